use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::LeagueError;
use crate::league_context::LeagueContext;
use crate::standings::{Standing, Standings};
use crate::teams::TeamId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Clinched,
    Magic,
    Competitive,
    Tragic,
    Eliminated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MagicNumberEntry {
    pub team: TeamId,
    pub target_rank: usize,
    pub value: u32,
    pub classification: Classification,
    pub lock_number: Option<u32>,
    pub tragic_number: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamMagic {
    pub team: TeamId,
    pub rank: usize,
    pub remaining: u32,
    pub per_target: Vec<MagicNumberEntry>,
    pub championship: Option<MagicNumberEntry>,
    pub playoff: Option<MagicNumberEntry>,
    pub home_field: Option<MagicNumberEntry>,
}

impl TeamMagic {
    pub fn target(&self, rank: usize) -> Option<&MagicNumberEntry> {
        self.per_target.iter().find(|e| e.target_rank == rank)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeMagic {
    pub group: String,
    pub applicable: bool,
    pub teams: Vec<TeamMagic>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MagicTable {
    pub scopes: Vec<ScopeMagic>,
}

impl MagicTable {
    pub fn team(&self, team: TeamId) -> Option<&TeamMagic> {
        self.scopes.iter().flat_map(|s| s.teams.iter()).find(|t| t.team == team)
    }

    pub fn entry(&self, team: TeamId, rank: usize) -> Option<&MagicNumberEntry> {
        self.team(team)?.target(rank)
    }

    pub fn entries(&self) -> impl Iterator<Item = &MagicNumberEntry> + '_ {
        self.scopes.iter().flat_map(|s| s.teams.iter()).flat_map(|t| t.per_target.iter())
    }
}

// Recomputed wholesale every run. `remaining` is indexed by team id.
pub fn compute_magic_numbers(standings: &Standings, remaining: &[u32], context: &LeagueContext) -> MagicTable {
    let scopes = standings
        .groups
        .iter()
        .map(|g| compute_scope(&g.group, &g.table, remaining, context))
        .collect();

    MagicTable { scopes }
}

fn compute_scope(group: &str, table: &[Standing], remaining: &[u32], context: &LeagueContext) -> ScopeMagic {
    let rem = |s: &Standing| remaining.get(s.team).copied().unwrap_or(0);

    if table.len() < 2 {
        let e = LeagueError::EmptyLeague { scope: group.to_string() };
        info!(group = %group, "{e}, magic numbers not applicable");

        let teams = table
            .iter()
            .map(|s| TeamMagic {
                team: s.team,
                rank: s.rank,
                remaining: rem(s),
                per_target: Vec::new(),
                championship: None,
                playoff: None,
                home_field: None,
            })
            .collect();
        return ScopeMagic { group: group.to_string(), applicable: false, teams };
    }

    let last_target = table.len() - 1;
    let highlight = |per_target: &[MagicNumberEntry], r: usize| -> Option<MagicNumberEntry> {
        if r == 0 || r > last_target { return None; }
        per_target.iter().find(|e| e.target_rank == r).cloned()
    };

    let teams = table
        .iter()
        .map(|s| {
            let per_target: Vec<MagicNumberEntry> = (1..=last_target)
                .map(|r| {
                    let target = &table[r - 1];
                    let outside = &table[r];
                    magic_entry(s, rem(s), r, (target.wins, rem(target)), (outside.wins, rem(outside)), context)
                })
                .collect();

            debug!(team = s.team, rank = s.rank, targets = per_target.len(), "magic numbers");

            TeamMagic {
                team: s.team,
                rank: s.rank,
                remaining: rem(s),
                championship: highlight(&per_target, 1),
                playoff: highlight(&per_target, context.playoff_spots),
                home_field: highlight(&per_target, context.home_field_rank),
                per_target,
            }
        })
        .collect();

    ScopeMagic { group: group.to_string(), applicable: true, teams }
}

// `target` is the (wins, remaining) of the team at rank r, `outside` the one at r + 1.
pub fn magic_entry(
    team: &Standing,
    remaining: u32,
    target_rank: usize,
    target: (u32, u32),
    outside: (u32, u32),
    context: &LeagueContext,
) -> MagicNumberEntry {
    if team.rank <= target_rank {
        let needed = (outside.0 + outside.1 + 1).saturating_sub(team.wins);
        let lock = if needed > remaining { context.eliminated_sentinel } else { needed };

        return MagicNumberEntry {
            team: team.team,
            target_rank,
            value: 0,
            classification: Classification::Clinched,
            lock_number: Some(lock),
            tragic_number: None,
        };
    }

    let required = target.0 + target.1 + 1;
    let ceiling = team.wins + remaining;

    if required > ceiling {
        return MagicNumberEntry {
            team: team.team,
            target_rank,
            value: context.eliminated_sentinel,
            classification: Classification::Eliminated,
            lock_number: None,
            tragic_number: Some(0),
        };
    }

    // Ranked below on win% even with more wins than the target can reach, so one more win is still owed
    let value = required.saturating_sub(team.wins).max(1);
    let classification = if value <= context.magic_threshold {
        Classification::Magic
    } else if value * 2 <= remaining {
        Classification::Competitive
    } else {
        Classification::Tragic
    };

    MagicNumberEntry {
        team: team.team,
        target_rank,
        value,
        classification,
        lock_number: None,
        tragic_number: Some(ceiling - required + 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::standings::{build_standings, rank_scope, TeamRecord, Wld};
    use crate::teams::TeamRegistry;

    fn record(team: TeamId, wins: u32, losses: u32) -> TeamRecord {
        let mut r = TeamRecord::new(team);
        r.total = Wld { wins, losses, draws: 0 };
        r
    }

    fn scope(records: &[TeamRecord]) -> Standings {
        let members: Vec<TeamId> = records.iter().map(|r| r.team).collect();
        let context = LeagueContext::kbo();
        Standings {
            as_of: None,
            groups: vec![crate::standings::GroupStandings {
                group: "league".to_string(),
                table: rank_scope(records, &members, "league", &context),
            }],
        }
    }

    #[test]
    fn test_leader_lock_number() {
        let context = LeagueContext::kbo();
        let standings = scope(&[record(0, 90, 60), record(1, 85, 65)]);
        let table = compute_magic_numbers(&standings, &[12, 12], &context);

        let a = table.entry(0, 1).unwrap();
        assert_eq!(a.value, 0);
        assert_eq!(a.classification, Classification::Clinched);
        assert_eq!(a.lock_number, Some(8));

        // 85 + 12 cannot reach 103
        let b = table.entry(1, 1).unwrap();
        assert_eq!(b.classification, Classification::Eliminated);
        assert_eq!(b.value, 999);
        assert_eq!(b.tragic_number, Some(0));
    }

    #[test]
    fn test_chaser_classifications() {
        let context = LeagueContext::kbo();
        let standings = scope(&[record(0, 56, 50), record(1, 57, 60), record(2, 50, 60), record(3, 45, 65)]);
        let table = compute_magic_numbers(&standings, &[2, 20, 20, 20], &context);

        let magic = table.entry(1, 1).unwrap();
        assert_eq!((magic.value, magic.classification), (2, Classification::Magic));
        assert_eq!(magic.tragic_number, Some(19));

        let competitive = table.entry(2, 1).unwrap();
        assert_eq!((competitive.value, competitive.classification), (9, Classification::Competitive));

        let tragic = table.entry(3, 1).unwrap();
        assert_eq!((tragic.value, tragic.classification), (14, Classification::Tragic));
        assert_eq!(tragic.tragic_number, Some(7));

        // 57 + 20 + 1 is out of reach in two games
        assert_eq!(table.entry(0, 1).unwrap().lock_number, Some(999));
        assert_eq!(table.team(0).unwrap().per_target.len(), 3);
    }

    #[test]
    fn test_highlights_respect_scope_size() {
        let context = LeagueContext::kbo();
        let standings = scope(&[record(0, 10, 5), record(1, 8, 7), record(2, 7, 8), record(3, 5, 10)]);
        let table = compute_magic_numbers(&standings, &[10, 10, 10, 10], &context);
        let leader = table.team(0).unwrap();

        assert_eq!(leader.championship.as_ref().map(|e| e.target_rank), Some(1));
        assert_eq!(leader.home_field.as_ref().map(|e| e.target_rank), Some(2));
        // five playoff spots in a four team scope
        assert!(leader.playoff.is_none());
        assert!(table.entry(0, 4).is_none());
    }

    #[test]
    fn test_zero_iff_holding_rank() {
        let context = LeagueContext::kbo();
        let standings = scope(&[record(0, 70, 50), record(1, 66, 54), record(2, 60, 60), record(3, 58, 62), record(4, 40, 80)]);
        let remaining = [24, 24, 24, 24, 24];
        let table = compute_magic_numbers(&standings, &remaining, &context);

        for s in standings.all() {
            for r in 1..5 {
                let e = table.entry(s.team, r).unwrap();
                assert_eq!(e.value == 0, s.rank <= r);

                let target = standings.groups[0].table[r - 1].wins + remaining[0] + 1;
                let eliminated = s.rank > r && s.wins + remaining[s.team] < target;
                assert_eq!(e.classification == Classification::Eliminated, eliminated);
                assert!(e.value == context.eliminated_sentinel || e.value < 100);
            }
        }
    }

    #[test]
    fn test_chaser_past_target_ceiling_stays_nonzero() {
        let context = LeagueContext::kbo();
        // 80-70 already beats 60 + 0 on wins but trails on win%
        let standings = scope(&[record(0, 70, 40), record(1, 60, 40), record(2, 80, 70)]);
        let table = compute_magic_numbers(&standings, &[0, 0, 10], &context);

        assert_eq!(standings.find(2).unwrap().rank, 3);
        let e = table.entry(2, 2).unwrap();
        assert_eq!(e.value, 1);
        assert_eq!(e.classification, Classification::Magic);
        assert_eq!(e.tragic_number, Some(30));

        for s in standings.all() {
            for r in 1..3 {
                assert_eq!(table.entry(s.team, r).unwrap().value == 0, s.rank <= r);
            }
        }
    }

    #[test]
    fn test_small_scope_not_applicable() {
        let mut context = LeagueContext::kbo();
        context.teams.truncate(1);
        let registry = TeamRegistry::from_context(&context);
        let standings = build_standings(&[TeamRecord::new(0)], &registry, &context, None);

        let table = compute_magic_numbers(&standings, &[144], &context);
        assert!(!table.scopes[0].applicable);
        assert!(table.scopes[0].teams[0].per_target.is_empty());
        assert_eq!(table.entries().count(), 0);
    }
}
