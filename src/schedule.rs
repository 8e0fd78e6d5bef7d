use serde::Serialize;
use tracing::{debug, warn};

use crate::data_loader::GameLog;
use crate::error::{LeagueError, Result};
use crate::league_context::LeagueContext;
use crate::teams::{TeamId, TeamRegistry};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScheduleQuota {
    pub expected: u32,
    pub played: u32,
    pub remaining: u32,
}

impl ScheduleQuota {
    fn new(expected: u32, played: u32) -> Self {
        Self {
            expected,
            played,
            remaining: expected.saturating_sub(played),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeasonMismatch {
    pub team: TeamId,
    pub expected_total: u32,
    pub season_games: u32,
}

#[derive(Debug)]
pub struct ScheduleEstimate {
    size: usize,
    quotas: Vec<ScheduleQuota>,     // symmetric N x N, diagonal unused
    pub exceeded: Vec<LeagueError>,
    pub season_mismatches: Vec<SeasonMismatch>,
    pub from_fixtures: bool,
}

impl ScheduleEstimate {
    pub fn quota(&self, a: TeamId, b: TeamId) -> Option<&ScheduleQuota> {
        if a == b { return None; }
        self.quotas.get(a * self.size + b)
    }

    pub fn remaining(&self, team: TeamId) -> u32 {
        (0..self.size).filter_map(|opp| self.quota(team, opp)).map(|q| q.remaining).sum()
    }

    pub fn remaining_by_team(&self) -> Vec<u32> {
        (0..self.size).map(|t| self.remaining(t)).collect()
    }

    pub fn expected_total(&self, team: TeamId) -> u32 {
        (0..self.size).filter_map(|opp| self.quota(team, opp)).map(|q| q.expected).sum()
    }
}

// Meetings still owed per pair. A fixture list wins over configured quotas when present.
pub fn estimate_schedule(log: &GameLog, fixtures: Option<&GameLog>, registry: &TeamRegistry, context: &LeagueContext) -> Result<ScheduleEstimate> {
    let n = registry.len();

    let played = count_meetings(log, n, true);
    let expected = match fixtures {
        Some(f) => count_meetings(f, n, false),
        None => configured_quotas(registry, context)?,
    };

    let mut estimate = ScheduleEstimate {
        size: n,
        quotas: vec![ScheduleQuota::default(); n * n],
        exceeded: Vec::new(),
        season_mismatches: Vec::new(),
        from_fixtures: fixtures.is_some(),
    };

    for a in 0..n {
        for b in 0..n {
            if a == b { continue; }
            let idx = a * n + b;
            let quota = ScheduleQuota::new(expected[idx], played[idx]);

            if quota.played > quota.expected && a < b {
                warn!(
                    team = registry.code(a),
                    opponent = registry.code(b),
                    played = quota.played,
                    expected = quota.expected,
                    "more meetings than scheduled, remaining clamped to 0"
                );
                estimate.exceeded.push(LeagueError::QuotaExceeded {
                    team: registry.code(a).to_string(),
                    opponent: registry.code(b).to_string(),
                    played: quota.played,
                    expected: quota.expected,
                });
            }
            estimate.quotas[idx] = quota;
        }
    }

    for team in 0..n {
        let expected_total = estimate.expected_total(team);
        if expected_total != context.season_games {
            warn!(
                team = registry.code(team),
                expected_total,
                season_games = context.season_games,
                "scheduled meetings do not add up to the season length"
            );
            estimate.season_mismatches.push(SeasonMismatch {
                team,
                expected_total,
                season_games: context.season_games,
            });
        }
    }

    debug!(from_fixtures = estimate.from_fixtures, exceeded = estimate.exceeded.len(), "schedule estimated");
    Ok(estimate)
}

fn count_meetings(log: &GameLog, n: usize, completed_only: bool) -> Vec<u32> {
    let mut counts = vec![0; n * n];

    for g in log.games() {
        if completed_only && !g.completed { continue; }
        counts[g.team_a * n + g.team_b] += 1;
        counts[g.team_b * n + g.team_a] += 1;
    }

    counts
}

fn configured_quotas(registry: &TeamRegistry, context: &LeagueContext) -> Result<Vec<u32>> {
    let n = registry.len();
    let mut quotas = vec![0; n * n];

    for a in 0..n {
        for b in 0..n {
            if a == b { continue; }
            quotas[a * n + b] = if registry.same_group(a, b) {
                context.games_per_opponent
            } else {
                context.inter_group_games_per_opponent
            };
        }
    }

    for o in &context.pair_overrides {
        let a = resolve_override(registry, &o.a)?;
        let b = resolve_override(registry, &o.b)?;
        if a == b {
            return Err(LeagueError::Config(format!("pair override pairs {} with itself", o.a)));
        }
        quotas[a * n + b] = o.games;
        quotas[b * n + a] = o.games;
    }

    Ok(quotas)
}

fn resolve_override(registry: &TeamRegistry, name: &str) -> Result<TeamId> {
    registry
        .lookup(name)
        .found()
        .ok_or_else(|| LeagueError::Config(format!("pair override names unknown team '{name}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_loader::tests::{make_game, make_log};
    use crate::league_context::PairQuota;

    #[test]
    fn test_configured_quotas() {
        let context = LeagueContext::kbo();
        let registry = TeamRegistry::from_context(&context);
        let log = make_log(vec![
            make_game("2025-04-01", 0, 5, 3, 1),
            make_game("2025-04-02", 1, 2, 2, 0),
        ]);

        let estimate = estimate_schedule(&log, None, &registry, &context).unwrap();
        let q = estimate.quota(0, 1).unwrap();

        assert_eq!(*q, ScheduleQuota { expected: 16, played: 2, remaining: 14 });
        assert_eq!(estimate.quota(1, 0), Some(q));
        assert_eq!(estimate.remaining(0), 144 - 2);
        assert_eq!(estimate.remaining(5), 144);
        assert!(estimate.season_mismatches.is_empty());
        assert!(estimate.quota(3, 3).is_none());
    }

    #[test]
    fn test_inter_group_and_overrides() {
        let mut context = LeagueContext::npb();
        context.pair_overrides.push(PairQuota { a: "G".to_string(), b: "H".to_string(), games: 4 });
        let registry = TeamRegistry::from_context(&context);
        let log = make_log(vec![make_game("2025-06-01", 0, 1, 2, 6)]);

        let estimate = estimate_schedule(&log, None, &registry, &context).unwrap();

        assert_eq!(estimate.quota(0, 1).unwrap().expected, 25);
        assert_eq!(estimate.quota(1, 7).unwrap().expected, 3);
        assert_eq!(estimate.quota(6, 0).unwrap().remaining, 3);
        // the override pushes G and H one game past the season length
        assert_eq!(estimate.expected_total(2), 143);
        let mismatched: Vec<TeamId> = estimate.season_mismatches.iter().map(|m| m.team).collect();
        assert_eq!(mismatched, vec![0, 6]);
    }

    #[test]
    fn test_unknown_override_is_config_error() {
        let mut context = LeagueContext::kbo();
        context.pair_overrides.push(PairQuota { a: "HH".to_string(), b: "Giants".to_string(), games: 4 });
        let registry = TeamRegistry::from_context(&context);

        let err = estimate_schedule(&GameLog::new(), None, &registry, &context).unwrap_err();
        assert!(matches!(err, LeagueError::Config(_)));
    }

    #[test]
    fn test_quota_exceeded_clamps() {
        let mut context = LeagueContext::kbo();
        context.games_per_opponent = 1;
        let registry = TeamRegistry::from_context(&context);
        let log = make_log(vec![
            make_game("2025-04-01", 0, 5, 3, 1),
            make_game("2025-04-02", 0, 4, 3, 1),
        ]);

        let estimate = estimate_schedule(&log, None, &registry, &context).unwrap();
        assert_eq!(estimate.quota(0, 1).unwrap().remaining, 0);
        assert_eq!(estimate.exceeded.len(), 1);
        assert!(!estimate.exceeded[0].is_fatal());
        // 9 opponents at 1 game each is not a 144 game season
        assert_eq!(estimate.season_mismatches.len(), 10);
    }

    #[test]
    fn test_fixture_list_sets_expected() {
        let mut context = LeagueContext::kbo();
        context.season_games = 3;
        let registry = TeamRegistry::from_context(&context);
        let log = make_log(vec![make_game("2025-04-01", 0, 5, 3, 1)]);

        let mut future = make_game("2025-04-02", 0, 0, 0, 1);
        future.completed = false;
        let mut other = make_game("2025-04-03", 0, 0, 0, 2);
        other.completed = false;
        let fixtures = make_log(vec![make_game("2025-04-01", 0, 5, 3, 1), future, other]);

        let estimate = estimate_schedule(&log, Some(&fixtures), &registry, &context).unwrap();
        assert!(estimate.from_fixtures);
        assert_eq!(*estimate.quota(0, 1).unwrap(), ScheduleQuota { expected: 2, played: 1, remaining: 1 });
        assert_eq!(estimate.quota(0, 2).unwrap().remaining, 1);
        assert_eq!(estimate.quota(3, 4).unwrap().expected, 0);
        assert_eq!(estimate.remaining(0), 2);
    }
}
