use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

use crate::data_loader::{Game, GameLog, Outcome};
use crate::league_context::LeagueContext;
use crate::series::current_streak;
use crate::teams::{TeamId, TeamRegistry};
use crate::util::{cmp_fraction, ratio, round_to};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wld {
    #[serde(rename = "W")]
    pub wins: u32,
    #[serde(rename = "L")]
    pub losses: u32,
    #[serde(rename = "D")]
    pub draws: u32,
}

impl Wld {
    pub fn add(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Win => self.wins += 1,
            Outcome::Loss => self.losses += 1,
            Outcome::Draw => self.draws += 1,
        }
    }

    pub fn merge(&mut self, other: &Wld) {
        self.wins += other.wins;
        self.losses += other.losses;
        self.draws += other.draws;
    }

    pub fn games(&self) -> u32 {
        self.wins + self.losses + self.draws
    }

    // Draws stay out of the denominator
    pub fn win_pct(&self) -> f64 {
        ratio(self.wins, self.wins + self.losses)
    }
}

impl std::ops::Add for Wld {
    type Output = Wld;

    fn add(self, other: Wld) -> Self::Output {
        Wld {
            wins: self.wins + other.wins,
            losses: self.losses + other.losses,
            draws: self.draws + other.draws,
        }
    }
}

impl std::iter::Sum for Wld {
    fn sum<I>(iter: I) -> Self
    where
        I: Iterator<Item = Self>,
    {
        iter.fold(Wld::default(), |a, b| a + b)
    }
}

// Running totals for one team. Rebuilt from the log on every run, never patched.
#[derive(Debug, Clone, Default)]
pub struct TeamRecord {
    pub team: TeamId,
    pub total: Wld,
    pub home: Wld,
    pub away: Wld,
    pub runs_scored: u32,
    pub runs_allowed: u32,
    pub results: Vec<Outcome>,
}

impl TeamRecord {
    pub fn new(team: TeamId) -> Self {
        Self { team, ..Default::default() }
    }

    pub fn record_game(&mut self, game: &Game) {
        debug_assert!(game.involves(self.team));

        let outcome = game.outcome_for(self.team);
        let (scored, allowed) = game.runs_for(self.team);

        self.total.add(outcome);
        match game.is_home(self.team) {
            Some(true) => self.home.add(outcome),
            Some(false) => self.away.add(outcome),
            None => {}
        }
        self.runs_scored += scored;
        self.runs_allowed += allowed;
        self.results.push(outcome);
    }

    pub fn games(&self) -> u32 { self.total.games() }
    pub fn wins(&self) -> u32 { self.total.wins }
    pub fn losses(&self) -> u32 { self.total.losses }
    pub fn draws(&self) -> u32 { self.total.draws }
    pub fn win_pct(&self) -> f64 { self.total.win_pct() }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Standing {
    pub team: TeamId,
    pub group: String,
    pub rank: usize,
    pub games: u32,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub win_pct: f64,
    pub games_behind: f64,
    pub recent_form: String,
    pub streak: String,
    pub home: Wld,
    pub away: Wld,
    pub runs_scored: u32,
    pub runs_allowed: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupStandings {
    pub group: String,
    pub table: Vec<Standing>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Standings {
    pub as_of: Option<NaiveDate>,
    pub groups: Vec<GroupStandings>,
}

impl Standings {
    pub fn all(&self) -> impl Iterator<Item = &Standing> + '_ {
        self.groups.iter().flat_map(|g| g.table.iter())
    }

    pub fn find(&self, team: TeamId) -> Option<&Standing> {
        self.all().find(|s| s.team == team)
    }

    pub fn group(&self, group: &str) -> Option<&GroupStandings> {
        self.groups.iter().find(|g| g.group == group)
    }
}

pub fn compute_standings(log: &GameLog, registry: &TeamRegistry, context: &LeagueContext) -> Standings {
    let records = tally_records(log.completed(), registry.len());
    let standings = build_standings(&records, registry, context, log.last_date());

    for s in standings.all() {
        debug!(
            team = registry.code(s.team),
            rank = s.rank,
            wins = s.wins,
            losses = s.losses,
            draws = s.draws,
            games_behind = s.games_behind,
            "standing"
        );
    }

    standings
}

pub fn tally_records<'a>(games: impl Iterator<Item = &'a Game>, team_count: usize) -> Vec<TeamRecord> {
    let mut records: Vec<TeamRecord> = (0..team_count).map(TeamRecord::new).collect();

    for g in games {
        if !g.completed { continue; }
        records[g.team_a].record_game(g);
        records[g.team_b].record_game(g);
    }

    records
}

// Shared by the current table and every timeline date so both rank identically
pub fn build_standings(records: &[TeamRecord], registry: &TeamRegistry, context: &LeagueContext, as_of: Option<NaiveDate>) -> Standings {
    let groups = registry
        .groups()
        .iter()
        .map(|group| GroupStandings {
            group: group.clone(),
            table: rank_scope(records, &registry.members(group), group, context),
        })
        .collect();

    Standings { as_of, groups }
}

// Better team first: win% desc, wins desc, losses asc, then registration order
pub fn compare_records(a: &TeamRecord, b: &TeamRecord) -> Ordering {
    cmp_fraction(b.wins(), b.wins() + b.losses(), a.wins(), a.wins() + a.losses())
        .then_with(|| b.wins().cmp(&a.wins()))
        .then_with(|| a.losses().cmp(&b.losses()))
        .then_with(|| a.team.cmp(&b.team))
}

pub fn rank_scope(records: &[TeamRecord], members: &[TeamId], group: &str, context: &LeagueContext) -> Vec<Standing> {
    let mut ordered: Vec<&TeamRecord> = members.iter().map(|&id| &records[id]).collect();
    ordered.sort_by(|a, b| compare_records(a, b));

    let Some(leader) = ordered.first().copied() else { return Vec::new() };

    ordered
        .iter()
        .enumerate()
        .map(|(idx, r)| Standing {
            team: r.team,
            group: group.to_string(),
            rank: idx + 1,
            games: r.games(),
            wins: r.wins(),
            losses: r.losses(),
            draws: r.draws(),
            win_pct: r.win_pct(),
            games_behind: games_behind(leader, r),
            recent_form: recent_form(&r.results, context.recent_form_window),
            streak: current_streak(&r.results).to_string(),
            home: r.home,
            away: r.away,
            runs_scored: r.runs_scored,
            runs_allowed: r.runs_allowed,
        })
        .collect()
}

// Half-game differential to the leader, never negative
pub fn games_behind(leader: &TeamRecord, team: &TeamRecord) -> f64 {
    let halves = (leader.wins() as i64 - team.wins() as i64) + (team.losses() as i64 - leader.losses() as i64);
    round_to(halves.max(0) as f64 / 2.0, 1)
}

pub fn recent_form(results: &[Outcome], window: usize) -> String {
    let recent = &results[results.len().saturating_sub(window)..];
    let mut form = Wld::default();
    for &o in recent {
        form.add(o);
    }

    format!("{}W-{}D-{}L", form.wins, form.draws, form.losses)
}
