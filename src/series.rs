use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

use crate::data_loader::{Game, GameLog, Outcome};
use crate::league_context::LeagueContext;
use crate::standings::Wld;
use crate::teams::{TeamId, TeamRegistry};
use crate::util::round_to;

const SWEEP_MIN_GAMES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesOutcome {
    Winning,
    Losing,
    Split,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesRecord {
    pub team: TeamId,
    pub opponent: TeamId,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub record: Wld,
    pub outcome: SeriesOutcome,
    pub sweep: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesSummary {
    pub total: u32,
    pub winning: u32,
    pub losing: u32,
    pub split: u32,
    pub sweeps_won: u32,
    pub sweeps_lost: u32,
}

// Record plus runs for one slice of the calendar
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitRecord {
    #[serde(flatten)]
    pub record: Wld,
    pub runs_scored: u32,
    pub runs_allowed: u32,
}

impl SplitRecord {
    pub fn add(&mut self, outcome: Outcome, scored: u32, allowed: u32) {
        self.record.add(outcome);
        self.runs_scored += scored;
        self.runs_allowed += allowed;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Streak {
    pub kind: Option<Outcome>,
    pub length: u32,
}

impl fmt::Display for Streak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            Some(o) if self.length > 0 => write!(f, "{}{}", self.length, o.symbol()),
            _ => write!(f, "-"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TeamAnalytics {
    pub team: TeamId,
    pub series: Vec<SeriesRecord>,
    pub summary: SeriesSummary,
    pub current_streak: Streak,
    pub max_win_streak: u32,
    pub max_lose_streak: u32,
    pub one_run: Wld,
    pub blowout: Wld,
    pub shutout: Wld,
    pub clutch: Option<f64>,
    pub pythagorean: Option<f64>,
    pub luck: Option<f64>,
    pub monthly: BTreeMap<String, SplitRecord>,    // keyed YYYY-MM
    pub weekday: [SplitRecord; 7],                 // Monday first
}

// Trailing draws are skipped; any draw before that ends the run.
pub fn current_streak(results: &[Outcome]) -> Streak {
    let mut decisive = results.iter().rev().skip_while(|&&o| o == Outcome::Draw);

    let Some(&kind) = decisive.next() else { return Streak::default() };
    let length = 1 + decisive.take_while(|&&o| o == kind).count() as u32;

    Streak { kind: Some(kind), length }
}

pub fn max_streak(results: &[Outcome], kind: Outcome) -> u32 {
    let mut best = 0;
    let mut run = 0;
    for &o in results {
        if o == kind {
            run += 1;
            best = best.max(run);
        } else {
            run = 0;
        }
    }
    best
}

// Splits one team's chronological games into runs against the same opponent
pub fn segment_series(team: TeamId, games: &[&Game]) -> Vec<SeriesRecord> {
    let mut series: Vec<SeriesRecord> = Vec::new();

    for g in games {
        let opponent = g.opponent(team);
        let outcome = g.outcome_for(team);

        match series.last_mut() {
            Some(current) if current.opponent == opponent => {
                current.end = g.date;
                current.record.add(outcome);
            }
            _ => {
                let mut record = Wld::default();
                record.add(outcome);
                series.push(SeriesRecord {
                    team,
                    opponent,
                    start: g.date,
                    end: g.date,
                    record,
                    outcome: SeriesOutcome::Split,
                    sweep: false,
                });
            }
        }
    }

    for s in series.iter_mut() {
        s.outcome = if s.record.wins > s.record.losses {
            SeriesOutcome::Winning
        } else if s.record.losses > s.record.wins {
            SeriesOutcome::Losing
        } else {
            SeriesOutcome::Split
        };
        s.sweep = s.record.games() >= SWEEP_MIN_GAMES && (s.record.wins == 0 || s.record.losses == 0) && s.outcome != SeriesOutcome::Split;
    }

    series
}

pub fn summarize_series(series: &[SeriesRecord]) -> SeriesSummary {
    let mut summary = SeriesSummary::default();

    for s in series {
        summary.total += 1;
        match s.outcome {
            SeriesOutcome::Winning => summary.winning += 1,
            SeriesOutcome::Losing => summary.losing += 1,
            SeriesOutcome::Split => summary.split += 1,
        }
        if s.sweep {
            match s.outcome {
                SeriesOutcome::Winning => summary.sweeps_won += 1,
                SeriesOutcome::Losing => summary.sweeps_lost += 1,
                SeriesOutcome::Split => {}
            }
        }
    }

    summary
}

pub fn pythagorean(runs_scored: u32, runs_allowed: u32) -> Option<f64> {
    let rs = (runs_scored as f64).powi(2);
    let ra = (runs_allowed as f64).powi(2);
    if rs + ra == 0.0 { return None; }

    Some(rs / (rs + ra))
}

pub fn analyze_team(log: &GameLog, team: TeamId, context: &LeagueContext) -> TeamAnalytics {
    let games: Vec<&Game> = log.completed().filter(|g| g.involves(team)).collect();
    let results: Vec<Outcome> = games.iter().map(|g| g.outcome_for(team)).collect();

    let mut overall = Wld::default();
    let mut one_run = Wld::default();
    let mut blowout = Wld::default();
    let mut shutout = Wld::default();
    let mut monthly: BTreeMap<String, SplitRecord> = BTreeMap::new();
    let mut weekday = [SplitRecord::default(); 7];
    let mut runs_scored = 0;
    let mut runs_allowed = 0;

    for (g, &outcome) in games.iter().zip(&results) {
        let (scored, allowed) = g.runs_for(team);
        runs_scored += scored;
        runs_allowed += allowed;
        overall.add(outcome);

        monthly.entry(g.date.format("%Y-%m").to_string()).or_default().add(outcome, scored, allowed);
        weekday[g.date.weekday().num_days_from_monday() as usize].add(outcome, scored, allowed);

        let margin = g.margin();
        if margin == 1 { one_run.add(outcome); }
        if margin >= context.blowout_margin { blowout.add(outcome); }

        match outcome {
            Outcome::Win if allowed == 0 => shutout.add(outcome),
            Outcome::Loss if scored == 0 => shutout.add(outcome),
            _ => {}
        }
    }

    let series = segment_series(team, &games);
    let summary = summarize_series(&series);

    let clutch = (one_run.wins + one_run.losses > 0).then(|| round_to(one_run.win_pct() - overall.win_pct(), 3));
    let pyth = pythagorean(runs_scored, runs_allowed);
    let luck = pyth.map(|p| round_to(overall.win_pct() - p, 3));

    TeamAnalytics {
        team,
        series,
        summary,
        current_streak: current_streak(&results),
        max_win_streak: max_streak(&results, Outcome::Win),
        max_lose_streak: max_streak(&results, Outcome::Loss),
        one_run,
        blowout,
        shutout,
        clutch,
        pythagorean: pyth.map(|p| round_to(p, 3)),
        luck,
        monthly,
        weekday,
    }
}

pub fn analyze_all(log: &GameLog, registry: &TeamRegistry, context: &LeagueContext) -> Vec<TeamAnalytics> {
    registry
        .teams()
        .iter()
        .map(|t| {
            let analytics = analyze_team(log, t.id, context);
            debug!(
                team = %t.code,
                series = analytics.summary.total,
                streak = %analytics.current_streak,
                sweeps = analytics.summary.sweeps_won,
                "series analysis"
            );
            analytics
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_loader::tests::{make_game, make_log};
    use Outcome::*;

    #[test]
    fn test_streak_draw_policy() {
        let s = &[Win, Win, Loss, Win];
        assert_eq!(current_streak(s).to_string(), "1W");
        assert_eq!(max_streak(s, Win), 2);
        assert_eq!(max_streak(s, Loss), 1);

        assert_eq!(current_streak(&[Win, Draw, Win]).to_string(), "1W");
        assert_eq!(current_streak(&[Win, Win, Draw]).to_string(), "2W");
        assert_eq!(current_streak(&[Loss, Loss, Draw, Draw]).to_string(), "2L");
        assert_eq!(max_streak(&[Win, Draw, Win], Win), 1);
    }

    #[test]
    fn test_streak_without_decisions() {
        assert_eq!(current_streak(&[]).to_string(), "-");
        assert_eq!(current_streak(&[Draw, Draw]).to_string(), "-");
    }

    #[test]
    fn test_series_segmentation_and_sweeps() {
        let context = LeagueContext::kbo();
        let log = make_log(vec![
            make_game("2025-05-02", 0, 3, 1, 1),
            make_game("2025-05-03", 0, 5, 4, 1),
            make_game("2025-05-04", 0, 2, 0, 1),
            make_game("2025-05-06", 0, 1, 2, 2),
            make_game("2025-05-07", 0, 3, 3, 2),
            make_game("2025-05-09", 3, 4, 1, 0),
            make_game("2025-05-10", 0, 6, 2, 1),
        ]);

        let analytics = analyze_team(&log, 0, &context);
        let series = &analytics.series;

        assert_eq!(series.len(), 4);
        assert_eq!(series[0].record, Wld { wins: 3, losses: 0, draws: 0 });
        assert!(series[0].sweep);
        assert_eq!(series[0].end, crate::data_loader::tests::date("2025-05-04"));
        assert_eq!(series[1].outcome, SeriesOutcome::Losing);
        assert!(!series[1].sweep);
        // a return to an earlier opponent is a new series
        assert_eq!(series[3].opponent, 1);

        assert_eq!(
            analytics.summary,
            SeriesSummary { total: 4, winning: 2, losing: 2, split: 0, sweeps_won: 1, sweeps_lost: 0 }
        );
        assert_eq!(analytics.current_streak.to_string(), "1W");
    }

    #[test]
    fn test_situational_records() {
        let context = LeagueContext::kbo();
        let log = make_log(vec![
            make_game("2025-06-01", 0, 2, 1, 1),
            make_game("2025-06-02", 0, 10, 0, 1),
            make_game("2025-06-03", 0, 0, 8, 1),
            make_game("2025-06-04", 0, 3, 4, 1),
        ]);

        let a = analyze_team(&log, 0, &context);
        assert_eq!(a.one_run, Wld { wins: 1, losses: 1, draws: 0 });
        assert_eq!(a.blowout, Wld { wins: 1, losses: 1, draws: 0 });
        assert_eq!(a.shutout, Wld { wins: 1, losses: 1, draws: 0 });
        assert_eq!(a.clutch, Some(0.0));
        // 15 scored, 13 allowed
        assert_eq!(a.pythagorean, Some(0.571));
        assert_eq!(a.luck, Some(-0.071));
    }

    #[test]
    fn test_undefined_ratios() {
        let context = LeagueContext::kbo();
        let log = make_log(vec![make_game("2025-06-01", 0, 0, 0, 1), make_game("2025-06-02", 2, 5, 0, 3)]);

        let a = analyze_team(&log, 0, &context);
        assert_eq!(a.pythagorean, None);
        assert_eq!(a.luck, None);
        assert_eq!(a.clutch, None);
        assert_eq!(a.shutout, Wld::default());

        let idle = analyze_team(&log, 5, &context);
        assert!(idle.series.is_empty());
        assert_eq!(idle.current_streak.to_string(), "-");
    }

    #[test]
    fn test_monthly_and_weekday_splits() {
        let context = LeagueContext::kbo();
        let log = make_log(vec![
            make_game("2025-05-31", 0, 3, 1, 1),    // Sat
            make_game("2025-06-01", 0, 2, 2, 1),    // Sun
            make_game("2025-06-02", 0, 1, 4, 2),    // Mon
            make_game("2025-06-09", 3, 0, 5, 0),    // Mon, 0 is the home side
        ]);

        let a = analyze_team(&log, 0, &context);

        assert_eq!(a.monthly.len(), 2);
        let may = a.monthly["2025-05"];
        assert_eq!((may.record, may.runs_scored, may.runs_allowed), (Wld { wins: 1, losses: 0, draws: 0 }, 3, 1));
        let june = a.monthly["2025-06"];
        assert_eq!((june.record, june.runs_scored, june.runs_allowed), (Wld { wins: 1, losses: 1, draws: 1 }, 8, 6));

        assert_eq!(a.weekday[0].record, Wld { wins: 1, losses: 1, draws: 0 });
        assert_eq!((a.weekday[0].runs_scored, a.weekday[0].runs_allowed), (6, 4));
        assert_eq!(a.weekday[5].record.wins, 1);
        assert_eq!(a.weekday[6].record.draws, 1);
        assert!(a.weekday[1..5].iter().all(|d| *d == SplitRecord::default()));

        let total: Wld = a.weekday.iter().map(|d| d.record).sum();
        assert_eq!(total.games(), 4);
    }
}
