use tracing::info;

use crate::data_loader::GameLog;
use crate::error::{LeagueError, Result};
use crate::head_to_head::{build_head_to_head, HeadToHead};
use crate::league_context::LeagueContext;
use crate::magic_number::{compute_magic_numbers, MagicTable};
use crate::schedule::{estimate_schedule, ScheduleEstimate};
use crate::series::{analyze_all, TeamAnalytics};
use crate::standings::{compute_standings, Standings};
use crate::teams::TeamRegistry;
use crate::timeline::{Timeline, TimelineCache};

// Every derived view of one game log. No IO happens in here.
#[derive(Debug)]
pub struct LeagueViews {
    pub source_digest: String,
    pub total_games: usize,
    pub standings: Standings,
    pub head_to_head: HeadToHead,
    pub schedule: ScheduleEstimate,
    pub magic: MagicTable,
    pub timeline: Timeline,
    pub analytics: Vec<TeamAnalytics>,
}

pub fn run_engine(
    log: &GameLog,
    fixtures: Option<&GameLog>,
    registry: &TeamRegistry,
    context: &LeagueContext,
    cache: &mut TimelineCache,
) -> Result<LeagueViews> {
    if log.is_empty() {
        return Err(LeagueError::EmptyGameLog);
    }

    let standings = compute_standings(log, registry, context);
    let head_to_head = build_head_to_head(log, registry.len());
    let schedule = estimate_schedule(log, fixtures, registry, context)?;
    let magic = compute_magic_numbers(&standings, &schedule.remaining_by_team(), context);
    let timeline = cache.get_or_build(log, registry, context).clone();
    let analytics = analyze_all(log, registry, context);

    info!(
        games = log.completed_count(),
        teams = registry.len(),
        dates = timeline.points.len(),
        as_of = ?standings.as_of,
        "league views computed"
    );

    Ok(LeagueViews {
        source_digest: log.content_digest(),
        total_games: log.completed_count(),
        standings,
        head_to_head,
        schedule,
        magic,
        timeline,
        analytics,
    })
}
