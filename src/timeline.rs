use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

use crate::data_loader::GameLog;
use crate::league_context::LeagueContext;
use crate::standings::{build_standings, Standings, TeamRecord};
use crate::teams::{TeamId, TeamRegistry};
use crate::util::round_to;

#[derive(Debug, Clone, PartialEq)]
pub struct TimelinePoint {
    pub date: NaiveDate,
    pub standings: Standings,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timeline {
    pub points: Vec<TimelinePoint>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamTimeline {
    pub dates: Vec<NaiveDate>,
    pub rank: Vec<usize>,
    pub win_pct: Vec<f64>,
    pub games_behind: Vec<f64>,
}

impl Timeline {
    pub fn last(&self) -> Option<&TimelinePoint> {
        self.points.last()
    }

    pub fn team(&self, team: TeamId) -> TeamTimeline {
        let mut series = TeamTimeline::default();

        for p in &self.points {
            let Some(s) = p.standings.find(team) else { continue };
            series.dates.push(p.date);
            series.rank.push(s.rank);
            series.win_pct.push(round_to(s.win_pct, 3));
            series.games_behind.push(s.games_behind);
        }

        series
    }
}

// One full ranking per date with completed games, using the same builder as the live table
pub fn reconstruct_timeline(log: &GameLog, registry: &TeamRegistry, context: &LeagueContext) -> Timeline {
    let mut records: Vec<TeamRecord> = (0..registry.len()).map(TeamRecord::new).collect();
    let mut points: Vec<TimelinePoint> = Vec::new();

    let games: Vec<_> = log.completed().collect();
    for day in games.chunk_by(|a, b| a.date == b.date) {
        for g in day {
            records[g.team_a].record_game(g);
            records[g.team_b].record_game(g);
        }

        let date = day[0].date;
        points.push(TimelinePoint {
            date,
            standings: build_standings(&records, registry, context, Some(date)),
        });
    }

    debug!(dates = points.len(), "timeline reconstructed");
    Timeline { points }
}

// Memoized timelines keyed by the log's content digest. Owned by the caller.
#[derive(Debug, Default)]
pub struct TimelineCache {
    entries: HashMap<String, Timeline>,
    pub hits: usize,
    pub misses: usize,
}

impl TimelineCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_build(&mut self, log: &GameLog, registry: &TeamRegistry, context: &LeagueContext) -> &Timeline {
        let key = log.content_digest();

        if self.entries.contains_key(&key) {
            self.hits += 1;
        } else {
            self.misses += 1;
        }

        self.entries
            .entry(key)
            .or_insert_with(|| reconstruct_timeline(log, registry, context))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
