use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::engine::LeagueViews;
use crate::error::Result;
use crate::head_to_head::HeadToHeadCell;
use crate::magic_number::{Classification, MagicNumberEntry};
use crate::series::{SeriesOutcome, SeriesSummary, SplitRecord, TeamAnalytics};
use crate::standings::Wld;
use crate::teams::TeamRegistry;
use crate::timeline::TeamTimeline;
use crate::util::round_to;

// generated_at is the only field that differs between two runs on the same log
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMeta {
    pub generated_at: DateTime<Utc>,
    pub source_digest: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StandingRow {
    pub team: String,
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

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StandingsDocument {
    #[serde(flatten)]
    pub meta: DocumentMeta,
    pub as_of_date: Option<NaiveDate>,
    pub per_team: Vec<StandingRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeadToHeadDocument {
    #[serde(flatten)]
    pub meta: DocumentMeta,
    pub per_pair: BTreeMap<String, BTreeMap<String, HeadToHeadCell>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MagicCell {
    pub value: u32,
    pub classification: Classification,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tragic_number: Option<u32>,
}

impl From<&MagicNumberEntry> for MagicCell {
    fn from(e: &MagicNumberEntry) -> Self {
        Self {
            value: e.value,
            classification: e.classification,
            lock_number: e.lock_number,
            tragic_number: e.tragic_number,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMagicRow {
    pub rank: usize,
    pub per_target_rank: BTreeMap<usize, MagicCell>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub championship: Option<MagicCell>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playoff: Option<MagicCell>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home_field: Option<MagicCell>,
    pub remaining_games: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScopeRow {
    pub group: String,
    pub applicable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MagicDocument {
    #[serde(flatten)]
    pub meta: DocumentMeta,
    pub per_team: BTreeMap<String, TeamMagicRow>,
    pub scopes: Vec<ScopeRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineDocument {
    #[serde(flatten)]
    pub meta: DocumentMeta,
    pub per_team: BTreeMap<String, TeamTimeline>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesRow {
    pub opponent: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub record: Wld,
    pub outcome: SeriesOutcome,
    pub sweep: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamAnalyticsRow {
    pub summary: SeriesSummary,
    pub current_streak: String,
    pub max_win_streak: u32,
    pub max_lose_streak: u32,
    pub one_run: Wld,
    pub blowout: Wld,
    pub shutout: Wld,
    pub pythagorean: Option<f64>,
    pub luck: Option<f64>,
    pub clutch: Option<f64>,
    pub monthly: BTreeMap<String, SplitRecord>,
    pub weekday: Vec<WeekdayRow>,
    pub series: Vec<SeriesRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekdayRow {
    pub day: &'static str,
    #[serde(flatten)]
    pub split: SplitRecord,
}

const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsDocument {
    #[serde(flatten)]
    pub meta: DocumentMeta,
    pub per_team: BTreeMap<String, TeamAnalyticsRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Documents {
    pub standings: StandingsDocument,
    pub head_to_head: HeadToHeadDocument,
    pub magic: MagicDocument,
    pub timeline: TimelineDocument,
    pub analytics: AnalyticsDocument,
}

impl Documents {
    pub fn build(views: &LeagueViews, registry: &TeamRegistry, generated_at: DateTime<Utc>) -> Self {
        let meta = DocumentMeta {
            generated_at,
            source_digest: views.source_digest.clone(),
        };

        Self {
            standings: standings_document(views, registry, meta.clone()),
            head_to_head: head_to_head_document(views, registry, meta.clone()),
            magic: magic_document(views, registry, meta.clone()),
            timeline: timeline_document(views, registry, meta.clone()),
            analytics: analytics_document(views, registry, meta),
        }
    }

    pub fn write_all(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(dir)?;

        let written = vec![
            write_json(dir, "standings.json", &self.standings)?,
            write_json(dir, "head-to-head.json", &self.head_to_head)?,
            write_json(dir, "magic-numbers.json", &self.magic)?,
            write_json(dir, "timeline.json", &self.timeline)?,
            write_json(dir, "analytics.json", &self.analytics)?,
        ];

        info!(dir = %dir.display(), files = written.len(), "documents written");
        Ok(written)
    }
}

fn write_json<T: Serialize>(dir: &Path, name: &str, value: &T) -> Result<PathBuf> {
    let path = dir.join(name);
    fs::write(&path, serde_json::to_string_pretty(value)?)?;
    Ok(path)
}

fn standings_document(views: &LeagueViews, registry: &TeamRegistry, meta: DocumentMeta) -> StandingsDocument {
    let per_team = views
        .standings
        .all()
        .map(|s| StandingRow {
            team: registry.code(s.team).to_string(),
            group: s.group.clone(),
            rank: s.rank,
            games: s.games,
            wins: s.wins,
            losses: s.losses,
            draws: s.draws,
            win_pct: round_to(s.win_pct, 3),
            games_behind: s.games_behind,
            recent_form: s.recent_form.clone(),
            streak: s.streak.clone(),
            home: s.home,
            away: s.away,
            runs_scored: s.runs_scored,
            runs_allowed: s.runs_allowed,
        })
        .collect();

    StandingsDocument { meta, as_of_date: views.standings.as_of, per_team }
}

fn head_to_head_document(views: &LeagueViews, registry: &TeamRegistry, meta: DocumentMeta) -> HeadToHeadDocument {
    let per_pair = registry
        .teams()
        .iter()
        .map(|t| {
            let row = views
                .head_to_head
                .row(t.id)
                .map(|(opp, cell)| (registry.code(opp).to_string(), *cell))
                .collect();
            (t.code.clone(), row)
        })
        .collect();

    HeadToHeadDocument { meta, per_pair }
}

fn magic_document(views: &LeagueViews, registry: &TeamRegistry, meta: DocumentMeta) -> MagicDocument {
    let mut per_team = BTreeMap::new();
    let mut scopes = Vec::new();

    for scope in &views.magic.scopes {
        scopes.push(ScopeRow { group: scope.group.clone(), applicable: scope.applicable });

        for t in &scope.teams {
            per_team.insert(
                registry.code(t.team).to_string(),
                TeamMagicRow {
                    rank: t.rank,
                    per_target_rank: t.per_target.iter().map(|e| (e.target_rank, MagicCell::from(e))).collect(),
                    championship: t.championship.as_ref().map(MagicCell::from),
                    playoff: t.playoff.as_ref().map(MagicCell::from),
                    home_field: t.home_field.as_ref().map(MagicCell::from),
                    remaining_games: t.remaining,
                },
            );
        }
    }

    MagicDocument { meta, per_team, scopes }
}

fn timeline_document(views: &LeagueViews, registry: &TeamRegistry, meta: DocumentMeta) -> TimelineDocument {
    let per_team = registry
        .teams()
        .iter()
        .map(|t| (t.code.clone(), views.timeline.team(t.id)))
        .collect();

    TimelineDocument { meta, per_team }
}

fn analytics_document(views: &LeagueViews, registry: &TeamRegistry, meta: DocumentMeta) -> AnalyticsDocument {
    let per_team = views
        .analytics
        .iter()
        .map(|a| (registry.code(a.team).to_string(), analytics_row(a, registry)))
        .collect();

    AnalyticsDocument { meta, per_team }
}

fn analytics_row(a: &TeamAnalytics, registry: &TeamRegistry) -> TeamAnalyticsRow {
    TeamAnalyticsRow {
        summary: a.summary,
        current_streak: a.current_streak.to_string(),
        max_win_streak: a.max_win_streak,
        max_lose_streak: a.max_lose_streak,
        one_run: a.one_run,
        blowout: a.blowout,
        shutout: a.shutout,
        pythagorean: a.pythagorean,
        luck: a.luck,
        clutch: a.clutch,
        monthly: a.monthly.clone(),
        weekday: WEEKDAYS
            .iter()
            .zip(a.weekday)
            .map(|(&day, split)| WeekdayRow { day, split })
            .collect(),
        series: a
            .series
            .iter()
            .map(|s| SeriesRow {
                opponent: registry.code(s.opponent).to_string(),
                start: s.start,
                end: s.end,
                record: s.record,
                outcome: s.outcome,
                sweep: s.sweep,
            })
            .collect(),
    }
}

pub fn print_standings(views: &LeagueViews, registry: &TeamRegistry) {
    for group in &views.standings.groups {
        println!("[{}]", group.group);
        for s in &group.table {
            println!("|{0:3}. | {1:5} | {2:4} | {3:3}-{4:3}-{5:2} | {6:.3} | {7:5.1} | {8:9} | {9:4}",
                s.rank,
                registry.code(s.team),
                s.games,
                s.wins,
                s.losses,
                s.draws,
                s.win_pct,
                s.games_behind,
                s.recent_form,
                s.streak,
            )
        }
    }
}

pub fn print_magic(views: &LeagueViews, registry: &TeamRegistry) {
    let show = |e: &Option<MagicNumberEntry>| match e {
        Some(e) => format!("{:>3} {:?}", e.value, e.classification),
        None => "  -".to_string(),
    };

    for scope in views.magic.scopes.iter().filter(|s| s.applicable) {
        for t in &scope.teams {
            println!("|{0:3}. | {1:5} | left {2:3} | 1st {3:16} | PO {4:16}",
                t.rank,
                registry.code(t.team),
                t.remaining,
                show(&t.championship),
                show(&t.playoff),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_loader::tests::{make_game, make_log};
    use crate::engine::run_engine;
    use crate::league_context::LeagueContext;
    use crate::timeline::TimelineCache;

    fn views_for(context: &LeagueContext) -> (LeagueViews, TeamRegistry) {
        let registry = TeamRegistry::from_context(context);
        let log = make_log(vec![
            make_game("2025-04-01", 0, 5, 3, 1),
            make_game("2025-04-02", 0, 4, 2, 1),
            make_game("2025-04-03", 0, 6, 1, 1),
            make_game("2025-04-03", 2, 2, 2, 3),
        ]);
        let views = run_engine(&log, None, &registry, context, &mut TimelineCache::new()).unwrap();
        (views, registry)
    }

    #[test]
    fn test_identical_input_identical_documents() {
        let context = LeagueContext::kbo();
        let (first, registry) = views_for(&context);
        let (second, _) = views_for(&context);
        let at = Utc::now();

        let a = Documents::build(&first, &registry, at);
        let b = Documents::build(&second, &registry, at);
        assert_eq!(serde_json::to_string(&a.standings).unwrap(), serde_json::to_string(&b.standings).unwrap());
        assert_eq!(serde_json::to_string(&a.analytics).unwrap(), serde_json::to_string(&b.analytics).unwrap());
        assert_eq!(a, b);
    }

    #[test]
    fn test_document_shapes() {
        let context = LeagueContext::kbo();
        let (views, registry) = views_for(&context);
        let docs = Documents::build(&views, &registry, Utc::now());

        let standings = serde_json::to_value(&docs.standings).unwrap();
        assert_eq!(standings["perTeam"][0]["team"], "HH");
        assert_eq!(standings["perTeam"][0]["home"]["W"], 0);
        assert!(standings["sourceDigest"].is_string());

        let h2h = serde_json::to_value(&docs.head_to_head).unwrap();
        assert_eq!(h2h["perPair"]["HH"]["LG"]["total"]["W"], 3);
        assert!(h2h["perPair"]["HH"].get("HH").is_none());

        let magic = serde_json::to_value(&docs.magic).unwrap();
        assert_eq!(magic["perTeam"]["HH"]["perTargetRank"]["1"]["classification"], "clinched");
        assert!(magic["perTeam"]["HH"]["perTargetRank"]["1"]["lockNumber"].is_number());
        assert_eq!(magic["scopes"][0]["applicable"], true);

        let analytics = serde_json::to_value(&docs.analytics).unwrap();
        assert_eq!(analytics["perTeam"]["HH"]["series"][0]["sweep"], true);
        assert_eq!(analytics["perTeam"]["HH"]["currentStreak"], "3W");
        assert_eq!(analytics["perTeam"]["HH"]["monthly"]["2025-04"]["W"], 3);
        assert_eq!(analytics["perTeam"]["HH"]["monthly"]["2025-04"]["runsScored"], 15);
        // April 1st 2025 was a Tuesday
        let weekday = &analytics["perTeam"]["HH"]["weekday"];
        assert_eq!(weekday.as_array().unwrap().len(), 7);
        assert_eq!(weekday[1]["day"], "Tue");
        assert_eq!(weekday[1]["W"], 1);
        assert_eq!(weekday[0]["W"], 0);
    }

    #[test]
    fn test_write_all() {
        let context = LeagueContext::kbo();
        let (views, registry) = views_for(&context);
        let dir = std::env::temp_dir().join(format!("pennant_race_docs_{}", std::process::id()));

        let written = Documents::build(&views, &registry, Utc::now()).write_all(&dir).unwrap();
        assert_eq!(written.len(), 5);
        assert!(written.iter().all(|p| p.exists()));
    }
}
