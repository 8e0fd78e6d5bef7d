use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, warn};

use crate::error::{LeagueError, Result};
use crate::magic_number::{Classification, MagicTable};
use crate::standings::{Standings, Wld};
use crate::teams::TeamRegistry;

static TEMP_COUNTER: AtomicUsize = AtomicUsize::new(0);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotStanding {
    pub team: String,
    pub group: String,
    pub rank: usize,
    pub games: u32,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub win_pct: f64,
    pub games_behind: f64,
    #[serde(default)]
    pub recent_form: String,
    #[serde(default)]
    pub streak: String,
    #[serde(default)]
    pub home: Wld,
    #[serde(default)]
    pub away: Wld,
    #[serde(default)]
    pub runs_scored: u32,
    #[serde(default)]
    pub runs_allowed: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMagic {
    pub team: String,
    pub target_rank: usize,
    pub value: u32,
    pub classification: Classification,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tragic_number: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankChange {
    pub team: String,
    pub from: usize,
    pub to: usize,
    pub change: i64,    // positive means the team climbed
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MagicChange {
    pub team: String,
    pub target_rank: usize,
    pub from: u32,
    pub to: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotDelta {
    pub previous_date: Option<NaiveDate>,
    pub rank_changes: Vec<RankChange>,
    pub magic_changes: Vec<MagicChange>,
    pub games_since_previous: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub date: NaiveDate,
    pub generated_at: DateTime<Utc>,
    pub source_digest: String,
    pub total_games: usize,
    pub standings: Vec<SnapshotStanding>,
    pub magic_numbers: Vec<SnapshotMagic>,
    pub delta: SnapshotDelta,
}

impl Snapshot {
    // Delta is left empty, the archiver fills it against what is on disk
    pub fn from_views(
        date: NaiveDate,
        standings: &Standings,
        magic: &MagicTable,
        registry: &TeamRegistry,
        total_games: usize,
        source_digest: &str,
        generated_at: DateTime<Utc>,
    ) -> Self {
        let standings = standings
            .all()
            .map(|s| SnapshotStanding {
                team: registry.code(s.team).to_string(),
                group: s.group.clone(),
                rank: s.rank,
                games: s.games,
                wins: s.wins,
                losses: s.losses,
                draws: s.draws,
                win_pct: s.win_pct,
                games_behind: s.games_behind,
                recent_form: s.recent_form.clone(),
                streak: s.streak.clone(),
                home: s.home,
                away: s.away,
                runs_scored: s.runs_scored,
                runs_allowed: s.runs_allowed,
            })
            .collect();

        let magic_numbers = magic
            .entries()
            .map(|e| SnapshotMagic {
                team: registry.code(e.team).to_string(),
                target_rank: e.target_rank,
                value: e.value,
                classification: e.classification,
                lock_number: e.lock_number,
                tragic_number: e.tragic_number,
            })
            .collect();

        Self {
            date,
            generated_at,
            source_digest: source_digest.to_string(),
            total_games,
            standings,
            magic_numbers,
            delta: SnapshotDelta::default(),
        }
    }

    pub fn standing(&self, team: &str) -> Option<&SnapshotStanding> {
        self.standings.iter().find(|s| s.team == team)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactStanding {
    pub team: String,
    pub rank: usize,
    pub wins: u32,
    pub losses: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySummary {
    pub total_games: usize,
    pub rank_changes: usize,
    pub standings: Vec<CompactStanding>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyRollup {
    pub month: String,
    pub days: BTreeMap<String, DailySummary>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub rank: usize,
    pub wins: u32,
    pub win_pct: f64,
}

// History on disk: <root>/daily/YYYY-MM-DD.json plus <root>/monthly/YYYY-MM.json
#[derive(Debug, Clone)]
pub struct SnapshotArchiver {
    root: PathBuf,
}

impl SnapshotArchiver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn daily_dir(&self) -> PathBuf {
        self.root.join("daily")
    }

    pub fn monthly_dir(&self) -> PathBuf {
        self.root.join("monthly")
    }

    pub fn daily_path(&self, date: NaiveDate) -> PathBuf {
        self.daily_dir().join(format!("{}.json", date.format("%Y-%m-%d")))
    }

    pub fn monthly_path(&self, date: NaiveDate) -> PathBuf {
        self.monthly_dir().join(format!("{:04}-{:02}.json", date.year(), date.month()))
    }

    // Writes (or rewrites) the record for snapshot.date and returns it with its delta filled in
    pub fn archive(&self, mut snapshot: Snapshot) -> Result<Snapshot> {
        let date = snapshot.date;

        snapshot.delta = match self.previous_before(date)? {
            Some(previous) => compute_delta(&previous, &snapshot),
            None => {
                let e = LeagueError::MissingPriorSnapshot { date };
                warn!(%date, "{e}, delta left empty");
                SnapshotDelta::default()
            }
        };

        write_atomic(&self.daily_path(date), &snapshot)?;
        self.upsert_monthly(&snapshot)?;

        info!(
            %date,
            rank_changes = snapshot.delta.rank_changes.len(),
            magic_changes = snapshot.delta.magic_changes.len(),
            new_games = snapshot.delta.games_since_previous,
            "snapshot archived"
        );
        Ok(snapshot)
    }

    fn upsert_monthly(&self, snapshot: &Snapshot) -> Result<()> {
        let path = self.monthly_path(snapshot.date);

        let mut rollup = if path.exists() {
            read_json::<MonthlyRollup>(&path)?
        } else {
            MonthlyRollup {
                month: snapshot.date.format("%Y-%m").to_string(),
                days: BTreeMap::new(),
                last_updated: snapshot.generated_at,
            }
        };

        rollup.days.insert(
            snapshot.date.format("%Y-%m-%d").to_string(),
            DailySummary {
                total_games: snapshot.total_games,
                rank_changes: snapshot.delta.rank_changes.len(),
                standings: snapshot
                    .standings
                    .iter()
                    .map(|s| CompactStanding { team: s.team.clone(), rank: s.rank, wins: s.wins, losses: s.losses })
                    .collect(),
            },
        );
        rollup.last_updated = snapshot.generated_at;

        debug!(month = %rollup.month, days = rollup.days.len(), "monthly rollup updated");
        write_atomic(&path, &rollup)
    }

    // Dates with a daily record, ascending
    pub fn archived_dates(&self) -> Result<Vec<NaiveDate>> {
        let dir = self.daily_dir();
        if !dir.exists() { return Ok(Vec::new()); }

        let mut dates = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let name = entry?.file_name();
            let Some(stem) = name.to_str().and_then(|n| n.strip_suffix(".json")) else { continue };
            if let Ok(date) = NaiveDate::parse_from_str(stem, "%Y-%m-%d") {
                dates.push(date);
            }
        }

        dates.sort();
        Ok(dates)
    }

    pub fn load(&self, date: NaiveDate) -> Result<Snapshot> {
        read_json(&self.daily_path(date))
    }

    // Most recent record strictly before the date, not necessarily the day before
    pub fn previous_before(&self, date: NaiveDate) -> Result<Option<Snapshot>> {
        let previous = self.archived_dates()?.into_iter().filter(|d| *d < date).last();
        previous.map(|d| self.load(d)).transpose()
    }

    pub fn monthly(&self, date: NaiveDate) -> Result<Option<MonthlyRollup>> {
        let path = self.monthly_path(date);
        if !path.exists() { return Ok(None); }
        read_json(&path).map(Some)
    }

    pub fn recent(&self, n: usize) -> Result<Vec<Snapshot>> {
        let dates = self.archived_dates()?;
        let start = dates.len().saturating_sub(n);

        dates[start..].iter().map(|&d| self.load(d)).collect()
    }

    pub fn team_trend(&self, team: &str, n: usize) -> Result<Vec<TrendPoint>> {
        let trend = self
            .recent(n)?
            .iter()
            .filter_map(|snap| {
                snap.standing(team).map(|s| TrendPoint {
                    date: snap.date,
                    rank: s.rank,
                    wins: s.wins,
                    win_pct: s.win_pct,
                })
            })
            .collect();

        Ok(trend)
    }
}

pub fn compute_delta(previous: &Snapshot, current: &Snapshot) -> SnapshotDelta {
    let previous_ranks: HashMap<&str, usize> = previous.standings.iter().map(|s| (s.team.as_str(), s.rank)).collect();

    let rank_changes = current
        .standings
        .iter()
        .filter_map(|s| {
            let from = *previous_ranks.get(s.team.as_str())?;
            (from != s.rank).then(|| RankChange {
                team: s.team.clone(),
                from,
                to: s.rank,
                change: from as i64 - s.rank as i64,
            })
        })
        .collect();

    let previous_magic: HashMap<(&str, usize), u32> = previous
        .magic_numbers
        .iter()
        .map(|m| ((m.team.as_str(), m.target_rank), m.value))
        .collect();

    let magic_changes = current
        .magic_numbers
        .iter()
        .filter_map(|m| {
            let from = *previous_magic.get(&(m.team.as_str(), m.target_rank))?;
            (from != m.value).then(|| MagicChange {
                team: m.team.clone(),
                target_rank: m.target_rank,
                from,
                to: m.value,
            })
        })
        .collect();

    SnapshotDelta {
        previous_date: Some(previous.date),
        rank_changes,
        magic_changes,
        games_since_previous: current.total_games as i64 - previous.total_games as i64,
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

// Temp file in the target directory, then rename over the final name
fn write_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let dir = path.parent().ok_or_else(|| LeagueError::Config(format!("{} has no parent directory", path.display())))?;
    fs::create_dir_all(dir)?;

    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("snapshot");
    let tmp = dir.join(format!(
        ".{name}.{}.{}.tmp",
        std::process::id(),
        TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));

    fs::write(&tmp, serde_json::to_string_pretty(value)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
