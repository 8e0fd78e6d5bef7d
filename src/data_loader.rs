use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_aux::field_attributes::deserialize_option_number_from_string;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::{LeagueError, Result};
use crate::league_context::LeagueContext;
use crate::teams::{Lookup, TeamId, TeamRegistry};

// Games are append-only. The log is kept sorted by date, then by arrival order within a date,
// and every derived view is rebuilt from it from scratch.
#[derive(Debug, Clone, Default)]
pub struct GameLog {
    games: Vec<Game>,
    next_seq: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    A,
    B,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Win,
    Loss,
    Draw,
}

impl Outcome {
    pub fn symbol(self) -> char {
        match self {
            Outcome::Win => 'W',
            Outcome::Loss => 'L',
            Outcome::Draw => 'D',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Game {
    pub date: NaiveDate,
    pub seq: usize,
    pub team_a: TeamId,
    pub team_b: TeamId,
    pub score_a: u32,
    pub score_b: u32,
    pub home: Option<Side>,     // None for neutral site
    pub completed: bool,
}

impl Game {
    pub fn involves(&self, id: TeamId) -> bool {
        self.team_a == id || self.team_b == id
    }

    pub fn opponent(&self, id: TeamId) -> TeamId {
        debug_assert!(self.involves(id));

        if self.team_a == id { self.team_b } else { self.team_a }
    }

    pub fn winner(&self) -> Option<TeamId> {
        if self.score_a > self.score_b { Some(self.team_a) }
        else if self.score_b > self.score_a { Some(self.team_b) }
        else { None }
    }

    pub fn outcome_for(&self, id: TeamId) -> Outcome {
        match self.winner() {
            None => Outcome::Draw,
            Some(w) if w == id => Outcome::Win,
            Some(_) => Outcome::Loss,
        }
    }

    // (scored, allowed) from the given team's side
    pub fn runs_for(&self, id: TeamId) -> (u32, u32) {
        if self.team_a == id { (self.score_a, self.score_b) } else { (self.score_b, self.score_a) }
    }

    pub fn margin(&self) -> u32 {
        self.score_a.abs_diff(self.score_b)
    }

    pub fn home_team(&self) -> Option<TeamId> {
        match self.home? {
            Side::A => Some(self.team_a),
            Side::B => Some(self.team_b),
        }
    }

    pub fn is_home(&self, id: TeamId) -> Option<bool> {
        self.home_team().map(|h| h == id)
    }
}

impl GameLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_games(mut games: Vec<Game>) -> Self {
        games.sort_by_key(|g| (g.date, g.seq));
        let next_seq = games.iter().map(|g| g.seq + 1).max().unwrap_or(0);

        Self { games, next_seq }
    }

    // Late arrivals for an earlier date go after everything already logged for that date
    pub fn append(&mut self, mut game: Game) {
        game.seq = self.next_seq;
        self.next_seq += 1;

        let at = self.games.partition_point(|g| g.date <= game.date);
        self.games.insert(at, game);
    }

    pub fn games(&self) -> &[Game] {
        &self.games
    }

    pub fn completed(&self) -> impl Iterator<Item = &Game> + '_ {
        self.games.iter().filter(|g| g.completed)
    }

    pub fn len(&self) -> usize {
        self.games.len()
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }

    pub fn completed_count(&self) -> usize {
        self.completed().count()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.completed().map(|g| g.date).last()
    }

    // Games up to and including the given date
    pub fn until(&self, date: NaiveDate) -> GameLog {
        let games = self.games.iter().filter(|g| g.date <= date).cloned().collect();
        GameLog::from_games(games)
    }

    pub fn content_digest(&self) -> String {
        let mut hasher = Sha256::new();
        for g in &self.games {
            let home = match g.home {
                Some(Side::A) => "A",
                Some(Side::B) => "B",
                None => "-",
            };
            hasher.update(format!(
                "{}|{}|{}|{}|{}|{}|{}\n",
                g.date, g.team_a, g.team_b, g.score_a, g.score_b, home, g.completed
            ));
        }
        format!("{:x}", hasher.finalize())
    }

    // Every line carries an explicit marker, the home side is always written second
    pub fn to_canonical_text(&self, registry: &TeamRegistry) -> String {
        let mut out = String::new();
        let mut current: Option<NaiveDate> = None;

        for g in &self.games {
            if current != Some(g.date) {
                if current.is_some() { out.push('\n'); }
                out.push_str(&format!("{}\n", g.date));
                current = Some(g.date);
            }

            let (first, second, s1, s2, marker) = match g.home {
                Some(Side::A) => (g.team_b, g.team_a, g.score_b, g.score_a, "(H)"),
                Some(Side::B) => (g.team_a, g.team_b, g.score_a, g.score_b, "(H)"),
                None          => (g.team_a, g.team_b, g.score_a, g.score_b, "(N)"),
            };

            if g.completed {
                out.push_str(&format!("{} {}:{} {}{}\n", registry.code(first), s1, s2, registry.code(second), marker));
            } else {
                out.push_str(&format!("{} vs {}{}\n", registry.code(first), registry.code(second), marker));
            }
        }

        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
    Csv,
}

impl LogFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()).map(str::to_lowercase).as_deref() {
            Some("json") => LogFormat::Json,
            Some("csv") => LogFormat::Csv,
            _ => LogFormat::Text,
        }
    }
}

// One game as it arrives, before any team name is trusted
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawGameRecord {
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub team_a: String,
    #[serde(default, deserialize_with = "deserialize_option_number_from_string")]
    pub score_a: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_option_number_from_string")]
    pub score_b: Option<u32>,
    #[serde(default)]
    pub team_b: String,
    #[serde(default)]
    pub home: Option<String>,
    #[serde(default = "default_true")]
    pub completed: bool,

    #[serde(skip)]
    pub implicit_home: bool,
}

impl RawGameRecord {
    fn raw_text(&self) -> String {
        let score = |s: Option<u32>| s.map_or("?".to_string(), |v| v.to_string());
        format!("{} {} {}:{} {}", self.date, self.team_a, score(self.score_a), score(self.score_b), self.team_b)
    }
}

#[derive(Debug, Default)]
pub struct IngestReport {
    pub accepted: usize,
    pub incomplete: usize,
    pub exhibition: usize,
    pub implicit_home: usize,
    pub skipped: Vec<LeagueError>,
}

pub type Located = std::result::Result<(String, RawGameRecord), LeagueError>;

pub fn load_game_log(path: &Path, format: LogFormat, registry: &TeamRegistry, context: &LeagueContext) -> Result<(GameLog, IngestReport)> {
    let content = fs::read_to_string(path)?;
    let records = parse_records(&content, format)?;
    let (log, report) = build_game_log(records, registry, context)?;

    info!(
        path = %path.display(),
        games = log.len(),
        skipped = report.skipped.len(),
        exhibition = report.exhibition,
        implicit_home = report.implicit_home,
        "loaded game log"
    );

    Ok((log, report))
}

pub fn parse_records(content: &str, format: LogFormat) -> Result<Vec<Located>> {
    match format {
        LogFormat::Text => parse_text(content),
        LogFormat::Json => {
            // One bad element skips that record, not the file
            let values: Vec<serde_json::Value> = serde_json::from_str(content)?;
            Ok(values
                .into_iter()
                .enumerate()
                .map(|(i, v)| {
                    let location = format!("record {}", i + 1);
                    match serde_json::from_value::<RawGameRecord>(v.clone()) {
                        Ok(rec) => Ok((location, rec)),
                        Err(e) => Err(LeagueError::malformed(location, format!("unreadable record: {e}"), v.to_string())),
                    }
                })
                .collect())
        }
        LogFormat::Csv => {
            let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(content.as_bytes());
            Ok(reader
                .deserialize::<RawGameRecord>()
                .enumerate()
                .map(|(i, r)| {
                    let location = format!("row {}", i + 2);
                    r.map(|rec| (location.clone(), rec))
                        .map_err(|e| LeagueError::malformed(location, "unreadable row", e.to_string()))
                })
                .collect())
        }
    }
}

// Date header (optionally a weekday in parentheses), then one line per game: `<teamA> <scoreA>:<scoreB> <teamB>[(H)]`.
// `(N)` marks a neutral site, `<teamA> vs <teamB>` a game without a result yet.
pub fn parse_text(content: &str) -> Result<Vec<Located>> {
    let date_re    = Regex::new(r"^(\d{4}-\d{2}-\d{2})\s*(\([^)]*\))?\s*(#.*)?$")?;
    let game_re    = Regex::new(r"^(.+?)\s+(\d+)\s*:\s*(\d+)\s+(.+?)\s*(\((H|N)\))?$")?;
    let fixture_re = Regex::new(r"^(.+?)\s+vs\.?\s+(.+?)\s*(\((H|N)\))?$")?;

    let mut records = Vec::new();
    let mut current_date: Option<String> = None;

    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        let location = format!("line {}", idx + 1);
        if line.is_empty() || line.starts_with('#') { continue; }

        if let Some(caps) = date_re.captures(line) {
            current_date = Some(caps[1].to_string());
            continue;
        }

        let Some(date) = current_date.clone() else {
            records.push(Err(LeagueError::malformed(location, "game before any date header", line)));
            continue;
        };

        let parsed = if let Some(caps) = game_re.captures(line) {
            Some(RawGameRecord {
                date,
                team_a: caps[1].to_string(),
                score_a: caps[2].parse().ok(),
                score_b: caps[3].parse().ok(),
                team_b: caps[4].to_string(),
                home: marker_side(caps.get(6).map(|m| m.as_str())),
                completed: true,
                implicit_home: caps.get(6).is_none(),
            })
        } else if let Some(caps) = fixture_re.captures(line) {
            Some(RawGameRecord {
                date,
                team_a: caps[1].to_string(),
                team_b: caps[2].to_string(),
                home: marker_side(caps.get(4).map(|m| m.as_str())),
                completed: false,
                implicit_home: caps.get(4).is_none(),
                ..Default::default()
            })
        } else {
            None
        };

        match parsed {
            Some(record) => records.push(Ok((location, record))),
            None => records.push(Err(LeagueError::malformed(location, "unrecognized line", line))),
        }
    }

    Ok(records)
}

fn marker_side(marker: Option<&str>) -> Option<String> {
    match marker {
        Some("H") => Some("b".to_string()),
        Some(_) => Some("neutral".to_string()),
        None => None,
    }
}

pub fn build_game_log(records: Vec<Located>, registry: &TeamRegistry, context: &LeagueContext) -> Result<(GameLog, IngestReport)> {
    let mut report = IngestReport::default();
    let mut games = Vec::new();

    for located in records {
        let (location, raw) = match located {
            Ok(pair) => pair,
            Err(e) => {
                skip(&mut report, e);
                continue;
            }
        };

        match resolve_record(&location, &raw, registry, context, &mut report) {
            Ok(Some(mut game)) => {
                game.seq = games.len();
                if !game.completed { report.incomplete += 1; }
                games.push(game);
            }
            Ok(None) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => skip(&mut report, e),
        }
    }

    if games.is_empty() {
        return Err(LeagueError::EmptyGameLog);
    }

    report.accepted = games.len();
    Ok((GameLog::from_games(games), report))
}

fn skip(report: &mut IngestReport, e: LeagueError) {
    warn!(error = %e, "skipping record");
    report.skipped.push(e);
}

fn resolve_record(location: &str, raw: &RawGameRecord, registry: &TeamRegistry, context: &LeagueContext, report: &mut IngestReport) -> Result<Option<Game>> {
    if context.is_exhibition(&raw.team_a) || context.is_exhibition(&raw.team_b) {
        debug!(location, raw = %raw.raw_text(), "exhibition game excluded");
        report.exhibition += 1;
        return Ok(None);
    }

    let date = NaiveDate::parse_from_str(raw.date.trim(), "%Y-%m-%d")
        .map_err(|_| LeagueError::malformed(location, format!("bad date '{}'", raw.date), raw.raw_text()))?;

    let team_a = resolve_team(&raw.team_a, location, raw, registry)?;
    let team_b = resolve_team(&raw.team_b, location, raw, registry)?;
    if team_a == team_b {
        return Err(LeagueError::malformed(location, "team listed against itself", raw.raw_text()));
    }

    let (score_a, score_b) = match (raw.score_a, raw.score_b) {
        (Some(a), Some(b)) => (a, b),
        _ if raw.completed => return Err(LeagueError::malformed(location, "missing score", raw.raw_text())),
        _ => (0, 0),
    };

    let home = if raw.implicit_home {
        if context.strict_home_marker {
            return Err(LeagueError::malformed(location, "missing home marker", raw.raw_text()));
        }
        report.implicit_home += 1;
        Some(Side::B)
    } else {
        resolve_home(raw.home.as_deref(), team_a, team_b, location, raw, registry)?
    };

    Ok(Some(Game {
        date,
        seq: 0,
        team_a,
        team_b,
        score_a,
        score_b,
        home,
        completed: raw.completed,
    }))
}

fn resolve_team(name: &str, location: &str, raw: &RawGameRecord, registry: &TeamRegistry) -> Result<TeamId> {
    match registry.lookup(name) {
        Lookup::Found(id) => Ok(id),
        Lookup::Ambiguous(candidates) => Err(LeagueError::NameAmbiguous {
            name: name.trim().to_string(),
            candidates,
        }),
        Lookup::Unknown { suggestion } => {
            let reason = match suggestion {
                Some(code) => format!("unknown team '{}' (closest: {code})", name.trim()),
                None => format!("unknown team '{}'", name.trim()),
            };
            Err(LeagueError::malformed(location, reason, raw.raw_text()))
        }
    }
}

fn resolve_home(home: Option<&str>, team_a: TeamId, team_b: TeamId, location: &str, raw: &RawGameRecord, registry: &TeamRegistry) -> Result<Option<Side>> {
    let Some(home) = home.map(str::trim).filter(|h| !h.is_empty()) else { return Ok(None) };

    match home.to_lowercase().as_str() {
        "a" => return Ok(Some(Side::A)),
        "b" | "h" => return Ok(Some(Side::B)),
        "neutral" | "n" => return Ok(None),
        _ => {}
    }

    match resolve_team(home, location, raw, registry)? {
        id if id == team_a => Ok(Some(Side::A)),
        id if id == team_b => Ok(Some(Side::B)),
        _ => Err(LeagueError::malformed(location, format!("home side '{home}' is neither team"), raw.raw_text())),
    }
}

fn default_true() -> bool { true }
