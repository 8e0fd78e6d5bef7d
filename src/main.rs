#![allow(dead_code)]

mod archive;
mod audit;
mod data_loader;
mod engine;
mod error;
mod head_to_head;
mod league_context;
mod magic_number;
mod report;
mod schedule;
mod series;
mod standings;
mod teams;
mod timeline;
mod util;

use anyhow::{bail, Context};
use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use archive::{Snapshot, SnapshotArchiver};
use data_loader::{load_game_log, GameLog, LogFormat};
use engine::run_engine;
use league_context::LeagueContext;
use report::{print_magic, print_standings, Documents};
use teams::TeamRegistry;
use timeline::TimelineCache;

/*
    Everything is recomputed from the game log on every run. Point --archive at a history
    directory to keep one snapshot per date and see what moved since the last one.
*/

/// Standings, magic numbers and race analytics from a game log.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute every view and write the output documents.
    Run(RunArgs),
    /// Show one team's archived rank history.
    Trend(TrendArgs),
    /// Rewrite a game log with an explicit home marker on every line.
    Canonicalize(CanonicalizeArgs),
}

#[derive(Args)]
struct LeagueArgs {
    /// League preset: kbo or npb.
    #[arg(long, default_value = "kbo")]
    preset: String,

    /// JSON league configuration, used instead of a preset.
    #[arg(long, conflicts_with = "preset")]
    config: Option<PathBuf>,
}

impl LeagueArgs {
    fn context(&self) -> anyhow::Result<LeagueContext> {
        match &self.config {
            Some(path) => LeagueContext::from_file(path)
                .with_context(|| format!("loading league configuration {}", path.display())),
            None => Ok(LeagueContext::preset(&self.preset)?),
        }
    }
}

#[derive(Parser)]
struct RunArgs {
    /// Game log (text, JSON or CSV).
    #[arg(long)]
    games: PathBuf,

    /// Input format, guessed from the extension when omitted.
    #[arg(long, value_enum)]
    format: Option<LogFormat>,

    /// Full fixture list (played and upcoming games).
    #[arg(long)]
    fixtures: Option<PathBuf>,

    #[command(flatten)]
    league: LeagueArgs,

    /// Directory for the output documents.
    #[arg(long, default_value = "output")]
    out: PathBuf,

    /// History directory. Archives a snapshot when given.
    #[arg(long)]
    archive: Option<PathBuf>,

    /// Snapshot date (YYYY-MM-DD), defaults to the last game date.
    #[arg(long)]
    date: Option<NaiveDate>,

    /// Skip the console tables.
    #[arg(long)]
    quiet: bool,
}

#[derive(Parser)]
struct TrendArgs {
    #[arg(long)]
    archive: PathBuf,

    /// Team code, name or alias.
    #[arg(long)]
    team: String,

    #[arg(long, default_value_t = 30)]
    days: usize,

    #[command(flatten)]
    league: LeagueArgs,
}

#[derive(Parser)]
struct CanonicalizeArgs {
    #[arg(long)]
    games: PathBuf,

    #[arg(long, value_enum)]
    format: Option<LogFormat>,

    #[arg(long)]
    out: PathBuf,

    #[command(flatten)]
    league: LeagueArgs,
}

fn main() -> anyhow::Result<()> {
    init_logging();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => handle_run(args),
        Commands::Trend(args) => handle_trend(args),
        Commands::Canonicalize(args) => handle_canonicalize(args),
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn load_log(path: &Path, format: Option<LogFormat>, registry: &TeamRegistry, context: &LeagueContext) -> anyhow::Result<GameLog> {
    let format = format.unwrap_or_else(|| LogFormat::from_path(path));
    let (log, report) = load_game_log(path, format, registry, context)
        .with_context(|| format!("loading {}", path.display()))?;

    for e in &report.skipped {
        warn!(error = %e, "skipped record");
    }
    if report.implicit_home > 0 {
        warn!(lines = report.implicit_home, "home side assumed for lines without a marker");
    }

    Ok(log)
}

fn handle_run(args: RunArgs) -> anyhow::Result<()> {
    let context = args.league.context()?;
    let registry = TeamRegistry::from_context(&context);

    let log = load_log(&args.games, args.format, &registry, &context)?;
    let fixtures = match &args.fixtures {
        Some(path) => Some(load_log(path, None, &registry, &context)?),
        None => None,
    };

    let mut cache = TimelineCache::new();
    let views = run_engine(&log, fixtures.as_ref(), &registry, &context, &mut cache)?;

    let violations = audit::audit_views(&views, &registry, &context);
    if !violations.is_empty() {
        warn!(count = violations.len(), "audit found inconsistencies");
    }

    let generated_at = Utc::now();
    Documents::build(&views, &registry, generated_at)
        .write_all(&args.out)
        .with_context(|| format!("writing documents to {}", args.out.display()))?;

    if let Some(root) = &args.archive {
        let Some(date) = args.date.or(views.standings.as_of) else {
            bail!("no completed games to date the snapshot, pass --date");
        };

        // a back-dated snapshot only sees the games played by then
        let dated = match views.standings.as_of {
            Some(last) if date < last => Some(run_engine(&log.until(date), fixtures.as_ref(), &registry, &context, &mut cache)?),
            _ => None,
        };
        let source = dated.as_ref().unwrap_or(&views);

        let snapshot = Snapshot::from_views(
            date,
            &source.standings,
            &source.magic,
            &registry,
            source.total_games,
            &source.source_digest,
            generated_at,
        );
        let archived = SnapshotArchiver::new(root).archive(snapshot)?;

        for c in &archived.delta.rank_changes {
            info!(team = %c.team, from = c.from, to = c.to, "rank change");
        }
    }

    if !args.quiet {
        print_standings(&views, &registry);
        print_magic(&views, &registry);
    }

    Ok(())
}

fn handle_trend(args: TrendArgs) -> anyhow::Result<()> {
    let context = args.league.context()?;
    let registry = TeamRegistry::from_context(&context);

    let Some(id) = registry.lookup(&args.team).found() else {
        bail!("unknown or ambiguous team '{}'", args.team);
    };
    let code = registry.code(id);

    let trend = SnapshotArchiver::new(&args.archive).team_trend(code, args.days)?;
    if trend.is_empty() {
        warn!(team = code, "no archived snapshots for team");
    }

    for p in trend {
        println!("| {0} | {1:3}. | {2:4} W | {3:.3}", p.date, p.rank, p.wins, p.win_pct);
    }

    Ok(())
}

fn handle_canonicalize(args: CanonicalizeArgs) -> anyhow::Result<()> {
    let context = args.league.context()?;
    let registry = TeamRegistry::from_context(&context);

    let log = load_log(&args.games, args.format, &registry, &context)?;
    fs::write(&args.out, log.to_canonical_text(&registry))
        .with_context(|| format!("writing {}", args.out.display()))?;

    info!(games = log.len(), out = %args.out.display(), "canonical log written");
    Ok(())
}
