use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use serde::Serialize;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

use feedlake::collector::OrchestratorStatus;
use feedlake::{
    load_config_or_default, CollectionKind, Config, Database, FeedlakeError, LakeStore, Pipeline,
    PipelineScheduler, TieredStorage,
};

fn cli() -> Command {
    Command::new("feedlake")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Collects social and news feeds into a bronze/silver/gold store")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Config file (default: ~/.feedlake/config.yaml)"),
        )
        .arg(
            Arg::new("database")
                .long("database")
                .value_name("FILE")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("SQLite database, overriding the configured path"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            Command::new("run")
                .about("Run one collection cycle")
                .arg(kind_arg())
                .arg(limit_arg()),
        )
        .subcommand(Command::new("health").about("Check every configured source and the store"))
        .subcommand(Command::new("status").about("Show collectors, rate limits and tier counts"))
        .subcommand(
            Command::new("quality")
                .about("Validation metrics from the silver tier")
                .arg(
                    Arg::new("source")
                        .short('s')
                        .long("source")
                        .help("Restrict to one source"),
                )
                .arg(days_arg("7")),
        )
        .subcommand(
            Command::new("cleanup")
                .about("Delete records older than the retention window")
                .arg(days_arg("90")),
        )
        .subcommand(
            Command::new("schedule")
                .about("Run the pipeline periodically until interrupted")
                .arg(kind_arg())
                .arg(limit_arg())
                .arg(
                    Arg::new("interval-minutes")
                        .short('i')
                        .long("interval-minutes")
                        .value_name("MINUTES")
                        .default_value("60")
                        .value_parser(value_parser!(u64).range(1..)),
                ),
        )
}

fn kind_arg() -> Arg {
    Arg::new("kind")
        .short('k')
        .long("kind")
        .default_value("default")
        .value_parser(["topic", "trending", "default"])
}

fn limit_arg() -> Arg {
    Arg::new("limit")
        .short('l')
        .long("limit")
        .value_name("N")
        .value_parser(value_parser!(usize))
        .help("Total item budget across sources (default: collection.default_limit)")
}

fn days_arg(default: &'static str) -> Arg {
    Arg::new("days")
        .short('d')
        .long("days")
        .default_value(default)
        .value_parser(value_parser!(u32).range(1..))
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let output: Box<dyn Layer<Registry> + Send + Sync> = if json {
        fmt::layer().json().with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer().with_writer(std::io::stderr).boxed()
    };
    let subscriber = tracing_subscriber::registry().with(output).with(filter);

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to install tracing subscriber: {}", e);
    }
    // Library code that logs through `log` ends up in the same output.
    if let Err(e) = tracing_log::LogTracer::init() {
        eprintln!("Failed to bridge log records: {}", e);
    }
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => error!(error = %e, "Failed to render output"),
    }
}

struct Context {
    config: Config,
    db: Database,
}

impl Context {
    fn load(matches: &ArgMatches) -> feedlake::Result<Self> {
        let config_path = matches.get_one::<PathBuf>("config").map(PathBuf::as_path);
        let config = load_config_or_default(config_path)?;

        let db_path = match matches.get_one::<PathBuf>("database") {
            Some(path) => path.clone(),
            None => config.database.resolve_path()?,
        };
        let db = open_database(&db_path)?;
        Ok(Self { config, db })
    }

    fn pipeline(&self) -> feedlake::Result<Pipeline> {
        Ok(Pipeline::from_config(&self.config, self.db.clone())?)
    }

    fn storage(&self) -> TieredStorage {
        TieredStorage::new(self.db.clone())
    }

    fn run_params(&self, matches: &ArgMatches) -> (CollectionKind, usize) {
        let kind = matches
            .get_one::<String>("kind")
            .and_then(|kind| kind.parse().ok())
            .unwrap_or(CollectionKind::Default);
        let limit = matches
            .get_one::<usize>("limit")
            .copied()
            .unwrap_or(self.config.collection.default_limit);
        (kind, limit)
    }
}

fn open_database(path: &Path) -> feedlake::Result<Database> {
    info!(path = %path.display(), "Opening database");
    Ok(Database::open(path)?)
}

async fn cmd_run(ctx: &Context, matches: &ArgMatches) -> feedlake::Result<()> {
    let pipeline = ctx.pipeline()?;
    if pipeline.orchestrator().is_empty() {
        warn!("No sources have credentials configured; nothing to collect");
    }
    let (kind, limit) = ctx.run_params(matches);
    let summary = pipeline.run(kind, limit).await?;
    print_json(&summary);
    Ok(())
}

#[derive(Serialize)]
struct HealthReport {
    store: bool,
    sources: BTreeMap<String, bool>,
}

async fn cmd_health(ctx: &Context) -> feedlake::Result<bool> {
    let pipeline = ctx.pipeline()?;
    let store = match ctx.storage().ping() {
        Ok(()) => true,
        Err(e) => {
            error!(error = %e, "Store is unreachable");
            false
        }
    };
    let sources = pipeline.orchestrator().health_check_all().await;
    let healthy = store && sources.values().all(|ok| *ok);
    print_json(&HealthReport { store, sources });
    Ok(healthy)
}

#[derive(Serialize)]
struct TierCounts {
    bronze: u64,
    silver: u64,
    gold: u64,
}

#[derive(Serialize)]
struct StatusReport {
    orchestrator: OrchestratorStatus,
    storage: TierCounts,
}

async fn cmd_status(ctx: &Context) -> feedlake::Result<()> {
    let pipeline = ctx.pipeline()?;
    let (bronze, silver, gold) = ctx.storage().counts(None)?;
    print_json(&StatusReport {
        orchestrator: pipeline.orchestrator().status().await,
        storage: TierCounts {
            bronze,
            silver,
            gold,
        },
    });
    Ok(())
}

fn cmd_quality(ctx: &Context, matches: &ArgMatches) -> feedlake::Result<()> {
    let source = matches.get_one::<String>("source").map(String::as_str);
    let days = matches.get_one::<u32>("days").copied().unwrap_or(7);
    let metrics = ctx.storage().quality_metrics(source, days)?;
    print_json(&metrics);
    Ok(())
}

fn cmd_cleanup(ctx: &Context, matches: &ArgMatches) -> feedlake::Result<()> {
    let days = matches.get_one::<u32>("days").copied().unwrap_or(90);
    let report = ctx.storage().cleanup_older_than(days)?;
    print_json(&report);
    Ok(())
}

async fn cmd_schedule(ctx: &Context, matches: &ArgMatches) -> feedlake::Result<()> {
    let pipeline = Arc::new(ctx.pipeline()?);
    let (kind, limit) = ctx.run_params(matches);
    let minutes = matches
        .get_one::<u64>("interval-minutes")
        .copied()
        .unwrap_or(60);

    let scheduler =
        PipelineScheduler::new(pipeline, Duration::from_secs(minutes.saturating_mul(60)), kind, limit);
    let shutdown = scheduler.shutdown_handle();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Interrupt received, stopping after the current run");
        shutdown.stop();
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler");
    }

    info!(kind = %kind, limit, minutes, "Scheduler started");
    if let Err(e) = scheduler.start().await {
        error!(error = %e, "Scheduler task aborted");
    }
    Ok(())
}

async fn dispatch(matches: &ArgMatches) -> Result<bool, FeedlakeError> {
    let ctx = Context::load(matches)?;
    match matches.subcommand() {
        Some(("run", sub)) => cmd_run(&ctx, sub).await.map(|_| true),
        Some(("health", _)) => cmd_health(&ctx).await,
        Some(("status", _)) => cmd_status(&ctx).await.map(|_| true),
        Some(("quality", sub)) => cmd_quality(&ctx, sub).map(|_| true),
        Some(("cleanup", sub)) => cmd_cleanup(&ctx, sub).map(|_| true),
        Some(("schedule", sub)) => cmd_schedule(&ctx, sub).await.map(|_| true),
        _ => {
            eprintln!("Please specify a valid subcommand");
            Ok(false)
        }
    }
}

#[tokio::main]
async fn main() {
    let matches = cli().get_matches();
    init_logging(matches.get_flag("log-json"));

    match dispatch(&matches).await {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}
