use std::fmt;

use chrono::{DateTime, Duration, Utc};
use recall_core::model::{EngineSnapshot, ItemId};
use recall_core::progress::ProgressAggregator;
use recall_core::scheduler::Scheduler;
use recall_storage::sqlite::DEFAULT_STORE_KEY;
use recall_storage::{StateRepository, Storage, StorageConfig, encode_snapshot};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    store_key: String,
    items: u32,
    reviewed: u32,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidItems { raw: String },
    InvalidReviewed { raw: String },
    InvalidDbUrl { raw: String },
    InvalidStoreKey { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidItems { raw } => write!(f, "invalid --items value: {raw}"),
            ArgsError::InvalidReviewed { raw } => write!(f, "invalid --reviewed value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidStoreKey { raw } => write!(f, "invalid --store-key value: {raw:?}"),
            ArgsError::InvalidNow { raw } => {
                write!(f, "invalid --now value (expected RFC3339): {raw}")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("RECALL_DB_URL").unwrap_or_else(|_| "sqlite:recall.sqlite3".into());
        let mut store_key =
            std::env::var("RECALL_STORE_KEY").unwrap_or_else(|_| DEFAULT_STORE_KEY.into());
        let mut items = 20;
        let mut reviewed = 0;
        let mut now: Option<DateTime<Utc>> = None;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--store-key" => {
                    let value = require_value(&mut args, "--store-key")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidStoreKey { raw: value });
                    }
                    store_key = value;
                }
                "--items" => {
                    let value = require_value(&mut args, "--items")?;
                    items = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidItems { raw: value.clone() })?;
                }
                "--reviewed" => {
                    let value = require_value(&mut args, "--reviewed")?;
                    reviewed = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidReviewed { raw: value.clone() })?;
                }
                "--now" => {
                    let value = require_value(&mut args, "--now")?;
                    let parsed = DateTime::parse_from_rfc3339(&value)
                        .map_err(|_| ArgsError::InvalidNow { raw: value.clone() })?
                        .with_timezone(&Utc);
                    now = Some(parsed);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            store_key,
            items,
            reviewed: reviewed.min(items),
            now,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p recall-storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <url>                Storage URL (default: sqlite:recall.sqlite3)");
    eprintln!("  --store-key <key>         Document key (default: {DEFAULT_STORE_KEY})");
    eprintln!("  --items <n>               Number of items to track (default: 20)");
    eprintln!("  --reviewed <n>            How many of them get a review history (default: 0)");
    eprintln!("  --now <rfc3339>           Fixed current time for deterministic seeding");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  RECALL_DB_URL, RECALL_STORE_KEY");
}

/// Answers item `i` a few times so the seeded registry spans several levels.
fn review_pattern(i: u32) -> &'static [bool] {
    match i % 4 {
        0 => &[true, true, true],
        1 => &[true, false],
        2 => &[false, false],
        _ => &[true],
    }
}

fn build_snapshot(args: &Args, now: DateTime<Utc>) -> EngineSnapshot {
    let mut scheduler = Scheduler::new();
    scheduler.registry_mut().add_all_items(1..=u64::from(args.items), now);

    for i in 0..args.reviewed {
        let id = ItemId::from(u64::from(i + 1));
        let mut at = now - Duration::days(30);
        for &correct in review_pattern(i) {
            let outcome = scheduler.record_answer(id.clone(), correct, at);
            at += Duration::days(i64::from(outcome.interval_days));
        }
    }

    let mut progress = ProgressAggregator::new();
    progress.on_items_changed(scheduler.registry().all_items());
    EngineSnapshot::new(scheduler.registry().as_map().clone(), progress.summary().clone())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::open(&StorageConfig::new(&args.db_url, &args.store_key)).await?;
    let now = args.now.unwrap_or_else(Utc::now);

    let snapshot = build_snapshot(&args, now);
    storage.state.save(&encode_snapshot(&snapshot)?).await?;
    tracing::info!(items = args.items, reviewed = args.reviewed, "seed document written");

    println!(
        "Seeded {} items ({} with history, {} due) into {} [{}]",
        args.items,
        args.reviewed,
        snapshot.items.values().filter(|item| item.is_due(now)).count(),
        args.db_url,
        args.store_key
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
