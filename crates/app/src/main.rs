use std::fmt;

use services::{AppServices, Clock};
use tracing::info;
use vocab_core::quiz::FeedbackDelays;

mod commands;
mod config;
mod logging;

use config::{Config, DEFAULT_COUNT, DEFAULT_TIER, prepare_sqlite_file};

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- drill [options]   # interactive session (default)");
    eprintln!("  cargo run -p app -- stats [options]   # level, streak, mission, history");
    eprintln!("  cargo run -p app -- weak  [options]   # weak words for --mode");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>      SQLite URL (default: sqlite:vocab.sqlite3)");
    eprintln!("  --user <id>            Learner id (default: local)");
    eprintln!("  --tier <n|weak|-1>     Max tier, or weak words (default: {DEFAULT_TIER})");
    eprintln!("  --mode <mode>          choice | spelling | spelling_easy (default: choice)");
    eprintln!("  --count <n>            Questions per session (default: {DEFAULT_COUNT})");
    eprintln!("  --utc-offset <min>     Minutes east of UTC for the study day (default: 0)");
    eprintln!();
    eprintln!("Environment (flags win):");
    eprintln!("  LEARN_DB_URL, LEARN_USER, LEARN_TIER, LEARN_MODE, LEARN_COUNT,");
    eprintln!("  LEARN_UTC_OFFSET_MINUTES, LEARN_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Drill,
    Stats,
    Weak,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "drill" => Some(Self::Drill),
            "stats" => Some(Self::Stats),
            "weak" => Some(Self::Weak),
            _ => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Command::Drill => "drill",
            Command::Stats => "stats",
            Command::Weak => "weak",
        };
        f.write_str(name)
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None => Command::Drill,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Drill,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };
    if argv.first().is_some_and(|first| !first.starts_with("--")) {
        argv.remove(0);
    }

    let mut iter = argv.into_iter();
    let config = Config::resolve(|key| std::env::var(key).ok(), &mut iter).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    logging::init_tracing();
    info!(command = %cmd, db = %config.db_url, user = %config.user, "starting");

    prepare_sqlite_file(&config.db_url)?;
    let app = AppServices::new_sqlite(
        &config.db_url,
        Clock::default_clock(),
        config.utc_offset,
        FeedbackDelays::default(),
    )
    .await?;

    match cmd {
        Command::Drill => commands::drill(&app, &config).await,
        Command::Stats => commands::show_stats(&app, &config.user).await,
        Command::Weak => commands::list_weak(&app, &config.user, config.mode.modality()).await,
    }
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
