use std::env;
use std::fs::File;
use std::io::BufReader;

use anyhow::Context as _;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use workout::{ActivityType, TrackerConfig, replay};

fn init_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> anyhow::Result<()> {
    init_logging();

    let mut args = env::args().skip(1);
    let path = args
        .next()
        .context("usage: workout-replay <fixes.jsonl> [activity]")?;
    let activity_type = match args.next() {
        Some(name) => name.parse::<ActivityType>().map_err(anyhow::Error::msg)?,
        None => ActivityType::Running,
    };

    let config = TrackerConfig::from_env()?;
    let file = File::open(&path).with_context(|| format!("opening {path}"))?;
    let fixes = replay::read_fixes(BufReader::new(file))?;
    tracing::info!(fixes = fixes.len(), %activity_type, "replaying {path}");

    let report = replay::replay(&fixes, activity_type, config)?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
