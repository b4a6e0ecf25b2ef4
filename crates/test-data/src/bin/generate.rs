//! Writes a synthetic GPS track to stdout as one JSON fix per line.
//!
//! Run with:
//! ```
//! cargo run -p test-data --bin generate -- run 5000 42 --gpx run.gpx
//! ```

use std::io::{BufWriter, Write};

use anyhow::{Context as _, bail};
use rand::SeedableRng;
use rand::rngs::StdRng;
use test_data::profiles;
use test_data::sources::{GpxLoader, ProceduralGenerator};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: generate <profile> [distance_m] [seed] [--gpx <path>]";

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut positional = Vec::new();
    let mut gpx_path = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--gpx" {
            gpx_path = Some(args.next().context(USAGE)?);
        } else {
            positional.push(arg);
        }
    }

    let Some(name) = positional.first() else {
        bail!(USAGE);
    };
    let profile = profiles::by_name(name).with_context(|| format!("unknown profile '{name}'"))?;
    let distance: f64 = match positional.get(1) {
        Some(value) => value.parse().context("distance must be a number of meters")?,
        None => 5000.0,
    };
    let seed: u64 = match positional.get(2) {
        Some(value) => value.parse().context("seed must be an integer")?,
        None => 12345,
    };

    let mut rng = StdRng::seed_from_u64(seed);
    let track = ProceduralGenerator::new(seed as u32)
        .with_distance(distance)
        .generate(profile.as_ref(), &mut rng);

    tracing::info!(
        fixes = track.fixes.len(),
        true_distance = track.true_distance_m,
        pauses = track.pauses.len(),
        activity = %profile.activity_type(),
        "generated track"
    );

    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for fix in &track.fixes {
        serde_json::to_writer(&mut out, fix)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;

    if let Some(path) = gpx_path {
        GpxLoader::write_file(&path, &track.fixes, Some(name))?;
        tracing::info!("wrote {path}");
    }

    Ok(())
}
