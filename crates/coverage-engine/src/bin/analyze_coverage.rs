//! Coverage Analysis CLI
//!
//! Runs one analysis against the simulated report source and prints the
//! ranked `LocationCoverage` as JSON.
//!
//! Usage:
//!   analyze-coverage --lat 43.6532 --lng -79.3832 --seed 42
//!   analyze-coverage --lat 40.7128 --lng -74.0060 --provider Verizon --verbose

use anyhow::Result;
use clap::Parser;
use coverage_engine::{CoverageEngine, EngineConfig};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "analyze-coverage",
    about = "Rank mobile and broadband providers around a location"
)]
struct Args {
    /// Latitude in decimal degrees
    #[arg(long, allow_hyphen_values = true)]
    lat: f64,

    /// Longitude in decimal degrees
    #[arg(long, allow_hyphen_values = true)]
    lng: f64,

    /// Street address echoed back in the result
    #[arg(short, long)]
    address: Option<String>,

    /// Single provider to analyze ("auto" resolves regional defaults)
    #[arg(short, long)]
    provider: Option<String>,

    /// Seed for the simulated report source
    #[arg(long)]
    seed: Option<u64>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    // Logs go to stderr so stdout stays valid JSON
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = EngineConfig::from_env()?;
    if args.seed.is_some() {
        config.report_seed = args.seed;
    }
    info!(
        radius_km = config.radius_km,
        days_back = config.days_back,
        ai = config.ai.is_some(),
        "Coverage engine configured"
    );

    let engine = CoverageEngine::from_config(config)?;
    let coverage = engine
        .analyze(args.lat, args.lng, args.address, args.provider.as_deref())
        .await?;

    info!("{}", "=".repeat(60));
    for (label, list) in [
        ("Mobile", &coverage.mobile_providers),
        ("Broadband", &coverage.broadband_providers),
    ] {
        for a in list.iter() {
            info!(
                "  {:9} | {:16} | {:3} | {}/5 | {:?}",
                label, a.provider, a.coverage_score, a.reliability_rating, a.recommendation
            );
        }
    }
    info!("{}", "=".repeat(60));

    println!("{}", serde_json::to_string_pretty(&coverage)?);
    Ok(())
}
