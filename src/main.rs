use anyhow::Context;
use clap::Parser;
use log::info;
use std::path::PathBuf;

use iob_engine::config::Scenario;
use iob_engine::{compute_iob, evaluate_timeline, format_for_display, BasalSchedule};

#[derive(Parser)]
#[command(name = "iob_engine")]
#[command(about = "Insulin-on-board and activity computation over a dose history")]
struct Cli {
    /// Scenario file path (JSON)
    #[arg(short, long)]
    config: PathBuf,

    /// Output directory for timeline.csv and summary.json
    #[arg(short, long)]
    output: PathBuf,

    /// Single query time (epoch ms); prints IOB instead of writing the grid
    #[arg(long)]
    at: Option<i64>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .init();
    }

    let scenario = Scenario::from_file(&cli.config)
        .with_context(|| format!("failed to load scenario from {:?}", cli.config))?;
    let resolved = scenario.resolve().context("invalid scenario")?;
    info!(
        "Loaded scenario: insulin {} ({} events)",
        resolved.profile.label(),
        resolved.events.len()
    );

    let basal = resolved
        .basal
        .as_ref()
        .map(|schedule| schedule as &dyn BasalSchedule);

    if let Some(at) = cli.at {
        let total = compute_iob(
            at,
            &resolved.events,
            &resolved.profile,
            basal,
            resolved.adjustment.as_ref(),
        )?;
        let display = format_for_display(total.iob_units, &resolved.profile)?;
        match display.concentrated_units {
            Some(concentrated) => println!(
                "t={} iob={:.4} U normalized ({:.4} U concentrated, factor {}) activity={:.6e} U/ms",
                at,
                display.normalized_units,
                concentrated,
                display.concentration_factor,
                total.activity_units_per_ms
            ),
            None => println!(
                "t={} iob={:.4} U activity={:.6e} U/ms",
                at, display.normalized_units, total.activity_units_per_ms
            ),
        }
        return Ok(());
    }

    let timeline = evaluate_timeline(
        &resolved.time_points,
        &resolved.events,
        &resolved.profile,
        basal,
        resolved.adjustment.as_ref(),
    )?;
    info!("Evaluated {} query points", timeline.len());

    std::fs::create_dir_all(&cli.output)
        .with_context(|| format!("failed to create output directory {:?}", cli.output))?;
    iob_engine::output::save_results(&timeline, &resolved.profile, &cli.output)?;
    info!("Results saved to {:?}", cli.output);

    Ok(())
}
