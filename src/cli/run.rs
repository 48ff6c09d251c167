//! Run command - the full cross-validation sweep

use anyhow::{Context, Result};
use console::style;
use indicatif::ProgressBar;
use std::time::Instant;
use tracing::info;

use sentiment_lab::config::ExperimentConfig;
use sentiment_lab::experiment::{Experiment, Sweep};
use sentiment_lab::metrics::{compute_metrics, write_records};

use super::create_bar_style;
use super::metrics::print_summary;

pub fn run(config: &ExperimentConfig, workers: usize) -> Result<()> {
    config.validate().context("Invalid experiment config")?;
    let start = Instant::now();

    println!(
        "\n{} Sentiment sweep on {} ({})\n",
        style("▶").bold(),
        style(&config.dataset.name).cyan(),
        style(config.dataset.root.display()).dim()
    );

    let experiment = Experiment::prepare(config).context("Failed to prepare experiment")?;
    let specs = config.classifier.specs();

    let total = experiment.models.len() * specs.len();
    let bar = ProgressBar::new(total as u64);
    bar.set_style(create_bar_style());
    bar.set_message("Cross-validating...");

    let bar_handle = bar.clone();
    let records = Sweep::new(&experiment)
        .workers(workers)
        .with_progress_callback(Box::new(move |key: &str, done: usize, _total: usize| {
            bar_handle.set_position(done as u64);
            bar_handle.set_message(key.to_string());
        }))
        .run(&experiment.models, &specs)
        .context("Cross-validation failed")?;
    bar.finish_and_clear();

    // Outputs are only written once every pair has succeeded
    let predictions = config.predictions_path();
    let trues = config.trues_path();
    write_records(&records, &predictions, &trues).context("Failed to write prediction tables")?;

    let summary = compute_metrics(&predictions, &trues, &config.metrics_path())
        .context("Failed to compute metrics")?;
    print_summary(&summary);

    info!("Sweep finished in {:.1}s", start.elapsed().as_secs_f64());
    println!(
        "{} {} pairs cross-validated in {:.1}s",
        style("✓").green(),
        records.len(),
        start.elapsed().as_secs_f64()
    );
    for path in [&predictions, &trues, &config.metrics_path()] {
        println!("  {}", style(path.display()).cyan());
    }
    Ok(())
}
