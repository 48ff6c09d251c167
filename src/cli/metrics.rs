//! Metrics command - recompute reports from saved tables

use anyhow::{Context, Result};
use console::style;

use sentiment_lab::config::ExperimentConfig;
use sentiment_lab::metrics::{compute_metrics, MetricsSummary};

pub fn run(config: &ExperimentConfig) -> Result<()> {
    let predictions = config.predictions_path();
    let trues = config.trues_path();
    let summary = compute_metrics(&predictions, &trues, &config.metrics_path())
        .with_context(|| format!("Failed to compute metrics from {}", predictions.display()))?;
    print_summary(&summary);
    println!(
        "{} Wrote {}",
        style("✓").green(),
        style(config.metrics_path().display()).cyan()
    );
    Ok(())
}

/// Print each report under its (language model, classifier) key
pub(crate) fn print_summary(summary: &MetricsSummary) {
    for keyed in &summary.reports {
        println!("\n{}", style(&keyed.key).bold().cyan());
        println!("{}", keyed.report.render());
    }
}
