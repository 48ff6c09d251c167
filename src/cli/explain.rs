//! Explain command - feature attributions for one language model and fold

use anyhow::{Context, Result};
use console::style;

use sentiment_lab::classifier::ClassifierKind;
use sentiment_lab::config::ExperimentConfig;
use sentiment_lab::experiment::Experiment;
use sentiment_lab::explain::{
    attribution, summary_plot_path, train_for_explanation, write_summary_plot,
};

pub fn run(
    config: &ExperimentConfig,
    model: &str,
    fold: usize,
    kind: ClassifierKind,
) -> Result<()> {
    config.validate().context("Invalid experiment config")?;
    let Some(lm) = config.language_model(model) else {
        let known: Vec<&str> = config
            .language_models
            .iter()
            .map(|lm| lm.name.as_str())
            .collect();
        anyhow::bail!(
            "Unknown language model '{}'. Configured: {}",
            model,
            known.join(", ")
        );
    };
    if fold >= config.folds.count {
        anyhow::bail!("Fold {} out of range (0..{})", fold, config.folds.count);
    }

    // Only the explained model's features are needed
    let mut scoped = config.clone();
    scoped.language_models = vec![lm.clone()];
    let experiment = Experiment::prepare(&scoped).context("Failed to prepare experiment")?;

    let spec = config.classifier.spec(kind);
    let explained = train_for_explanation(&experiment, model, fold, &spec)
        .with_context(|| format!("Failed to train {} on {} fold {}", spec.name(), model, fold))?;
    let attr = attribution(
        &explained,
        config.explain.samples,
        config.explain.background,
        config.explain.seed,
    )
    .context("Attribution failed")?;

    let path = summary_plot_path(
        &config.output.results_dir,
        &config.dataset.name,
        model,
        fold,
        config.classifier.estimators,
    );
    let title = format!(
        "{} / {} fold {} ({})",
        config.dataset.name,
        model,
        fold,
        spec.name()
    );
    write_summary_plot(&attr, config.explain.top_features, &title, &path)?;

    println!(
        "\n{} Top features for {} fold {}\n",
        style("▶").bold(),
        style(model).cyan(),
        fold
    );
    let top = attr.ranking().into_iter().take(config.explain.top_features);
    for (rank, (feature, mean_abs)) in top.enumerate() {
        println!(
            "  {:>2}. {:<40} {:.4}",
            rank + 1,
            attr.features[feature],
            mean_abs
        );
    }
    println!("\n{} Wrote {}", style("✓").green(), style(path.display()).cyan());
    Ok(())
}
