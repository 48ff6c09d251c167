//! Init command - write a default experiment.toml

use anyhow::{Context, Result};
use console::style;
use std::path::Path;

use sentiment_lab::config::default_config_toml;

/// Run the init command
pub fn run(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        println!(
            "{} {} already exists (use --force to overwrite)",
            style("✓").green(),
            style(path.display()).cyan()
        );
        return Ok(());
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, default_config_toml())
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!(
        "{} Created {}",
        style("✓").green(),
        style(path.display()).cyan()
    );
    println!(
        "\nEdit {} to point at your dataset, then run {}",
        style("[dataset] root").bold(),
        style("sentiment-lab run").bold()
    );
    Ok(())
}
