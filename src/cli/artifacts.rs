//! Artifacts command - encoder training directories and model files

use anyhow::{Context, Result};
use console::style;

use sentiment_lab::artifacts::ArtifactLayout;

use super::ArtifactsCommand;

pub fn run(command: &ArtifactsCommand) -> Result<()> {
    match command {
        ArtifactsCommand::Prepare { target } => {
            let layout = ArtifactLayout::new(&target.root);
            let dirs = layout
                .prepare(&target.task, &target.run, target.folds)
                .with_context(|| format!("Failed to prepare run '{}'", target.run))?;
            println!(
                "{} Prepared run {} ({})",
                style("✓").green(),
                style(&target.run).cyan(),
                style(layout.run_dir(&target.run).display()).dim()
            );
            for dir in dirs {
                println!("  {}", dir.display());
            }
        }
        ArtifactsCommand::Collect { target } => {
            let layout = ArtifactLayout::new(&target.root);
            let models = layout
                .collect(&target.task, &target.run, target.folds)
                .with_context(|| format!("Failed to collect models of run '{}'", target.run))?;
            println!(
                "{} Collected {} models for {}",
                style("✓").green(),
                models.len(),
                style(&target.run).cyan()
            );
            for model in models {
                println!("  {}", model.display());
            }
        }
        ArtifactsCommand::Locate {
            task,
            run,
            fold,
            root,
        } => {
            let path = ArtifactLayout::new(root).locate(task, run, *fold)?;
            println!("{}", path.display());
        }
    }
    Ok(())
}
