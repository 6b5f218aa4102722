//! Apply command - render manifests and hand them to kubectl

use console::style;
use miette::Result;
use std::path::Path;
use std::process::Command;

use deckhand_render::{ResourceGenerator, YamlOptions};

use crate::definition::Project;
use crate::error::CliError;

pub fn run(definition: &Path, dry_run: bool, kubectl: &str) -> Result<()> {
    let project = Project::load(definition)?;
    let generator = ResourceGenerator::new(project.builder.as_ref());

    let dir = tempfile::Builder::new()
        .prefix("deckhand-")
        .tempdir()
        .map_err(|e| CliError::io(&std::env::temp_dir(), e))?;
    generator
        .to_yaml_with(dir.path(), YamlOptions::default().with_kustomization())
        .map_err(CliError::from)?;

    let target = dir.path().display().to_string();
    let args = ["apply", "-f", target.as_str()];
    if dry_run {
        println!(
            "{} Dry run, would run: {} {}",
            style("→").blue(),
            kubectl,
            args.join(" ")
        );
        print!("{}", generator.preview().map_err(CliError::from)?);
        return Ok(());
    }

    println!(
        "{} Applying {} with {}",
        style("→").blue(),
        style(&project.definition.name).bold(),
        kubectl
    );
    tracing::debug!(kubectl, dir = %dir.path().display(), "running kubectl");
    let status = Command::new(kubectl)
        .args(&args)
        .status()
        .map_err(|e| CliError::Apply {
            message: format!("could not run '{kubectl}': {e}"),
            help: Some("install kubectl or pass its path with --kubectl".to_string()),
        })?;

    if !status.success() {
        return Err(CliError::Apply {
            message: format!("'{kubectl}' exited with {status}"),
            help: None,
        }
        .into());
    }

    println!("{} Applied!", style("✓").green().bold());
    Ok(())
}
