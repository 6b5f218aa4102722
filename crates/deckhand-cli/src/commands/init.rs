//! Init command - scaffold a definition file

use console::style;
use miette::{IntoDiagnostic, Result, WrapErr};
use std::fs;
use std::path::Path;

use crate::definition::DEFAULT_DEFINITION;

pub fn run(name: &str, output: &Path) -> Result<()> {
    let path = output.join(DEFAULT_DEFINITION);
    if path.exists() {
        return Err(miette::miette!("{} already exists", path.display()));
    }

    fs::create_dir_all(output)
        .into_diagnostic()
        .wrap_err_with(|| format!("Failed to create {}", output.display()))?;

    let definition = format!(
        r#"# Deployment definition for {name}
name: {name}
namespace: default

# Rendered by `deckhand render` when --format is not given
formats: [kubernetes, compose, helm, kustomize, terraform]

chart:
  version: 0.1.0
  description: A Helm chart for {name}

overlays:
  - name: production
    replicas:
      {name}: 3

builders:
  - type: App
    name: {name}
    image: nginx:latest
    ports:
      - container: 80
        host: 8080
    scaling:
      replicas: 1
    env:
      LOG_LEVEL: info
    configMaps:
      - name: {name}-config
        sources:
          - source: literal
            key: GREETING
            value: hello
"#
    );

    fs::write(&path, definition)
        .into_diagnostic()
        .wrap_err_with(|| format!("Failed to write {}", path.display()))?;

    println!(
        "{} Created {}",
        style("✓").green().bold(),
        style(path.display()).bold()
    );
    println!();
    println!("Next steps:");
    println!("  deckhand validate {}", path.display());
    println!("  deckhand render {} -o dist", path.display());
    Ok(())
}
