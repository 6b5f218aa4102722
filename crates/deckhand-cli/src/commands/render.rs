//! Render command - write every requested output format

use console::style;
use miette::{Result, WrapErr};
use std::path::Path;

use deckhand_core::OutputFormat;
use deckhand_render::ResourceGenerator;
use deckhand_render::compose::COMPOSE_FILE;

use crate::definition::Project;
use crate::error::CliError;

pub fn run(
    definition: &Path,
    output: &Path,
    formats: &[String],
    set_values: &[String],
    single_file: bool,
) -> Result<()> {
    let project = Project::load(definition)?;
    let formats = project.formats(formats)?;
    let builder = project.builder.as_ref();

    println!(
        "{} Rendering {} ({} {})",
        style("→").blue(),
        style(&project.definition.name).bold(),
        builder.type_name(),
        builder.name()
    );

    let generator = ResourceGenerator::new(builder);
    let records = generator.resources().map_err(CliError::from)?;
    let settings = project.settings(records, set_values, single_file)?;
    let chart_name = settings
        .chart
        .as_ref()
        .map(|c| c.name().to_string())
        .unwrap_or_else(|| builder.name().to_string());

    generator
        .to_all_formats_with(output, &formats, settings)
        .map_err(CliError::from)
        .wrap_err_with(|| format!("Failed to render into {}", output.display()))?;

    for format in &formats {
        if !builder.supports(*format) {
            println!(
                "  {} {} skipped: nothing to render",
                style("⚠").yellow(),
                format
            );
            continue;
        }
        let location = match format {
            OutputFormat::Kubernetes => output.join("k8s"),
            OutputFormat::Compose => output.join(COMPOSE_FILE),
            OutputFormat::Helm => output.join("charts").join(&chart_name),
            OutputFormat::Kustomize => output.join("kustomize"),
            OutputFormat::Terraform => output.join("terraform"),
        };
        println!(
            "  {} {} {}",
            style("✓").green(),
            format,
            location.display()
        );
        for note in builder.compatibility(*format) {
            println!("    {} {}", style("note:").yellow(), note);
        }
    }

    println!();
    println!(
        "{} Rendered {} record(s) in {} format(s)",
        style("✓").green().bold(),
        records.len(),
        formats.len()
    );
    Ok(())
}
