//! Validate command - report advisory problems in a definition

use console::style;
use miette::Result;
use std::path::Path;

use deckhand_render::ResourceGenerator;

use crate::definition::Project;
use crate::error::CliError;

pub fn run(definition: &Path, json_output: bool, strict: bool) -> Result<()> {
    let project = Project::load(definition)?;
    let generator = ResourceGenerator::new(project.builder.as_ref());
    let problems = generator.validate().map_err(CliError::from)?;

    if json_output {
        let output = serde_json::json!({
            "valid": problems.is_empty(),
            "name": project.definition.name,
            "records": generator.resources().map_err(CliError::from)?.len(),
            "problems": problems,
        });
        let rendered = serde_json::to_string_pretty(&output)
            .map_err(|e| miette::miette!("Failed to serialize report: {e}"))?;
        println!("{rendered}");
    } else {
        println!(
            "{} Validating {}",
            style("→").blue(),
            style(&project.definition.name).bold()
        );
        if problems.is_empty() {
            println!();
            println!("{} Validation passed!", style("✓").green().bold());
        } else {
            for problem in &problems {
                println!("  {} {}", style("⚠").yellow(), problem);
            }
            println!();
            println!(
                "{} {} problem(s) found",
                style("⚠").yellow().bold(),
                problems.len()
            );
        }
    }

    if strict && !problems.is_empty() {
        return Err(CliError::Validation {
            count: problems.len(),
        }
        .into());
    }
    Ok(())
}
