//! Preview command - print generated records without writing files

use miette::{Result, WrapErr};
use std::path::Path;

use deckhand_render::ResourceGenerator;

use crate::definition::Project;
use crate::error::CliError;

pub fn run(definition: &Path) -> Result<()> {
    let project = Project::load(definition)?;
    let generator = ResourceGenerator::new(project.builder.as_ref());
    let preview = generator
        .preview()
        .map_err(CliError::from)
        .wrap_err_with(|| format!("Failed to generate {}", project.definition.name))?;
    print!("{preview}");
    Ok(())
}
