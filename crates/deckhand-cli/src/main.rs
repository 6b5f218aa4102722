//! Deckhand CLI - describe a deployment once, render it for every target

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod definition;
mod error;
mod exit_codes;

use definition::DEFAULT_DEFINITION;
use error::CliError;

#[derive(Parser)]
#[command(name = "deckhand")]
#[command(author = "Deckhand Contributors")]
#[command(version)]
#[command(about = "Render one deployment definition as Kubernetes, Compose, Helm, Kustomize or Terraform", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the definition into output directories
    Render {
        /// Definition file
        #[arg(default_value = DEFAULT_DEFINITION)]
        definition: PathBuf,

        /// Output directory
        #[arg(short, long, env = "DECKHAND_OUTPUT", default_value = "dist")]
        output: PathBuf,

        /// Formats to render (k8s, compose, helm, kustomize, terraform, all)
        #[arg(short, long = "format")]
        format: Vec<String>,

        /// Set chart values on command line (key=value)
        #[arg(long = "set")]
        set: Vec<String>,

        /// Write Kubernetes manifests into a single file
        #[arg(long)]
        single_file: bool,
    },

    /// Print the generated manifests to stdout
    Preview {
        /// Definition file
        #[arg(default_value = DEFAULT_DEFINITION)]
        definition: PathBuf,
    },

    /// Check the definition and the records it generates
    Validate {
        /// Definition file
        #[arg(default_value = DEFAULT_DEFINITION)]
        definition: PathBuf,

        /// Output results as JSON
        #[arg(long)]
        json: bool,

        /// Exit with an error when problems are found
        #[arg(long)]
        strict: bool,
    },

    /// Render manifests and apply them with kubectl
    Apply {
        /// Definition file
        #[arg(default_value = DEFAULT_DEFINITION)]
        definition: PathBuf,

        /// Print what would be applied without running kubectl
        #[arg(long)]
        dry_run: bool,

        /// kubectl binary to run
        #[arg(long, env = "DECKHAND_KUBECTL", default_value = "kubectl")]
        kubectl: String,
    },

    /// Create a starter definition file
    Init {
        /// Application name
        name: String,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    miette::set_panic_hook();

    let cli = Cli::parse();
    init_tracing(cli.debug);

    let result = match cli.command {
        Commands::Render {
            definition,
            output,
            format,
            set,
            single_file,
        } => commands::render::run(&definition, &output, &format, &set, single_file),

        Commands::Preview { definition } => commands::preview::run(&definition),

        Commands::Validate {
            definition,
            json,
            strict,
        } => commands::validate::run(&definition, json, strict),

        Commands::Apply {
            definition,
            dry_run,
            kubectl,
        } => commands::apply::run(&definition, dry_run, &kubectl),

        Commands::Init { name, output } => commands::init::run(&name, &output),
    };

    if let Err(err) = result {
        eprintln!("{err:?}");
        let code = err
            .downcast_ref::<CliError>()
            .map_or(exit_codes::ERROR, CliError::exit_code);
        std::process::exit(code);
    }
}
