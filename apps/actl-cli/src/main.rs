//! # action-control
//!
//! Report on and enforce a GitHub Actions usage policy across an
//! organization or a single repository:
//! - `action-control report`: list every action each repository uses
//! - `action-control enforce`: check repositories against a policy file,
//!   exiting non-zero when any repository violates it
//! - `action-control export`: write a baseline policy from current usage

mod commands;
mod config;
mod driver;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use actl_report::OutputFormat;

use crate::config::{AppConfig, ConfigLayer};

/// A CLI tool to enforce a GitHub Actions policy that you create.
#[derive(Parser)]
#[command(name = "action-control", version, about)]
struct Cli {
    /// Config file (default is ./config.yaml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// GitHub organization name.
    #[arg(long, global = true)]
    org: Option<String>,

    /// Specific repository to check (format: owner/repo).
    #[arg(long, global = true)]
    repo: Option<String>,

    /// Output format (markdown or json).
    #[arg(long, global = true)]
    output: Option<OutputFormat>,

    /// Log per-repository detail.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report on GitHub Actions used in repositories across your organization.
    Report,
    /// Enforce policy on GitHub Actions usage.
    Enforce(commands::enforce::EnforceArgs),
    /// Export a policy file based on discovered GitHub Actions.
    Export(commands::export::ExportArgs),
}

impl Cli {
    /// Flag values as the highest-precedence configuration layer.
    fn config_layer(&self) -> ConfigLayer {
        let mut layer = ConfigLayer {
            organization: self.org.clone(),
            repository: self.repo.clone(),
            output_format: self.output.map(|f| f.to_string()),
            ..ConfigLayer::default()
        };
        match &self.command {
            Commands::Report => {}
            Commands::Enforce(args) => args.apply_to(&mut layer),
            Commands::Export(args) => args.apply_to(&mut layer),
        }
        layer
    }
}

fn init_tracing(verbose: bool) -> anyhow::Result<()> {
    let level = if verbose { "debug" } else { "info" };
    // Logs go to stderr so stdout carries only the report.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(format!("action_control={level}").parse()?)
                .add_directive(format!("actl_github={level}").parse()?)
                .add_directive(format!("actl_policy={level}").parse()?),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let config = AppConfig::load(cli.config.as_deref(), cli.config_layer());

    match &cli.command {
        Commands::Report => commands::report::execute(&config),
        Commands::Enforce(_) => {
            let violations_found = commands::enforce::execute(&config)?;
            if violations_found {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Export(_) => commands::export::execute(&config),
    }
}
