//! Top-level CLI definition and dispatch.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use crate::collector::EnvInputSource;
use crate::core::config::{Config, Variant};
use crate::logger::workflow;
use crate::runner::{RunRequest, format_run_report, run_pipeline};
use crate::warehouse::{BigQueryClient, TableAddress, provision};

/// CI analytics emitter: records one CI job's timing and result in BigQuery.
#[derive(Parser)]
#[command(name = "ci-analytics", version, about)]
pub struct Cli {
    /// Path to a TOML config file (defaults to $CI_ANALYTICS_CONFIG).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Deployment variant: full or fixed-table.
    #[arg(long, global = true)]
    pub variant: Option<Variant>,
    /// Subcommand; `emit` when omitted.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands. Without one, `emit` runs.
#[derive(Subcommand)]
pub enum Command {
    /// Build the analytics record from step inputs and append it (default).
    Emit(EmitArgs),
    /// Create the partitioned analytics table (one-time setup).
    Provision(ProvisionArgs),
    /// Print a shell completion script.
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

/// Flags for `emit`.
#[derive(Args, Default)]
pub struct EmitArgs {
    /// Build and log the record without writing it.
    #[arg(long)]
    pub dry_run: bool,
    /// Print the run report as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Flags for `provision`; each overrides the configured table address.
#[derive(Args)]
pub struct ProvisionArgs {
    /// Cloud project owning the dataset.
    #[arg(long)]
    pub project_id: Option<String>,
    /// Dataset to create the table in.
    #[arg(long)]
    pub dataset: Option<String>,
    /// Table name.
    #[arg(long)]
    pub table: Option<String>,
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> ExitCode {
    if let Some(Command::Completions { shell }) = &cli.command {
        clap_complete::generate(*shell, &mut Cli::command(), "ci-analytics", &mut io::stdout());
        return ExitCode::SUCCESS;
    }

    let config = match load_config(cli) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(code = err.code(), "{err}");
            return fail(&err.to_string());
        }
    };

    match &cli.command {
        None => emit(&config, &EmitArgs::default()),
        Some(Command::Emit(args)) => emit(&config, args),
        Some(Command::Provision(args)) => provision_table(&config, args),
        Some(Command::Completions { .. }) => ExitCode::SUCCESS,
    }
}

fn load_config(cli: &Cli) -> crate::core::errors::Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(variant) = cli.variant {
        config.variant = variant;
        config.validate()?;
    }
    Ok(config)
}

fn emit(config: &Config, args: &EmitArgs) -> ExitCode {
    let environment = |key: &str| std::env::var(key).ok();
    let request = RunRequest {
        config,
        inputs: &EnvInputSource,
        environment: &environment,
        dry_run: args.dry_run,
    };
    let report = run_pipeline(&request, BigQueryClient::from_config);

    if args.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(err) => tracing::warn!("could not render report: {err}"),
        }
    } else {
        print!("{}", format_run_report(&report));
    }

    match report.failure.as_deref() {
        Some(message) if !report.succeeded() => fail(message),
        _ => ExitCode::SUCCESS,
    }
}

fn provision_table(config: &Config, args: &ProvisionArgs) -> ExitCode {
    let address = TableAddress::new(
        args.project_id.clone().unwrap_or_else(|| config.table.project_id.clone()),
        args.dataset.clone().unwrap_or_else(|| config.table.dataset.clone()),
        args.table.clone().unwrap_or_else(|| config.table.table.clone()),
    );
    let result = BigQueryClient::from_config(&config.sink)
        .and_then(|client| provision(&client, &address, &config.sink));
    match result {
        Ok(_) => {
            println!("Provisioned {address}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(code = err.code(), "{err}");
            fail(&err.to_string())
        }
    }
}

fn fail(message: &str) -> ExitCode {
    let _ = workflow::set_failed(&mut io::stdout().lock(), message);
    let _ = io::stdout().flush();
    ExitCode::FAILURE
}
