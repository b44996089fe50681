//! bedrock CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments or missing prerequisites
//! - 5: IaC error

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

use bedrock_core::CoreError;
use bedrock_iac::{EnvironmentKind, IacError};
use commands::{Cli, Commands};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const IAC_ERROR: u8 = 5;
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "bedrock=debug" } else { "bedrock=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // A subscriber may already be installed; keep going either way.
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .try_init();

    let globals = cli.globals();
    let result = match cli.command {
        Commands::AzureSimple(args) => {
            commands::environment::execute(EnvironmentKind::Simple, args, &globals)
        }
        Commands::AzureCommonInfra(args) => {
            commands::environment::execute(EnvironmentKind::Common, args, &globals)
        }
        Commands::AzureSingleKeyvault(args) => {
            commands::environment::execute(EnvironmentKind::Keyvault, args, &globals)
        }
        Commands::AzureMultipleClusters(args) => commands::environment::execute_multiple(args, &globals),
        Commands::Simulate(args) => commands::provision::simulate(args, &globals),
        Commands::Deploy(args) => commands::provision::deploy(args, &globals),
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(categorize_error(&e))
        }
    }
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    if let Some(core) = e.downcast_ref::<CoreError>() {
        if core.is_input_error() {
            return ExitCodes::INVALID_ARGS;
        }
        return match (core, core.root_cause()) {
            (CoreError::Provisioning { .. }, _) | (_, CoreError::ExternalTool(_)) => {
                ExitCodes::IAC_ERROR
            }
            _ => ExitCodes::GENERAL_ERROR,
        };
    }
    if e.downcast_ref::<IacError>().is_some() {
        return ExitCodes::IAC_ERROR;
    }
    if e.downcast_ref::<bedrock_runner::RunnerError>().is_some() {
        return ExitCodes::IAC_ERROR;
    }
    ExitCodes::GENERAL_ERROR
}
