use clap::Parser;
use tracing_subscriber::EnvFilter;

use vulngate::cli::{self, Cli, Commands};
use vulngate::config;
use vulngate::errors::GateError;
use vulngate::models::GateStatus;

/// Exit codes the CI caller branches on: 0 = PASS, 2 = threshold FAIL,
/// 3 = scan execution error, 4 = policy load error, 1 = everything else.
const EXIT_THRESHOLD_FAIL: i32 = 2;
const EXIT_SCAN_ERROR: i32 = 3;
const EXIT_POLICY_ERROR: i32 = 4;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(!cli.no_color)
        .init();

    let exit_code = match cli.command {
        Commands::Gate(args) => match cli::gate::handle_gate(args).await {
            Ok(GateStatus::Pass) => 0,
            Ok(GateStatus::Fail) => EXIT_THRESHOLD_FAIL,
            Err(e) => report_error(e),
        },
        Commands::Rescan(args) => match cli::rescan::handle_rescan(args).await {
            Ok(summary) => {
                if summary.failed_verdicts > 0 {
                    EXIT_THRESHOLD_FAIL
                } else if summary.scan_errors > 0 {
                    EXIT_SCAN_ERROR
                } else {
                    0
                }
            }
            Err(e) => report_error(e),
        },
        Commands::Schedule(args) => match cli::schedule::handle_schedule(args).await {
            Ok(()) => 0,
            Err(e) => report_error(e),
        },
        Commands::Exceptions(args) => match cli::exceptions::handle_exceptions(args).await {
            Ok(()) => 0,
            Err(e) => report_error(e),
        },
        Commands::Validate(args) => match handle_validate(args).await {
            Ok(()) => 0,
            Err(e) => report_error(e),
        },
    };

    std::process::exit(exit_code);
}

fn report_error(e: GateError) -> i32 {
    eprintln!("Error: {}", e);
    match &e {
        GateError::PolicyLoad(_) => EXIT_POLICY_ERROR,
        GateError::InvalidImage(_)
        | GateError::EngineAuth(_)
        | GateError::EngineOutput(_)
        | GateError::EngineUnavailable(_)
        | GateError::Network(_)
        | GateError::Timeout(_)
        | GateError::RateLimit(_)
        | GateError::RetryExhausted { .. } => EXIT_SCAN_ERROR,
        _ => 1,
    }
}

async fn handle_validate(args: cli::commands::ValidateArgs) -> Result<(), GateError> {
    let path = std::path::PathBuf::from(&args.config);
    let _config = config::parse_config(&path).await?;
    println!("Configuration is valid: {}", args.config);
    Ok(())
}
