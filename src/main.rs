//! Internet Speed Tester - Main CLI Application
//!
//! Measures download, upload and latency against a catalog of public HTTP
//! endpoints and prints the result for a terminal or as JSON.

use clap::Parser;
use internet_speed_tester::{
    log_debug, log_warn,
    cli::Cli,
    config::{load_config, validate_config},
    error::{AppError, Result},
    executor::{EngineEvent, RunHandle, SpeedTestEngine},
    logging::Logger,
    output::{OutputCoordinator, OutputFormatterFactory},
    Config, TestRun, PKG_NAME, VERSION,
};
use std::process;

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panic: {}", panic_info);
    }));

    let cli = Cli::parse();

    if let Err(message) = cli.validate() {
        eprintln!("Error: {}", message);
        process::exit(1);
    }

    let use_color = cli.use_colors();

    if let Err(e) = run_application(cli).await {
        eprintln!("{}", e.format_for_console(use_color));
        print_error_suggestions(&e);
        process::exit(e.exit_code());
    }
}

/// Main application logic
async fn run_application(cli: Cli) -> Result<()> {
    if cli.debug {
        eprintln!("{} v{}", PKG_NAME, VERSION);
        eprintln!("Debug mode enabled");
        eprintln!();
    }

    let print_catalog = cli.print_catalog;
    let config = load_config(cli)?;
    let catalog = config.load_catalog()?;

    for warning in validate_config(&config, &catalog)? {
        eprintln!("{}", warning.format(config.enable_color));
    }

    if print_catalog {
        println!("{}", catalog.to_json_pretty()?);
        return Ok(());
    }

    let mut engine = SpeedTestEngine::from_config(&config, catalog)?;

    let logger = Logger::with_config("APP".to_string(), &config);
    logger.add_context_field("mode".to_string(), config.mode).await;

    let handle = engine.start_run(config.mode).await;
    let correlation_id = handle.run_id().to_string();
    logger.set_session_id(correlation_id.clone()).await;
    logger.begin_operation(&correlation_id, "speed_test").await;
    log_debug!(
        logger,
        "Probe budget {}s, I/O timeout {}s, retention {}",
        config.probe_duration_secs,
        config.io_timeout_secs,
        if config.retain_payload { "on" } else { "off" }
    );

    let outcome = drive_run(handle, &config).await;
    engine.stop_active().await;

    if let Err(AppError::Cancelled) = &outcome {
        log_warn!(logger, "Run {} cancelled by user", correlation_id);
    }
    logger
        .end_operation(&correlation_id, "speed_test", outcome.is_ok())
        .await;

    let run = outcome?;
    if config.json_output {
        let json = serde_json::to_string_pretty(&run)
            .map_err(|e| AppError::internal(format!("Failed to serialize result: {}", e)))?;
        println!("{}", json);
    }

    Ok(())
}

/// Print events as they arrive until the run reaches a terminal event.
///
/// With `--json` everything but the final document goes to stderr so stdout
/// stays machine-readable. Ctrl-C cancels the run.
async fn drive_run(mut handle: RunHandle, config: &Config) -> Result<TestRun> {
    let formatter = OutputFormatterFactory::create_formatter(config.enable_color, config.verbose);
    let coordinator = OutputCoordinator::new(formatter, config.verbose || config.debug);
    let mut interrupted = false;

    loop {
        let event = tokio::select! {
            event = handle.next_event() => event,
            signal = tokio::signal::ctrl_c(), if !interrupted => {
                if let Err(e) = signal {
                    return Err(AppError::internal(format!("Failed to listen for Ctrl-C: {}", e)));
                }
                interrupted = true;
                handle.cancel();
                continue;
            }
        };

        let Some(event) = event else {
            return Err(AppError::Cancelled);
        };

        match event {
            EngineEvent::Completed(run) => {
                if !config.json_output {
                    println!("{}", coordinator.render_run(&run)?);
                }
                return Ok(run);
            }
            EngineEvent::Failed(error) => return Err(error),
            other => {
                if let Some(text) = coordinator.render_event(&other)? {
                    if config.json_output {
                        eprintln!("{}", text);
                    } else {
                        println!("{}", text);
                    }
                }
            }
        }
    }
}

/// Print helpful suggestions for common errors
fn print_error_suggestions(error: &AppError) {
    match error {
        AppError::Config(_) | AppError::Parse(_) => {
            eprintln!();
            eprintln!("Configuration help:");
            eprintln!("  - Check your .env file format");
            eprintln!("  - Durations are whole seconds between 1 and 300");
            eprintln!("  - Catalog files are JSON with download, upload and latency lists");
            eprintln!("  - Run with --print-catalog to see the expected layout");
        }
        AppError::PhaseExhausted(_) => {
            eprintln!();
            eprintln!("Network troubleshooting:");
            eprintln!("  - Check your internet connection");
            eprintln!("  - Verify firewall or proxy settings");
            eprintln!("  - Supply your own endpoints with --catalog");
            eprintln!("  - Run with --verbose to see every endpoint attempt");
        }
        AppError::Timeout(_) => {
            eprintln!();
            eprintln!("Timeout help:");
            eprintln!("  - Increase --io-timeout or --connect-timeout");
            eprintln!("  - Shorten --duration on slow links");
        }
        _ => {}
    }
}
