//! UDP Routing Harness - command-line entry point
//!
//! Runs the selected phases against a UDP routing layer, prints the structured
//! report as JSON on stdout and exits non-zero when verification fails.

use clap::Parser;
use std::process;
use udp_routing_harness::{
    app::App,
    cli::Cli,
    error::{AppError, ErrorReporter, Result},
};

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panic: {}", panic_info);
        process::exit(99);
    }));

    let cli = Cli::parse();
    let reporter = ErrorReporter::new(cli.use_colors(), cli.verbose || cli.debug);

    if let Err(e) = run_application(cli).await {
        reporter.report_error(&e);
        print_error_suggestions(&e);
        process::exit(e.exit_code());
    }
}

/// Main application logic
async fn run_application(cli: Cli) -> Result<()> {
    let app = App::new(cli)?;
    let report = app.run().await?;

    let rendered = serde_json::to_string_pretty(&report)?;
    println!("{}", rendered);

    report.verdict()
}

/// Print helpful suggestions for common errors
fn print_error_suggestions(error: &AppError) {
    match error {
        AppError::Config(_) | AppError::Validation(_) | AppError::Parse(_) => {
            eprintln!();
            eprintln!("Configuration help:");
            eprintln!("  - Routes look like [HOST:]PORT=BACKEND, e.g. 10001=game-server-2");
            eprintln!("  - Counts, concurrency and timeouts must be greater than 0");
            eprintln!("  - Check HARNESS_* variables and your .env file");
        }
        AppError::Timeout(_) => {
            eprintln!();
            eprintln!("Timeout help:");
            eprintln!("  - Raise --run-deadline-ms or lower --requests");
            eprintln!("  - Raise --concurrency so the run finishes sooner");
        }
        AppError::Verification(_) => {
            eprintln!();
            eprintln!("Verification help:");
            eprintln!("  - Check the proxy's listener-to-cluster mapping");
            eprintln!("  - Confirm every backend is up and tags replies with its id");
            eprintln!("  - Use --verbose to see per-probe outcomes");
        }
        _ => {}
    }
}
