//! cronherd CLI entry point
//!
//! Thin composition layer: parse arguments, initialize logging, route
//! the command, map errors to the process exit code.

use clap::Parser;
use tracing::error;

use cronherd::cli::{execute_command, Cli};
use cronherd::jobs::{registry, sleep};

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose >= 2)
        .init();
}

/// Publish the process-global job registry: built-in jobs plus the
/// crontab declared in the environment.
fn publish_registry() {
    let mut reg = registry::JobRegistry::new();
    sleep::register_builtin(&mut reg);
    for (time_expr, job_spec) in cronherd::config::crontab_from_env() {
        reg.schedule(&time_expr, &job_spec);
    }
    if let Err(e) = registry::publish(reg) {
        error!("{e}");
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    publish_registry();

    if let Err(e) = execute_command(cli.command).await {
        error!("fatal: {e}");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
