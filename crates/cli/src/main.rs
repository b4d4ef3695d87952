//! To-Do E2E CLI - Main Entry Point
//!
//! Runs the browser suite against the to-do list page, lists the scenario
//! catalogue and serves the local reference page.

use clap::{Parser, Subcommand};

use todo_cli::commands::{list, run, serve};
use todo_cli::output::{self, print_error};

/// To-Do E2E - browser suite for a to-do list page
#[derive(Parser)]
#[command(name = "todo-e2e")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the suite
    Run(run::RunArgs),

    /// List scenarios
    List(list::ListArgs),

    /// Serve the local reference page
    Serve(serve::ServeArgs),

    /// Show version information
    Version,
}

/// 0 all passed, 1 scenarios failed, 2 environment or usage error
fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            print_error(&format!("Failed to start runtime: {}", e));
            std::process::exit(2);
        }
    };

    let outcome = rt.block_on(async {
        match cli.command {
            Commands::Run(args) => run::execute(args).await,
            Commands::List(args) => list::execute(args, cli.format).await.map(|_| true),
            Commands::Serve(args) => serve::execute(args).await.map(|_| true),
            Commands::Version => {
                println!("To-Do E2E v{}", todo_common::VERSION);
                println!("Browser suite for a to-do list web page");
                println!();
                println!("Drivers: simulated, playwright");
                println!("Projects: chromium, firefox, webkit, Mobile Chrome, Mobile Safari");
                Ok(true)
            }
        }
    });

    match outcome {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            print_error(&format!("{:#}", e));
            std::process::exit(2);
        }
    }
}
