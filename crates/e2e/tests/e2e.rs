//! E2E test harness entry point
//!
//! Runs the whole catalogue plus the YAML scenarios in `specs/`.
//! Run with: cargo test --package todo-e2e --test e2e
//!
//! Configuration comes from `todo-e2e.toml` and `TODO_E2E_*` variables;
//! without either, every project runs against the simulated driver.
//! Set `TODO_E2E_DRIVER=playwright` to drive real browsers.

use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

use todo_e2e::report::write_reports;
use todo_e2e::{load_scenarios, E2eResult, SuiteConfig, TestRunner};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to create tokio runtime: {}", e);
            std::process::exit(2);
        }
    };

    match rt.block_on(async_main()) {
        Ok(true) => std::process::exit(0),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    }
}

async fn async_main() -> E2eResult<bool> {
    let mut config = SuiteConfig::load()?;
    if config.specs_dir.is_none() {
        let bundled = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("specs");
        if bundled.is_dir() {
            config.specs_dir = Some(bundled);
        }
    }

    let scenarios = load_scenarios(&config)?;
    let mut runner = TestRunner::new(config.clone());
    let suite = runner.run(scenarios).await?;
    write_reports(&suite, &config)?;

    Ok(suite.success())
}
