//! To-Do E2E Test Framework
//!
//! This crate drives a to-do list web page through a browser and checks it
//! behaves as a to-do list should:
//! - A Page Model (`TodoPage`) naming every element and user action
//! - Polling expectations in the style of Playwright's `expect`
//! - A catalogue of 49 scenarios plus declarative YAML scenarios
//! - A runner that fans scenarios out over browser projects and workers,
//!   with retries and per-attempt artifacts
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    E2E Test Runner (Rust)                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestRunner                                                 │
//! │    ├── start_server() -> ServerHandle (todo-web)            │
//! │    ├── DriverFactory::open(project) -> dyn PageDriver       │
//! │    │     ├── SimulatedPage  (in-process DOM)                │
//! │    │     └── PlaywrightPage (node bridge, JSON lines)       │
//! │    ├── Scenario::run(ctx) with retries and timeouts         │
//! │    └── report::write_reports(suite)                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Scenarios                                                  │
//! │    ├── built-in catalogue TC001..TC049                      │
//! │    └── ScenarioSpec (YAML)                                  │
//! │          ├── name, description, tags, start, viewport       │
//! │          └── steps: add_item, navigate, complete_item, ...  │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod dom;
pub mod driver;
pub mod error;
pub mod expect;
pub mod locator;
pub mod page;
pub mod playwright;
pub mod report;
pub mod runner;
pub mod scenarios;
pub mod server;
pub mod simulated;
pub mod spec;

pub use config::{DriverKind, ProjectConfig, SuiteConfig, Viewport};
pub use driver::{DriverFactory, PageDriver, SessionArtifacts};
pub use error::{E2eError, E2eResult, FailureKind};
pub use expect::{expect, expect_url};
pub use locator::Locator;
pub use page::TodoPage;
pub use runner::{Outcome, TestResult, TestRunner, TestSuiteResult};
pub use scenarios::{catalogue, Scenario, ScenarioContext};
pub use spec::ScenarioSpec;

/// Built-in catalogue followed by the YAML scenarios under `specs_dir`
pub fn load_scenarios(config: &SuiteConfig) -> E2eResult<Vec<Scenario>> {
    let mut all = catalogue();
    if let Some(dir) = &config.specs_dir {
        if !dir.is_dir() {
            return Err(E2eError::Config(format!(
                "specs directory {} does not exist",
                dir.display()
            )));
        }
        let specs = ScenarioSpec::load_all(dir)?;
        for spec in specs {
            if all.iter().any(|s| s.id == spec.name) {
                return Err(E2eError::SpecParse(format!(
                    "scenario '{}' clashes with a built-in id",
                    spec.name
                )));
            }
            all.push(Scenario::declarative(spec));
        }
    }
    Ok(all)
}
