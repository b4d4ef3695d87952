//! `todo-e2e run`

use std::path::PathBuf;

use clap::Args;
use tracing::{info, warn};

use todo_e2e::config::DriverKind;
use todo_e2e::report::write_reports;
use todo_e2e::server::ServerConfig;
use todo_e2e::{load_scenarios, SuiteConfig, TestRunner};

use crate::output::{print_info, print_success, print_warning};

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Suite config file (TOML)
    #[arg(long, env = "TODO_E2E_CONFIG")]
    pub config: Option<PathBuf>,

    /// Driver: simulated or playwright
    #[arg(long)]
    pub driver: Option<String>,

    /// Only run these projects (repeatable)
    #[arg(long = "project")]
    pub projects: Vec<String>,

    /// Only run scenarios matching this regex (id, title, group or @tag)
    #[arg(short, long)]
    pub grep: Option<String>,

    /// Number of parallel workers
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Retries for failing scenarios
    #[arg(long)]
    pub retries: Option<u32>,

    /// Page under test
    #[arg(long)]
    pub base_url: Option<String>,

    /// Start the local reference page and test against it
    #[arg(long)]
    pub serve_local: bool,

    /// Path to the todo-web binary (with --serve-local)
    #[arg(long, env = "TODO_WEB_BIN")]
    pub web_bin: Option<PathBuf>,

    /// Directory of YAML scenarios to add to the catalogue
    #[arg(long)]
    pub specs: Option<PathBuf>,

    /// Show browser windows (playwright driver)
    #[arg(long)]
    pub headed: bool,

    /// Results, screenshots, videos and traces
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Config file, then environment, then command-line flags
pub fn build_config<F>(args: &RunArgs, lookup: F) -> anyhow::Result<SuiteConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match &args.config {
        Some(path) => SuiteConfig::from_file(path)?,
        None => {
            let default = PathBuf::from(todo_e2e::config::DEFAULT_CONFIG_FILE);
            if default.exists() {
                SuiteConfig::from_file(&default)?
            } else {
                SuiteConfig::default()
            }
        }
    };
    config.apply_env(lookup)?;

    if let Some(driver) = &args.driver {
        config.driver = driver.parse::<DriverKind>()?;
    }
    if !args.projects.is_empty() {
        config.project_filter = args.projects.clone();
    }
    if let Some(grep) = &args.grep {
        config.grep = Some(grep.clone());
    }
    if args.workers.is_some() {
        config.workers = args.workers;
    }
    if args.retries.is_some() {
        config.retries = args.retries;
    }
    if let Some(url) = &args.base_url {
        config.base_url = url.clone();
    }
    if let Some(specs) = &args.specs {
        config.specs_dir = Some(specs.clone());
    }
    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }
    if args.headed {
        config.headless = false;
    }

    config.validate()?;
    Ok(config)
}

/// `todo-web` next to this binary, else the default build path
fn default_web_bin() -> PathBuf {
    std::env::current_exe()
        .ok()
        .map(|exe| exe.with_file_name("todo-web"))
        .filter(|p| p.exists())
        .unwrap_or_else(|| ServerConfig::default().binary_path)
}

/// Returns whether every scenario passed
pub async fn execute(args: RunArgs) -> anyhow::Result<bool> {
    let config = build_config(&args, env_lookup)?;
    let scenarios = load_scenarios(&config)?;

    let mut runner = TestRunner::new(config);
    if args.serve_local {
        let server = ServerConfig {
            binary_path: args.web_bin.clone().unwrap_or_else(default_web_bin),
            ..Default::default()
        };
        runner.start_server(server).await?;
        print_info(&format!("Serving reference page at {}", runner.config().base_url));
    }

    let config = runner.config().clone();
    info!(
        "Running against {} with the {} driver",
        config.base_url, config.driver
    );
    let suite = runner.run(scenarios).await?;
    runner.stop_server()?;

    for path in write_reports(&suite, &config)? {
        print_info(&format!("Report: {}", path.display()));
    }

    if suite.success() {
        if suite.flaky > 0 {
            print_warning(&format!("{} scenario(s) only passed on retry", suite.flaky));
        }
        print_success(&format!("{} scenario(s) passed", suite.total));
    } else {
        warn!("{} failed, {} timed out", suite.failed, suite.timed_out);
    }
    Ok(suite.success())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        run: RunArgs,
    }

    fn parse(args: &[&str]) -> RunArgs {
        TestCli::parse_from(std::iter::once("todo-e2e").chain(args.iter().copied())).run
    }

    #[test]
    fn test_flags_override_environment() {
        let args = parse(&[
            "--driver",
            "simulated",
            "--project",
            "firefox",
            "--project",
            "webkit",
            "--grep",
            "TC00[1-3]",
            "--workers",
            "3",
            "--headed",
        ]);
        let env = |key: &str| match key {
            "TODO_E2E_WORKERS" => Some("8".to_string()),
            "TODO_E2E_DRIVER" => Some("playwright".to_string()),
            "CI" => Some("1".to_string()),
            _ => None,
        };
        let config = build_config(&args, env).unwrap();

        assert_eq!(config.driver, DriverKind::Simulated);
        assert_eq!(config.project_filter, vec!["firefox", "webkit"]);
        assert_eq!(config.grep.as_deref(), Some("TC00[1-3]"));
        assert_eq!(config.workers(), 3);
        assert_eq!(config.retries(), 2);
        assert!(!config.headless);
    }

    #[test]
    fn test_invalid_flags_are_rejected() {
        let no_env = |_: &str| None;
        assert!(build_config(&parse(&["--driver", "selenium"]), no_env).is_err());
        assert!(build_config(&parse(&["--project", "lynx"]), no_env).is_err());
        assert!(build_config(&parse(&["--grep", "("]), no_env).is_err());
    }
}
