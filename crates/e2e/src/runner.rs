//! Suite runner: fans scenarios out over projects and workers, retries
//! failures and collects artifacts per attempt.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::FutureExt;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::{DriverKind, ProjectConfig, SuiteConfig};
use crate::driver::{DriverFactory, PageDriver, SessionArtifacts};
use crate::error::{E2eError, E2eResult, FailureKind};
use crate::page::TodoPage;
use crate::playwright::PlaywrightDriverFactory;
use crate::scenarios::{Annotation, Scenario, ScenarioContext};
use crate::server::{ServerConfig, ServerHandle};
use crate::simulated::SimulatedDriverFactory;

/// Final outcome of one scenario on one project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Passed,
    /// Passed on a retry
    Flaky,
    Failed,
    TimedOut,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Passed | Outcome::Flaky)
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Passed => write!(f, "passed"),
            Outcome::Flaky => write!(f, "flaky"),
            Outcome::Failed => write!(f, "failed"),
            Outcome::TimedOut => write!(f, "timed out"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Passed,
    Failed,
    TimedOut,
}

/// One try of a scenario in a fresh session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptResult {
    pub retry: u32,
    pub status: AttemptStatus,
    pub duration_ms: u64,
    pub error: Option<String>,
    pub error_kind: Option<FailureKind>,
    /// Screenshots, videos and traces kept for this attempt
    pub artifacts: Vec<PathBuf>,
}

/// Result of running a single scenario on a single project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub id: String,
    pub title: String,
    pub group: String,
    pub project: String,
    pub outcome: Outcome,
    pub duration_ms: u64,
    pub attempts: Vec<AttemptResult>,
    pub annotations: Vec<Annotation>,
    /// Error of the last failed attempt
    pub error: Option<String>,
    pub error_kind: Option<FailureKind>,
}

impl TestResult {
    pub fn retries(&self) -> usize {
        self.attempts.len().saturating_sub(1)
    }

    pub fn artifacts(&self) -> impl Iterator<Item = &PathBuf> {
        self.attempts.iter().flat_map(|a| a.artifacts.iter())
    }
}

/// Result of running all jobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSuiteResult {
    pub started_at: DateTime<Utc>,
    pub driver: String,
    pub base_url: String,
    pub workers: usize,
    pub total: usize,
    pub passed: usize,
    pub flaky: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub duration_ms: u64,
    pub results: Vec<TestResult>,
}

impl TestSuiteResult {
    pub fn success(&self) -> bool {
        self.failed == 0 && self.timed_out == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &TestResult> {
        self.results.iter().filter(|r| !r.outcome.is_success())
    }
}

struct JobEnv {
    config: SuiteConfig,
    factory: Arc<dyn DriverFactory>,
}

/// Main E2E test runner
pub struct TestRunner {
    config: SuiteConfig,
    factory: Option<Arc<dyn DriverFactory>>,
    server: Option<ServerHandle>,
}

impl TestRunner {
    /// Runner whose driver is picked from `config.driver` on first run
    pub fn new(config: SuiteConfig) -> Self {
        Self {
            config,
            factory: None,
            server: None,
        }
    }

    /// Runner with an explicit driver factory
    pub fn with_factory(config: SuiteConfig, factory: Arc<dyn DriverFactory>) -> Self {
        Self {
            config,
            factory: Some(factory),
            server: None,
        }
    }

    pub fn config(&self) -> &SuiteConfig {
        &self.config
    }

    /// Start the local reference page and point the suite at it
    pub async fn start_server(&mut self, server_config: ServerConfig) -> E2eResult<()> {
        if self.server.is_some() {
            return Ok(());
        }

        let server = ServerHandle::spawn(server_config).await?;
        self.config.base_url = server.base_url().to_string();
        self.server = Some(server);
        Ok(())
    }

    pub fn stop_server(&mut self) -> E2eResult<()> {
        if let Some(mut server) = self.server.take() {
            server.stop()?;
        }
        Ok(())
    }

    fn factory(&mut self) -> E2eResult<Arc<dyn DriverFactory>> {
        if let Some(factory) = &self.factory {
            return Ok(factory.clone());
        }
        let factory: Arc<dyn DriverFactory> = match self.config.driver {
            DriverKind::Simulated => Arc::new(SimulatedDriverFactory::new()),
            DriverKind::Playwright => Arc::new(PlaywrightDriverFactory::new(&self.config)?),
        };
        self.factory = Some(factory.clone());
        Ok(factory)
    }

    /// Scenarios whose id, title, group or tags match `grep`
    pub fn select(&self, scenarios: Vec<Scenario>) -> E2eResult<Vec<Scenario>> {
        let Some(grep) = &self.config.grep else {
            return Ok(scenarios);
        };
        let pattern = Regex::new(grep)?;
        Ok(scenarios
            .into_iter()
            .filter(|s| pattern.is_match(&s.grep_haystack()))
            .collect())
    }

    /// Run the selected scenarios on every selected project
    pub async fn run(&mut self, scenarios: Vec<Scenario>) -> E2eResult<TestSuiteResult> {
        let started_at = Utc::now();
        let start = Instant::now();
        let scenarios = self.select(scenarios)?;
        let factory = self.factory()?;
        let projects = self.config.selected_projects();

        // Without full parallelism every job runs serially
        let workers = if self.config.fully_parallel {
            self.config.workers()
        } else {
            1
        };

        info!(
            "Running {} test(s) using {} worker(s) [driver: {}, projects: {}]",
            scenarios.len() * projects.len(),
            workers,
            factory.name(),
            projects.iter().map(|p| p.name.as_str()).collect::<Vec<_>>().join(", ")
        );

        let env = Arc::new(JobEnv {
            config: self.config.clone(),
            factory: factory.clone(),
        });
        let semaphore = Arc::new(Semaphore::new(workers));
        let mut set = JoinSet::new();

        let jobs: Vec<(Scenario, ProjectConfig)> = projects
            .iter()
            .flat_map(|p| scenarios.iter().map(move |s| (s.clone(), p.clone())))
            .collect();
        for (job, (scenario, project)) in jobs.iter().cloned().enumerate() {
            let env = env.clone();
            let semaphore = semaphore.clone();
            set.spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => {
                        AssertUnwindSafe(run_job(&env, &scenario, &project))
                            .catch_unwind()
                            .await
                            .unwrap_or_else(|panic| {
                                crashed(
                                    &scenario,
                                    &project,
                                    format!("scenario panicked: {}", panic_message(&*panic)),
                                )
                            })
                    }
                    Err(e) => crashed(&scenario, &project, format!("worker pool closed: {}", e)),
                };
                (job, result)
            });
        }

        let mut slots: Vec<Option<TestResult>> = vec![None; jobs.len()];
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((job, result)) => {
                    log_result(&result);
                    slots[job] = Some(result);
                }
                Err(e) => error!("Worker task failed: {}", e),
            }
        }
        let results: Vec<TestResult> = slots
            .into_iter()
            .zip(&jobs)
            .map(|(slot, (scenario, project))| {
                slot.unwrap_or_else(|| crashed(scenario, project, "worker task failed".into()))
            })
            .collect();

        let count = |outcome: Outcome| results.iter().filter(|r| r.outcome == outcome).count();
        let suite = TestSuiteResult {
            started_at,
            driver: factory.name().to_string(),
            base_url: self.config.base_url.clone(),
            workers,
            total: results.len(),
            passed: count(Outcome::Passed),
            flaky: count(Outcome::Flaky),
            failed: count(Outcome::Failed),
            timed_out: count(Outcome::TimedOut),
            duration_ms: start.elapsed().as_millis() as u64,
            results,
        };

        info!(
            "Test Results: {} passed, {} flaky, {} failed, {} timed out ({} ms)",
            suite.passed, suite.flaky, suite.failed, suite.timed_out, suite.duration_ms
        );
        Ok(suite)
    }
}

impl Drop for TestRunner {
    fn drop(&mut self) {
        let _ = self.stop_server();
    }
}

fn log_result(result: &TestResult) {
    match result.outcome {
        Outcome::Passed => info!("✓ [{}] {} ({} ms)", result.project, result.title, result.duration_ms),
        Outcome::Flaky => warn!(
            "± [{}] {} passed after {} retr{}",
            result.project,
            result.title,
            result.retries(),
            if result.retries() == 1 { "y" } else { "ies" }
        ),
        Outcome::Failed | Outcome::TimedOut => error!(
            "✗ [{}] {} - {}",
            result.project,
            result.title,
            result.error.as_deref().unwrap_or("unknown error")
        ),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Result for a job whose worker died before reporting
fn crashed(scenario: &Scenario, project: &ProjectConfig, message: String) -> TestResult {
    let error = E2eError::Driver(message);
    error!(scenario = %scenario.id, project = %project.name, "{}", error);
    TestResult {
        id: scenario.id.clone(),
        title: scenario.full_title(),
        group: scenario.group.label().to_string(),
        project: project.name.clone(),
        outcome: Outcome::Failed,
        duration_ms: 0,
        attempts: Vec::new(),
        annotations: Vec::new(),
        error: Some(error.to_string()),
        error_kind: Some(error.kind()),
    }
}

/// Run one scenario on one project, retrying until it passes or the
/// retry budget is spent
async fn run_job(env: &JobEnv, scenario: &Scenario, project: &ProjectConfig) -> TestResult {
    let max_retries = env.config.retries();
    let mut attempts = Vec::new();
    let mut annotations = Vec::new();

    for retry in 0..=max_retries {
        let (attempt, notes) = run_attempt(env, scenario, project, retry).await;
        let passed = attempt.status == AttemptStatus::Passed;
        if !passed && retry < max_retries {
            debug!(scenario = %scenario.id, project = %project.name, retry, "retrying");
        }
        attempts.push(attempt);
        annotations = notes;
        if passed {
            break;
        }
    }

    let last = attempts.last();
    let outcome = match last.map(|a| a.status) {
        Some(AttemptStatus::Passed) if attempts.len() > 1 => Outcome::Flaky,
        Some(AttemptStatus::Passed) => Outcome::Passed,
        Some(AttemptStatus::TimedOut) => Outcome::TimedOut,
        _ => Outcome::Failed,
    };

    TestResult {
        id: scenario.id.clone(),
        title: scenario.full_title(),
        group: scenario.group.label().to_string(),
        project: project.name.clone(),
        outcome,
        duration_ms: attempts.iter().map(|a| a.duration_ms).sum(),
        error: last.and_then(|a| a.error.clone()),
        error_kind: last.and_then(|a| a.error_kind),
        attempts,
        annotations,
    }
}

/// `test-results/<scenario>-<project>[-retryN]`
fn attempt_dir_name(scenario: &Scenario, project: &ProjectConfig, retry: u32) -> String {
    let mut name = format!("{}-{}", slug(&scenario.full_title()), slug(&project.name));
    if retry > 0 {
        name.push_str(&format!("-retry{}", retry));
    }
    name
}

fn slug(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_matches('-').chars().take(80).collect()
}

async fn run_attempt(
    env: &JobEnv,
    scenario: &Scenario,
    project: &ProjectConfig,
    retry: u32,
) -> (AttemptResult, Vec<Annotation>) {
    let config = &env.config;
    let policy = config.artifacts;
    let dir = config.output_dir.join(attempt_dir_name(scenario, project, retry));
    let mut session = SessionArtifacts::new(&dir);
    session.record_video = policy.video.records();
    session.record_trace = policy.trace.records(retry);

    let start = Instant::now();
    let elapsed_ms = |start: Instant| start.elapsed().as_millis() as u64;

    let driver: Arc<dyn PageDriver> = match env.factory.open(project, &session).await {
        Ok(driver) => Arc::from(driver),
        Err(e) => {
            let attempt = AttemptResult {
                retry,
                status: AttemptStatus::Failed,
                duration_ms: elapsed_ms(start),
                error_kind: Some(e.kind()),
                error: Some(e.to_string()),
                artifacts: Vec::new(),
            };
            return (attempt, Vec::new());
        }
    };

    let page = TodoPage::new(driver.clone(), config.base_url.clone())
        .with_expect_timeout(config.timeouts.expect());
    let ctx = ScenarioContext::new(page);

    let test_timeout = config.timeouts.test();
    let outcome = tokio::time::timeout(test_timeout, scenario.run(&ctx)).await;
    let (status, error, error_kind) = match outcome {
        Ok(Ok(())) => (AttemptStatus::Passed, None, None),
        Ok(Err(e)) => (AttemptStatus::Failed, Some(e.to_string()), Some(e.kind())),
        Err(_) => (
            AttemptStatus::TimedOut,
            Some(format!("Test timeout of {}ms exceeded", test_timeout.as_millis())),
            Some(FailureKind::Timeout),
        ),
    };
    let failed = status != AttemptStatus::Passed;

    let mut artifacts = Vec::new();
    if policy.screenshot.captures(failed) {
        let path = dir.join(if failed { "test-failed-1.png" } else { "test-finished-1.png" });
        match tokio::time::timeout(Duration::from_secs(10), driver.screenshot(&path)).await {
            Ok(Ok(path)) => artifacts.push(path),
            Ok(Err(e)) => warn!("Screenshot for {} failed: {}", scenario.id, e),
            Err(_) => warn!("Screenshot for {} timed out", scenario.id),
        }
    }

    let keep = policy.video.keeps(failed) || policy.trace.keeps(retry, failed);
    match driver.close(keep).await {
        Ok(kept) => artifacts.extend(kept),
        Err(e) => warn!("Closing session for {} failed: {}", scenario.id, e),
    }
    if artifacts.is_empty() {
        // Only succeeds when nothing was written
        let _ = std::fs::remove_dir(&dir);
    }

    let attempt = AttemptResult {
        retry,
        status,
        duration_ms: elapsed_ms(start),
        error,
        error_kind,
        artifacts,
    };
    (attempt, ctx.annotations())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use futures::future::BoxFuture;
    use todo_common::Tab;

    use crate::config::{ScreenshotMode, TraceMode, VideoMode};
    use crate::scenarios::{catalogue, Group};

    fn config(output: &std::path::Path) -> SuiteConfig {
        let mut config = SuiteConfig::default();
        config.base_url = "http://todo.test/".into();
        config.output_dir = output.to_path_buf();
        config.workers = Some(4);
        config.retries = Some(0);
        config.timeouts.expect_ms = 300;
        config.project_filter = vec!["chromium".into()];
        config
    }

    fn passing(ctx: &ScenarioContext) -> BoxFuture<'_, E2eResult<()>> {
        Box::pin(async move { ctx.page.open(Some(Tab::AddItem)).await })
    }

    fn failing(ctx: &ScenarioContext) -> BoxFuture<'_, E2eResult<()>> {
        Box::pin(async move {
            ctx.page.open(None).await?;
            Err(E2eError::AssertionFailed("expected failure".into()))
        })
    }

    fn hanging(_ctx: &ScenarioContext) -> BoxFuture<'_, E2eResult<()>> {
        Box::pin(async move {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        })
    }

    fn panicking(_ctx: &ScenarioContext) -> BoxFuture<'_, E2eResult<()>> {
        Box::pin(async move { panic!("scenario bug") })
    }

    static FLAKY_CALLS: AtomicUsize = AtomicUsize::new(0);

    fn flaky(ctx: &ScenarioContext) -> BoxFuture<'_, E2eResult<()>> {
        Box::pin(async move {
            ctx.page.open(None).await?;
            if FLAKY_CALLS.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(E2eError::AssertionFailed("first try".into()));
            }
            Ok(())
        })
    }

    struct BrokenFactory;

    #[async_trait]
    impl DriverFactory for BrokenFactory {
        fn name(&self) -> &str {
            "broken"
        }

        async fn open(
            &self,
            _project: &ProjectConfig,
            _artifacts: &SessionArtifacts,
        ) -> E2eResult<Box<dyn PageDriver>> {
            Err(E2eError::DriverNotFound)
        }
    }

    #[tokio::test]
    async fn test_full_catalogue_passes_on_simulated_driver() {
        let dir = tempfile::tempdir().unwrap();
        let mut runner = TestRunner::new(config(dir.path()));
        let suite = runner.run(catalogue()).await.unwrap();

        let failures: Vec<_> = suite
            .failures()
            .map(|r| format!("{}: {:?}", r.title, r.error))
            .collect();
        assert!(failures.is_empty(), "{:#?}", failures);
        assert_eq!(suite.total, 49);
        assert!(suite.success());
        assert_eq!(suite.driver, "simulated");
    }

    #[tokio::test]
    async fn test_failure_keeps_screenshot_and_trace_policy() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.retries = Some(1);
        let scenarios = vec![
            Scenario::builtin("X001", "passes", Group::Navigation, passing),
            Scenario::builtin("X002", "fails", Group::Navigation, failing),
        ];
        let mut runner = TestRunner::new(cfg);
        let suite = runner.run(scenarios).await.unwrap();

        assert_eq!(suite.passed, 1);
        assert_eq!(suite.failed, 1);
        assert!(!suite.success());

        let failed = &suite.results[1];
        assert_eq!(failed.outcome, Outcome::Failed);
        assert_eq!(failed.attempts.len(), 2);
        assert_eq!(failed.error_kind, Some(FailureKind::Assertion));

        // First attempt: screenshot only. Retry: screenshot plus trace.
        assert_eq!(failed.attempts[0].artifacts.len(), 1);
        assert!(failed.attempts[1]
            .artifacts
            .iter()
            .any(|p| p.ends_with("trace.json")));
        assert!(failed.attempts[1].artifacts[0]
            .to_string_lossy()
            .contains("-retry1"));

        let passed = &suite.results[0];
        assert!(passed.artifacts().next().is_none());
    }

    #[tokio::test]
    async fn test_flaky_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.retries = Some(2);
        let mut runner = TestRunner::new(cfg);
        let suite = runner
            .run(vec![Scenario::builtin("X003", "flaky", Group::EdgeCases, flaky)])
            .await
            .unwrap();

        assert_eq!(suite.flaky, 1);
        assert!(suite.success());
        assert_eq!(suite.results[0].retries(), 1);
    }

    #[tokio::test]
    async fn test_timeout_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.timeouts.test_ms = 100;
        cfg.artifacts.screenshot = ScreenshotMode::Off;
        let mut runner = TestRunner::new(cfg);
        let suite = runner
            .run(vec![Scenario::builtin("X004", "hangs", Group::Performance, hanging)])
            .await
            .unwrap();

        assert_eq!(suite.timed_out, 1);
        assert_eq!(suite.results[0].error_kind, Some(FailureKind::Timeout));
    }

    #[tokio::test]
    async fn test_panicking_scenario_fails_alone() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.retries = Some(1);
        let scenarios = vec![
            Scenario::builtin("X006", "passes", Group::Navigation, passing),
            Scenario::builtin("X007", "panics", Group::EdgeCases, panicking),
            Scenario::builtin("X008", "passes too", Group::Navigation, passing),
        ];
        let mut runner = TestRunner::new(cfg);
        let suite = runner.run(scenarios).await.unwrap();

        assert_eq!(suite.total, 3);
        assert_eq!(suite.passed, 2);
        assert_eq!(suite.failed, 1);

        let crashed = &suite.results[1];
        assert_eq!(crashed.id, "X007");
        assert_eq!(crashed.outcome, Outcome::Failed);
        assert_eq!(crashed.error_kind, Some(FailureKind::Environment));
        assert!(crashed.error.as_deref().unwrap().contains("scenario bug"));
        assert_eq!(suite.results[2].outcome, Outcome::Passed);
    }

    #[tokio::test]
    async fn test_driver_errors_are_environment_failures() {
        let dir = tempfile::tempdir().unwrap();
        let mut runner = TestRunner::with_factory(config(dir.path()), Arc::new(BrokenFactory));
        let suite = runner
            .run(vec![Scenario::builtin("X005", "passes", Group::Navigation, passing)])
            .await
            .unwrap();

        assert_eq!(suite.failed, 1);
        assert_eq!(suite.results[0].error_kind, Some(FailureKind::Environment));
    }

    #[tokio::test]
    async fn test_grep_and_project_selection() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.grep = Some("delete_item".into());
        cfg.project_filter = vec!["chromium".into(), "Mobile Safari".into()];
        cfg.artifacts.trace = TraceMode::Off;
        cfg.artifacts.video = VideoMode::Off;

        let mut runner = TestRunner::new(cfg);
        let suite = runner.run(catalogue()).await.unwrap();

        assert_eq!(suite.total, 10);
        assert!(suite.results.iter().all(|r| r.group == Group::DeleteItem.label()));
        assert_eq!(suite.results[0].project, "chromium");
        assert_eq!(suite.results[9].project, "Mobile Safari");
    }

    #[test]
    fn test_attempt_dir_name() {
        let scenario = Scenario::builtin("TC001", "Should load page", Group::Navigation, passing);
        let project = ProjectConfig::for_device("Mobile Chrome", "Pixel 5").unwrap();
        assert_eq!(
            attempt_dir_name(&scenario, &project, 0),
            "tc001-should-load-page-mobile-chrome"
        );
        assert!(attempt_dir_name(&scenario, &project, 2).ends_with("-retry2"));
    }
}
