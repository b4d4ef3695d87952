//! Suite configuration
//!
//! Defaults mirror the Playwright configuration the suite was written
//! against. A TOML file (`todo-e2e.toml`, or `TODO_E2E_CONFIG`) overrides the
//! defaults and `TODO_E2E_*` environment variables override the file.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{E2eError, E2eResult};

pub const DEFAULT_BASE_URL: &str = "https://abhigyank.github.io/To-Do-List/";
pub const DEFAULT_CONFIG_FILE: &str = "todo-e2e.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1280, 720)
    }
}

impl std::fmt::Display for Viewport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

/// Which `PageDriver` implementation the suite uses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    /// In-process rendition of the reference page
    #[default]
    Simulated,
    /// Real browsers through the Node bridge
    Playwright,
}

impl FromStr for DriverKind {
    type Err = E2eError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simulated" | "sim" => Ok(DriverKind::Simulated),
            "playwright" | "browser" => Ok(DriverKind::Playwright),
            other => Err(E2eError::Config(format!("unknown driver '{}'", other))),
        }
    }
}

impl std::fmt::Display for DriverKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriverKind::Simulated => write!(f, "simulated"),
            DriverKind::Playwright => write!(f, "playwright"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TraceMode {
    Off,
    On,
    #[default]
    OnFirstRetry,
    RetainOnFailure,
}

impl TraceMode {
    /// Whether attempt number `retry` (0 = first run) records a trace
    pub fn records(&self, retry: u32) -> bool {
        match self {
            TraceMode::Off => false,
            TraceMode::On | TraceMode::RetainOnFailure => true,
            TraceMode::OnFirstRetry => retry == 1,
        }
    }

    pub fn keeps(&self, retry: u32, failed: bool) -> bool {
        match self {
            TraceMode::RetainOnFailure => failed,
            mode => mode.records(retry),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScreenshotMode {
    Off,
    On,
    #[default]
    OnlyOnFailure,
}

impl ScreenshotMode {
    pub fn captures(&self, failed: bool) -> bool {
        match self {
            ScreenshotMode::Off => false,
            ScreenshotMode::On => true,
            ScreenshotMode::OnlyOnFailure => failed,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VideoMode {
    Off,
    On,
    #[default]
    RetainOnFailure,
}

impl VideoMode {
    pub fn records(&self) -> bool {
        !matches!(self, VideoMode::Off)
    }

    pub fn keeps(&self, failed: bool) -> bool {
        match self {
            VideoMode::Off => false,
            VideoMode::On => true,
            VideoMode::RetainOnFailure => failed,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactPolicy {
    pub trace: TraceMode,
    pub screenshot: ScreenshotMode,
    pub video: VideoMode,
}

/// Timeouts in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub action_ms: u64,
    pub navigation_ms: u64,
    pub expect_ms: u64,
    pub test_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            action_ms: 10_000,
            navigation_ms: 30_000,
            expect_ms: 5_000,
            test_ms: 60_000,
        }
    }
}

impl Timeouts {
    pub fn action(&self) -> Duration {
        Duration::from_millis(self.action_ms)
    }

    pub fn navigation(&self) -> Duration {
        Duration::from_millis(self.navigation_ms)
    }

    pub fn expect(&self) -> Duration {
        Duration::from_millis(self.expect_ms)
    }

    pub fn test(&self) -> Duration {
        Duration::from_millis(self.test_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReporterKind {
    List,
    Json,
    Html,
}

/// One browser/device combination every scenario runs against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    #[serde(default)]
    pub browser: Browser,
    /// Playwright device descriptor name, e.g. `Pixel 5`
    #[serde(default)]
    pub device: Option<String>,
    /// Overrides the device's viewport
    #[serde(default)]
    pub viewport: Option<Viewport>,
    /// Overrides the device's mobile flag
    #[serde(default)]
    pub is_mobile: Option<bool>,
}

impl ProjectConfig {
    /// Project using one of the known device descriptors
    pub fn for_device(name: &str, device: &str) -> E2eResult<Self> {
        let (browser, _, _) = device_descriptor(device)
            .ok_or_else(|| E2eError::Config(format!("unknown device '{}'", device)))?;
        Ok(Self {
            name: name.to_string(),
            browser,
            device: Some(device.to_string()),
            viewport: None,
            is_mobile: None,
        })
    }

    fn descriptor(&self) -> Option<(Browser, Viewport, bool)> {
        self.device.as_deref().and_then(device_descriptor)
    }

    /// Explicit viewport, else the device's, else `fallback`
    pub fn viewport_or(&self, fallback: Viewport) -> Viewport {
        self.viewport
            .or_else(|| self.descriptor().map(|(_, viewport, _)| viewport))
            .unwrap_or(fallback)
    }

    pub fn is_mobile(&self) -> bool {
        self.is_mobile
            .or_else(|| self.descriptor().map(|(_, _, mobile)| mobile))
            .unwrap_or(false)
    }
}

/// Browser engine, viewport and mobile flag of the devices the suite targets
pub fn device_descriptor(device: &str) -> Option<(Browser, Viewport, bool)> {
    match device {
        "Desktop Chrome" => Some((Browser::Chromium, Viewport::new(1280, 720), false)),
        "Desktop Firefox" => Some((Browser::Firefox, Viewport::new(1280, 720), false)),
        "Desktop Safari" => Some((Browser::Webkit, Viewport::new(1280, 720), false)),
        "Pixel 5" => Some((Browser::Chromium, Viewport::new(393, 727), true)),
        "iPhone 12" => Some((Browser::Webkit, Viewport::new(390, 664), true)),
        _ => None,
    }
}

fn default_projects() -> Vec<ProjectConfig> {
    [
        ("chromium", "Desktop Chrome"),
        ("firefox", "Desktop Firefox"),
        ("webkit", "Desktop Safari"),
        ("Mobile Chrome", "Pixel 5"),
        ("Mobile Safari", "iPhone 12"),
    ]
    .into_iter()
    .filter_map(|(name, device)| ProjectConfig::for_device(name, device).ok())
    .collect()
}

/// Complete suite configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SuiteConfig {
    pub base_url: String,
    pub driver: DriverKind,
    pub fully_parallel: bool,
    /// `None` resolves to 2 on CI and 0 elsewhere
    pub retries: Option<u32>,
    /// `None` resolves to 1 on CI and the available parallelism elsewhere
    pub workers: Option<usize>,
    pub timeouts: Timeouts,
    pub viewport: Viewport,
    pub headless: bool,
    pub artifacts: ArtifactPolicy,
    pub reporters: Vec<ReporterKind>,
    /// Results, screenshots, videos and traces
    pub output_dir: PathBuf,
    /// HTML report folder
    pub report_dir: PathBuf,
    pub projects: Vec<ProjectConfig>,
    /// Only run projects with these names (empty = all)
    pub project_filter: Vec<String>,
    /// Regex over scenario id, title and group
    pub grep: Option<String>,
    /// Directory of declarative YAML scenarios
    pub specs_dir: Option<PathBuf>,
    #[serde(skip)]
    pub ci: bool,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            driver: DriverKind::default(),
            fully_parallel: true,
            retries: None,
            workers: None,
            timeouts: Timeouts::default(),
            viewport: Viewport::default(),
            headless: true,
            artifacts: ArtifactPolicy::default(),
            reporters: vec![ReporterKind::Html, ReporterKind::List, ReporterKind::Json],
            output_dir: PathBuf::from("test-results"),
            report_dir: PathBuf::from("playwright-report"),
            projects: default_projects(),
            project_filter: Vec::new(),
            grep: None,
            specs_dir: None,
            ci: false,
        }
    }
}

impl SuiteConfig {
    /// Defaults, then the config file if present, then the environment
    pub fn load() -> E2eResult<Self> {
        let lookup = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());

        let explicit = lookup("TODO_E2E_CONFIG").map(PathBuf::from);
        let path = explicit
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else if let Some(path) = explicit {
            return Err(E2eError::Config(format!(
                "config file {} does not exist",
                path.display()
            )));
        } else {
            Self::default()
        };

        config.apply_env(lookup)?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> E2eResult<Self> {
        debug!("Loading suite config from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> E2eResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `TODO_E2E_*` and `CI` overrides from `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> E2eResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.ci = lookup("CI").is_some_and(|v| v != "0" && v != "false");

        if let Some(url) = lookup("TODO_E2E_BASE_URL") {
            self.base_url = url;
        }
        if let Some(driver) = lookup("TODO_E2E_DRIVER") {
            self.driver = driver.parse()?;
        }
        if let Some(workers) = lookup("TODO_E2E_WORKERS") {
            self.workers = Some(parse_number("TODO_E2E_WORKERS", &workers)?);
        }
        if let Some(retries) = lookup("TODO_E2E_RETRIES") {
            self.retries = Some(parse_number("TODO_E2E_RETRIES", &retries)?);
        }
        if let Some(projects) = lookup("TODO_E2E_PROJECTS") {
            self.project_filter = projects
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(grep) = lookup("TODO_E2E_GREP") {
            self.grep = Some(grep);
        }
        if let Some(dir) = lookup("TODO_E2E_SPECS_DIR") {
            self.specs_dir = Some(PathBuf::from(dir));
        }

        self.validate()
    }

    pub fn validate(&self) -> E2eResult<()> {
        if self.base_url.trim().is_empty() {
            return Err(E2eError::Config("base_url must not be empty".into()));
        }
        if self.workers == Some(0) {
            return Err(E2eError::Config("workers must be at least 1".into()));
        }
        if self.projects.is_empty() {
            return Err(E2eError::Config("at least one project is required".into()));
        }
        for name in &self.project_filter {
            if !self.projects.iter().any(|p| &p.name == name) {
                return Err(E2eError::Config(format!("unknown project '{}'", name)));
            }
        }
        if let Some(grep) = &self.grep {
            regex::Regex::new(grep)?;
        }
        Ok(())
    }

    pub fn retries(&self) -> u32 {
        self.retries.unwrap_or(if self.ci { 2 } else { 0 })
    }

    pub fn workers(&self) -> usize {
        match self.workers {
            Some(n) => n,
            None if self.ci => 1,
            None => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }

    /// Projects selected by `project_filter`, with viewport and mobile
    /// flag resolved against their device and the suite viewport
    pub fn selected_projects(&self) -> Vec<ProjectConfig> {
        self.projects
            .iter()
            .filter(|p| self.project_filter.is_empty() || self.project_filter.contains(&p.name))
            .map(|p| ProjectConfig {
                viewport: Some(p.viewport_or(self.viewport)),
                is_mobile: Some(p.is_mobile()),
                ..p.clone()
            })
            .collect()
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> E2eResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| E2eError::Config(format!("{} must be a number, got '{}'", key, value)))
}

/// Join `path` onto `base` the way `page.goto` does with a `baseURL`
pub fn resolve_url(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    let base_no_fragment = base.split('#').next().unwrap_or(base);
    if path.is_empty() {
        return base_no_fragment.to_string();
    }
    if let Some(fragment) = path.strip_prefix('#') {
        return format!("{}#{}", base_no_fragment, fragment);
    }
    let dir = match base_no_fragment.rfind('/') {
        Some(i) if base_no_fragment[..i].ends_with('/') => base_no_fragment.to_string() + "/",
        Some(i) => base_no_fragment[..=i].to_string(),
        None => format!("{}/", base_no_fragment),
    };
    format!("{}{}", dir, path.trim_start_matches("./").trim_start_matches('/'))
}
