//! Browser session abstraction
//!
//! A `PageDriver` is one isolated browser session (one page in a fresh
//! context). The page model and expectations only talk to this trait, so the
//! same scenarios run against real browsers or the in-process simulation.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::config::{ProjectConfig, Viewport};
use crate::error::E2eResult;
use crate::locator::Locator;

#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate to an absolute URL and wait for the page to load
    async fn goto(&self, url: &str) -> E2eResult<()>;

    async fn reload(&self) -> E2eResult<()>;

    async fn url(&self) -> E2eResult<String>;

    /// Click the first match, waiting for it to be actionable
    async fn click(&self, locator: &Locator) -> E2eResult<()>;

    /// Replace the value of an input
    async fn fill(&self, locator: &Locator, value: &str) -> E2eResult<()>;

    /// Press a key (e.g. `Enter`) with the element focused
    async fn press(&self, locator: &Locator, key: &str) -> E2eResult<()>;

    async fn focus(&self, locator: &Locator) -> E2eResult<()>;

    async fn count(&self, locator: &Locator) -> E2eResult<usize>;

    /// False when nothing matches
    async fn is_visible(&self, locator: &Locator) -> E2eResult<bool>;

    async fn is_enabled(&self, locator: &Locator) -> E2eResult<bool>;

    async fn is_focused(&self, locator: &Locator) -> E2eResult<bool>;

    async fn input_value(&self, locator: &Locator) -> E2eResult<Option<String>>;

    async fn text_content(&self, locator: &Locator) -> E2eResult<Option<String>>;

    async fn computed_style(&self, locator: &Locator, property: &str)
        -> E2eResult<Option<String>>;

    async fn get_attribute(&self, locator: &Locator, name: &str) -> E2eResult<Option<String>>;

    async fn set_viewport(&self, viewport: Viewport) -> E2eResult<()>;

    /// Capture the page into `path`
    async fn screenshot(&self, path: &Path) -> E2eResult<PathBuf>;

    /// End the session. Returns the recorded artifacts kept on disk.
    async fn close(&self, keep_artifacts: bool) -> E2eResult<Vec<PathBuf>>;
}

/// What a session should record and where
#[derive(Debug, Clone)]
pub struct SessionArtifacts {
    /// Per-attempt output directory
    pub dir: PathBuf,
    pub record_video: bool,
    pub record_trace: bool,
}

impl SessionArtifacts {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            record_video: false,
            record_trace: false,
        }
    }

    pub fn video_dir(&self) -> PathBuf {
        self.dir.join("video")
    }

    pub fn trace_path(&self) -> PathBuf {
        self.dir.join("trace.zip")
    }
}

/// Opens isolated sessions for a project
#[async_trait]
pub trait DriverFactory: Send + Sync {
    fn name(&self) -> &str;

    async fn open(
        &self,
        project: &ProjectConfig,
        artifacts: &SessionArtifacts,
    ) -> E2eResult<Box<dyn PageDriver>>;
}
