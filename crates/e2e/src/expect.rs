//! Auto-retrying expectations
//!
//! `expect(&page, locator).to_be_visible().await` re-evaluates the condition
//! every 50 ms until it holds or the expect timeout runs out, like
//! Playwright's web-first assertions.

use std::time::{Duration, Instant};

use regex::Regex;

use crate::error::{E2eError, E2eResult, FailureKind};
use crate::locator::{normalize_text, Locator};
use crate::page::TodoPage;

pub const DEFAULT_EXPECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

enum Condition {
    Visible,
    Enabled,
    Focused,
    Value(String),
    ContainsText(String),
    Class(Regex),
    Count(usize),
    Css { property: String, contains: String },
}

impl Condition {
    fn name(&self) -> String {
        match self {
            Condition::Visible => "to_be_visible()".into(),
            Condition::Enabled => "to_be_enabled()".into(),
            Condition::Focused => "to_be_focused()".into(),
            Condition::Value(v) => format!("to_have_value({:?})", v),
            Condition::ContainsText(t) => format!("to_contain_text({:?})", t),
            Condition::Class(re) => format!("to_have_class(/{}/)", re.as_str()),
            Condition::Count(n) => format!("to_have_count({})", n),
            Condition::Css { property, contains } => {
                format!("to_have_css({:?}, {:?})", property, contains)
            }
        }
    }
}

/// Expectation on a locator
pub struct Expectation<'a> {
    page: &'a TodoPage,
    locator: Locator,
    negate: bool,
    timeout: Duration,
}

pub fn expect(page: &TodoPage, locator: Locator) -> Expectation<'_> {
    Expectation {
        page,
        locator,
        negate: false,
        timeout: page.expect_timeout(),
    }
}

impl<'a> Expectation<'a> {
    #[allow(clippy::should_implement_trait)]
    pub fn not(mut self) -> Self {
        self.negate = !self.negate;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn to_be_visible(self) -> E2eResult<()> {
        self.check(Condition::Visible).await
    }

    pub async fn to_be_enabled(self) -> E2eResult<()> {
        self.check(Condition::Enabled).await
    }

    pub async fn to_be_focused(self) -> E2eResult<()> {
        self.check(Condition::Focused).await
    }

    pub async fn to_have_value(self, value: impl Into<String>) -> E2eResult<()> {
        self.check(Condition::Value(value.into())).await
    }

    /// Normalised text content contains `text` (case-sensitive)
    pub async fn to_contain_text(self, text: impl Into<String>) -> E2eResult<()> {
        self.check(Condition::ContainsText(text.into())).await
    }

    /// `class` attribute matches `pattern`
    pub async fn to_have_class(self, pattern: &str) -> E2eResult<()> {
        self.check(Condition::Class(Regex::new(pattern)?)).await
    }

    pub async fn to_have_count(self, count: usize) -> E2eResult<()> {
        self.check(Condition::Count(count)).await
    }

    /// Computed style `property` contains `contains`
    pub async fn to_have_css(self, property: &str, contains: &str) -> E2eResult<()> {
        self.check(Condition::Css {
            property: property.to_string(),
            contains: contains.to_string(),
        })
        .await
    }

    /// One evaluation: whether the condition holds, plus what was seen
    async fn observe(&self, condition: &Condition) -> E2eResult<(bool, String)> {
        let driver = self.page.driver();
        let loc = &self.locator;
        Ok(match condition {
            Condition::Visible => {
                let v = driver.is_visible(loc).await?;
                (v, if v { "visible" } else { "hidden or missing" }.to_string())
            }
            Condition::Enabled => {
                let v = driver.is_enabled(loc).await?;
                (v, if v { "enabled" } else { "disabled or missing" }.to_string())
            }
            Condition::Focused => {
                let v = driver.is_focused(loc).await?;
                (v, if v { "focused" } else { "not focused" }.to_string())
            }
            Condition::Value(expected) => {
                let actual = driver.input_value(loc).await?;
                (actual.as_deref() == Some(expected.as_str()), format!("{:?}", actual))
            }
            Condition::ContainsText(needle) => {
                let actual = driver.text_content(loc).await?;
                let hit = actual
                    .as_deref()
                    .is_some_and(|t| normalize_text(t).contains(&normalize_text(needle)));
                (hit, format!("{:?}", actual))
            }
            Condition::Class(re) => {
                let actual = driver.get_attribute(loc, "class").await?;
                (actual.as_deref().is_some_and(|c| re.is_match(c)), format!("{:?}", actual))
            }
            Condition::Count(expected) => {
                let actual = driver.count(loc).await?;
                (actual == *expected, actual.to_string())
            }
            Condition::Css { property, contains } => {
                let actual = driver.computed_style(loc, property).await?;
                (
                    actual.as_deref().is_some_and(|v| v.contains(contains.as_str())),
                    format!("{:?}", actual),
                )
            }
        })
    }

    async fn check(self, condition: Condition) -> E2eResult<()> {
        let started = Instant::now();

        loop {
            let last = match self.observe(&condition).await {
                Ok((holds, _)) if holds != self.negate => return Ok(()),
                Ok((_, seen)) => seen,
                // Element queries may time out while the page settles
                Err(e) if e.kind() == FailureKind::Timeout => e.to_string(),
                Err(e) => return Err(e),
            };

            if started.elapsed() >= self.timeout {
                return Err(E2eError::AssertionFailed(format!(
                    "expect({}){}.{} failed after {}ms, received {}",
                    self.locator,
                    if self.negate { ".not()" } else { "" },
                    condition.name(),
                    self.timeout.as_millis(),
                    last
                )));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

/// Expectation on the page URL
pub struct UrlExpectation<'a> {
    page: &'a TodoPage,
    negate: bool,
    timeout: Duration,
}

pub fn expect_url(page: &TodoPage) -> UrlExpectation<'_> {
    UrlExpectation {
        page,
        negate: false,
        timeout: page.expect_timeout(),
    }
}

impl<'a> UrlExpectation<'a> {
    #[allow(clippy::should_implement_trait)]
    pub fn not(mut self) -> Self {
        self.negate = !self.negate;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn to_match(self, pattern: &str) -> E2eResult<()> {
        let re = Regex::new(pattern)?;
        let started = Instant::now();
        loop {
            let url = self.page.url().await?;
            if re.is_match(&url) != self.negate {
                return Ok(());
            }
            if started.elapsed() >= self.timeout {
                return Err(E2eError::AssertionFailed(format!(
                    "expect(page){}.to_have_url(/{}/) failed after {}ms, received {:?}",
                    if self.negate { ".not()" } else { "" },
                    pattern,
                    self.timeout.as_millis(),
                    url
                )));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}
