//! Page model for the to-do list page
//!
//! Maps semantic actions (add, navigate, complete, delete) onto locators and
//! driver calls. It keeps no state of its own and never judges outcomes:
//! when an action could not take effect, the scenario's assertions say so.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use todo_common::{ListKind, Tab};

use crate::config::resolve_url;
use crate::driver::PageDriver;
use crate::error::E2eResult;
use crate::expect::DEFAULT_EXPECT_TIMEOUT;
use crate::locator::{Locator, Selectors};

#[derive(Clone)]
pub struct TodoPage {
    driver: Arc<dyn PageDriver>,
    base_url: String,
    expect_timeout: Duration,
}

impl TodoPage {
    pub fn new(driver: Arc<dyn PageDriver>, base_url: impl Into<String>) -> Self {
        Self {
            driver,
            base_url: base_url.into(),
            expect_timeout: DEFAULT_EXPECT_TIMEOUT,
        }
    }

    /// Default timeout of expectations made on this page
    pub fn with_expect_timeout(mut self, timeout: Duration) -> Self {
        self.expect_timeout = timeout;
        self
    }

    pub fn expect_timeout(&self) -> Duration {
        self.expect_timeout
    }

    pub fn driver(&self) -> &dyn PageDriver {
        self.driver.as_ref()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Load the page, optionally straight onto a tab via its fragment
    pub async fn open(&self, tab: Option<Tab>) -> E2eResult<()> {
        let path = tab.map(|t| t.nav_href()).unwrap_or_default();
        let url = resolve_url(&self.base_url, &path);
        debug!(%url, "open");
        self.driver.goto(&url).await
    }

    pub async fn reload(&self) -> E2eResult<()> {
        self.driver.reload().await
    }

    pub async fn url(&self) -> E2eResult<String> {
        self.driver.url().await
    }

    /// Fill the input and click the add button. A silently rejected text
    /// (blank, whitespace) is not an error.
    pub async fn add_item(&self, text: &str) -> E2eResult<()> {
        debug!(text, "add item");
        self.fill_input(text).await?;
        self.driver.click(&self.add_button()).await
    }

    pub async fn fill_input(&self, text: &str) -> E2eResult<()> {
        self.driver.fill(&self.input(), text).await
    }

    /// Submit the input from the keyboard
    pub async fn submit_with_enter(&self) -> E2eResult<()> {
        self.driver.press(&self.input(), "Enter").await
    }

    /// Click the nav anchor for `tab`. Clicking the active tab is harmless.
    pub async fn navigate(&self, tab: Tab) -> E2eResult<()> {
        debug!(%tab, "navigate");
        self.driver.click(&self.nav(tab)).await
    }

    /// Tick the checkbox of the first To-Do row containing `text`; no-op
    /// when no row matches
    pub async fn complete_item(&self, text: &str) -> E2eResult<()> {
        let checkbox = self.checkbox(text);
        if self.driver.count(&checkbox).await? == 0 {
            debug!(text, "complete: no matching item");
            return Ok(());
        }
        self.driver.click(&checkbox.first()).await
    }

    /// Click the delete button of the first row in `list` containing
    /// `text`; no-op when no row matches
    pub async fn delete_item(&self, text: &str, list: ListKind) -> E2eResult<()> {
        let button = self.delete_button(list, text);
        if self.driver.count(&button).await? == 0 {
            debug!(text, %list, "delete: no matching item");
            return Ok(());
        }
        self.driver.click(&button.first()).await
    }

    /// Rows of `list` whose text contains `text`
    pub fn item(&self, list: ListKind, text: &str) -> Locator {
        self.rows(list).filter_text(text)
    }

    /// Elements inside rows of `list` whose whole text is `text`. Rows
    /// carry their text in a `<span>` or `<label>` depending on the list.
    pub fn exact_item_text(&self, list: ListKind, text: &str) -> Locator {
        self.rows(list).locator("*").filter_exact_text(text)
    }

    pub fn rows(&self, list: ListKind) -> Locator {
        Locator::css(Selectors::rows(list))
    }

    pub fn list(&self, list: ListKind) -> Locator {
        Locator::css(Selectors::list(list))
    }

    pub fn checkbox(&self, text: &str) -> Locator {
        self.item(ListKind::Todo, text).locator(Selectors::checkbox())
    }

    pub fn delete_button(&self, list: ListKind, text: &str) -> Locator {
        self.item(list, text).locator(Selectors::delete_button())
    }

    /// Every delete button in `list`
    pub fn delete_buttons(&self, list: ListKind) -> Locator {
        self.list(list).locator(Selectors::delete_button())
    }

    pub fn input(&self) -> Locator {
        Locator::css(Selectors::input())
    }

    pub fn add_button(&self) -> Locator {
        Locator::css(Selectors::add_button())
    }

    pub fn nav(&self, tab: Tab) -> Locator {
        Locator::css(Selectors::nav(tab))
    }

    pub fn heading(&self) -> Locator {
        Locator::css(Selectors::heading())
    }

    /// Text span of the n-th completed row, 1-based
    pub fn completed_span(&self, nth: usize) -> Locator {
        Locator::css(Selectors::completed_span(nth))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Viewport;
    use crate::driver::SessionArtifacts;
    use crate::simulated::SimulatedPage;
    use todo_common::IdAllocator;

    fn page() -> TodoPage {
        let driver = SimulatedPage::new(
            IdAllocator::new(),
            Viewport::default(),
            SessionArtifacts::new(std::env::temp_dir()),
        );
        TodoPage::new(Arc::new(driver), "http://todo.test/")
    }

    #[tokio::test]
    async fn test_open_with_tab_sets_fragment() {
        let page = page();
        page.open(Some(Tab::Completed)).await.unwrap();
        assert_eq!(page.url().await.unwrap(), "http://todo.test/#completed");
        page.open(None).await.unwrap();
        assert_eq!(page.url().await.unwrap(), "http://todo.test/");
    }

    #[tokio::test]
    async fn test_navigate_is_idempotent() {
        let page = page();
        page.open(None).await.unwrap();
        page.navigate(Tab::Todo).await.unwrap();
        page.navigate(Tab::Todo).await.unwrap();
        assert_eq!(page.url().await.unwrap(), "http://todo.test/#todo");
    }

    #[tokio::test]
    async fn test_item_lifecycle_through_page_model() {
        let page = page();
        page.open(Some(Tab::AddItem)).await.unwrap();
        page.add_item("Water plants").await.unwrap();
        page.navigate(Tab::Todo).await.unwrap();

        let d = page.driver();
        assert_eq!(d.count(&page.item(ListKind::Todo, "water")).await.unwrap(), 1);

        page.complete_item("Water plants").await.unwrap();
        assert_eq!(d.count(&page.item(ListKind::Todo, "Water plants")).await.unwrap(), 0);
        assert_eq!(
            d.count(&page.exact_item_text(ListKind::Completed, "Water plants"))
                .await
                .unwrap(),
            1
        );

        page.navigate(Tab::Completed).await.unwrap();
        page.delete_item("Water plants", ListKind::Completed).await.unwrap();
        assert_eq!(d.count(&page.rows(ListKind::Completed)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_zero_matches_are_no_ops() {
        let page = page();
        page.open(Some(Tab::Todo)).await.unwrap();
        page.complete_item("ghost").await.unwrap();
        page.delete_item("ghost", ListKind::Todo).await.unwrap();
        page.delete_item("ghost", ListKind::Completed).await.unwrap();
    }

    #[tokio::test]
    async fn test_duplicates_complete_one_at_a_time() {
        let page = page();
        page.open(None).await.unwrap();
        page.add_item("Same").await.unwrap();
        page.add_item("Same").await.unwrap();
        page.navigate(Tab::Todo).await.unwrap();
        page.complete_item("Same").await.unwrap();

        let d = page.driver();
        assert_eq!(d.count(&page.item(ListKind::Todo, "Same")).await.unwrap(), 1);
        assert_eq!(d.count(&page.item(ListKind::Completed, "Same")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_enter_submits_input() {
        let page = page();
        page.open(None).await.unwrap();
        page.fill_input("Via keyboard").await.unwrap();
        page.submit_with_enter().await.unwrap();
        assert_eq!(
            page.driver()
                .count(&page.exact_item_text(ListKind::Todo, "Via keyboard"))
                .await
                .unwrap(),
            1
        );
    }
}
