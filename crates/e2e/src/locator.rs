//! Locator expressions and the page's selector table
//!
//! A `Locator` is a chain of steps evaluated left to right, the way
//! Playwright chains `page.locator(..).filter(..).nth(..)`. Locators are
//! plain data: the Playwright driver ships them to the browser as JSON, the
//! simulated driver evaluates them against its own DOM.

use serde::{Deserialize, Serialize};

use todo_common::{contract, ListKind, Tab};

/// One step of a locator chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocatorStep {
    /// CSS selector, scoped to the previous step's matches
    Css(String),
    /// Keep matches whose text contains the needle (case-insensitive,
    /// whitespace-normalised)
    HasText(String),
    /// Keep matches whose whole normalised text equals the value
    HasExactText(String),
    /// Keep only the n-th match (0-based)
    Nth(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Locator {
    steps: Vec<LocatorStep>,
}

impl Locator {
    /// Root locator for a CSS selector
    pub fn css(selector: impl Into<String>) -> Self {
        Self {
            steps: vec![LocatorStep::Css(selector.into())],
        }
    }

    /// Descendants of the current matches
    pub fn locator(mut self, selector: impl Into<String>) -> Self {
        self.steps.push(LocatorStep::Css(selector.into()));
        self
    }

    pub fn filter_text(mut self, text: impl Into<String>) -> Self {
        self.steps.push(LocatorStep::HasText(text.into()));
        self
    }

    pub fn filter_exact_text(mut self, text: impl Into<String>) -> Self {
        self.steps.push(LocatorStep::HasExactText(text.into()));
        self
    }

    pub fn nth(mut self, index: usize) -> Self {
        self.steps.push(LocatorStep::Nth(index));
        self
    }

    pub fn first(self) -> Self {
        self.nth(0)
    }

    pub fn steps(&self) -> &[LocatorStep] {
        &self.steps
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            match step {
                LocatorStep::Css(css) if i == 0 => write!(f, "locator('{}')", css)?,
                LocatorStep::Css(css) => write!(f, ".locator('{}')", css)?,
                LocatorStep::HasText(t) => write!(f, ".filter({{ hasText: '{}' }})", t)?,
                LocatorStep::HasExactText(t) => write!(f, ".filter({{ hasText: /^{}$/ }})", t)?,
                LocatorStep::Nth(n) => write!(f, ".nth({})", n)?,
            }
        }
        Ok(())
    }
}

/// Normalise whitespace the way text matching does: trim and collapse runs
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Substring match used by `HasText`
pub fn text_contains(haystack: &str, needle: &str) -> bool {
    normalize_text(haystack)
        .to_lowercase()
        .contains(&normalize_text(needle).to_lowercase())
}

/// Static selector table of the to-do page
pub struct Selectors;

impl Selectors {
    pub fn input() -> String {
        format!("#{}", contract::INPUT_ID)
    }

    pub fn add_button() -> String {
        format!("#{} > button", contract::ADD_ITEM_PANEL_ID)
    }

    pub fn list(kind: ListKind) -> String {
        format!("#{}", kind.element_id())
    }

    /// Rows of a list
    pub fn rows(kind: ListKind) -> String {
        format!("#{} li", kind.element_id())
    }

    pub fn delete_button() -> String {
        format!("button.{}", contract::DELETE_CLASS)
    }

    pub fn checkbox() -> &'static str {
        r#"input[type="checkbox"]"#
    }

    pub fn nav(tab: Tab) -> String {
        format!(r#"a[href="{}"]"#, tab.nav_href())
    }

    pub fn heading() -> &'static str {
        "h1"
    }

    /// Text span of the n-th completed row (1-based, like `:nth-child`)
    pub fn completed_span(nth: usize) -> String {
        format!("#{} > li:nth-child({}) > span", contract::COMPLETED_LIST_ID, nth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_table_matches_dom_contract() {
        assert_eq!(Selectors::input(), "#new-task");
        assert_eq!(Selectors::add_button(), "#add-item > button");
        assert_eq!(Selectors::rows(ListKind::Todo), "#incomplete-tasks li");
        assert_eq!(Selectors::list(ListKind::Completed), "#completed-tasks");
        assert_eq!(Selectors::delete_button(), "button.delete");
        assert_eq!(Selectors::nav(Tab::Todo), r##"a[href="#todo"]"##);
        assert_eq!(
            Selectors::completed_span(1),
            "#completed-tasks > li:nth-child(1) > span"
        );
    }

    #[test]
    fn test_locator_display_reads_like_playwright() {
        let loc = Locator::css("#incomplete-tasks li")
            .filter_text("Buy milk")
            .locator("button.delete")
            .first();
        assert_eq!(
            loc.to_string(),
            "locator('#incomplete-tasks li').filter({ hasText: 'Buy milk' }).locator('button.delete').nth(0)"
        );
    }

    #[test]
    fn test_locator_serializes_as_step_list() {
        let loc = Locator::css("li").filter_exact_text("A").nth(2);
        let json = serde_json::to_value(&loc).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{ "css": "li" }, { "has_exact_text": "A" }, { "nth": 2 }])
        );
    }

    #[test]
    fn test_text_contains_is_case_and_space_insensitive() {
        assert!(text_contains("Buy   MILK\n Delete", "buy milk"));
        assert!(!text_contains("Rapid 10 1700", "Rapid 1 1700"));
    }
}
