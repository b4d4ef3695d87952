//! Scenario catalogue
//!
//! Every scenario is independent: it opens its own page, uses item texts
//! made unique with a timestamp suffix, and asserts only on what it created.

use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{E2eError, E2eResult};
use crate::page::TodoPage;
use crate::spec::ScenarioSpec;

mod add_item;
mod complete_item;
mod delete_item;
mod navigation;
mod ui;
mod workflows;

/// Behaviour class of a scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Group {
    Navigation,
    AddItem,
    CompleteItem,
    DeleteItem,
    UiUx,
    DataPersistence,
    EdgeCases,
    Integration,
    Accessibility,
    Performance,
    SpecificLocators,
    Declarative,
}

impl Group {
    pub fn label(&self) -> &'static str {
        match self {
            Group::Navigation => "Navigation Tests",
            Group::AddItem => "Add Item Tests",
            Group::CompleteItem => "Complete Item Tests",
            Group::DeleteItem => "Delete Item Tests",
            Group::UiUx => "UI/UX Tests",
            Group::DataPersistence => "Data Persistence Tests",
            Group::EdgeCases => "Edge Cases",
            Group::Integration => "Integration Tests",
            Group::Accessibility => "Accessibility Tests",
            Group::Performance => "Performance Tests",
            Group::SpecificLocators => "Specific Locator Tests",
            Group::Declarative => "Declarative Scenarios",
        }
    }
}

impl std::fmt::Display for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Free-form note attached to a result, like Playwright's `test.info().annotations`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
}

/// What a scenario body gets to work with
pub struct ScenarioContext {
    pub page: TodoPage,
    suffix: String,
    annotations: Mutex<Vec<Annotation>>,
}

impl ScenarioContext {
    pub fn new(page: TodoPage) -> Self {
        Self::with_suffix(page, chrono::Utc::now().timestamp_millis().to_string())
    }

    pub fn with_suffix(page: TodoPage, suffix: impl Into<String>) -> Self {
        Self {
            page,
            suffix: suffix.into(),
            annotations: Mutex::new(Vec::new()),
        }
    }

    /// Timestamp suffix shared by every text of this attempt
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// `"{prefix} {timestamp}"`
    pub fn unique(&self, prefix: &str) -> String {
        format!("{} {}", prefix, self.suffix)
    }

    pub fn annotate(&self, kind: &str, description: impl Into<String>) {
        let description = description.into();
        tracing::info!(kind, %description, "annotation");
        self.annotations.lock().push(Annotation {
            kind: kind.to_string(),
            description,
        });
    }

    pub fn annotations(&self) -> Vec<Annotation> {
        self.annotations.lock().clone()
    }
}

/// Fail the scenario with an assertion error unless `condition` holds
pub fn ensure(condition: bool, message: impl FnOnce() -> String) -> E2eResult<()> {
    if condition {
        Ok(())
    } else {
        Err(E2eError::AssertionFailed(message()))
    }
}

pub type ScenarioFn = fn(&ScenarioContext) -> BoxFuture<'_, E2eResult<()>>;

#[derive(Clone)]
pub enum ScenarioBody {
    Builtin(ScenarioFn),
    Declarative(Arc<ScenarioSpec>),
}

#[derive(Clone)]
pub struct Scenario {
    pub id: String,
    pub title: String,
    pub group: Group,
    pub tags: Vec<String>,
    pub body: ScenarioBody,
}

impl Scenario {
    pub fn builtin(id: &str, title: &str, group: Group, body: ScenarioFn) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            group,
            tags: Vec::new(),
            body: ScenarioBody::Builtin(body),
        }
    }

    pub fn declarative(spec: ScenarioSpec) -> Self {
        let title = if spec.description.is_empty() {
            spec.name.clone()
        } else {
            spec.description.clone()
        };
        Self {
            id: spec.name.clone(),
            title,
            group: Group::Declarative,
            tags: spec.tags.clone(),
            body: ScenarioBody::Declarative(Arc::new(spec)),
        }
    }

    /// `TC009 - Should add a new todo item with normal text`
    pub fn full_title(&self) -> String {
        format!("{} - {}", self.id, self.title)
    }

    /// Text `--grep` patterns are matched against
    pub fn grep_haystack(&self) -> String {
        let mut haystack = format!("{} {} {}", self.full_title(), self.group.label(), self.group_key());
        for tag in &self.tags {
            haystack.push_str(" @");
            haystack.push_str(tag);
        }
        haystack
    }

    fn group_key(&self) -> String {
        serde_json::to_value(self.group)
            .ok()
            .and_then(|v| v.as_str().map(String::from))
            .unwrap_or_default()
    }

    pub fn run<'a>(&'a self, ctx: &'a ScenarioContext) -> BoxFuture<'a, E2eResult<()>> {
        match &self.body {
            ScenarioBody::Builtin(body) => body(ctx),
            ScenarioBody::Declarative(spec) => Box::pin(spec.run(ctx)),
        }
    }
}

impl std::fmt::Debug for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scenario")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("group", &self.group)
            .finish()
    }
}

/// The built-in catalogue, TC001 to TC049 in order
pub fn catalogue() -> Vec<Scenario> {
    let mut all = Vec::new();
    all.extend(navigation::scenarios());
    all.extend(add_item::scenarios());
    all.extend(complete_item::scenarios());
    all.extend(delete_item::scenarios());
    all.extend(ui::scenarios());
    all.extend(workflows::scenarios());
    all.sort_by(|a, b| a.id.cmp(&b.id));
    all
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_catalogue_is_complete_and_unique() {
        let all = catalogue();
        assert_eq!(all.len(), 49);
        let ids: HashSet<_> = all.iter().map(|s| s.id.clone()).collect();
        assert_eq!(ids.len(), 49);
        for n in 1..=49 {
            assert!(ids.contains(&format!("TC{:03}", n)), "TC{:03} missing", n);
        }
        assert_eq!(all[0].id, "TC001");
        assert_eq!(all[48].id, "TC049");
    }

    #[test]
    fn test_group_sizes() {
        let all = catalogue();
        let count = |g: Group| all.iter().filter(|s| s.group == g).count();
        assert_eq!(count(Group::Navigation), 6);
        assert_eq!(count(Group::AddItem), 10);
        assert_eq!(count(Group::CompleteItem), 5);
        assert_eq!(count(Group::DeleteItem), 5);
        assert_eq!(count(Group::UiUx), 6);
        assert_eq!(count(Group::DataPersistence), 2);
        assert_eq!(count(Group::EdgeCases), 4);
        assert_eq!(count(Group::Integration), 2);
        assert_eq!(count(Group::Accessibility), 2);
        assert_eq!(count(Group::Performance), 2);
        assert_eq!(count(Group::SpecificLocators), 5);
    }

    #[test]
    fn test_grep_haystack_covers_id_title_and_group() {
        let all = catalogue();
        let tc009 = all.iter().find(|s| s.id == "TC009").unwrap();
        let hay = tc009.grep_haystack();
        assert!(hay.contains("TC009 - Should add a new todo item with normal text"));
        assert!(hay.contains("Add Item Tests"));
        assert!(hay.contains("add_item"));
    }

    #[test]
    fn test_ensure() {
        assert!(ensure(true, || unreachable!()).is_ok());
        assert!(matches!(
            ensure(false, || "nope".into()),
            Err(E2eError::AssertionFailed(m)) if m == "nope"
        ));
    }
}
