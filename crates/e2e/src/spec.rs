//! Declarative YAML scenarios
//!
//! Extra scenarios can be written as data instead of code:
//!
//! ```yaml
//! name: complete-then-delete
//! description: Completed items can be deleted from the Completed tab
//! tags: [smoke]
//! start: add_item
//! steps:
//!   - action: add_item
//!     text: "Buy milk {ts}"
//!   - action: navigate
//!     tab: todo
//!   - action: complete_item
//!     text: "Buy milk {ts}"
//!   - action: expect_item
//!     list: completed
//!     text: "Buy milk {ts}"
//! ```
//!
//! `{ts}` expands to the attempt's unique timestamp suffix.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use todo_common::{ListKind, Tab};

use crate::config::Viewport;
use crate::error::{E2eError, E2eResult};
use crate::expect::{expect, expect_url};
use crate::scenarios::ScenarioContext;

pub const TIMESTAMP_PLACEHOLDER: &str = "{ts}";

/// A complete scenario parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSpec {
    /// Unique name, used as the scenario id
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Tags for filtering (`--grep @smoke`)
    #[serde(default)]
    pub tags: Vec<String>,

    /// Tab to open the page on
    #[serde(default)]
    pub start: Option<Tab>,

    #[serde(default)]
    pub viewport: Option<Viewport>,

    pub steps: Vec<SpecStep>,
}

fn default_list() -> ListKind {
    ListKind::Todo
}

fn default_true() -> bool {
    true
}

/// A single step
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SpecStep {
    AddItem {
        text: String,
    },
    Navigate {
        tab: Tab,
    },
    CompleteItem {
        text: String,
    },
    DeleteItem {
        text: String,
        #[serde(default = "default_list")]
        list: ListKind,
    },
    /// Fill the input without submitting
    Fill {
        text: String,
    },
    /// Press a key in the input
    Press {
        key: String,
    },
    Reload,
    /// Wait for a fixed amount of time (use sparingly)
    Sleep {
        ms: u64,
    },
    Log {
        message: String,
    },
    ExpectItem {
        #[serde(default = "default_list")]
        list: ListKind,
        text: String,
        #[serde(default = "default_true")]
        visible: bool,
        /// Match the whole item text instead of a substring
        #[serde(default)]
        exact: bool,
    },
    ExpectUrl {
        fragment: String,
    },
    ExpectInputValue {
        value: String,
    },
}

impl SpecStep {
    /// Short label used in failure messages
    pub fn describe(&self) -> String {
        match self {
            SpecStep::AddItem { text } => format!("add_item:{}", text),
            SpecStep::Navigate { tab } => format!("navigate:{}", tab),
            SpecStep::CompleteItem { text } => format!("complete_item:{}", text),
            SpecStep::DeleteItem { text, list } => format!("delete_item:{}:{}", list, text),
            SpecStep::Fill { text } => format!("fill:{}", text),
            SpecStep::Press { key } => format!("press:{}", key),
            SpecStep::Reload => "reload".to_string(),
            SpecStep::Sleep { ms } => format!("sleep:{}ms", ms),
            SpecStep::Log { message } => {
                format!("log:{}", message.chars().take(30).collect::<String>())
            }
            SpecStep::ExpectItem { list, text, visible, .. } => {
                format!("expect_item:{}:{}:{}", list, text, visible)
            }
            SpecStep::ExpectUrl { fragment } => format!("expect_url:{}", fragment),
            SpecStep::ExpectInputValue { value } => format!("expect_input_value:{}", value),
        }
    }

    async fn execute(&self, ctx: &ScenarioContext) -> E2eResult<()> {
        let page = &ctx.page;
        let expand = |s: &str| s.replace(TIMESTAMP_PLACEHOLDER, ctx.suffix());

        match self {
            SpecStep::AddItem { text } => page.add_item(&expand(text)).await,
            SpecStep::Navigate { tab } => page.navigate(*tab).await,
            SpecStep::CompleteItem { text } => page.complete_item(&expand(text)).await,
            SpecStep::DeleteItem { text, list } => page.delete_item(&expand(text), *list).await,
            SpecStep::Fill { text } => page.fill_input(&expand(text)).await,
            SpecStep::Press { key } => page.driver().press(&page.input(), key).await,
            SpecStep::Reload => page.reload().await,
            SpecStep::Sleep { ms } => {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
                Ok(())
            }
            SpecStep::Log { message } => {
                info!("[SPEC LOG] {}", expand(message));
                Ok(())
            }
            SpecStep::ExpectItem {
                list,
                text,
                visible,
                exact,
            } => {
                let text = expand(text);
                let locator = if *exact {
                    page.exact_item_text(*list, &text)
                } else {
                    page.item(*list, &text)
                };
                let expectation = expect(page, locator);
                if *visible {
                    expectation.to_be_visible().await
                } else {
                    expectation.not().to_be_visible().await
                }
            }
            SpecStep::ExpectUrl { fragment } => {
                let fragment = fragment.trim_start_matches('#');
                expect_url(page)
                    .to_match(&format!("#{}$", regex::escape(fragment)))
                    .await
            }
            SpecStep::ExpectInputValue { value } => {
                expect(page, page.input()).to_have_value(expand(value)).await
            }
        }
    }
}

impl ScenarioSpec {
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let spec: Self = serde_yaml::from_str(yaml)?;
        spec.validate()?;
        Ok(spec)
    }

    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
            .map_err(|e| E2eError::SpecParse(format!("{}: {}", path.display(), e)))
    }

    /// Load every `.yaml`/`.yml` file under `dir`, sorted by path
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        let mut paths: Vec<_> = walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
            .map(|e| e.into_path())
            .collect();
        paths.sort();

        let mut seen = HashSet::new();
        let mut specs = Vec::with_capacity(paths.len());
        for path in paths {
            let spec = Self::from_file(&path)?;
            if !seen.insert(spec.name.clone()) {
                return Err(E2eError::SpecParse(format!(
                    "duplicate scenario name '{}' in {}",
                    spec.name,
                    path.display()
                )));
            }
            debug!("Loaded scenario spec '{}' from {}", spec.name, path.display());
            specs.push(spec);
        }
        Ok(specs)
    }

    fn validate(&self) -> E2eResult<()> {
        if self.name.trim().is_empty() {
            return Err(E2eError::SpecParse("scenario name must not be empty".into()));
        }
        if self.steps.is_empty() {
            return Err(E2eError::SpecParse(format!("scenario '{}' has no steps", self.name)));
        }
        Ok(())
    }

    /// Open the start tab and run every step in order
    pub async fn run(&self, ctx: &ScenarioContext) -> E2eResult<()> {
        let page = &ctx.page;
        if let Some(viewport) = self.viewport {
            page.driver().set_viewport(viewport).await?;
        }
        page.open(self.start).await?;

        for (i, step) in self.steps.iter().enumerate() {
            debug!(scenario = %self.name, step = i + 1, "{}", step.describe());
            step.execute(ctx).await.map_err(|e| match e {
                E2eError::AssertionFailed(reason) => E2eError::StepFailed {
                    step: format!("{} ({})", i + 1, step.describe()),
                    reason,
                },
                other => other,
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use todo_common::IdAllocator;

    use crate::driver::SessionArtifacts;
    use crate::page::TodoPage;
    use crate::simulated::SimulatedPage;

    const LIFECYCLE: &str = r##"
name: lifecycle
description: Add, complete and delete one item
tags: [smoke]
start: add_item
viewport:
  width: 390
  height: 664
steps:
  - action: add_item
    text: "Buy milk {ts}"
  - action: expect_input_value
    value: ""
  - action: navigate
    tab: todo
  - action: expect_url
    fragment: "#todo"
  - action: expect_item
    text: "Buy milk {ts}"
    exact: true
  - action: complete_item
    text: "Buy milk {ts}"
  - action: navigate
    tab: completed
  - action: expect_item
    list: completed
    text: "Buy milk {ts}"
  - action: delete_item
    list: completed
    text: "Buy milk {ts}"
  - action: expect_item
    list: completed
    text: "Buy milk {ts}"
    visible: false
  - action: log
    message: done {ts}
"##;

    fn context() -> ScenarioContext {
        let driver = SimulatedPage::new(
            IdAllocator::new(),
            Viewport::default(),
            SessionArtifacts::new(std::env::temp_dir()),
        );
        let page = TodoPage::new(Arc::new(driver), "http://todo.test/")
            .with_expect_timeout(Duration::from_millis(200));
        ScenarioContext::with_suffix(page, "1700000000000")
    }

    #[test]
    fn test_parse_spec() {
        let spec = ScenarioSpec::from_yaml(LIFECYCLE).unwrap();
        assert_eq!(spec.name, "lifecycle");
        assert_eq!(spec.tags, vec!["smoke"]);
        assert_eq!(spec.start, Some(Tab::AddItem));
        assert_eq!(spec.viewport, Some(Viewport::new(390, 664)));
        assert_eq!(spec.steps.len(), 11);
        assert!(matches!(
            &spec.steps[8],
            SpecStep::DeleteItem { list: ListKind::Completed, .. }
        ));
    }

    #[test]
    fn test_defaults_for_optional_fields() {
        let spec = ScenarioSpec::from_yaml(
            "name: x\nsteps:\n  - action: expect_item\n    text: a\n  - action: reload\n",
        )
        .unwrap();
        assert!(spec.start.is_none());
        match &spec.steps[0] {
            SpecStep::ExpectItem { list, visible, exact, .. } => {
                assert_eq!(*list, ListKind::Todo);
                assert!(*visible);
                assert!(!*exact);
            }
            other => panic!("unexpected step {:?}", other),
        }
    }

    #[test]
    fn test_invalid_specs_are_rejected() {
        assert!(ScenarioSpec::from_yaml("name: x\nsteps: []\n").is_err());
        assert!(ScenarioSpec::from_yaml("name: ''\nsteps:\n  - action: reload\n").is_err());
        assert!(ScenarioSpec::from_yaml("name: x\nsteps:\n  - action: teleport\n").is_err());
        assert!(ScenarioSpec::from_yaml("name: x\nsteps:\n  - action: navigate\n    tab: nowhere\n").is_err());
    }

    #[test]
    fn test_load_all_walks_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join("a.yaml"), "name: a\nsteps:\n  - action: reload\n").unwrap();
        std::fs::write(nested.join("b.yml"), "name: b\nsteps:\n  - action: reload\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let specs = ScenarioSpec::load_all(dir.path()).unwrap();
        let names: Vec<_> = specs.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);

        std::fs::write(nested.join("c.yaml"), "name: a\nsteps:\n  - action: reload\n").unwrap();
        assert!(matches!(
            ScenarioSpec::load_all(dir.path()),
            Err(E2eError::SpecParse(_))
        ));
    }

    #[tokio::test]
    async fn test_run_lifecycle_spec() {
        let spec = ScenarioSpec::from_yaml(LIFECYCLE).unwrap();
        let ctx = context();
        spec.run(&ctx).await.unwrap();
    }

    #[tokio::test]
    async fn test_failing_step_names_the_step() {
        let spec = ScenarioSpec::from_yaml(
            r#"
name: missing
steps:
  - action: navigate
    tab: todo
  - action: expect_item
    text: "Never added {ts}"
"#,
        )
        .unwrap();
        let err = spec.run(&context()).await.unwrap_err();
        match err {
            E2eError::StepFailed { step, reason } => {
                assert!(step.starts_with("2 (expect_item"), "{}", step);
                assert!(reason.contains("Never added 1700000000000"), "{}", reason);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}
