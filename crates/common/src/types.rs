//! Core types for the to-do domain

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::contract;
use crate::error::{Error, Result};

/// Identifier assigned by the page to each task.
///
/// Ids come from a process-wide counter and are never reused, even after the
/// task is deleted. The page also uses the bare number as the checkbox
/// element id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub u64);

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Completion state of a task.
///
/// `Incomplete -> Completed` is the only transition. Nothing in this crate
/// moves a task back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Completion {
    Incomplete,
    Completed { at: DateTime<Utc> },
}

impl Default for Completion {
    fn default() -> Self {
        Self::Incomplete
    }
}

impl Completion {
    pub fn is_completed(&self) -> bool {
        matches!(self, Completion::Completed { .. })
    }
}

impl std::fmt::Display for Completion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Completion::Incomplete => write!(f, "incomplete"),
            Completion::Completed { .. } => write!(f, "completed"),
        }
    }
}

/// A single to-do entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskItem {
    pub id: TaskId,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub completion: Completion,
}

impl TaskItem {
    pub fn new(id: TaskId, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            created_at: Utc::now(),
            completion: Completion::Incomplete,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.completion.is_completed()
    }

    /// Mark the task completed. Fails if it already is.
    pub fn complete(&mut self) -> Result<()> {
        match self.completion {
            Completion::Incomplete => {
                self.completion = Completion::Completed { at: Utc::now() };
                Ok(())
            }
            Completion::Completed { .. } => Err(Error::InvalidStateTransition {
                id: self.id,
                from: self.completion.to_string(),
                to: "completed".to_string(),
            }),
        }
    }

    /// The list this task currently belongs to
    pub fn list(&self) -> ListKind {
        if self.is_completed() {
            ListKind::Completed
        } else {
            ListKind::Todo
        }
    }
}

/// One of the three mutually exclusive views of the page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tab {
    AddItem,
    Todo,
    Completed,
}

impl Default for Tab {
    fn default() -> Self {
        Self::AddItem
    }
}

impl Tab {
    pub fn all() -> [Tab; 3] {
        [Tab::AddItem, Tab::Todo, Tab::Completed]
    }

    /// URL fragment without the leading `#`
    pub fn fragment(&self) -> &'static str {
        match self {
            Tab::AddItem => contract::ADD_ITEM_PANEL_ID,
            Tab::Todo => contract::TODO_PANEL_ID,
            Tab::Completed => contract::COMPLETED_PANEL_ID,
        }
    }

    /// Value of the navigation anchor's `href`
    pub fn nav_href(&self) -> String {
        format!("#{}", self.fragment())
    }

    /// Id of the panel element shown while this tab is active
    pub fn panel_id(&self) -> &'static str {
        self.fragment()
    }

    pub fn label(&self) -> &'static str {
        match self {
            Tab::AddItem => "Add Item",
            Tab::Todo => "To-Do Tasks",
            Tab::Completed => "Completed",
        }
    }

    pub fn from_fragment(fragment: &str) -> Result<Self> {
        let fragment = fragment.trim_start_matches('#');
        Tab::all()
            .into_iter()
            .find(|tab| tab.fragment() == fragment)
            .ok_or_else(|| Error::UnknownTab(fragment.to_string()))
    }

    /// Tab addressed by the fragment of a full URL, if any
    pub fn from_url(url: &str) -> Option<Self> {
        let (_, fragment) = url.split_once('#')?;
        Tab::from_fragment(fragment).ok()
    }
}

impl std::fmt::Display for Tab {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.fragment())
    }
}

impl std::str::FromStr for Tab {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Tab::from_fragment(s)
    }
}

/// The two lists a task can live in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListKind {
    Todo,
    Completed,
}

impl ListKind {
    /// Id of the `<ul>` holding this list
    pub fn element_id(&self) -> &'static str {
        match self {
            ListKind::Todo => contract::TODO_LIST_ID,
            ListKind::Completed => contract::COMPLETED_LIST_ID,
        }
    }

    /// Tab that displays this list
    pub fn tab(&self) -> Tab {
        match self {
            ListKind::Todo => Tab::Todo,
            ListKind::Completed => Tab::Completed,
        }
    }
}

impl std::fmt::Display for ListKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListKind::Todo => write!(f, "todo"),
            ListKind::Completed => write!(f, "completed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_is_one_way() {
        let mut item = TaskItem::new(TaskId(1), "write tests");
        assert_eq!(item.list(), ListKind::Todo);

        item.complete().unwrap();
        assert!(item.is_completed());
        assert_eq!(item.list(), ListKind::Completed);

        let err = item.complete().unwrap_err();
        assert!(matches!(err, Error::InvalidStateTransition { id: TaskId(1), .. }));
    }

    #[test]
    fn test_tab_fragments_round_trip() {
        for tab in Tab::all() {
            assert_eq!(Tab::from_fragment(&tab.nav_href()).unwrap(), tab);
        }
        assert_eq!(Tab::AddItem.fragment(), "add-item");
        assert!(Tab::from_fragment("#settings").is_err());
    }

    #[test]
    fn test_tab_from_url() {
        assert_eq!(
            Tab::from_url("https://example.test/To-Do-List/#completed"),
            Some(Tab::Completed)
        );
        assert_eq!(Tab::from_url("https://example.test/To-Do-List/"), None);
    }
}
