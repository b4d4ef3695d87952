//! DOM contract of the to-do page.
//!
//! Element ids, classes and labels that both the reference page and the page
//! model agree on. Changing one of these changes the page under test.

/// Text input for new tasks
pub const INPUT_ID: &str = "new-task";

/// Tab panels. The add button is a direct child of the add-item panel.
pub const ADD_ITEM_PANEL_ID: &str = "add-item";
pub const TODO_PANEL_ID: &str = "todo";
pub const COMPLETED_PANEL_ID: &str = "completed";

/// `<ul>` elements holding the task rows
pub const TODO_LIST_ID: &str = "incomplete-tasks";
pub const COMPLETED_LIST_ID: &str = "completed-tasks";

/// Class on every row's delete button
pub const DELETE_CLASS: &str = "delete";

/// Attribute carrying the task id on delete buttons
pub const TASK_ATTR: &str = "data-task";

pub const HEADING_TEXT: &str = "To Do List";
pub const ADD_BUTTON_LABEL: &str = "Add";
pub const DELETE_BUTTON_LABEL: &str = "Delete";

/// Computed `text-decoration` of a completed task's text
pub const COMPLETED_TEXT_DECORATION: &str = "line-through";

/// Cookie naming the storage session of the reference page
pub const SESSION_COOKIE: &str = "todo_session";
