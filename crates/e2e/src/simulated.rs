//! In-process simulated browser
//!
//! Renders the reference page for a `TodoStore` into a `Document` on every
//! query and maps clicks and key presses back onto store operations. It needs
//! no Node or browser install, so the whole catalogue can run in `cargo test`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, trace};

use todo_common::{contract, IdAllocator, ListKind, Tab, TaskItem, TodoStore};

use crate::config::{ProjectConfig, Viewport};
use crate::dom::{Document, Element, NodeId, NodeKey};
use crate::driver::{DriverFactory, PageDriver, SessionArtifacts};
use crate::error::{E2eError, E2eResult};
use crate::locator::Locator;

const BLANK_URL: &str = "about:blank";

#[derive(Debug, Clone, Serialize)]
struct TraceEntry {
    at: DateTime<Utc>,
    action: String,
    url: String,
}

struct PageState {
    store: TodoStore,
    url: String,
    loaded: bool,
    tab: Tab,
    input: String,
    focus: Option<NodeKey>,
    viewport: Viewport,
    closed: bool,
    trace: Vec<TraceEntry>,
}

impl PageState {
    fn record(&mut self, action: String) {
        trace!(%action, "simulated action");
        let url = self.url.clone();
        self.trace.push(TraceEntry {
            at: Utc::now(),
            action,
            url,
        });
    }

    fn ensure_open(&self) -> E2eResult<()> {
        if self.closed {
            return Err(E2eError::Driver("Target page has been closed".into()));
        }
        Ok(())
    }

    /// Add the input text, then clear the input. Blank text is ignored.
    fn submit(&mut self) {
        let text = std::mem::take(&mut self.input);
        match self.store.add(&text) {
            Ok(item) => debug!(id = %item.id, "simulated page added task"),
            Err(e) => debug!("simulated page ignored input: {}", e),
        }
    }

    fn render(&self) -> Document {
        let mut doc = Document::new();
        if !self.loaded {
            return doc;
        }

        let body = doc.append(doc.root(), Element::new("body"));
        let container = doc.append(body, Element::new("div").class("container"));
        doc.append(
            container,
            Element::new("h1")
                .text(contract::HEADING_TEXT)
                .key(NodeKey::Heading),
        );

        let nav = doc.append(container, Element::new("nav").class("tabs"));
        for tab in Tab::all() {
            let mut link = Element::new("a")
                .attr("href", tab.nav_href())
                .text(tab.label())
                .key(NodeKey::Nav(tab));
            if tab == self.tab {
                link = link.class("is-active");
            }
            doc.append(nav, link);
        }

        let add_panel = self.panel(&mut doc, container, Tab::AddItem);
        doc.append(
            add_panel,
            Element::new("input")
                .id(contract::INPUT_ID)
                .attr("type", "text")
                .attr("placeholder", "New task")
                .key(NodeKey::Input),
        );
        doc.append(
            add_panel,
            Element::new("button")
                .attr("type", "button")
                .text(contract::ADD_BUTTON_LABEL)
                .key(NodeKey::AddButton),
        );

        for kind in [ListKind::Todo, ListKind::Completed] {
            let panel = self.panel(&mut doc, container, kind.tab());
            let list = doc.append(
                panel,
                Element::new("ul")
                    .id(kind.element_id())
                    .key(NodeKey::List(kind)),
            );
            for item in self.store.list(kind) {
                render_row(&mut doc, list, item);
            }
        }

        doc
    }

    fn panel(&self, doc: &mut Document, parent: NodeId, tab: Tab) -> NodeId {
        let mut section = Element::new("section")
            .id(tab.panel_id())
            .class("panel")
            .hidden(tab != self.tab);
        if tab == self.tab {
            section = section.class("is-active");
        }
        doc.append(parent, section)
    }

    /// First match of a locator in the current render
    fn first(&self, locator: &Locator) -> E2eResult<Option<(Document, NodeId)>> {
        let doc = self.render();
        let first = doc.resolve(locator)?.first().copied();
        Ok(first.map(|node| (doc, node)))
    }

    /// First match that is visible, as Playwright's actionability check
    /// requires. The simulated page never changes on its own, so waiting
    /// could not help.
    fn actionable(&self, locator: &Locator) -> E2eResult<(Document, NodeId)> {
        match self.first(locator)? {
            Some((doc, node)) if doc.is_visible(node) => Ok((doc, node)),
            Some(_) => Err(E2eError::Timeout(format!("{} to be visible", locator))),
            None => Err(E2eError::Timeout(format!("{} to be attached", locator))),
        }
    }

    fn activate(&mut self, key: NodeKey) -> E2eResult<()> {
        match key {
            NodeKey::Nav(tab) => {
                self.tab = tab;
                let base = self.url.split('#').next().unwrap_or_default().to_string();
                self.url = format!("{}{}", base, tab.nav_href());
            }
            NodeKey::AddButton => self.submit(),
            NodeKey::Checkbox(id) => {
                self.store.complete(id)?;
            }
            NodeKey::Delete(id) => {
                self.store.delete(id)?;
            }
            _ => {}
        }
        Ok(())
    }
}

fn render_row(doc: &mut Document, list: NodeId, item: &TaskItem) {
    let row = doc.append(list, Element::new("li").key(NodeKey::Row(item.id)));
    let mut span = Element::new("span").text(item.text.clone()).key(NodeKey::Text(item.id));

    if item.is_completed() {
        span = span.style("text-decoration", contract::COMPLETED_TEXT_DECORATION);
    } else {
        doc.append(
            row,
            Element::new("input")
                .id(item.id.to_string())
                .attr("type", "checkbox")
                .key(NodeKey::Checkbox(item.id)),
        );
    }

    doc.append(row, span);
    doc.append(
        row,
        Element::new("button")
            .class(contract::DELETE_CLASS)
            .attr("type", "button")
            .attr(contract::TASK_ATTR, item.id.to_string())
            .text(contract::DELETE_BUTTON_LABEL)
            .key(NodeKey::Delete(item.id)),
    );
}

/// One simulated browser session
pub struct SimulatedPage {
    state: Mutex<PageState>,
    artifacts: SessionArtifacts,
}

impl SimulatedPage {
    pub fn new(ids: IdAllocator, viewport: Viewport, artifacts: SessionArtifacts) -> Self {
        Self {
            state: Mutex::new(PageState {
                store: TodoStore::new(ids),
                url: BLANK_URL.to_string(),
                loaded: false,
                tab: Tab::default(),
                input: String::new(),
                focus: None,
                viewport,
                closed: false,
                trace: Vec::new(),
            }),
            artifacts,
        }
    }
}

#[async_trait]
impl PageDriver for SimulatedPage {
    async fn goto(&self, url: &str) -> E2eResult<()> {
        let mut state = self.state.lock();
        state.ensure_open()?;
        state.url = url.to_string();
        state.loaded = true;
        state.tab = Tab::from_url(url).unwrap_or_default();
        state.input.clear();
        state.focus = None;
        state.record(format!("goto {}", url));
        Ok(())
    }

    async fn reload(&self) -> E2eResult<()> {
        let mut state = self.state.lock();
        state.ensure_open()?;
        state.tab = Tab::from_url(&state.url).unwrap_or_default();
        state.input.clear();
        state.focus = None;
        state.record("reload".into());
        Ok(())
    }

    async fn url(&self) -> E2eResult<String> {
        let state = self.state.lock();
        state.ensure_open()?;
        Ok(state.url.clone())
    }

    async fn click(&self, locator: &Locator) -> E2eResult<()> {
        let mut state = self.state.lock();
        state.ensure_open()?;
        let (doc, node) = state.actionable(locator)?;
        let key = doc.element(node).key;
        state.record(format!("click {}", locator));
        state.focus = Some(key);
        state.activate(key)
    }

    async fn fill(&self, locator: &Locator, value: &str) -> E2eResult<()> {
        let mut state = self.state.lock();
        state.ensure_open()?;
        let (doc, node) = state.actionable(locator)?;
        match doc.element(node).key {
            NodeKey::Input => {
                state.record(format!("fill {} {:?}", locator, value));
                state.focus = Some(NodeKey::Input);
                state.input = value.to_string();
                Ok(())
            }
            _ => Err(E2eError::Driver(format!(
                "{} is not a text <input> element",
                locator
            ))),
        }
    }

    async fn press(&self, locator: &Locator, key: &str) -> E2eResult<()> {
        let mut state = self.state.lock();
        state.ensure_open()?;
        let (doc, node) = state.actionable(locator)?;
        let target = doc.element(node).key;
        state.record(format!("press {} {}", locator, key));
        state.focus = Some(target);

        match (target, key) {
            (NodeKey::Input, "Enter") => state.submit(),
            (NodeKey::Input, "Backspace") => {
                state.input.pop();
            }
            (NodeKey::Input, k) if k.chars().count() == 1 => state.input.push_str(k),
            (other, "Enter") | (other, " ") => state.activate(other)?,
            _ => {}
        }
        Ok(())
    }

    async fn focus(&self, locator: &Locator) -> E2eResult<()> {
        let mut state = self.state.lock();
        state.ensure_open()?;
        let (doc, node) = state.actionable(locator)?;
        let key = doc.element(node).key;
        state.focus = Some(key);
        Ok(())
    }

    async fn count(&self, locator: &Locator) -> E2eResult<usize> {
        let state = self.state.lock();
        state.ensure_open()?;
        Ok(state.render().resolve(locator)?.len())
    }

    async fn is_visible(&self, locator: &Locator) -> E2eResult<bool> {
        let state = self.state.lock();
        state.ensure_open()?;
        Ok(state
            .first(locator)?
            .is_some_and(|(doc, node)| doc.is_visible(node)))
    }

    async fn is_enabled(&self, locator: &Locator) -> E2eResult<bool> {
        let state = self.state.lock();
        state.ensure_open()?;
        Ok(state
            .first(locator)?
            .is_some_and(|(doc, node)| !doc.element(node).disabled))
    }

    async fn is_focused(&self, locator: &Locator) -> E2eResult<bool> {
        let state = self.state.lock();
        state.ensure_open()?;
        let focus = state.focus;
        Ok(state
            .first(locator)?
            .is_some_and(|(doc, node)| focus.is_some() && Some(doc.element(node).key) == focus))
    }

    async fn input_value(&self, locator: &Locator) -> E2eResult<Option<String>> {
        let state = self.state.lock();
        state.ensure_open()?;
        Ok(state.first(locator)?.and_then(|(doc, node)| {
            match doc.element(node).key {
                NodeKey::Input => Some(state.input.clone()),
                NodeKey::Checkbox(_) => Some("on".to_string()),
                _ => None,
            }
        }))
    }

    async fn text_content(&self, locator: &Locator) -> E2eResult<Option<String>> {
        let state = self.state.lock();
        state.ensure_open()?;
        Ok(state
            .first(locator)?
            .map(|(doc, node)| doc.text_content(node)))
    }

    async fn computed_style(
        &self,
        locator: &Locator,
        property: &str,
    ) -> E2eResult<Option<String>> {
        let state = self.state.lock();
        state.ensure_open()?;
        Ok(state.first(locator)?.map(|(doc, node)| {
            let el = doc.element(node);
            match (el.computed_style(property), property) {
                (Some(value), _) => value.to_string(),
                (None, "display") if !doc.is_visible(node) => "none".to_string(),
                (None, "display") => "block".to_string(),
                (None, "text-decoration") | (None, "text-decoration-line") => "none".to_string(),
                (None, _) => String::new(),
            }
        }))
    }

    async fn get_attribute(&self, locator: &Locator, name: &str) -> E2eResult<Option<String>> {
        let state = self.state.lock();
        state.ensure_open()?;
        Ok(state
            .first(locator)?
            .and_then(|(doc, node)| doc.element(node).get_attribute(name)))
    }

    async fn set_viewport(&self, viewport: Viewport) -> E2eResult<()> {
        let mut state = self.state.lock();
        state.ensure_open()?;
        state.viewport = viewport;
        state.record(format!("viewport {}", viewport));
        Ok(())
    }

    async fn screenshot(&self, path: &Path) -> E2eResult<PathBuf> {
        let (html, url, viewport) = {
            let state = self.state.lock();
            state.ensure_open()?;
            (state.render().to_html(), state.url.clone(), state.viewport)
        };
        // There is no rasteriser; the snapshot is the rendered markup.
        let path = path.with_extension("html");
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let snapshot = format!("<!-- {} @ {} -->\n{}", url, viewport, html);
        tokio::fs::write(&path, snapshot).await?;
        Ok(path)
    }

    async fn close(&self, keep_artifacts: bool) -> E2eResult<Vec<PathBuf>> {
        let trace = {
            let mut state = self.state.lock();
            if state.closed {
                return Ok(Vec::new());
            }
            state.closed = true;
            std::mem::take(&mut state.trace)
        };

        if !(keep_artifacts && self.artifacts.record_trace) {
            return Ok(Vec::new());
        }
        let path = self.artifacts.dir.join("trace.json");
        tokio::fs::create_dir_all(&self.artifacts.dir).await?;
        tokio::fs::write(&path, serde_json::to_vec_pretty(&trace)?).await?;
        Ok(vec![path])
    }
}

/// Opens simulated sessions. Every session gets a fresh store; checkbox ids
/// keep increasing across sessions.
#[derive(Default)]
pub struct SimulatedDriverFactory {
    ids: IdAllocator,
}

impl SimulatedDriverFactory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DriverFactory for SimulatedDriverFactory {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn open(
        &self,
        project: &ProjectConfig,
        artifacts: &SessionArtifacts,
    ) -> E2eResult<Box<dyn PageDriver>> {
        debug!(project = %project.name, "opening simulated session");
        Ok(Box::new(SimulatedPage::new(
            self.ids.clone(),
            project.viewport_or(Viewport::default()),
            artifacts.clone(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::Selectors;

    const BASE: &str = "http://todo.test/";

    fn page() -> SimulatedPage {
        SimulatedPage::new(
            IdAllocator::new(),
            Viewport::default(),
            SessionArtifacts::new(std::env::temp_dir()),
        )
    }

    fn css(s: impl Into<String>) -> Locator {
        Locator::css(s)
    }

    async fn add(page: &SimulatedPage, text: &str) {
        page.fill(&css(Selectors::input()), text).await.unwrap();
        page.click(&css(Selectors::add_button())).await.unwrap();
    }

    #[tokio::test]
    async fn test_goto_fragment_selects_tab() {
        let page = page();
        page.goto(&format!("{}#completed", BASE)).await.unwrap();
        assert!(page.is_visible(&css(Selectors::list(ListKind::Completed))).await.unwrap());
        assert!(!page.is_visible(&css(Selectors::input())).await.unwrap());

        page.goto(BASE).await.unwrap();
        assert!(page.is_visible(&css(Selectors::input())).await.unwrap());
        assert!(page.is_visible(&css(Selectors::heading())).await.unwrap());
    }

    #[tokio::test]
    async fn test_nav_click_updates_url() {
        let page = page();
        page.goto(BASE).await.unwrap();
        page.click(&css(Selectors::nav(Tab::Todo))).await.unwrap();
        assert_eq!(page.url().await.unwrap(), "http://todo.test/#todo");
        page.click(&css(Selectors::nav(Tab::Completed))).await.unwrap();
        assert_eq!(page.url().await.unwrap(), "http://todo.test/#completed");
    }

    #[tokio::test]
    async fn test_add_complete_delete() {
        let page = page();
        page.goto(&format!("{}#add-item", BASE)).await.unwrap();
        add(&page, "Buy milk").await;
        assert_eq!(
            page.input_value(&css(Selectors::input())).await.unwrap().as_deref(),
            Some("")
        );

        page.click(&css(Selectors::nav(Tab::Todo))).await.unwrap();
        let row = css(Selectors::rows(ListKind::Todo)).filter_text("Buy milk");
        assert!(page.is_visible(&row).await.unwrap());

        page.click(&row.clone().locator(Selectors::checkbox())).await.unwrap();
        assert_eq!(page.count(&row).await.unwrap(), 0);

        page.click(&css(Selectors::nav(Tab::Completed))).await.unwrap();
        let span = css(Selectors::completed_span(1));
        assert_eq!(page.text_content(&span).await.unwrap().as_deref(), Some("Buy milk"));
        assert_eq!(
            page.computed_style(&span, "text-decoration").await.unwrap().as_deref(),
            Some("line-through")
        );
        assert_eq!(
            page.count(&css(Selectors::rows(ListKind::Completed)).locator(Selectors::checkbox()))
                .await
                .unwrap(),
            0
        );

        let done = css(Selectors::rows(ListKind::Completed)).filter_text("Buy milk");
        page.click(&done.clone().locator(Selectors::delete_button())).await.unwrap();
        assert_eq!(page.count(&done).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_blank_input_is_ignored_and_cleared() {
        let page = page();
        page.goto(BASE).await.unwrap();
        add(&page, "   ").await;
        page.click(&css(Selectors::add_button())).await.unwrap();
        assert_eq!(page.count(&css(Selectors::rows(ListKind::Todo))).await.unwrap(), 0);
        assert_eq!(
            page.input_value(&css(Selectors::input())).await.unwrap().as_deref(),
            Some("")
        );
    }

    #[tokio::test]
    async fn test_enter_submits_and_focus_tracks() {
        let page = page();
        page.goto(BASE).await.unwrap();
        let input = css(Selectors::input());
        page.focus(&input).await.unwrap();
        assert!(page.is_focused(&input).await.unwrap());
        assert!(!page.is_focused(&css(Selectors::add_button())).await.unwrap());

        page.fill(&input, "Keyboard").await.unwrap();
        page.press(&input, "Enter").await.unwrap();
        assert_eq!(page.count(&css(Selectors::rows(ListKind::Todo))).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_hidden_or_missing_targets_time_out() {
        let page = page();
        page.goto(&format!("{}#todo", BASE)).await.unwrap();
        assert!(matches!(
            page.click(&css(Selectors::add_button())).await,
            Err(E2eError::Timeout(_))
        ));
        assert!(matches!(
            page.click(&css("#nope")).await,
            Err(E2eError::Timeout(_))
        ));
        assert!(matches!(
            page.fill(&css(Selectors::heading()), "x").await,
            Err(E2eError::Driver(_))
        ));
    }

    #[tokio::test]
    async fn test_reload_keeps_tasks_and_resets_input() {
        let page = page();
        page.goto(BASE).await.unwrap();
        add(&page, "Persist me").await;
        page.fill(&css(Selectors::input()), "draft").await.unwrap();
        page.reload().await.unwrap();
        assert_eq!(
            page.input_value(&css(Selectors::input())).await.unwrap().as_deref(),
            Some("")
        );
        assert_eq!(page.count(&css(Selectors::rows(ListKind::Todo))).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_checkbox_ids_increase_across_sessions() {
        let factory = SimulatedDriverFactory::new();
        let project = ProjectConfig::for_device("chromium", "Desktop Chrome").unwrap();
        let artifacts = SessionArtifacts::new(std::env::temp_dir());

        let mut ids = Vec::new();
        for _ in 0..2 {
            let session = factory.open(&project, &artifacts).await.unwrap();
            session.goto(BASE).await.unwrap();
            session.fill(&css(Selectors::input()), "Item").await.unwrap();
            session.click(&css(Selectors::add_button())).await.unwrap();
            session.click(&css(Selectors::nav(Tab::Todo))).await.unwrap();
            ids.push(
                session
                    .get_attribute(&css(Selectors::checkbox()), "id")
                    .await
                    .unwrap()
                    .unwrap(),
            );
            session.close(false).await.unwrap();
        }
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn test_screenshot_and_trace_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let mut artifacts = SessionArtifacts::new(dir.path());
        artifacts.record_trace = true;
        let page = SimulatedPage::new(IdAllocator::new(), Viewport::default(), artifacts);
        page.goto(BASE).await.unwrap();

        let shot = page.screenshot(&dir.path().join("failure.png")).await.unwrap();
        assert_eq!(shot.extension().unwrap(), "html");
        let html = std::fs::read_to_string(&shot).unwrap();
        assert!(html.contains("id=\"new-task\""));

        let kept = page.close(true).await.unwrap();
        assert_eq!(kept, vec![dir.path().join("trace.json")]);
        assert!(page.url().await.is_err());
    }
}
