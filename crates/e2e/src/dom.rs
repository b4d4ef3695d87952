//! Minimal DOM tree and CSS selector engine for the simulated page
//!
//! Supports the selector subset the to-do page needs: type selectors,
//! `#id`, `.class`, `[attr]`, `[attr="value"]`, `:nth-child(n)`, and the
//! descendant and child combinators. Matching follows `querySelectorAll`:
//! a scoped query returns descendants of the scope, but combinators may walk
//! to ancestors outside it.

use todo_common::{ListKind, Tab, TaskId};

use crate::error::{E2eError, E2eResult};
use crate::locator::{normalize_text, text_contains, Locator, LocatorStep};

pub type NodeId = usize;

/// What a rendered element stands for, so actions can map back to state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKey {
    None,
    Heading,
    Nav(Tab),
    Panel(Tab),
    Input,
    AddButton,
    List(ListKind),
    Row(TaskId),
    Checkbox(TaskId),
    Text(TaskId),
    Delete(TaskId),
}

#[derive(Debug, Clone)]
pub struct Element {
    pub tag: String,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub attrs: Vec<(String, String)>,
    pub text: String,
    pub style: Vec<(String, String)>,
    pub hidden: bool,
    pub disabled: bool,
    pub key: NodeKey,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Element {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            id: None,
            classes: Vec::new(),
            attrs: Vec::new(),
            text: String::new(),
            style: Vec::new(),
            hidden: false,
            disabled: false,
            key: NodeKey::None,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn class(mut self, class: &str) -> Self {
        self.classes.push(class.to_string());
        self
    }

    pub fn attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.attrs.push((name.to_string(), value.into()));
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn style(mut self, property: &str, value: &str) -> Self {
        self.style.push((property.to_string(), value.to_string()));
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    pub fn key(mut self, key: NodeKey) -> Self {
        self.key = key;
        self
    }

    /// Attribute value, with `id` and `class` reflected like the DOM does
    pub fn get_attribute(&self, name: &str) -> Option<String> {
        match name {
            "id" => self.id.clone(),
            "class" if !self.classes.is_empty() => Some(self.classes.join(" ")),
            _ => self
                .attrs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone()),
        }
    }

    pub fn computed_style(&self, property: &str) -> Option<&str> {
        self.style
            .iter()
            .find(|(k, _)| k == property)
            .map(|(_, v)| v.as_str())
    }
}

/// Arena-backed element tree. Node 0 is the `<html>` root.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Element>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            nodes: vec![Element::new("html")],
        }
    }

    pub fn root(&self) -> NodeId {
        0
    }

    pub fn append(&mut self, parent: NodeId, mut element: Element) -> NodeId {
        let id = self.nodes.len();
        element.parent = Some(parent);
        self.nodes.push(element);
        self.nodes[parent].children.push(id);
        id
    }

    pub fn element(&self, node: NodeId) -> &Element {
        &self.nodes[node]
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node].parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node].children
    }

    /// Concatenated text of the node and its descendants
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        out.push_str(&self.nodes[node].text);
        for &child in &self.nodes[node].children {
            self.collect_text(child, out);
        }
    }

    /// Visible when neither the node nor any ancestor is hidden
    pub fn is_visible(&self, node: NodeId) -> bool {
        let mut cursor = Some(node);
        while let Some(n) = cursor {
            if self.nodes[n].hidden {
                return false;
            }
            cursor = self.nodes[n].parent;
        }
        true
    }

    /// Descendants of `scope` in document order
    fn descendants(&self, scope: NodeId, out: &mut Vec<NodeId>) {
        for &child in &self.nodes[scope].children {
            out.push(child);
            self.descendants(child, out);
        }
    }

    /// `scope.querySelectorAll(selector)`
    pub fn query_all(&self, scope: NodeId, selector: &str) -> E2eResult<Vec<NodeId>> {
        let chain = parse_selector_chain(selector)?;
        let mut candidates = Vec::new();
        self.descendants(scope, &mut candidates);
        Ok(candidates
            .into_iter()
            .filter(|&n| self.matches_chain(n, &chain))
            .collect())
    }

    /// Evaluate a locator chain against the whole document
    pub fn resolve(&self, locator: &Locator) -> E2eResult<Vec<NodeId>> {
        let mut current: Option<Vec<NodeId>> = None;

        for step in locator.steps() {
            let next = match step {
                LocatorStep::Css(css) => {
                    let scopes = current.unwrap_or_else(|| vec![self.root()]);
                    let mut found = Vec::new();
                    for scope in scopes {
                        for n in self.query_all(scope, css)? {
                            if !found.contains(&n) {
                                found.push(n);
                            }
                        }
                    }
                    found.sort_unstable();
                    found
                }
                LocatorStep::HasText(needle) => current
                    .unwrap_or_default()
                    .into_iter()
                    .filter(|&n| text_contains(&self.text_content(n), needle))
                    .collect(),
                LocatorStep::HasExactText(expected) => current
                    .unwrap_or_default()
                    .into_iter()
                    .filter(|&n| normalize_text(&self.text_content(n)) == normalize_text(expected))
                    .collect(),
                LocatorStep::Nth(index) => current
                    .unwrap_or_default()
                    .into_iter()
                    .nth(*index)
                    .into_iter()
                    .collect(),
            };
            current = Some(next);
        }

        Ok(current.unwrap_or_default())
    }

    fn matches_chain(&self, node: NodeId, chain: &[SelectorPart]) -> bool {
        let Some((last, rest)) = chain.split_last() else {
            return false;
        };
        if !self.matches_compound(node, &last.compound) {
            return false;
        }
        if rest.is_empty() {
            return true;
        }

        match last.combinator {
            Some(Combinator::Child) => match self.parent(node) {
                Some(parent) => self.matches_chain(parent, rest),
                None => false,
            },
            // Descendant: any ancestor may satisfy the rest of the chain.
            _ => {
                let mut cursor = self.parent(node);
                while let Some(ancestor) = cursor {
                    if self.matches_chain(ancestor, rest) {
                        return true;
                    }
                    cursor = self.parent(ancestor);
                }
                false
            }
        }
    }

    fn matches_compound(&self, node: NodeId, compound: &Compound) -> bool {
        let el = &self.nodes[node];
        if let Some(tag) = &compound.tag {
            if !el.tag.eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(id) = &compound.id {
            if el.id.as_deref() != Some(id.as_str()) {
                return false;
            }
        }
        if !compound.classes.iter().all(|c| el.classes.contains(c)) {
            return false;
        }
        for (name, expected) in &compound.attrs {
            match (el.get_attribute(name), expected) {
                (None, _) => return false,
                (Some(actual), Some(expected)) if &actual != expected => return false,
                _ => {}
            }
        }
        if let Some(n) = compound.nth_child {
            let Some(parent) = el.parent else {
                return false;
            };
            let position = self.nodes[parent].children.iter().position(|&c| c == node);
            if position.map(|p| p + 1) != Some(n) {
                return false;
            }
        }
        true
    }

    /// Serialise the tree as HTML, used for failure snapshots
    pub fn to_html(&self) -> String {
        let mut out = String::from("<!DOCTYPE html>\n");
        self.write_html(self.root(), 0, &mut out);
        out
    }

    fn write_html(&self, node: NodeId, depth: usize, out: &mut String) {
        let el = &self.nodes[node];
        let indent = "  ".repeat(depth);
        out.push_str(&indent);
        out.push('<');
        out.push_str(&el.tag);
        if let Some(id) = &el.id {
            out.push_str(&format!(" id=\"{}\"", escape_html(id)));
        }
        if !el.classes.is_empty() {
            out.push_str(&format!(" class=\"{}\"", escape_html(&el.classes.join(" "))));
        }
        for (k, v) in &el.attrs {
            out.push_str(&format!(" {}=\"{}\"", k, escape_html(v)));
        }
        let mut style: Vec<String> = el.style.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
        if el.hidden {
            style.push("display: none".to_string());
        }
        if !style.is_empty() {
            out.push_str(&format!(" style=\"{}\"", style.join("; ")));
        }
        out.push('>');

        if el.tag == "input" {
            out.push('\n');
            return;
        }
        out.push_str(&escape_html(&el.text));
        if el.children.is_empty() {
            out.push_str(&format!("</{}>\n", el.tag));
            return;
        }
        out.push('\n');
        for &child in &el.children {
            self.write_html(child, depth + 1, out);
        }
        out.push_str(&format!("{}</{}>\n", indent, el.tag));
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

// ============================================================================
// Selector parsing
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    universal: bool,
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<(String, Option<String>)>,
    nth_child: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SelectorPart {
    compound: Compound,
    // Relation to the part on the left
    combinator: Option<Combinator>,
}

fn unsupported(selector: &str) -> E2eError {
    E2eError::Selector(selector.to_string())
}

/// Split on whitespace and `>` outside brackets and parentheses
fn tokenize_selector(selector: &str) -> E2eResult<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;

    for ch in selector.chars() {
        if let Some(q) = quote {
            current.push(ch);
            if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' if depth > 0 => {
                quote = Some(ch);
                current.push(ch);
            }
            '[' | '(' => {
                depth += 1;
                current.push(ch);
            }
            ']' | ')' => {
                depth -= 1;
                if depth < 0 {
                    return Err(unsupported(selector));
                }
                current.push(ch);
            }
            '>' if depth == 0 => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
                tokens.push(">".to_string());
            }
            c if c.is_whitespace() && depth == 0 => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(ch),
        }
    }

    if depth != 0 || quote.is_some() {
        return Err(unsupported(selector));
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    Ok(tokens)
}

fn parse_selector_chain(selector: &str) -> E2eResult<Vec<SelectorPart>> {
    let tokens = tokenize_selector(selector.trim())?;
    let mut parts: Vec<SelectorPart> = Vec::new();
    let mut pending: Option<Combinator> = None;

    for token in tokens {
        if token == ">" {
            if pending.is_some() || parts.is_empty() {
                return Err(unsupported(selector));
            }
            pending = Some(Combinator::Child);
            continue;
        }

        let compound = parse_compound(&token).ok_or_else(|| unsupported(selector))?;
        let combinator = if parts.is_empty() {
            None
        } else {
            Some(pending.take().unwrap_or(Combinator::Descendant))
        };
        parts.push(SelectorPart {
            compound,
            combinator,
        });
    }

    if parts.is_empty() || pending.is_some() {
        return Err(unsupported(selector));
    }
    Ok(parts)
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn take_ident(s: &str) -> (&str, &str) {
    let end = s.find(|c: char| !is_ident_char(c)).unwrap_or(s.len());
    s.split_at(end)
}

fn parse_compound(token: &str) -> Option<Compound> {
    let mut compound = Compound::default();
    let mut rest = token;

    if let Some(tail) = rest.strip_prefix('*') {
        compound.universal = true;
        rest = tail;
    } else if rest.starts_with(|c: char| c.is_ascii_alphabetic()) {
        let (tag, tail) = take_ident(rest);
        compound.tag = Some(tag.to_ascii_lowercase());
        rest = tail;
    }

    while !rest.is_empty() {
        if let Some(tail) = rest.strip_prefix('#') {
            let (id, tail) = take_ident(tail);
            if id.is_empty() || compound.id.replace(id.to_string()).is_some() {
                return None;
            }
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix('.') {
            let (class, tail) = take_ident(tail);
            if class.is_empty() {
                return None;
            }
            compound.classes.push(class.to_string());
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix('[') {
            let close = tail.find(']')?;
            let body = &tail[..close];
            let attr = match body.split_once('=') {
                Some((name, value)) => {
                    let value = value.trim();
                    let unquoted = value
                        .strip_prefix('"')
                        .and_then(|v| v.strip_suffix('"'))
                        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
                        .unwrap_or(value);
                    (name.trim().to_string(), Some(unquoted.to_string()))
                }
                None => (body.trim().to_string(), None),
            };
            if attr.0.is_empty() || !attr.0.chars().all(is_ident_char) {
                return None;
            }
            compound.attrs.push(attr);
            rest = &tail[close + 1..];
        } else if let Some(tail) = rest.strip_prefix(":nth-child(") {
            let close = tail.find(')')?;
            let n: usize = tail[..close].trim().parse().ok()?;
            if n == 0 {
                return None;
            }
            compound.nth_child = Some(n);
            rest = &tail[close + 1..];
        } else {
            return None;
        }
    }

    if compound == Compound::default() {
        return None;
    }
    Some(compound)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// <div id="app"><ul id="list"><li><span>A</span><button class="delete x">Delete</button></li>
    /// <li><span>B</span></li></ul><p hidden><span>C</span></p></div>
    fn sample() -> Document {
        let mut doc = Document::new();
        let app = doc.append(doc.root(), Element::new("div").id("app"));
        let list = doc.append(app, Element::new("ul").id("list"));
        let a = doc.append(list, Element::new("li"));
        doc.append(a, Element::new("span").text("A"));
        doc.append(
            a,
            Element::new("button").class("delete").class("x").text("Delete"),
        );
        let b = doc.append(list, Element::new("li"));
        doc.append(b, Element::new("span").text("B"));
        let p = doc.append(app, Element::new("p").hidden(true));
        doc.append(p, Element::new("span").text("C"));
        doc
    }

    fn texts(doc: &Document, nodes: &[NodeId]) -> Vec<String> {
        nodes.iter().map(|&n| doc.text_content(n)).collect()
    }

    #[test]
    fn test_descendant_and_child_combinators() {
        let doc = sample();
        let all = doc.query_all(doc.root(), "#app span").unwrap();
        assert_eq!(texts(&doc, &all), vec!["A", "B", "C"]);

        let direct = doc.query_all(doc.root(), "#list > li > span").unwrap();
        assert_eq!(texts(&doc, &direct), vec!["A", "B"]);

        assert!(doc.query_all(doc.root(), "#app > span").unwrap().is_empty());
    }

    #[test]
    fn test_nth_child_and_classes() {
        let doc = sample();
        let second = doc.query_all(doc.root(), "#list > li:nth-child(2) > span").unwrap();
        assert_eq!(texts(&doc, &second), vec!["B"]);

        let buttons = doc.query_all(doc.root(), "button.delete.x").unwrap();
        assert_eq!(buttons.len(), 1);
        assert_eq!(
            doc.element(buttons[0]).get_attribute("class").as_deref(),
            Some("delete x")
        );
    }

    #[test]
    fn test_attribute_selectors() {
        let mut doc = Document::new();
        doc.append(doc.root(), Element::new("a").attr("href", "#todo"));
        doc.append(doc.root(), Element::new("input").attr("type", "checkbox"));
        assert_eq!(doc.query_all(doc.root(), r##"a[href="#todo"]"##).unwrap().len(), 1);
        assert_eq!(doc.query_all(doc.root(), "input[type='checkbox']").unwrap().len(), 1);
        assert_eq!(doc.query_all(doc.root(), "input[type]").unwrap().len(), 1);
        assert!(doc.query_all(doc.root(), r##"a[href="#add"]"##).unwrap().is_empty());
    }

    #[test]
    fn test_scoped_query_sees_outer_ancestors() {
        let doc = sample();
        let rows = doc.query_all(doc.root(), "li").unwrap();
        let inner = doc.query_all(rows[0], "#list span").unwrap();
        assert_eq!(texts(&doc, &inner), vec!["A"]);
    }

    #[test]
    fn test_resolve_locator_chain() {
        let doc = sample();
        let loc = Locator::css("#list li").filter_text("a").locator("button.delete");
        let found = doc.resolve(&loc).unwrap();
        assert_eq!(found.len(), 1);

        let exact = Locator::css("#list span").filter_exact_text("B");
        assert_eq!(doc.resolve(&exact).unwrap().len(), 1);

        let first = Locator::css("li").first().locator("span");
        assert_eq!(texts(&doc, &doc.resolve(&first).unwrap()), vec!["A"]);

        let none = Locator::css("li").nth(5);
        assert!(doc.resolve(&none).unwrap().is_empty());
    }

    #[test]
    fn test_universal_selector_finds_row_text() {
        let mut doc = Document::new();
        let list = doc.append(doc.root(), Element::new("ul"));
        let row = doc.append(list, Element::new("li"));
        doc.append(row, Element::new("input").attr("type", "checkbox"));
        doc.append(row, Element::new("label").text("Walk"));
        doc.append(row, Element::new("button").text("Delete"));

        let exact = Locator::css("li").locator("*").filter_exact_text("Walk");
        let found = doc.resolve(&exact).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(doc.element(found[0]).tag, "label");

        let partial = Locator::css("li").locator("*").filter_exact_text("Wal");
        assert!(doc.resolve(&partial).unwrap().is_empty());
        assert_eq!(doc.query_all(row, "*").unwrap().len(), 3);
    }

    #[test]
    fn test_visibility_follows_ancestors() {
        let doc = sample();
        let c = doc.resolve(&Locator::css("p span")).unwrap()[0];
        assert!(!doc.is_visible(c));
        let a = doc.resolve(&Locator::css("li span")).unwrap()[0];
        assert!(doc.is_visible(a));
    }

    #[test]
    fn test_unsupported_selectors_are_errors() {
        let doc = sample();
        for bad in ["", "li >", "> li", "li ~ span", "li:hover", "li[", "a:nth-child(0)"] {
            assert!(
                matches!(doc.query_all(doc.root(), bad), Err(E2eError::Selector(_))),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_to_html_marks_hidden_nodes() {
        let html = sample().to_html();
        assert!(html.contains("<p style=\"display: none\">"));
        assert!(html.contains("<button class=\"delete x\">Delete</button>"));
    }
}
