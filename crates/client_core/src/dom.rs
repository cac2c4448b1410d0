//! Minimal in-memory document the panel manager and table sync mutate.
//!
//! The parser is tolerant rather than conforming: it understands the markup
//! the server renders (elements, quoted/unquoted/boolean attributes, void
//! elements, comments, raw-text elements) and closes stray tags leniently.

use std::{fmt::Write as _, sync::Arc};

use tokio::sync::Mutex;

pub type SharedDocument = Arc<Mutex<Document>>;

const VOID_ELEMENTS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];
const RAW_TEXT_ELEMENTS: [&str; 3] = ["script", "style", "textarea"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    tag: String,
    attrs: Vec<(String, Option<String>)>,
}

impl Element {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.iter().any(|(key, _)| key == name)
    }

    /// Attribute value; boolean attributes read as `""`.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_deref().unwrap_or(""))
    }

    pub fn attrs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attrs
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_deref().unwrap_or("")))
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|classes| classes.split_ascii_whitespace().any(|c| c == class))
    }

    fn set_attr(&mut self, name: &str, value: Option<String>) {
        match self.attrs.iter_mut().find(|(key, _)| key == name) {
            Some((_, existing)) => *existing = value,
            None => self.attrs.push((name.to_string(), value)),
        }
    }

    fn remove_attr(&mut self, name: &str) -> bool {
        let before = self.attrs.len();
        self.attrs.retain(|(key, _)| key != name);
        before != self.attrs.len()
    }
}

#[derive(Debug, Clone)]
enum NodeData {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Arena-backed node tree rooted at a `body` element.
///
/// Node ids are never reused, so an id held across an await either still
/// names the same node or is dead.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Option<Node>>,
    root: NodeId,
    focused: Option<NodeId>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            nodes: vec![Some(Node {
                data: NodeData::Element(Element::new("body")),
                parent: None,
                children: Vec::new(),
            })],
            root: NodeId(0),
            focused: None,
        }
    }

    pub fn parse(html: &str) -> Self {
        let mut doc = Self::new();
        doc.append_html(doc.root, html);
        doc
    }

    pub fn shared(self) -> SharedDocument {
        Arc::new(Mutex::new(self))
    }

    pub fn body(&self) -> NodeId {
        self.root
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.node(node).is_some()
    }

    pub fn element(&self, node: NodeId) -> Option<&Element> {
        match &self.node(node)?.data {
            NodeData::Element(element) => Some(element),
            NodeData::Text(_) => None,
        }
    }

    pub fn tag(&self, node: NodeId) -> Option<&str> {
        self.element(node).map(Element::tag)
    }

    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node)?.attr(name)
    }

    pub fn has_attr(&self, node: NodeId, name: &str) -> bool {
        self.element(node).is_some_and(|el| el.has_attr(name))
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.element(node).is_some_and(|el| el.has_class(class))
    }

    pub fn set_attr(&mut self, node: NodeId, name: &str, value: impl Into<String>) {
        if let Some(element) = self.element_mut(node) {
            element.set_attr(name, Some(value.into()));
        }
    }

    pub fn set_bool_attr(&mut self, node: NodeId, name: &str, on: bool) {
        if let Some(element) = self.element_mut(node) {
            if on {
                element.set_attr(name, None);
            } else {
                element.remove_attr(name);
            }
        }
    }

    pub fn remove_attr(&mut self, node: NodeId, name: &str) -> bool {
        self.element_mut(node)
            .is_some_and(|element| element.remove_attr(name))
    }

    pub fn add_class(&mut self, node: NodeId, class: &str) {
        let Some(element) = self.element_mut(node) else {
            return;
        };
        if element.has_class(class) {
            return;
        }
        let classes = match element.attr("class") {
            Some(existing) if !existing.trim().is_empty() => format!("{} {class}", existing.trim()),
            _ => class.to_string(),
        };
        element.set_attr("class", Some(classes));
    }

    pub fn remove_class(&mut self, node: NodeId, class: &str) {
        let Some(element) = self.element_mut(node) else {
            return;
        };
        if !element.has_class(class) {
            return;
        }
        let classes = element
            .attr("class")
            .unwrap_or_default()
            .split_ascii_whitespace()
            .filter(|c| *c != class)
            .collect::<Vec<_>>()
            .join(" ");
        element.set_attr("class", Some(classes));
    }

    pub fn toggle_class(&mut self, node: NodeId, class: &str, on: bool) {
        if on {
            self.add_class(node, class);
        } else {
            self.remove_class(node, class);
        }
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node)?.parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.node(node)
            .map(|n| n.children.as_slice())
            .unwrap_or_default()
    }

    pub fn element_children(&self, node: NodeId) -> Vec<NodeId> {
        self.children(node)
            .iter()
            .copied()
            .filter(|child| self.element(*child).is_some())
            .collect()
    }

    /// Element descendants of `scope` in document order, excluding `scope`.
    pub fn descendants(&self, scope: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(scope).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            if self.element(node).is_some() {
                out.push(node);
                stack.extend(self.children(node).iter().rev().copied());
            }
        }
        out
    }

    pub fn find(&self, scope: NodeId, pred: impl Fn(&Element) -> bool) -> Option<NodeId> {
        self.descendants(scope)
            .into_iter()
            .find(|node| self.element(*node).is_some_and(&pred))
    }

    pub fn find_all(&self, scope: NodeId, pred: impl Fn(&Element) -> bool) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|node| self.element(*node).is_some_and(&pred))
            .collect()
    }

    pub fn find_by_attr(&self, scope: NodeId, name: &str, value: &str) -> Option<NodeId> {
        self.find(scope, |el| el.attr(name) == Some(value))
    }

    pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.find_by_attr(self.root, "id", id)
    }

    /// `node` itself or its nearest element ancestor matching `pred`.
    pub fn closest(&self, node: NodeId, pred: impl Fn(&Element) -> bool) -> Option<NodeId> {
        let mut current = Some(node);
        while let Some(id) = current {
            if self.element(id).is_some_and(&pred) {
                return Some(id);
            }
            current = self.parent(id);
        }
        None
    }

    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        decode_entities(&out)
    }

    /// Replaces the children of `node` with one escaped text node.
    pub fn set_text(&mut self, node: NodeId, text: &str) {
        if self.element(node).is_none() {
            return;
        }
        for child in self.children(node).to_vec() {
            self.remove(child);
        }
        let text = if self.is_raw_text(node) {
            text.replace("</", "&lt;/")
        } else {
            v_htmlescape::escape(text).to_string()
        };
        let id = self.alloc(NodeData::Text(text), Some(node));
        if let Some(parent) = self.node_mut(node) {
            parent.children.push(id);
        }
    }

    pub fn append_html(&mut self, parent: NodeId, html: &str) -> Vec<NodeId> {
        let index = self.children(parent).len();
        self.insert_html(parent, index, html)
    }

    pub fn prepend_html(&mut self, parent: NodeId, html: &str) -> Vec<NodeId> {
        self.insert_html(parent, 0, html)
    }

    /// Replaces `node` with the parsed markup, in the same position.
    pub fn replace_with_html(&mut self, node: NodeId, html: &str) -> Vec<NodeId> {
        let Some(parent) = self.parent(node) else {
            return Vec::new();
        };
        let index = self.index_in_parent(node).unwrap_or(0);
        self.remove(node);
        self.insert_html(parent, index, html)
    }

    /// Detaches `node` and its subtree. Returns false for dead ids and the root.
    pub fn remove(&mut self, node: NodeId) -> bool {
        if node == self.root || !self.contains(node) {
            return false;
        }
        if let Some(parent) = self.parent(node) {
            if let Some(p) = self.node_mut(parent) {
                p.children.retain(|child| *child != node);
            }
        }
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            if let Some(removed) = self.nodes.get_mut(id.0).and_then(Option::take) {
                stack.extend(removed.children);
            }
            if self.focused == Some(id) {
                self.focused = None;
            }
        }
        true
    }

    pub fn focus(&mut self, node: NodeId) {
        if self.element(node).is_some() {
            self.focused = Some(node);
        }
    }

    pub fn focused(&self) -> Option<NodeId> {
        self.focused.filter(|node| self.contains(*node))
    }

    pub fn outer_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_node(node, &mut out);
        out
    }

    pub fn inner_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(node) {
            self.write_node(*child, &mut out);
        }
        out
    }

    /// Serialized content of the body.
    pub fn to_html(&self) -> String {
        self.inner_html(self.root)
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)?.as_ref()
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)?.as_mut()
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match &mut self.node_mut(id)?.data {
            NodeData::Element(element) => Some(element),
            NodeData::Text(_) => None,
        }
    }

    fn index_in_parent(&self, node: NodeId) -> Option<usize> {
        let parent = self.parent(node)?;
        self.children(parent).iter().position(|child| *child == node)
    }

    fn is_raw_text(&self, node: NodeId) -> bool {
        self.tag(node)
            .is_some_and(|tag| RAW_TEXT_ELEMENTS.contains(&tag))
    }

    fn alloc(&mut self, data: NodeData, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Some(Node {
            data,
            parent,
            children: Vec::new(),
        }));
        id
    }

    fn insert_html(&mut self, parent: NodeId, index: usize, html: &str) -> Vec<NodeId> {
        if self.element(parent).is_none() {
            return Vec::new();
        }
        let fragments = parse_fragment(html);
        let inserted: Vec<NodeId> = fragments
            .into_iter()
            .map(|fragment| self.graft(fragment, parent))
            .collect();
        if let Some(p) = self.node_mut(parent) {
            let index = index.min(p.children.len());
            p.children.splice(index..index, inserted.iter().copied());
        }
        inserted
    }

    fn graft(&mut self, fragment: Fragment, parent: NodeId) -> NodeId {
        match fragment {
            Fragment::Text(text) => self.alloc(NodeData::Text(text), Some(parent)),
            Fragment::Element { element, children } => {
                let id = self.alloc(NodeData::Element(element), Some(parent));
                let child_ids: Vec<NodeId> = children
                    .into_iter()
                    .map(|child| self.graft(child, id))
                    .collect();
                if let Some(node) = self.node_mut(id) {
                    node.children = child_ids;
                }
                id
            }
        }
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        let Some(n) = self.node(node) else {
            return;
        };
        match &n.data {
            NodeData::Text(text) => out.push_str(text),
            NodeData::Element(_) => {
                for child in &n.children {
                    self.collect_text(*child, out);
                }
            }
        }
    }

    fn write_node(&self, node: NodeId, out: &mut String) {
        let Some(n) = self.node(node) else {
            return;
        };
        match &n.data {
            NodeData::Text(text) => out.push_str(text),
            NodeData::Element(element) => {
                let _ = write!(out, "<{}", element.tag);
                for (name, value) in &element.attrs {
                    match value {
                        Some(value) => {
                            let _ = write!(out, r#" {name}="{}""#, escape_attr(value));
                        }
                        None => {
                            let _ = write!(out, " {name}");
                        }
                    }
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&element.tag.as_str()) {
                    return;
                }
                for child in &n.children {
                    self.write_node(*child, out);
                }
                let _ = write!(out, "</{}>", element.tag);
            }
        }
    }
}

#[derive(Debug)]
enum Fragment {
    Element {
        element: Element,
        children: Vec<Fragment>,
    },
    Text(String),
}

struct OpenElement {
    element: Element,
    children: Vec<Fragment>,
}

fn parse_fragment(html: &str) -> Vec<Fragment> {
    let mut cursor = Cursor { src: html, pos: 0 };
    let mut root: Vec<Fragment> = Vec::new();
    let mut stack: Vec<OpenElement> = Vec::new();

    fn push(stack: &mut [OpenElement], root: &mut Vec<Fragment>, fragment: Fragment) {
        match stack.last_mut() {
            Some(open) => open.children.push(fragment),
            None => root.push(fragment),
        }
    }

    fn close_top(stack: &mut Vec<OpenElement>, root: &mut Vec<Fragment>) {
        if let Some(open) = stack.pop() {
            let fragment = Fragment::Element {
                element: open.element,
                children: open.children,
            };
            push(stack, root, fragment);
        }
    }

    while !cursor.at_end() {
        if cursor.starts_with("<!--") {
            cursor.skip_past("-->");
        } else if cursor.starts_with("</") {
            cursor.pos += 2;
            let name = cursor
                .eat_while(|c| c.is_ascii_alphanumeric() || c == '-')
                .to_ascii_lowercase();
            cursor.skip_past(">");
            if let Some(depth) = stack.iter().rposition(|open| open.element.tag == name) {
                while stack.len() > depth {
                    close_top(&mut stack, &mut root);
                }
            }
        } else if cursor.starts_with("<!") || cursor.starts_with("<?") {
            cursor.skip_past(">");
        } else if cursor.starts_with("<") && cursor.peek_at(1).is_some_and(|c| c.is_ascii_alphabetic()) {
            cursor.pos += 1;
            let (element, self_closing) = parse_start_tag(&mut cursor);

            while stack
                .last()
                .is_some_and(|open| implicitly_closed_by(&open.element.tag, &element.tag))
            {
                close_top(&mut stack, &mut root);
            }

            let tag = element.tag.clone();
            if self_closing || VOID_ELEMENTS.contains(&tag.as_str()) {
                push(&mut stack, &mut root, Fragment::Element {
                    element,
                    children: Vec::new(),
                });
            } else if RAW_TEXT_ELEMENTS.contains(&tag.as_str()) {
                let text = cursor.take_until_close_tag(&tag);
                let children = if text.is_empty() {
                    Vec::new()
                } else {
                    vec![Fragment::Text(text.to_string())]
                };
                push(&mut stack, &mut root, Fragment::Element { element, children });
            } else {
                stack.push(OpenElement {
                    element,
                    children: Vec::new(),
                });
            }
        } else {
            let start = cursor.pos;
            cursor.bump();
            while !cursor.at_end() && !cursor.at_markup() {
                cursor.bump();
            }
            let text = &html[start..cursor.pos];
            push(&mut stack, &mut root, Fragment::Text(text.to_string()));
        }
    }

    while !stack.is_empty() {
        close_top(&mut stack, &mut root);
    }
    root
}

fn implicitly_closed_by(open: &str, incoming: &str) -> bool {
    match incoming {
        "tr" => matches!(open, "tr" | "td" | "th"),
        "td" | "th" => matches!(open, "td" | "th"),
        "li" => open == "li",
        "option" => open == "option",
        "p" => open == "p",
        _ => false,
    }
}

fn parse_start_tag(cursor: &mut Cursor<'_>) -> (Element, bool) {
    let name = cursor.eat_while(|c| c.is_ascii_alphanumeric() || c == '-');
    let mut element = Element::new(name);
    loop {
        cursor.eat_while(char::is_whitespace);
        match cursor.peek() {
            None => return (element, false),
            Some('>') => {
                cursor.pos += 1;
                return (element, false);
            }
            Some('/') => {
                cursor.pos += 1;
                if cursor.peek() == Some('>') {
                    cursor.pos += 1;
                    return (element, true);
                }
                continue;
            }
            Some(_) => {}
        }

        let name = cursor
            .eat_while(|c| !c.is_whitespace() && c != '=' && c != '>' && c != '/')
            .to_ascii_lowercase();
        if name.is_empty() {
            cursor.bump();
            continue;
        }
        cursor.eat_while(char::is_whitespace);
        let value = if cursor.peek() == Some('=') {
            cursor.pos += 1;
            cursor.eat_while(char::is_whitespace);
            Some(decode_entities(&parse_attr_value(cursor)))
        } else {
            None
        };
        if !element.has_attr(&name) {
            element.attrs.push((name, value));
        }
    }
}

fn parse_attr_value(cursor: &mut Cursor<'_>) -> String {
    match cursor.peek() {
        Some(quote @ ('"' | '\'')) => {
            cursor.pos += 1;
            let value = cursor.eat_while(|c| c != quote).to_string();
            cursor.bump();
            value
        }
        _ => cursor
            .eat_while(|c| !c.is_whitespace() && c != '>')
            .to_string(),
    }
}

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.rest().chars().nth(offset)
    }

    fn bump(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn starts_with(&self, prefix: &str) -> bool {
        self.rest().starts_with(prefix)
    }

    fn at_markup(&self) -> bool {
        self.starts_with("</")
            || self.starts_with("<!")
            || (self.starts_with("<") && self.peek_at(1).is_some_and(|c| c.is_ascii_alphabetic()))
    }

    fn eat_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
        &self.src[start..self.pos]
    }

    fn skip_past(&mut self, needle: &str) {
        match self.rest().find(needle) {
            Some(offset) => self.pos += offset + needle.len(),
            None => self.pos = self.src.len(),
        }
    }

    /// Raw content up to `</tag`, consuming the closing tag.
    fn take_until_close_tag(&mut self, tag: &str) -> &'a str {
        let rest = self.rest();
        let needle = format!("</{tag}");
        let end = rest
            .to_ascii_lowercase()
            .find(&needle)
            .unwrap_or(rest.len());
        let text = &rest[..end];
        self.pos += end;
        self.skip_past(">");
        text
    }
}

fn escape_attr(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

/// Decodes the entities the server's escaper emits plus numeric references.
/// Unknown entities are left as written.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest.find(';').filter(|end| *end <= 10).and_then(|end| {
            let entity = &rest[1..end];
            let c = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "#39" | "#x27" | "apos" => Some('\''),
                "#x2F" | "#x2f" | "#47" => Some('/'),
                "times" => Some('\u{d7}'),
                "nbsp" => Some('\u{a0}'),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                    .and_then(char::from_u32),
            }?;
            Some((c, end))
        });
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
#[path = "tests/dom_tests.rs"]
mod tests;
