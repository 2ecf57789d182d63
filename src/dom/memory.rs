use std::{collections::BTreeMap, fmt};

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use url::Url;

use super::{Document, DomError, MutationKind, MutationRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

const ROOT: NodeId = NodeId(0);
const BODY: NodeId = NodeId(1);

#[derive(Debug)]
struct NodeData {
    tag: String,
    attrs: BTreeMap<String, String>,
    styles: Vec<(String, String)>,
    text: Option<String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    attached: bool,
}

impl NodeData {
    fn element(tag: &str, parent: Option<NodeId>) -> Self {
        Self {
            tag: tag.to_string(),
            attrs: BTreeMap::new(),
            styles: Vec::new(),
            text: None,
            parent,
            children: Vec::new(),
            attached: true,
        }
    }

    fn has_class(&self, class: &str) -> bool {
        self.attrs
            .get("class")
            .is_some_and(|value| value.split_whitespace().any(|c| c == class))
    }

    fn style(&self, property: &str) -> Option<&str> {
        self.styles
            .iter()
            .find(|(name, _)| name == property)
            .map(|(_, value)| value.as_str())
    }
}

/// Arena-backed document tree standing in for the browser page.
///
/// Nodes are never freed; removing a node detaches its subtree so handles
/// held elsewhere stay valid but refuse writes.
pub struct MemoryDocument {
    base_url: Url,
    nodes: RwLock<Vec<NodeData>>,
    observers: Mutex<Vec<UnboundedSender<MutationRecord>>>,
}

impl MemoryDocument {
    pub fn new(base_url: Url) -> Self {
        let mut html = NodeData::element("html", None);
        html.children.push(BODY);
        let body = NodeData::element("body", Some(ROOT));
        Self {
            base_url,
            nodes: RwLock::new(vec![html, body]),
            observers: Mutex::new(Vec::new()),
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn body(&self) -> NodeId {
        BODY
    }

    pub fn append_anchor(&self, parent: NodeId, href: &str, label: &str) -> Result<NodeId, DomError> {
        let node = self.insert(parent, "a", &[("href", href)], Some(label))?;
        Ok(node)
    }

    pub fn remove(&self, node: NodeId) -> Result<(), DomError> {
        {
            let mut nodes = self.nodes.write();
            let parent = checked(&nodes, node)?.parent;
            if node == ROOT || node == BODY {
                return Err(DomError::Detached(node.to_string()));
            }
            if let Some(parent) = parent {
                nodes[parent.0].children.retain(|child| *child != node);
            }
            let mut stack = vec![node];
            while let Some(current) = stack.pop() {
                let data = &mut nodes[current.0];
                data.attached = false;
                stack.extend(data.children.iter().copied());
            }
        }
        self.notify(MutationKind::Removed, node);
        Ok(())
    }

    pub fn to_html(&self) -> String {
        let nodes = self.nodes.read();
        let mut out = String::new();
        render(&nodes, ROOT, &mut out);
        out
    }

    fn insert(
        &self,
        parent: NodeId,
        tag: &str,
        attrs: &[(&str, &str)],
        text: Option<&str>,
    ) -> Result<NodeId, DomError> {
        let node = {
            let mut nodes = self.nodes.write();
            if !checked(&nodes, parent)?.attached {
                return Err(DomError::Detached(parent.to_string()));
            }
            let node = NodeId(nodes.len());
            let mut data = NodeData::element(tag, Some(parent));
            for (name, value) in attrs {
                data.attrs.insert((*name).to_string(), (*value).to_string());
            }
            data.text = text.map(str::to_string);
            nodes.push(data);
            nodes[parent.0].children.push(node);
            node
        };
        self.notify(MutationKind::Added, node);
        Ok(node)
    }

    fn with_attached<T>(
        &self,
        node: NodeId,
        f: impl FnOnce(&mut NodeData) -> T,
    ) -> Result<T, DomError> {
        let mut nodes = self.nodes.write();
        let data = nodes
            .get_mut(node.0)
            .ok_or_else(|| DomError::UnknownNode(node.to_string()))?;
        if !data.attached {
            return Err(DomError::Detached(node.to_string()));
        }
        Ok(f(data))
    }

    fn notify(&self, kind: MutationKind, node: NodeId) {
        let record = MutationRecord {
            kind,
            target: node.to_string(),
        };
        self.observers
            .lock()
            .retain(|observer| observer.send(record.clone()).is_ok());
    }
}

#[cfg(test)]
impl MemoryDocument {
    pub fn text(&self, node: NodeId) -> Option<String> {
        self.nodes.read().get(node.0).and_then(|data| data.text.clone())
    }

    pub fn style(&self, node: NodeId, property: &str) -> Option<String> {
        self.nodes
            .read()
            .get(node.0)
            .and_then(|data| data.style(property).map(str::to_string))
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes
            .read()
            .get(node.0)
            .map(|data| data.children.clone())
            .unwrap_or_default()
    }

    pub fn is_attached(&self, node: NodeId) -> bool {
        self.nodes.read().get(node.0).is_some_and(|data| data.attached)
    }
}

impl Document for MemoryDocument {
    type Node = NodeId;

    fn anchors(&self, needle: &str) -> Vec<NodeId> {
        let nodes = self.nodes.read();
        let mut found = Vec::new();
        let mut stack = vec![ROOT];
        while let Some(current) = stack.pop() {
            let data = &nodes[current.0];
            if data.tag == "a" && data.attrs.get("href").is_some_and(|href| href.contains(needle)) {
                found.push(current);
            }
            stack.extend(data.children.iter().rev().copied());
        }
        found
    }

    fn href(&self, node: &NodeId) -> Option<String> {
        let raw = self.nodes.read().get(node.0)?.attrs.get("href")?.clone();
        Some(
            self.base_url
                .join(&raw)
                .map(|url| url.to_string())
                .unwrap_or(raw),
        )
    }

    fn find_by_class(&self, root: &NodeId, class: &str) -> Option<NodeId> {
        let nodes = self.nodes.read();
        let mut stack: Vec<NodeId> = nodes.get(root.0)?.children.iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            let data = &nodes[current.0];
            if data.has_class(class) {
                return Some(current);
            }
            stack.extend(data.children.iter().rev().copied());
        }
        None
    }

    fn append_element(&self, parent: &NodeId, tag: &str, class: &str) -> Result<NodeId, DomError> {
        self.insert(*parent, tag, &[("class", class)], None)
    }

    fn set_text(&self, node: &NodeId, text: &str) -> Result<(), DomError> {
        self.with_attached(*node, |data| data.text = Some(text.to_string()))
    }

    fn set_style(&self, node: &NodeId, property: &str, value: &str) -> Result<(), DomError> {
        self.with_attached(*node, |data| {
            match data.styles.iter_mut().find(|(name, _)| name == property) {
                Some(entry) => entry.1 = value.to_string(),
                None => data.styles.push((property.to_string(), value.to_string())),
            }
        })
    }

    fn computed_style(&self, node: &NodeId, property: &str) -> Option<String> {
        let nodes = self.nodes.read();
        let data = nodes.get(node.0).filter(|data| data.attached)?;
        match (data.style(property), property) {
            (Some(value), _) => Some(value.to_string()),
            (None, "position") => Some("static".to_string()),
            (None, "display") if data.tag == "a" || data.tag == "span" => Some("inline".to_string()),
            (None, "display") => Some("block".to_string()),
            (None, _) => None,
        }
    }

    fn observe(&self) -> UnboundedReceiver<MutationRecord> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.observers.lock().push(tx);
        rx
    }
}

fn checked(nodes: &[NodeData], node: NodeId) -> Result<&NodeData, DomError> {
    nodes
        .get(node.0)
        .ok_or_else(|| DomError::UnknownNode(node.to_string()))
}

fn render(nodes: &[NodeData], node: NodeId, out: &mut String) {
    let data = &nodes[node.0];
    out.push('<');
    out.push_str(&data.tag);
    for (name, value) in &data.attrs {
        out.push_str(&format!(" {}=\"{}\"", name, escape_html(value)));
    }
    if !data.styles.is_empty() {
        let style = data
            .styles
            .iter()
            .map(|(name, value)| format!("{name}: {value}"))
            .collect::<Vec<_>>()
            .join("; ");
        out.push_str(&format!(" style=\"{}\"", escape_html(&style)));
    }
    out.push('>');
    if let Some(text) = &data.text {
        out.push_str(&escape_html(text));
    }
    for child in &data.children {
        render(nodes, *child, out);
    }
    out.push_str("</");
    out.push_str(&data.tag);
    out.push('>');
}

pub(crate) fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
