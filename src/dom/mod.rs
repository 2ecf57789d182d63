use std::{fmt::Debug, hash::Hash};

use thiserror::Error;
use tokio::sync::mpsc::UnboundedReceiver;

pub mod memory;
pub mod snapshot;

pub use memory::{MemoryDocument, NodeId};

/// The slice of a live document the marker reads and writes.
///
/// Node handles are stable for the lifetime of the element they point to and
/// are never reused for another element.
pub trait Document: Send + Sync + 'static {
    type Node: Clone + Eq + Hash + Debug + Send + Sync + 'static;

    /// Attached `<a>` elements whose raw `href` contains `needle`, in document order.
    fn anchors(&self, needle: &str) -> Vec<Self::Node>;

    /// Absolute link target of an anchor.
    fn href(&self, node: &Self::Node) -> Option<String>;

    /// First descendant of `root` carrying `class`.
    fn find_by_class(&self, root: &Self::Node, class: &str) -> Option<Self::Node>;

    fn append_element(&self, parent: &Self::Node, tag: &str, class: &str) -> Result<Self::Node, DomError>;

    fn set_text(&self, node: &Self::Node, text: &str) -> Result<(), DomError>;

    fn set_style(&self, node: &Self::Node, property: &str, value: &str) -> Result<(), DomError>;

    fn computed_style(&self, node: &Self::Node, property: &str) -> Option<String>;

    /// Child-list mutations anywhere in the document, like a subtree
    /// `MutationObserver` on the root element.
    fn observe(&self) -> UnboundedReceiver<MutationRecord>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Added,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub kind: MutationKind,
    pub target: String,
}

#[derive(Debug, Error)]
pub enum DomError {
    #[error("node {0} is detached from the document")]
    Detached(String),
    #[error("node {0} does not exist")]
    UnknownNode(String),
}
