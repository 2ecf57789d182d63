use std::sync::Arc;

use crate::dom::{Document, DomError};

pub const BADGE_CLASS: &str = "__applied_badge";
const BADGE_LABEL: &str = "지원완료";

const BADGE_STYLE: &[(&str, &str)] = &[
    ("position", "absolute"),
    ("top", "10px"),
    ("right", "10px"),
    ("z-index", "10"),
    ("padding", "4px 8px"),
    ("border-radius", "999px"),
    ("font-size", "12px"),
    ("line-height", "1"),
    ("font-weight", "700"),
    ("background", "rgba(0,0,0,0.75)"),
    ("color", "#fff"),
];

pub fn badge_label(status_text: Option<&str>) -> String {
    match status_text {
        Some(status) if !status.is_empty() => format!("{BADGE_LABEL} ({status})"),
        _ => BADGE_LABEL.to_string(),
    }
}

pub struct BadgeRenderer<D: Document> {
    document: Arc<D>,
    hide_applied: bool,
}

impl<D: Document> BadgeRenderer<D> {
    pub fn new(document: Arc<D>, hide_applied: bool) -> Self {
        Self {
            document,
            hide_applied,
        }
    }

    /// Marks `node` as applied. Calling it again only rewrites the badge text.
    pub fn mark_applied(&self, node: &D::Node, status_text: Option<&str>) -> Result<(), DomError> {
        let badge = match self.document.find_by_class(node, BADGE_CLASS) {
            Some(badge) => badge,
            None => self.insert_badge(node)?,
        };
        self.document.set_text(&badge, &badge_label(status_text))?;

        self.document.set_style(node, "opacity", "0.55")?;
        self.document.set_style(node, "filter", "grayscale(0.35)")?;
        if self.hide_applied {
            self.document.set_style(node, "display", "none")?;
        }
        Ok(())
    }

    fn insert_badge(&self, node: &D::Node) -> Result<D::Node, DomError> {
        // The badge is absolutely positioned against the card.
        if self.document.computed_style(node, "position").as_deref() == Some("static") {
            self.document.set_style(node, "position", "relative")?;
        }
        let badge = self.document.append_element(node, "span", BADGE_CLASS)?;
        for (property, value) in BADGE_STYLE {
            self.document.set_style(&badge, property, value)?;
        }
        Ok(badge)
    }
}
