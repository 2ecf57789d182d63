use std::{collections::HashSet, sync::Arc};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::{dom::Document, domain::ListingId};

/// Substring every listing link carries; used to pre-filter anchors.
pub const LISTING_HREF_HINT: &str = "/wd/";

static LISTING_PATH_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/wd/(\d+)").expect("valid listing path regex"));

pub fn extract_listing_id(href: &str) -> Option<ListingId> {
    LISTING_PATH_REGEX
        .captures(href)
        .and_then(|caps| caps.get(1))
        .and_then(|digits| digits.as_str().parse::<u64>().ok())
        .map(ListingId)
}

/// Finds listing anchors that have not been handed out before.
pub struct DomScanner<D: Document> {
    document: Arc<D>,
    seen: HashSet<D::Node>,
}

impl<D: Document> DomScanner<D> {
    pub fn new(document: Arc<D>) -> Self {
        Self {
            document,
            seen: HashSet::new(),
        }
    }

    /// Each element is returned at most once per scanner, even when several
    /// elements point at the same listing.
    pub fn scan(&mut self) -> Vec<(D::Node, ListingId)> {
        let mut found = Vec::new();
        for node in self.document.anchors(LISTING_HREF_HINT) {
            if self.seen.contains(&node) {
                continue;
            }
            let Some(listing_id) = self
                .document
                .href(&node)
                .as_deref()
                .and_then(extract_listing_id)
            else {
                continue;
            };
            self.seen.insert(node.clone());
            found.push((node, listing_id));
        }
        if !found.is_empty() {
            tracing::debug!(target: "scanner", new = found.len(), seen = self.seen.len(), "listing anchors discovered");
        }
        found
    }

    pub fn seen(&self) -> usize {
        self.seen.len()
    }
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;
    use crate::dom::MemoryDocument;

    fn doc() -> Arc<MemoryDocument> {
        Arc::new(MemoryDocument::new(
            Url::parse("https://www.wanted.co.kr/wdlist/518").unwrap(),
        ))
    }

    #[test]
    fn extracts_digits_after_wd() {
        assert_eq!(extract_listing_id("https://www.wanted.co.kr/wd/12345"), Some(ListingId(12345)));
        assert_eq!(extract_listing_id("/wd/7?referer_id=3"), Some(ListingId(7)));
        assert_eq!(extract_listing_id("/wd/abc"), None);
        assert_eq!(extract_listing_id("/wd/"), None);
        assert_eq!(extract_listing_id("/wd/99999999999999999999999"), None);
        assert_eq!(extract_listing_id("/company/1"), None);
    }

    #[test]
    fn empty_page_yields_nothing() {
        let mut scanner = DomScanner::new(doc());
        assert!(scanner.scan().is_empty());
    }

    #[test]
    fn repeated_scans_never_reemit_an_element() {
        let doc = doc();
        let a = doc.append_anchor(doc.body(), "/wd/1", "one").unwrap();
        let b = doc.append_anchor(doc.body(), "/wd/2", "two").unwrap();
        let mut scanner = DomScanner::new(doc.clone());

        assert_eq!(scanner.scan(), vec![(a, ListingId(1)), (b, ListingId(2))]);
        assert!(scanner.scan().is_empty());
        assert!(scanner.scan().is_empty());

        let c = doc.append_anchor(doc.body(), "/wd/3", "three").unwrap();
        assert_eq!(scanner.scan(), vec![(c, ListingId(3))]);
        assert_eq!(scanner.seen(), 3);
    }

    #[test]
    fn same_listing_on_two_elements_is_emitted_for_each() {
        let doc = doc();
        let card = doc.append_anchor(doc.body(), "/wd/42", "card").unwrap();
        let title = doc.append_anchor(doc.body(), "https://www.wanted.co.kr/wd/42", "title").unwrap();
        let mut scanner = DomScanner::new(doc);

        assert_eq!(scanner.scan(), vec![(card, ListingId(42)), (title, ListingId(42))]);
    }

    #[test]
    fn malformed_links_are_skipped() {
        let doc = doc();
        doc.append_anchor(doc.body(), "/wd/", "empty").unwrap();
        doc.append_anchor(doc.body(), "/wd/draft", "draft").unwrap();
        let good = doc.append_anchor(doc.body(), "/wd/8", "eight").unwrap();
        let mut scanner = DomScanner::new(doc);

        assert_eq!(scanner.scan(), vec![(good, ListingId(8))]);
        assert_eq!(scanner.seen(), 1);
    }
}
