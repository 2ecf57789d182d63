use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, SystemTime},
};

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tokio::{
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};

use super::{MemoryDocument, NodeId};
use crate::infrastructure::shutdown::ShutdownListener;

static ANCHOR_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("valid anchor selector"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotAnchor {
    pub href: String,
    pub label: String,
}

/// Every `<a href>` in `html`, in document order. Script bodies and comments
/// are not markup and contribute nothing.
pub fn extract_anchors(html: &str) -> Vec<SnapshotAnchor> {
    let document = Html::parse_document(html);
    document
        .select(&ANCHOR_SELECTOR)
        .filter_map(|element| {
            let href = element.value().attr("href")?.trim();
            let label = element
                .text()
                .flat_map(|text| text.split_whitespace())
                .collect::<Vec<_>>()
                .join(" ");
            Some(SnapshotAnchor {
                href: href.to_string(),
                label,
            })
        })
        .collect()
}

/// Feeds a saved listing page into a `MemoryDocument`.
///
/// Only anchors that were not imported before are appended, and imported
/// anchors missing from a newer save are removed. Re-saving the page after
/// scrolling therefore behaves like the site appending (or recycling) cards.
pub struct SnapshotFeed {
    path: PathBuf,
    imported: HashMap<String, Vec<NodeId>>,
    last_modified: Option<SystemTime>,
}

impl SnapshotFeed {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            imported: HashMap::new(),
            last_modified: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the file changed since the last successful sync.
    pub async fn changed(&self) -> Result<bool> {
        let modified = tokio::fs::metadata(&self.path)
            .await
            .and_then(|meta| meta.modified())
            .with_context(|| format!("failed to stat snapshot {}", self.path.display()))?;
        Ok(self.last_modified != Some(modified))
    }

    /// Reads the snapshot and appends new anchors under `<body>`.
    /// Returns how many were appended.
    pub async fn sync(&mut self, document: &MemoryDocument) -> Result<usize> {
        let modified = tokio::fs::metadata(&self.path)
            .await
            .and_then(|meta| meta.modified())
            .ok();
        let html = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("failed to read snapshot {}", self.path.display()))?;
        let appended = self.import(&html, document)?;
        self.last_modified = modified;
        Ok(appended)
    }

    /// Polls the snapshot every `poll` and imports it whenever it changes.
    pub fn spawn(
        mut self,
        document: Arc<MemoryDocument>,
        poll: Duration,
        mut shutdown: ShutdownListener,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(poll);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = shutdown.notified() => break,
                    _ = ticker.tick() => {}
                }
                match self.changed().await {
                    Ok(true) => match self.sync(&document).await {
                        Ok(0) => {}
                        Ok(appended) => {
                            tracing::info!(target: "feed", appended, "new listings appended");
                        }
                        Err(err) => {
                            tracing::warn!(target: "feed", error = %err, "snapshot import failed");
                        }
                    },
                    Ok(false) => {}
                    Err(err) => {
                        tracing::warn!(target: "feed", error = %err, "snapshot check failed");
                    }
                }
            }
            tracing::info!(target: "feed", path = %self.path.display(), "snapshot feed stopped");
        })
    }

    fn import(&mut self, html: &str, document: &MemoryDocument) -> Result<usize> {
        let anchors = extract_anchors(html);
        let mut occurrences: HashMap<&str, usize> = HashMap::new();
        let mut appended = 0;
        for anchor in &anchors {
            let seen = occurrences.entry(anchor.href.as_str()).or_insert(0);
            *seen += 1;
            let nodes = self.imported.entry(anchor.href.clone()).or_default();
            if *seen <= nodes.len() {
                continue;
            }
            let node = document
                .append_anchor(document.body(), &anchor.href, &anchor.label)
                .with_context(|| format!("failed to append anchor {}", anchor.href))?;
            nodes.push(node);
            appended += 1;
        }

        let mut removed = 0;
        for (href, nodes) in self.imported.iter_mut() {
            let keep = occurrences.get(href.as_str()).copied().unwrap_or(0);
            if nodes.len() > keep {
                for node in nodes.drain(keep..) {
                    document
                        .remove(node)
                        .with_context(|| format!("failed to remove anchor {href}"))?;
                    removed += 1;
                }
            }
        }
        self.imported.retain(|_, nodes| !nodes.is_empty());

        tracing::debug!(
            target: "feed",
            total = anchors.len(),
            appended,
            removed,
            path = %self.path.display(),
            "snapshot imported"
        );
        Ok(appended)
    }
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;
    use crate::dom::Document;

    fn doc() -> MemoryDocument {
        MemoryDocument::new(Url::parse("https://www.wanted.co.kr/wdlist").unwrap())
    }

    #[test]
    fn extracts_hrefs_and_labels() {
        let html = r#"
            <div><a class="card" href="/wd/101" data-x='1'><strong>백엔드</strong>
              개발자</a></div>
            <a href='/wd/102?a=1&amp;b=2'>two</a>
            <a href=/wd/103>three&nbsp;&#47;&nbsp;3</a>
            <a name="no-href">skip</a>
        "#;
        let anchors = extract_anchors(html);
        assert_eq!(
            anchors,
            vec![
                SnapshotAnchor { href: "/wd/101".into(), label: "백엔드 개발자".into() },
                SnapshotAnchor { href: "/wd/102?a=1&b=2".into(), label: "two".into() },
                SnapshotAnchor { href: "/wd/103".into(), label: "three / 3".into() },
            ]
        );
    }

    #[test]
    fn quoted_angle_bracket_does_not_hide_anchor() {
        let anchors = extract_anchors(r#"<a data-track="card>list" href="/wd/5">five</a>"#);
        assert_eq!(anchors, vec![SnapshotAnchor { href: "/wd/5".into(), label: "five".into() }]);
    }

    #[test]
    fn script_and_comment_markup_is_ignored() {
        let html = r#"
            <script>var tpl = '<a href="/wd/9">x</a>';</script>
            <!-- <a href="/wd/8">old card</a> -->
            <a href="/wd/1">one</a>
        "#;
        let anchors = extract_anchors(html);
        assert_eq!(anchors, vec![SnapshotAnchor { href: "/wd/1".into(), label: "one".into() }]);
    }

    #[test]
    fn reimport_appends_only_new_anchors() {
        let doc = doc();
        let mut feed = SnapshotFeed::new("unused.html");

        let first = r#"<a href="/wd/1">a</a><a href="/wd/2">b</a>"#;
        assert_eq!(feed.import(first, &doc).unwrap(), 2);

        let scrolled = r#"<a href="/wd/1">a</a><a href="/wd/2">b</a><a href="/wd/2">b again</a><a href="/wd/3">c</a>"#;
        assert_eq!(feed.import(scrolled, &doc).unwrap(), 2);
        assert_eq!(feed.import(scrolled, &doc).unwrap(), 0);
        assert_eq!(doc.anchors("/wd/").len(), 4);
    }

    #[test]
    fn anchors_dropped_from_a_newer_save_are_removed() {
        let doc = doc();
        let mut feed = SnapshotFeed::new("unused.html");
        feed.import(r#"<a href="/wd/1">a</a><a href="/wd/2">b</a><a href="/wd/2">b</a>"#, &doc)
            .unwrap();
        let mut mutations = doc.observe();

        assert_eq!(feed.import(r#"<a href="/wd/2">b</a><a href="/wd/3">c</a>"#, &doc).unwrap(), 1);

        let hrefs: Vec<String> = doc
            .anchors("/wd/")
            .iter()
            .filter_map(|node| doc.href(node))
            .collect();
        assert_eq!(
            hrefs,
            vec!["https://www.wanted.co.kr/wd/2", "https://www.wanted.co.kr/wd/3"]
        );
        let kinds: Vec<_> = std::iter::from_fn(|| mutations.try_recv().ok())
            .map(|record| record.kind)
            .collect();
        assert_eq!(kinds.iter().filter(|k| **k == crate::dom::MutationKind::Removed).count(), 2);
        assert_eq!(kinds.iter().filter(|k| **k == crate::dom::MutationKind::Added).count(), 1);
    }

    #[tokio::test]
    async fn sync_reads_file_and_tracks_modification() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.html");
        tokio::fs::write(&path, r#"<a href="/wd/9">nine</a>"#).await.unwrap();

        let doc = doc();
        let mut feed = SnapshotFeed::new(&path);
        assert!(feed.changed().await.unwrap());
        assert_eq!(feed.sync(&doc).await.unwrap(), 1);
        assert!(!feed.changed().await.unwrap());
        assert_eq!(doc.anchors("/wd/").len(), 1);
    }

    #[tokio::test]
    async fn spawned_feed_appends_rewritten_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.html");
        tokio::fs::write(&path, r#"<a href="/wd/1">one</a>"#).await.unwrap();

        let doc = Arc::new(doc());
        let mut feed = SnapshotFeed::new(&path);
        feed.sync(&doc).await.unwrap();
        let mut mutations = doc.observe();

        let shutdown = crate::infrastructure::shutdown::Shutdown::new();
        let handle = feed.spawn(doc.clone(), Duration::from_millis(10), shutdown.subscribe());

        // Distinct content and a later mtime.
        tokio::time::sleep(Duration::from_millis(20)).await;
        std::fs::write(&path, r#"<a href="/wd/1">one</a><a href="/wd/2">two</a>"#).unwrap();
        let file = std::fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(5)).unwrap();

        let record = tokio::time::timeout(Duration::from_secs(5), mutations.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.kind, crate::dom::MutationKind::Added);
        assert_eq!(doc.anchors("/wd/").len(), 2);

        shutdown.trigger();
        handle.await.unwrap();
    }
}
