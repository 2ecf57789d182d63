use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tokio::{
    fs,
    sync::mpsc::{self, UnboundedSender},
    task::JoinHandle,
};

use crate::{
    dom::{memory::escape_html, MemoryDocument},
    domain::RunStats,
};

/// Writes the marked document to `path`, replacing any previous report.
pub async fn write_report(
    path: &Path,
    document: &MemoryDocument,
    stats: &RunStats,
    timezone: &str,
) -> Result<()> {
    let html = render_report(document, stats, timezone, Utc::now());
    write_html(path, &html).await?;
    tracing::debug!(target: "report", path = %path.display(), marked = stats.marked, "report written");
    Ok(())
}

async fn write_html(path: &Path, html: &str) -> Result<()> {
    let staging = path.with_extension("tmp");
    fs::write(&staging, html)
        .await
        .with_context(|| format!("failed to write report {}", staging.display()))?;
    fs::rename(&staging, path)
        .await
        .with_context(|| format!("failed to move report into {}", path.display()))?;
    Ok(())
}

/// Persists rendered reports off the caller's task. Submissions that pile up
/// while a write is in progress collapse into the newest one.
pub struct ReportWriter {
    sender: UnboundedSender<String>,
    handle: JoinHandle<()>,
}

impl ReportWriter {
    pub fn spawn(path: PathBuf) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<String>();
        let handle = tokio::spawn(async move {
            while let Some(mut html) = receiver.recv().await {
                while let Ok(newer) = receiver.try_recv() {
                    html = newer;
                }
                if let Err(err) = write_html(&path, &html).await {
                    tracing::warn!(target: "report", error = %err, "리포트 저장 실패");
                }
            }
        });
        Self { sender, handle }
    }

    pub fn submit(&self, html: String) {
        if self.sender.send(html).is_err() {
            tracing::warn!(target: "report", "report writer is no longer running");
        }
    }

    /// Flushes pending submissions and stops the writer.
    pub async fn finish(self) {
        let ReportWriter { sender, handle } = self;
        drop(sender);
        if let Err(err) = handle.await {
            if err.is_panic() {
                tracing::error!(target: "report", "리포트 작성 작업이 패닉으로 종료되었습니다");
            }
        }
    }
}

pub fn render_report(
    document: &MemoryDocument,
    stats: &RunStats,
    timezone: &str,
    generated_at: DateTime<Utc>,
) -> String {
    let tz: Tz = timezone.parse().unwrap_or(chrono_tz::Asia::Seoul);
    let generated = generated_at.with_timezone(&tz).format("%Y-%m-%d %H:%M:%S");
    format!(
        "<!-- 지원 표시 리포트\n\
         페이지: {}\n\
         생성 시각: {} ({})\n\
         발견: {} / 조회: {} / 실패: {} / 캐시 적중: {} / 표시: {}\n\
         -->\n{}\n",
        escape_html(document.base_url().as_str()),
        generated,
        tz.name(),
        stats.scanned,
        stats.fetched,
        stats.failed,
        stats.cache_hits,
        stats.marked,
        document.to_html()
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::TimeZone;
    use url::Url;

    use super::*;
    use crate::marker::badge::BadgeRenderer;

    fn marked_document() -> MemoryDocument {
        let doc = Arc::new(MemoryDocument::new(Url::parse("https://www.wanted.co.kr/wdlist").unwrap()));
        let anchor = doc.append_anchor(doc.body(), "/wd/3", "백엔드 개발자").unwrap();
        BadgeRenderer::new(doc.clone(), false)
            .mark_applied(&anchor, Some("서류검토"))
            .unwrap();
        Arc::try_unwrap(doc).ok().unwrap()
    }

    #[test]
    fn report_shows_local_time_and_badges() {
        let stats = RunStats {
            scanned: 5,
            fetched: 5,
            marked: 1,
            ..RunStats::default()
        };
        let at = Utc.with_ymd_and_hms(2026, 2, 24, 15, 30, 0).unwrap();
        let html = render_report(&marked_document(), &stats, "Asia/Seoul", at);

        assert!(html.contains("생성 시각: 2026-02-25 00:30:00 (Asia/Seoul)"));
        assert!(html.contains("발견: 5 / 조회: 5 / 실패: 0 / 캐시 적중: 0 / 표시: 1"));
        assert!(html.contains("지원완료 (서류검토)"));
        assert!(html.contains("opacity: 0.55"));
    }

    #[test]
    fn unknown_timezone_falls_back_to_seoul() {
        let at = Utc.with_ymd_and_hms(2026, 2, 24, 0, 0, 0).unwrap();
        let html = render_report(&marked_document(), &RunStats::default(), "Mars/Base", at);
        assert!(html.contains("(Asia/Seoul)"));
    }

    #[tokio::test]
    async fn write_replaces_previous_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("marked.html");
        fs::write(&path, "old").await.unwrap();

        write_report(&path, &marked_document(), &RunStats::default(), "Asia/Seoul")
            .await
            .unwrap();
        let written = fs::read_to_string(&path).await.unwrap();
        assert!(written.contains("지원완료"));
        assert!(!path.with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn background_writer_keeps_the_newest_submission() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("marked.html");

        let writer = ReportWriter::spawn(path.clone());
        writer.submit("first".to_string());
        writer.submit("second".to_string());
        writer.finish().await;

        assert_eq!(fs::read_to_string(&path).await.unwrap(), "second");
        assert!(!path.with_extension("tmp").exists());
    }
}
