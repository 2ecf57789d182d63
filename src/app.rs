use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use chrono::Utc;
use reqwest::Client;
use tokio::{task::JoinHandle, time::timeout};
use url::Url;

use crate::{
    api::{DetailsApi, WantedClient},
    config::AppConfig,
    db::{self, kv_store::SqliteKvStore},
    dom::{snapshot::SnapshotFeed, MemoryDocument},
    domain::{system_clock, RunStats},
    infrastructure::{directories::ResolvedPaths, shutdown::Shutdown},
    marker::MarkerController,
    report::{render_report, write_report, ReportWriter},
    store::{KeyValueStore, MemoryStore},
};

/// Where verdicts persist between runs.
enum StoreHandle {
    Sqlite(Arc<SqliteKvStore>),
    Memory(Arc<MemoryStore>),
}

impl StoreHandle {
    fn shared(&self) -> Arc<dyn KeyValueStore> {
        match self {
            StoreHandle::Sqlite(store) => store.clone(),
            StoreHandle::Memory(store) => store.clone(),
        }
    }

    async fn close(&self) {
        if let StoreHandle::Sqlite(store) = self {
            store.close().await;
        }
    }
}

pub struct MarkerApp {
    paths: ResolvedPaths,
    config: Arc<AppConfig>,
    store: StoreHandle,
    api: Arc<dyn DetailsApi>,
    document: Arc<MemoryDocument>,
    feed: SnapshotFeed,
    shutdown: Shutdown,
}

impl MarkerApp {
    pub async fn initialize(
        config: AppConfig,
        paths: ResolvedPaths,
        shutdown: Shutdown,
    ) -> Result<Self> {
        let config = Arc::new(config);

        let store = if config.marker.ephemeral_store {
            tracing::warn!(target: "store", "휘발성 저장소 사용: 캐시가 종료 시 사라집니다");
            StoreHandle::Memory(Arc::new(MemoryStore::new()))
        } else {
            let pool = db::init_pool(&paths.db_path).await?;
            StoreHandle::Sqlite(Arc::new(SqliteKvStore::new(pool)))
        };

        let http_client = Client::builder()
            .user_agent(format!("wanted-applied-marker/{}", env!("CARGO_PKG_VERSION")))
            .build()?;
        let api: Arc<dyn DetailsApi> = Arc::new(WantedClient::new(http_client, config.api.clone())?);

        let base_url = Url::parse(&config.page.base_url)
            .with_context(|| format!("invalid PAGE_BASE_URL {:?}", config.page.base_url))?;
        let document = Arc::new(MemoryDocument::new(base_url));
        let feed = SnapshotFeed::new(&paths.snapshot_path);

        Ok(Self {
            paths,
            config,
            store,
            api,
            document,
            feed,
            shutdown,
        })
    }

    pub async fn run(self) -> Result<()> {
        let MarkerApp {
            paths,
            config,
            store,
            api,
            document,
            mut feed,
            shutdown,
        } = self;

        tracing::info!(target: "lifecycle", "지원 완료 표시기 시작");

        let imported = feed.sync(&document).await?;
        tracing::info!(
            target: "feed",
            imported,
            path = %feed.path().display(),
            "페이지 스냅샷 로드 완료"
        );

        let mut controller = MarkerController::new(
            document.clone(),
            store.shared(),
            api,
            &config.marker,
            system_clock(),
        )
        .await;

        let stats = if config.page.run_once {
            let mut shutdown_listener = shutdown.subscribe();
            controller.scan_and_apply();
            tokio::select! {
                _ = controller.settle() => {}
                _ = shutdown_listener.notified() => {}
            }
            if shutdown_listener.is_triggered() {
                tracing::info!(target: "lifecycle", "종료 신호 감지 (CTRL+C / SIGTERM)");
            }
            controller.stats()
        } else {
            let mut feed_handle = feed.spawn(
                document.clone(),
                config.page.poll_interval,
                shutdown.subscribe(),
            );

            let reports = ReportWriter::spawn(paths.report_path.clone());
            let report_document = document.clone();
            let timezone = config.timezone.clone();
            let stats = controller
                .run(shutdown.subscribe(), |stats| {
                    reports.submit(render_report(&report_document, &stats, &timezone, Utc::now()));
                })
                .await;
            reports.finish().await;
            tracing::info!(target: "lifecycle", "종료 신호 감지 (CTRL+C / SIGTERM)");

            shutdown.trigger();
            stop_feed(&mut feed_handle).await;
            stats
        };

        persist_report(&paths.report_path, &document, &stats, &config.timezone).await;
        tracing::info!(
            target: "lifecycle",
            rescans = stats.rescans,
            scanned = stats.scanned,
            cache_hits = stats.cache_hits,
            joined = stats.joined,
            fetched = stats.fetched,
            failed = stats.failed,
            marked = stats.marked,
            report = %paths.report_path.display(),
            "실행 요약"
        );

        let shutdown_timeout = Duration::from_secs(5);
        if timeout(shutdown_timeout, store.close()).await.is_err() {
            tracing::warn!(
                target: "store",
                "저장소 정리가 {:?} 내에 완료되지 않았습니다.",
                shutdown_timeout
            );
        }

        tracing::info!(target: "lifecycle", "표시기 종료 완료");
        Ok(())
    }
}

async fn persist_report(
    path: &std::path::Path,
    document: &MemoryDocument,
    stats: &RunStats,
    timezone: &str,
) {
    if let Err(err) = write_report(path, document, stats, timezone).await {
        tracing::warn!(target: "report", error = %err, "리포트 저장 실패");
    }
}

async fn stop_feed(handle: &mut JoinHandle<()>) {
    let shutdown_timeout = Duration::from_secs(5);
    let wait = tokio::time::sleep(shutdown_timeout);
    tokio::pin!(wait);
    tokio::select! {
        res = &mut *handle => {
            if let Err(err) = res {
                if err.is_panic() {
                    tracing::error!(target: "feed", "스냅샷 감시 작업이 패닉으로 종료되었습니다");
                }
            }
        }
        _ = &mut wait => {
            tracing::warn!(
                target: "feed",
                "스냅샷 감시 종료가 {:?} 내에 완료되지 않아 작업을 중단합니다",
                shutdown_timeout
            );
            handle.abort();
        }
    }
}
