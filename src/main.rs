mod api;
mod app;
mod cache;
mod config;
mod db;
mod dom;
mod domain;
mod infrastructure;
mod marker;
mod report;
mod store;
mod tasks;
#[cfg(test)]
mod testing;

use anyhow::Result;
use infrastructure::{directories, logging, shutdown};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = config::load_config()?;
    let paths = directories::ensure_directories(&config.directories, &config.page)?;
    logging::init_tracing(&config, &paths)?;

    let shutdown = shutdown::Shutdown::new();
    shutdown.install_signal_handlers();

    let app = app::MarkerApp::initialize(config, paths, shutdown.clone()).await?;
    app.run().await
}
