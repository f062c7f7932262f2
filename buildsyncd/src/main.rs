use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use buildsync::Orchestrator;
use buildsync::config::JsonConfigStore;
use buildsync::deploy::SshDeployer;
use buildsync::events::EventBus;
use buildsync::history::JsonHistoryStore;
use buildsync::scanner::FsArtifactScanner;

use buildsyncd::api::{self, ApiServerConfig, AppState};
use buildsyncd::logging;

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let data_dir = PathBuf::from(
        std::env::var("BUILDSYNC_DATA_DIR").unwrap_or_else(|_| "data".to_string()),
    );
    std::fs::create_dir_all(&data_dir)?;
    let _log_guard = logging::init(&data_dir.join("logs"));

    let events = EventBus::new();
    let orchestrator = Orchestrator::new(
        events.clone(),
        Arc::new(JsonConfigStore::new(data_dir.join("config.json"))),
        Arc::new(JsonHistoryStore::new(data_dir.join("history.json"))),
        Arc::new(FsArtifactScanner::new(events.clone())),
        Arc::new(SshDeployer::new(events.clone())),
    );
    orchestrator.spawn_event_pumps();
    info!("buildsyncd initialized, data dir: {}", data_dir.display());

    if env_flag("BUILDSYNC_AUTOSTART") {
        if let Err(e) = orchestrator.start().await {
            error!("Autostart failed: {}", e);
        }
    }

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown signal received");
                orchestrator.shutdown().await;
                shutdown.cancel();
            }
        });
    }

    let state = AppState {
        start_time: Instant::now(),
        orchestrator,
    };
    api::serve(state, ApiServerConfig::from_env_or_default(), shutdown).await
}
