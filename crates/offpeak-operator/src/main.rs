use std::sync::Arc;
use tracing::info;

mod watcher;

use offpeak_cluster::kube::KubeCluster;
use offpeak_core::config::{OperatorConfig, StoreDriver};
use offpeak_store::{PostgresScalingStore, ScalingStore, SqliteScalingStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "offpeak=info,offpeak_operator=info".into()),
        )
        .init();

    // load config: explicit path > OFFPEAK_CONFIG env > ./offpeak.toml
    let config_path = std::env::var("OFFPEAK_CONFIG").ok();
    let config = OperatorConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        OperatorConfig::default()
    });

    let store = build_store(&config).await?;
    let client = Arc::new(KubeCluster::connect().await?);

    info!(
        policy_path = %config.policy.path,
        poll_secs = config.policy.poll,
        persistence = config.persistence.enabled,
        "offpeak operator starting"
    );

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let watcher = watcher::PolicyWatcher::new(config, client, store);
    let handle = tokio::spawn(watcher.run(shutdown_rx));

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);
    handle.await?;
    Ok(())
}

/// Open the configured replica store, or none when persistence is off.
async fn build_store(config: &OperatorConfig) -> anyhow::Result<Option<Arc<dyn ScalingStore>>> {
    if !config.persistence.enabled {
        return Ok(None);
    }
    let store: Arc<dyn ScalingStore> = match config.persistence.driver {
        StoreDriver::Sqlite => {
            ensure_parent_dir(&config.persistence.path);
            info!(path = %config.persistence.path, "opening SQLite replica store");
            Arc::new(SqliteScalingStore::open(&config.persistence.path)?)
        }
        StoreDriver::Postgres => {
            let url = config
                .persistence
                .url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("persistence.url is required for postgres"))?;
            info!("connecting to Postgres replica store");
            Arc::new(PostgresScalingStore::connect(url).await?)
        }
    };
    Ok(Some(store))
}

/// Ensure the parent directory for a file path exists.
fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}
