//! OHQ Daemon - Main Entry Point
//! Serves the office hours queue over JSON-RPC

mod logging;
mod settings;
mod telemetry;

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

use ohq_api_rpc::{RpcServer, RpcServerConfig};
use ohq_core::port::{QueueStore, StaticStaffDirectory, SystemTimeProvider};
use ohq_core::{IndexReconciler, QueueEngine};
use ohq_infra_memory::MemoryQueueStore;
use ohq_infra_sqlite::{create_pool, run_migrations, SqliteQueueStore};
use settings::{DaemonConfig, StoreKind};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize logging (guard keeps the file writer alive)
    let _log_guard = logging::init()?;
    info!("OHQ daemon v{} starting...", VERSION);

    // 2. Load configuration
    let config = DaemonConfig::load()?;
    info!(
        store = ?config.store,
        rpc_host = %config.rpc_host,
        rpc_port = config.rpc_port,
        enabled = config.enabled,
        staff = config.staff_uids.len(),
        "Configuration loaded"
    );

    // 3. Open the store
    let store = open_store(&config).await?;

    // 4. Repair indexes left behind by an interrupted run
    if config.reconcile_on_startup {
        info!("Running index reconciliation...");
        match IndexReconciler::new(store.clone()).reconcile_all().await {
            Ok(report) if report.is_clean() => {
                info!(courses = report.courses, "Indexes consistent")
            }
            Ok(report) => warn!(
                courses = report.courses,
                dangling_removed = report.dangling_removed,
                memberships_repaired = report.memberships_repaired,
                claims_rebuilt = report.claims_rebuilt,
                "Indexes repaired"
            ),
            Err(e) => error!(error = %e, "Index reconciliation failed"),
        }
    }

    // 5. Setup dependencies (DI wiring)
    let engine = Arc::new(QueueEngine::new(
        store,
        Arc::new(SystemTimeProvider),
        config.queue_config(),
    ));
    let staff = StaticStaffDirectory::new(config.staff_uids.iter().copied());
    if staff.is_empty() {
        warn!("No staff configured; staff-only methods will reject every caller");
    }

    // 6. Start JSON-RPC server
    let rpc_config = RpcServerConfig {
        host: config.rpc_host.clone(),
        port: config.rpc_port,
    };
    let (addr, rpc_handle) = RpcServer::new(rpc_config, engine, Arc::new(staff))
        .start()
        .await
        .context("RPC server start failed")?;

    info!(addr = %addr, "System ready. Press Ctrl+C to shutdown");

    // 7. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting gracefully...");

    // 8. Graceful shutdown
    if rpc_handle.stop().is_ok() {
        rpc_handle.stopped().await;
    }
    telemetry::shutdown();

    info!("Shutdown complete.");
    Ok(())
}

async fn open_store(config: &DaemonConfig) -> Result<Arc<dyn QueueStore>> {
    match config.store {
        StoreKind::Memory => {
            warn!("Using in-memory store; queue state is lost on shutdown");
            Ok(Arc::new(MemoryQueueStore::new()))
        }
        StoreKind::Sqlite => {
            let db_path = config.expanded_db_path();
            if let Some(parent) = Path::new(&db_path).parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }

            info!(db_path = %db_path, "Initializing database...");
            let pool = create_pool(&db_path)
                .await
                .context("DB pool creation failed")?;
            run_migrations(&pool).await.context("Migration failed")?;

            Ok(Arc::new(SqliteQueueStore::new(pool)))
        }
    }
}
