//! Shared fixtures: engines over each store, error extraction, and a macro
//! that runs one test body against every QueueStore implementation.

#![allow(dead_code)]

use ohq_core::domain::{CourseId, QueueConfig, QueueError, UserId};
use ohq_core::port::{ManualTimeProvider, QueueStore};
use ohq_core::{AppError, QueueEngine};
use ohq_infra_memory::MemoryQueueStore;
use ohq_infra_sqlite::{create_pool, run_migrations, SqliteQueueStore};
use std::sync::Arc;

pub const COURSE: CourseId = 101;
pub const OTHER_COURSE: CourseId = 202;
pub const TA: UserId = 900;
pub const TA2: UserId = 901;

/// Start of the manual clock; every clock read advances one second
pub const CLOCK_START: i64 = 1_700_000_000_000;
pub const CLOCK_STEP: i64 = 1_000;

pub fn memory_store() -> Arc<dyn QueueStore> {
    Arc::new(MemoryQueueStore::new())
}

pub async fn sqlite_store() -> Arc<dyn QueueStore> {
    let pool = create_pool("sqlite::memory:").await.unwrap();
    run_migrations(&pool).await.unwrap();
    Arc::new(SqliteQueueStore::new(pool))
}

pub fn engine_with(store: Arc<dyn QueueStore>, config: QueueConfig) -> QueueEngine {
    QueueEngine::new(
        store,
        Arc::new(ManualTimeProvider::new(CLOCK_START, CLOCK_STEP)),
        config,
    )
}

pub fn engine(store: Arc<dyn QueueStore>) -> QueueEngine {
    engine_with(store, QueueConfig::default())
}

/// Engine whose `COURSE` queue is already open
pub async fn open_engine(store: Arc<dyn QueueStore>) -> QueueEngine {
    let engine = engine(store);
    engine.set_queue_open(COURSE, true).await.unwrap();
    engine
}

/// Engine whose clock never advances, so every write shares one timestamp
pub async fn frozen_engine(store: Arc<dyn QueueStore>) -> QueueEngine {
    let engine = QueueEngine::new(
        store,
        Arc::new(ManualTimeProvider::frozen(CLOCK_START)),
        QueueConfig::default(),
    );
    engine.set_queue_open(COURSE, true).await.unwrap();
    engine
}

/// The queue rule a call violated; panics on success or infrastructure errors
pub fn queue_error<T: std::fmt::Debug>(result: ohq_core::Result<T>) -> QueueError {
    match result {
        Err(AppError::Domain(err)) => err,
        other => panic!("expected a queue error, got {:?}", other),
    }
}

/// Generate one `#[tokio::test]` per store for each listed test body.
///
/// Each body is an `async fn(Arc<dyn QueueStore>)` defined in the test file.
#[allow(unused_macros)]
macro_rules! for_each_store {
    ($($name:ident),* $(,)?) => {
        mod memory {
            $(
                #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
                async fn $name() {
                    super::$name(crate::common::memory_store()).await;
                }
            )*
        }

        mod sqlite {
            $(
                #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
                async fn $name() {
                    super::$name(crate::common::sqlite_store().await).await;
                }
            )*
        }
    };
}
