// In-memory QueueStore Implementation

use async_trait::async_trait;
use ohq_core::error::{AppError, Result};
use ohq_core::port::{QueueStore, Record, Score, WriteBatch, WriteOp};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

use crate::sorted_set::SortedSet;

#[derive(Debug, Default)]
struct State {
    objects: HashMap<String, Record>,
    sorted_sets: HashMap<String, SortedSet>,
    /// Insertion sequence shared by all sorted sets (tie-break for equal scores)
    seq: u64,
}

impl State {
    fn field(&self, key: &str, field: &str) -> Option<&String> {
        self.objects.get(key).and_then(|record| record.get(field))
    }

    fn set_field(&mut self, key: &str, field: &str, value: &str) {
        self.objects
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
    }

    fn delete_field(&mut self, key: &str, field: &str) {
        if let Some(record) = self.objects.get_mut(key) {
            record.remove(field);
            if record.is_empty() {
                self.objects.remove(key);
            }
        }
    }

    fn zadd(&mut self, key: &str, score: Score, member: &str) {
        self.seq += 1;
        let seq = self.seq;
        self.sorted_sets
            .entry(key.to_string())
            .or_default()
            .add(score, seq, member);
    }

    fn zrem(&mut self, key: &str, member: &str) {
        if let Some(set) = self.sorted_sets.get_mut(key) {
            set.remove(member);
            if set.is_empty() {
                self.sorted_sets.remove(key);
            }
        }
    }

    fn write(&mut self, op: WriteOp) {
        match op {
            WriteOp::SetObject { key, record } => {
                if record.is_empty() {
                    self.objects.remove(&key);
                } else {
                    self.objects.insert(key, record);
                }
            }
            WriteOp::DeleteObject { key } => {
                self.objects.remove(&key);
            }
            WriteOp::SetField { key, field, value } => self.set_field(&key, &field, &value),
            WriteOp::DeleteField { key, field } => self.delete_field(&key, &field),
            WriteOp::SortedSetAdd { key, score, member } => self.zadd(&key, score, &member),
            WriteOp::SortedSetRemove { key, member } => self.zrem(&key, &member),
        }
    }
}

/// QueueStore held in process memory behind one RwLock
///
/// Batches run under the write lock, so they are atomic with respect to
/// every other call on the same store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryQueueStore {
    state: RwLock<State>,
}

impl MemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueueStore for MemoryQueueStore {
    async fn get_field(&self, key: &str, field: &str) -> Result<Option<String>> {
        Ok(self.state.read().await.field(key, field).cloned())
    }

    async fn set_field(&self, key: &str, field: &str, value: &str) -> Result<()> {
        self.state.write().await.set_field(key, field, value);
        Ok(())
    }

    async fn incr_field(&self, key: &str, field: &str) -> Result<i64> {
        let mut state = self.state.write().await;
        let current: i64 = match state.field(key, field) {
            Some(raw) => raw.parse().map_err(|_| {
                AppError::Store(format!("{}.{} is not an integer: '{}'", key, field, raw))
            })?,
            None => 0,
        };
        let next = current + 1;
        state.set_field(key, field, &next.to_string());
        Ok(next)
    }

    async fn get_object(&self, key: &str) -> Result<Option<Record>> {
        Ok(self.state.read().await.objects.get(key).cloned())
    }

    async fn get_objects(&self, keys: &[String]) -> Result<Vec<Option<Record>>> {
        let state = self.state.read().await;
        Ok(keys.iter().map(|key| state.objects.get(key).cloned()).collect())
    }

    async fn set_object(&self, key: &str, record: &Record) -> Result<()> {
        self.state.write().await.write(WriteOp::SetObject {
            key: key.to_string(),
            record: record.clone(),
        });
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        self.state.write().await.objects.remove(key);
        Ok(())
    }

    async fn sorted_set_add(&self, key: &str, score: Score, member: &str) -> Result<()> {
        self.state.write().await.zadd(key, score, member);
        Ok(())
    }

    async fn sorted_set_remove(&self, key: &str, member: &str) -> Result<()> {
        self.state.write().await.zrem(key, member);
        Ok(())
    }

    async fn sorted_set_range(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>> {
        let state = self.state.read().await;
        Ok(state
            .sorted_sets
            .get(key)
            .map(|set| set.range(start, stop))
            .unwrap_or_default())
    }

    async fn sorted_set_card(&self, key: &str) -> Result<u64> {
        let state = self.state.read().await;
        Ok(state.sorted_sets.get(key).map_or(0, |set| set.len() as u64))
    }

    async fn sorted_set_rank(&self, key: &str, member: &str) -> Result<Option<u64>> {
        let state = self.state.read().await;
        Ok(state.sorted_sets.get(key).and_then(|set| set.rank(member)))
    }

    async fn apply(&self, batch: WriteBatch) -> Result<bool> {
        let mut state = self.state.write().await;

        for guard in batch.guards() {
            let actual = state.field(&guard.key, &guard.field).map(String::as_str);
            if actual != guard.expected.as_deref() {
                debug!(
                    key = %guard.key,
                    field = %guard.field,
                    expected = ?guard.expected,
                    actual = ?actual,
                    "Batch guard failed"
                );
                return Ok(false);
            }
        }

        for op in batch.ops() {
            state.write(op.clone());
        }
        Ok(true)
    }
}
