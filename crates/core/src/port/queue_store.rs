// Queue Store Port (Interface)
//
// Abstract hash-object + sorted-set store. Adapters: ohq-infra-memory, ohq-infra-sqlite.

use crate::error::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::ops::Range;

/// Hash object: field -> value
pub type Record = BTreeMap<String, String>;

/// Sorted-set score (epoch ms for every index the engine keeps)
pub type Score = i64;

/// A single mutation inside a [`WriteBatch`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    /// Replace the whole object
    SetObject { key: String, record: Record },
    DeleteObject { key: String },
    SetField {
        key: String,
        field: String,
        value: String,
    },
    DeleteField { key: String, field: String },
    /// Insert, or move an existing member to the new score at the back of its ties
    SortedSetAdd {
        key: String,
        score: Score,
        member: String,
    },
    SortedSetRemove { key: String, member: String },
}

/// Precondition checked atomically before a batch is written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldGuard {
    pub key: String,
    pub field: String,
    /// `None` means the field must be absent
    pub expected: Option<String>,
}

/// Mutations applied all-or-nothing, optionally guarded by field checks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    guards: Vec<FieldGuard>,
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expect_field(&mut self, key: &str, field: &str, expected: Option<&str>) -> &mut Self {
        self.guards.push(FieldGuard {
            key: key.to_string(),
            field: field.to_string(),
            expected: expected.map(str::to_string),
        });
        self
    }

    pub fn set_object(&mut self, key: &str, record: Record) -> &mut Self {
        self.ops.push(WriteOp::SetObject {
            key: key.to_string(),
            record,
        });
        self
    }

    pub fn delete_object(&mut self, key: &str) -> &mut Self {
        self.ops.push(WriteOp::DeleteObject {
            key: key.to_string(),
        });
        self
    }

    pub fn set_field(&mut self, key: &str, field: &str, value: &str) -> &mut Self {
        self.ops.push(WriteOp::SetField {
            key: key.to_string(),
            field: field.to_string(),
            value: value.to_string(),
        });
        self
    }

    pub fn delete_field(&mut self, key: &str, field: &str) -> &mut Self {
        self.ops.push(WriteOp::DeleteField {
            key: key.to_string(),
            field: field.to_string(),
        });
        self
    }

    pub fn sorted_set_add(&mut self, key: &str, score: Score, member: &str) -> &mut Self {
        self.ops.push(WriteOp::SortedSetAdd {
            key: key.to_string(),
            score,
            member: member.to_string(),
        });
        self
    }

    pub fn sorted_set_remove(&mut self, key: &str, member: &str) -> &mut Self {
        self.ops.push(WriteOp::SortedSetRemove {
            key: key.to_string(),
            member: member.to_string(),
        });
        self
    }

    pub fn guards(&self) -> &[FieldGuard] {
        &self.guards
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Repository interface for queue state
///
/// Sorted sets order members by (score, insertion sequence): equal scores keep
/// the order in which members were added. Every single-key method is atomic.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Read one field of a hash object
    async fn get_field(&self, key: &str, field: &str) -> Result<Option<String>>;

    /// Write one field of a hash object (creating the object if needed)
    async fn set_field(&self, key: &str, field: &str, value: &str) -> Result<()>;

    /// Atomically increment an integer field (missing counts as 0), returning the new value
    async fn incr_field(&self, key: &str, field: &str) -> Result<i64>;

    /// Read a whole hash object
    async fn get_object(&self, key: &str) -> Result<Option<Record>>;

    /// Read many hash objects, preserving order
    async fn get_objects(&self, keys: &[String]) -> Result<Vec<Option<Record>>> {
        let mut records = Vec::with_capacity(keys.len());
        for key in keys {
            records.push(self.get_object(key).await?);
        }
        Ok(records)
    }

    /// Replace a whole hash object
    async fn set_object(&self, key: &str, record: &Record) -> Result<()>;

    /// Delete a hash object (no-op if missing)
    async fn delete_object(&self, key: &str) -> Result<()>;

    /// Add a member, or re-score an existing one
    async fn sorted_set_add(&self, key: &str, score: Score, member: &str) -> Result<()>;

    /// Remove a member (no-op if missing)
    async fn sorted_set_remove(&self, key: &str, member: &str) -> Result<()>;

    /// Members between `start` and `stop` inclusive; negative indexes count from the end
    async fn sorted_set_range(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>>;

    /// Number of members
    async fn sorted_set_card(&self, key: &str) -> Result<u64>;

    /// 0-based rank of a member
    async fn sorted_set_rank(&self, key: &str, member: &str) -> Result<Option<u64>>;

    /// Apply a batch atomically.
    ///
    /// Returns `false` (and writes nothing) when any guard does not hold.
    async fn apply(&self, batch: WriteBatch) -> Result<bool>;
}

/// Resolve Redis-style inclusive `start..=stop` indexes against a set of `len` members
pub fn normalize_range(len: usize, start: i64, stop: i64) -> Range<usize> {
    let len_i = len as i64;
    let start = if start < 0 { (len_i + start).max(0) } else { start };
    let stop = if stop < 0 { len_i + stop } else { stop.min(len_i - 1) };

    if len == 0 || start > stop || start >= len_i {
        return 0..0;
    }
    (start as usize)..(stop as usize + 1)
}
