// Queue Domain Model

use crate::domain::entry::CourseId;
use serde::{Deserialize, Serialize};

/// Average handling time per entry used by the wait estimate (10 minutes)
pub const DEFAULT_AVG_SERVICE_MS: i64 = 10 * 60 * 1000;

/// Engine configuration, passed in at construction
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Feature toggle; when false every join is rejected
    pub enabled: bool,
    /// Average time a helper spends on one entry (ms)
    pub avg_service_ms: i64,
}

impl QueueConfig {
    pub fn new(enabled: bool, avg_service_ms: i64) -> Self {
        Self {
            enabled,
            avg_service_ms,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self::new(true, DEFAULT_AVG_SERVICE_MS)
    }
}

/// Per-course gate on joining
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseQueueState {
    pub course_id: CourseId,
    pub is_open: bool,
}

/// Where a waiting requester stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuePosition {
    /// 1-based rank in the waiting line, -1 when not waiting
    pub position: i64,
    /// Number of entries strictly before this one
    pub ahead: i64,
    pub estimated_wait_ms: i64,
}

impl QueuePosition {
    /// Sentinel for a requester without a waiting entry
    pub const NOT_WAITING: QueuePosition = QueuePosition {
        position: -1,
        ahead: 0,
        estimated_wait_ms: 0,
    };

    /// Linear estimate: entries ahead times the average service time
    pub fn from_rank(rank: u64, avg_service_ms: i64) -> Self {
        let ahead = rank as i64;
        Self {
            position: ahead + 1,
            ahead,
            estimated_wait_ms: ahead * avg_service_ms,
        }
    }

    pub fn is_waiting(&self) -> bool {
        self.position > 0
    }
}

/// Open flag plus entry counts per status for one course
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSummary {
    pub course_id: CourseId,
    pub open: bool,
    pub waiting: u64,
    pub assigned: u64,
    pub in_progress: u64,
    pub done: u64,
}

impl QueueSummary {
    /// Entries that still need a helper's attention
    pub fn active(&self) -> u64 {
        self.waiting + self.assigned + self.in_progress
    }
}
