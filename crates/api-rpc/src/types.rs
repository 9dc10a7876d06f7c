//! RPC Request/Response Types
//!
//! Every request carries `caller_uid`; uid 0 is the anonymous caller.

use ohq_core::domain::{CourseId, EntryId, QueueEntry, QueuePosition, QueueSummary, UserId};
use serde::{Deserialize, Serialize};

/// ohqueue.join.v1 / leave.v1 / position.v1 / status.v1 / take_next.v1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseRequest {
    pub caller_uid: UserId,
    pub course_id: CourseId,
}

/// ohqueue.list.v1 - Entries of a course, optionally one status only
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListRequest {
    pub caller_uid: UserId,
    pub course_id: CourseId,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse {
    pub course_id: CourseId,
    pub entries: Vec<QueueEntry>,
}

/// ohqueue.start.v1 / resolve.v1 / requeue.v1 / remove.v1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryRequest {
    pub caller_uid: UserId,
    pub entry_id: EntryId,
}

/// ohqueue.assign.v1 - helper defaults to the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignRequest {
    pub caller_uid: UserId,
    pub entry_id: EntryId,
    #[serde(default)]
    pub helper_uid: Option<UserId>,
}

/// ohqueue.status.v1 - what a student page shows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub summary: QueueSummary,
    pub active_entry: Option<QueueEntry>,
    pub position: QueuePosition,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TakeNextResponse {
    pub course_id: CourseId,
    pub entry: Option<QueueEntry>,
}

/// ohqueue.open.v1 - Open or close a course queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRequest {
    pub caller_uid: UserId,
    pub course_id: CourseId,
    pub open: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenResponse {
    pub course_id: CourseId,
    pub open: bool,
}
