// Domain Error Types

use crate::domain::entry::{CourseId, EntryId, EntryStatus, UserId};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("Office hours queue is disabled")]
    FeatureDisabled,

    #[error("Queue for course {0} is closed")]
    QueueClosed(CourseId),

    #[error("User {requester_id} already has an active entry in course {course_id}")]
    AlreadyJoined {
        course_id: CourseId,
        requester_id: UserId,
    },

    #[error("User {requester_id} is not in the queue for course {course_id}")]
    NotInQueue {
        course_id: CourseId,
        requester_id: UserId,
    },

    #[error("Queue entry not found: {0}")]
    EntryNotFound(EntryId),

    #[error("Invalid queue entry transition: {from} -> {to}")]
    InvalidState { from: EntryStatus, to: EntryStatus },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

pub type Result<T> = std::result::Result<T, QueueError>;
