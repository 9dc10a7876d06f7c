// Queue Entry Domain Model

use crate::domain::error::{QueueError, Result};
use serde::{Deserialize, Serialize};

/// Entry ID (allocated from a store counter, never reused)
pub type EntryId = i64;

/// Course identifier (one independent queue per course)
pub type CourseId = i64;

/// User identifier; 0 means anonymous
pub type UserId = i64;

/// Entry lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Waiting,
    Assigned,
    InProgress,
    Done,
}

impl EntryStatus {
    pub const ALL: [EntryStatus; 4] = [
        EntryStatus::Waiting,
        EntryStatus::Assigned,
        EntryStatus::InProgress,
        EntryStatus::Done,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Waiting => "waiting",
            EntryStatus::Assigned => "assigned",
            EntryStatus::InProgress => "in_progress",
            EntryStatus::Done => "done",
        }
    }

    /// Parse the stored form; unknown strings yield None
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "waiting" => Some(EntryStatus::Waiting),
            "assigned" => Some(EntryStatus::Assigned),
            "in_progress" => Some(EntryStatus::InProgress),
            "done" => Some(EntryStatus::Done),
            _ => None,
        }
    }

    /// Anything but Done occupies the requester's single active slot
    pub fn is_active(&self) -> bool {
        *self != EntryStatus::Done
    }
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One requester's occupancy of a course queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: EntryId,
    pub course_id: CourseId,
    pub requester_id: UserId,
    pub status: EntryStatus,
    /// Set iff status != Waiting
    pub helper_id: Option<UserId>,
    pub joined_at: i64,  // epoch ms
    pub updated_at: i64, // epoch ms
}

impl QueueEntry {
    /// Create a waiting entry
    ///
    /// # Arguments
    ///
    /// * `id` - Entry ID (allocated by the store, not generated here)
    /// * `course_id` - Course the queue belongs to
    /// * `requester_id` - Joining user
    /// * `now_millis` - Join timestamp (injected, not system time)
    pub fn new(id: EntryId, course_id: CourseId, requester_id: UserId, now_millis: i64) -> Self {
        Self {
            id,
            course_id,
            requester_id,
            status: EntryStatus::Waiting,
            helper_id: None,
            joined_at: now_millis,
            updated_at: now_millis,
        }
    }

    fn invalid(&self, to: EntryStatus) -> QueueError {
        QueueError::InvalidState {
            from: self.status,
            to,
        }
    }

    /// Waiting -> Assigned
    pub fn assign(&mut self, helper_id: UserId, now_millis: i64) -> Result<()> {
        if self.status != EntryStatus::Waiting {
            return Err(self.invalid(EntryStatus::Assigned));
        }
        self.status = EntryStatus::Assigned;
        self.helper_id = Some(helper_id);
        self.updated_at = now_millis;
        Ok(())
    }

    /// Assigned -> InProgress
    pub fn start_session(&mut self, now_millis: i64) -> Result<()> {
        if self.status != EntryStatus::Assigned {
            return Err(self.invalid(EntryStatus::InProgress));
        }
        self.status = EntryStatus::InProgress;
        self.updated_at = now_millis;
        Ok(())
    }

    /// InProgress -> Done (terminal)
    pub fn resolve(&mut self, now_millis: i64) -> Result<()> {
        if self.status != EntryStatus::InProgress {
            return Err(self.invalid(EntryStatus::Done));
        }
        self.status = EntryStatus::Done;
        self.updated_at = now_millis;
        Ok(())
    }

    /// Any non-Done status -> Waiting, helper cleared
    ///
    /// `joined_at` is kept; the caller re-scores the waiting index with
    /// `updated_at` so the entry lands at the back of the line.
    pub fn requeue(&mut self, now_millis: i64) -> Result<()> {
        if self.status == EntryStatus::Done {
            return Err(self.invalid(EntryStatus::Waiting));
        }
        self.status = EntryStatus::Waiting;
        self.helper_id = None;
        self.updated_at = now_millis;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn waiting() -> QueueEntry {
        QueueEntry::new(1, 10, 100, 1_000)
    }

    #[test]
    fn test_new_entry_is_waiting_without_helper() {
        let entry = waiting();
        assert_eq!(entry.status, EntryStatus::Waiting);
        assert_eq!(entry.helper_id, None);
        assert_eq!(entry.joined_at, entry.updated_at);
    }

    #[test]
    fn test_full_lifecycle() {
        let mut entry = waiting();
        entry.assign(7, 2_000).unwrap();
        assert_eq!(entry.status, EntryStatus::Assigned);
        assert_eq!(entry.helper_id, Some(7));

        entry.start_session(3_000).unwrap();
        assert_eq!(entry.status, EntryStatus::InProgress);

        entry.resolve(4_000).unwrap();
        assert_eq!(entry.status, EntryStatus::Done);
        assert_eq!(entry.updated_at, 4_000);
        assert_eq!(entry.joined_at, 1_000);
    }

    #[test]
    fn test_assign_requires_waiting() {
        let mut entry = waiting();
        entry.assign(7, 2_000).unwrap();

        let err = entry.assign(8, 3_000).unwrap_err();
        assert_eq!(
            err,
            QueueError::InvalidState {
                from: EntryStatus::Assigned,
                to: EntryStatus::Assigned
            }
        );
        // Failed transition leaves the entry untouched
        assert_eq!(entry.helper_id, Some(7));
        assert_eq!(entry.updated_at, 2_000);
    }

    #[test]
    fn test_resolve_requires_in_progress() {
        let mut entry = waiting();
        assert!(entry.resolve(2_000).is_err());

        entry.assign(7, 2_000).unwrap();
        assert!(entry.resolve(3_000).is_err());
        assert_eq!(entry.status, EntryStatus::Assigned);
    }

    #[test]
    fn test_start_session_requires_assigned() {
        let mut entry = waiting();
        assert!(entry.start_session(2_000).is_err());
    }

    #[test]
    fn test_requeue_clears_helper() {
        let mut entry = waiting();
        entry.assign(7, 2_000).unwrap();
        entry.start_session(3_000).unwrap();

        entry.requeue(4_000).unwrap();
        assert_eq!(entry.status, EntryStatus::Waiting);
        assert_eq!(entry.helper_id, None);
        assert_eq!(entry.updated_at, 4_000);
        assert_eq!(entry.joined_at, 1_000);
    }

    #[test]
    fn test_done_is_terminal() {
        let mut entry = waiting();
        entry.assign(7, 2_000).unwrap();
        entry.start_session(3_000).unwrap();
        entry.resolve(4_000).unwrap();

        assert!(entry.requeue(5_000).is_err());
        assert!(entry.assign(7, 5_000).is_err());
        assert!(entry.start_session(5_000).is_err());
        assert!(entry.resolve(5_000).is_err());
        assert_eq!(entry.status, EntryStatus::Done);
    }

    #[test]
    fn test_status_string_forms() {
        for status in EntryStatus::ALL {
            assert_eq!(EntryStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(EntryStatus::parse("WAITING"), None);
        assert_eq!(EntryStatus::parse("bogus"), None);
        assert!(!EntryStatus::Done.is_active());
        assert!(EntryStatus::InProgress.is_active());
    }

    #[test]
    fn test_status_serde_matches_store_form() {
        let json = serde_json::to_string(&EntryStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
    }
}
