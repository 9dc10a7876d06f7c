// Store key layout. Every per-course key is scoped by course id.

use crate::domain::{CourseId, EntryId, EntryStatus};

/// Hash holding system-wide counters
pub const GLOBAL: &str = "global";
pub const NEXT_ENTRY_ID_FIELD: &str = "nextQueueEntryId";

/// Field of the course hash holding the open flag
pub const QUEUE_OPEN_FIELD: &str = "queueOpen";

/// Sorted set of every course with queue activity (score = course id)
pub const COURSES: &str = "courses:queue";

pub fn course(course_id: CourseId) -> String {
    format!("course:{}", course_id)
}

pub fn entry(entry_id: EntryId) -> String {
    format!("queue:entry:{}", entry_id)
}

/// All entries of a course ordered by join time
pub fn full_index(course_id: CourseId) -> String {
    format!("course:{}:queue", course_id)
}

pub fn status_index(course_id: CourseId, status: EntryStatus) -> String {
    format!("course:{}:queue:{}", course_id, status.as_str())
}

/// Hash: requester id -> id of the requester's active entry
pub fn active_claims(course_id: CourseId) -> String {
    format!("course:{}:queue:active", course_id)
}
