// Queue engine constants (no magic values)

/// How many times take_next re-reads the head of the waiting index after
/// losing it to a concurrent claim
pub const TAKE_NEXT_MAX_ATTEMPTS: usize = 3;

/// How many times leave and remove re-read an entry whose guarded delete lost
/// to a concurrent write
pub const DELETE_MAX_ATTEMPTS: usize = 3;

/// Stored value of the open flag
pub const QUEUE_OPEN: &str = "1";
pub const QUEUE_CLOSED: &str = "0";
