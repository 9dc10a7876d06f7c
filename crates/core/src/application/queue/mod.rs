// Queue Engine - per-course FIFO queue with entry lifecycle management

pub mod constants;
pub mod keys;
pub mod record;

use constants::*;

use crate::domain::{
    CourseId, EntryId, EntryStatus, QueueConfig, QueueEntry, QueueError, QueuePosition,
    QueueSummary, UserId,
};
use crate::error::{AppError, Result};
use crate::port::{QueueStore, TimeProvider, WriteBatch};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Office hours queue engine
///
/// Holds no in-process locks: every compound change goes to the store as one
/// guarded [`WriteBatch`], so any number of engines may share a store.
pub struct QueueEngine {
    store: Arc<dyn QueueStore>,
    time_provider: Arc<dyn TimeProvider>,
    config: QueueConfig,
}

impl QueueEngine {
    pub fn new(
        store: Arc<dyn QueueStore>,
        time_provider: Arc<dyn TimeProvider>,
        config: QueueConfig,
    ) -> Self {
        Self {
            store,
            time_provider,
            config,
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Read the open flag; a course that was never opened is closed
    pub async fn is_queue_open(&self, course_id: CourseId) -> Result<bool> {
        let value = self
            .store
            .get_field(&keys::course(course_id), keys::QUEUE_OPEN_FIELD)
            .await?;
        Ok(value.as_deref() == Some(QUEUE_OPEN))
    }

    /// Open or close a course queue. Existing entries are not touched.
    pub async fn set_queue_open(&self, course_id: CourseId, open: bool) -> Result<()> {
        let flag = if open { QUEUE_OPEN } else { QUEUE_CLOSED };
        let mut batch = WriteBatch::new();
        batch
            .set_field(&keys::course(course_id), keys::QUEUE_OPEN_FIELD, flag)
            .sorted_set_add(keys::COURSES, course_id, &course_id.to_string());
        self.store.apply(batch).await?;

        info!(course_id = %course_id, open = open, "Queue open flag updated");
        Ok(())
    }

    /// Add a requester to the back of a course queue
    ///
    /// The requester's active-entry claim is written in the same guarded batch
    /// as the entry, so two concurrent joins cannot both succeed. A claim left
    /// behind by a finished or vanished entry is taken over, guarded on that
    /// entry still being finished or gone.
    pub async fn join(&self, course_id: CourseId, requester_id: UserId) -> Result<QueueEntry> {
        if !self.config.enabled {
            return Err(QueueError::FeatureDisabled.into());
        }
        if !self.is_queue_open(course_id).await? {
            return Err(QueueError::QueueClosed(course_id).into());
        }

        let claims = keys::active_claims(course_id);
        let field = requester_id.to_string();
        let held = self.store.get_field(&claims, &field).await?;
        let stale = match held.as_deref().map(record::parse_member).transpose()? {
            Some(held_id) => match self.get_entry(held_id).await? {
                Some(holder) if holder.status.is_active() => {
                    return Err(already_joined(course_id, requester_id));
                }
                holder => Some((held_id, holder.map(|e| e.status))),
            },
            None => None,
        };

        let id = self
            .store
            .incr_field(keys::GLOBAL, keys::NEXT_ENTRY_ID_FIELD)
            .await?;
        let entry = QueueEntry::new(id, course_id, requester_id, self.time_provider.now_millis());
        let member = id.to_string();

        let mut batch = WriteBatch::new();
        batch.expect_field(&claims, &field, held.as_deref());
        if let Some((held_id, status)) = stale {
            debug!(
                course_id = %course_id,
                requester_id = %requester_id,
                stale_entry = %held_id,
                "Replacing stale active-entry claim"
            );
            batch.expect_field(
                &keys::entry(held_id),
                record::STATUS_FIELD,
                status.map(|s| s.as_str()),
            );
        }
        batch
            .set_field(&claims, &field, &member)
            .set_object(&keys::entry(id), record::encode(&entry))
            .sorted_set_add(&keys::full_index(course_id), entry.joined_at, &member)
            .sorted_set_add(
                &keys::status_index(course_id, EntryStatus::Waiting),
                entry.joined_at,
                &member,
            )
            .sorted_set_add(keys::COURSES, course_id, &course_id.to_string());

        if !self.store.apply(batch).await? {
            // The claim changed between our read and the write
            warn!(
                course_id = %course_id,
                requester_id = %requester_id,
                entry_id = %id,
                "Join lost the active-entry claim to a concurrent request"
            );
            return Err(already_joined(course_id, requester_id));
        }

        info!(
            course_id = %course_id,
            requester_id = %requester_id,
            entry_id = %id,
            "Requester joined queue"
        );
        Ok(entry)
    }

    /// Remove the requester's active entry; leaving forfeits history
    ///
    /// The delete is guarded on the active-entry claim rather than the status,
    /// so staff moving the entry between states does not block it.
    pub async fn leave(&self, course_id: CourseId, requester_id: UserId) -> Result<QueueEntry> {
        let claims = keys::active_claims(course_id);
        let field = requester_id.to_string();

        for attempt in 1..=DELETE_MAX_ATTEMPTS {
            let Some(entry) = self.active_entry(course_id, requester_id).await? else {
                return Err(QueueError::NotInQueue {
                    course_id,
                    requester_id,
                }
                .into());
            };

            let member = entry.id.to_string();
            let mut batch = delete_batch(&entry);
            batch
                .expect_field(&claims, &field, Some(member.as_str()))
                .delete_field(&claims, &field);

            if self.store.apply(batch).await? {
                info!(
                    course_id = %course_id,
                    requester_id = %requester_id,
                    entry_id = %entry.id,
                    status = %entry.status,
                    "Requester left queue"
                );
                return Ok(entry);
            }

            debug!(
                course_id = %course_id,
                requester_id = %requester_id,
                entry_id = %entry.id,
                attempt = attempt,
                "Active-entry claim changed during leave, re-reading"
            );
        }

        warn!(
            course_id = %course_id,
            requester_id = %requester_id,
            "leave gave up after repeated contention"
        );
        Err(AppError::Internal(format!(
            "leave of user {} in course {} kept losing to concurrent writes",
            requester_id, course_id
        )))
    }

    /// Staff removal of an entry in any status, history included
    pub async fn remove(&self, entry_id: EntryId) -> Result<QueueEntry> {
        for attempt in 1..=DELETE_MAX_ATTEMPTS {
            let entry = self.require_entry(entry_id).await?;
            let entry_key = keys::entry(entry_id);

            let mut batch = delete_batch(&entry);
            batch.expect_field(&entry_key, record::STATUS_FIELD, Some(entry.status.as_str()));
            if entry.status.is_active() {
                batch.delete_field(
                    &keys::active_claims(entry.course_id),
                    &entry.requester_id.to_string(),
                );
            }

            if self.store.apply(batch).await? {
                info!(
                    course_id = %entry.course_id,
                    entry_id = %entry_id,
                    status = %entry.status,
                    "Queue entry removed"
                );
                return Ok(entry);
            }

            debug!(
                entry_id = %entry_id,
                attempt = attempt,
                "Entry changed status during removal, re-reading"
            );
        }

        warn!(entry_id = %entry_id, "remove gave up after repeated contention");
        Err(AppError::Internal(format!(
            "removal of entry {} kept losing to concurrent writes",
            entry_id
        )))
    }

    /// Waiting -> Assigned
    pub async fn assign(&self, entry_id: EntryId, helper_id: UserId) -> Result<QueueEntry> {
        self.transition(entry_id, EntryStatus::Assigned, |entry, now| {
            entry.assign(helper_id, now)
        })
        .await
    }

    /// Assigned -> InProgress
    pub async fn start_session(&self, entry_id: EntryId) -> Result<QueueEntry> {
        self.transition(entry_id, EntryStatus::InProgress, |entry, now| {
            entry.start_session(now)
        })
        .await
    }

    /// InProgress -> Done; the record stays as history
    pub async fn resolve(&self, entry_id: EntryId) -> Result<QueueEntry> {
        self.transition(entry_id, EntryStatus::Done, |entry, now| entry.resolve(now))
            .await
    }

    /// Back of the waiting line, helper cleared
    pub async fn requeue(&self, entry_id: EntryId) -> Result<QueueEntry> {
        self.transition(entry_id, EntryStatus::Waiting, |entry, now| entry.requeue(now))
            .await
    }

    /// Claim the earliest waiting entry for `helper_id`; `None` if nobody waits
    pub async fn take_next(
        &self,
        course_id: CourseId,
        helper_id: UserId,
    ) -> Result<Option<QueueEntry>> {
        let waiting = keys::status_index(course_id, EntryStatus::Waiting);
        let mut lost: Option<EntryId> = None;

        for attempt in 1..=TAKE_NEXT_MAX_ATTEMPTS {
            let head = self.store.sorted_set_range(&waiting, 0, 0).await?;
            let Some(member) = head.first() else {
                return Ok(None);
            };
            let entry_id = record::parse_member(member)?;

            if lost == Some(entry_id) {
                lost = None;
                let observed = self.get_entry(entry_id).await?.map(|e| e.status);
                if observed == Some(EntryStatus::Waiting) {
                    // Requeued in the meantime, claim it normally
                    continue;
                }

                // Still at the head after a failed claim: the index is stale
                warn!(
                    course_id = %course_id,
                    entry_id = %entry_id,
                    status = ?observed,
                    "Dropping stale member from waiting index"
                );
                let mut batch = WriteBatch::new();
                batch
                    .expect_field(
                        &keys::entry(entry_id),
                        record::STATUS_FIELD,
                        observed.map(|s| s.as_str()),
                    )
                    .sorted_set_remove(&waiting, member);
                if !self.store.apply(batch).await? {
                    debug!(
                        course_id = %course_id,
                        entry_id = %entry_id,
                        "Entry moved again before the stale member was dropped"
                    );
                }
                continue;
            }

            match self.assign(entry_id, helper_id).await {
                Ok(entry) => return Ok(Some(entry)),
                Err(AppError::Domain(
                    QueueError::InvalidState { .. } | QueueError::EntryNotFound(_),
                )) => {
                    debug!(
                        course_id = %course_id,
                        entry_id = %entry_id,
                        attempt = attempt,
                        "Head of queue claimed concurrently, re-reading"
                    );
                    lost = Some(entry_id);
                }
                Err(e) => return Err(e),
            }
        }

        warn!(
            course_id = %course_id,
            helper_id = %helper_id,
            "take_next gave up after repeated contention"
        );
        Ok(None)
    }

    /// Entries of a course in join order
    ///
    /// A recognized status filter (`waiting`, `assigned`, `in_progress`, `done`)
    /// reads that status index instead; anything else falls back to the full index.
    pub async fn get_queue_by_cid(
        &self,
        course_id: CourseId,
        filter: Option<&str>,
    ) -> Result<Vec<QueueEntry>> {
        let status = filter.and_then(EntryStatus::parse);
        if let (Some(raw), None) = (filter, status) {
            debug!(course_id = %course_id, filter = %raw, "Ignoring unknown status filter");
        }

        let index = match status {
            Some(status) => keys::status_index(course_id, status),
            None => keys::full_index(course_id),
        };

        let entries = self.load_index(&index).await?;
        // The record's status is authoritative; index membership is a cache
        Ok(match status {
            Some(status) => entries.into_iter().filter(|e| e.status == status).collect(),
            None => entries,
        })
    }

    /// Rank of the requester's waiting entry with a linear wait estimate
    pub async fn get_position(
        &self,
        course_id: CourseId,
        requester_id: UserId,
    ) -> Result<QueuePosition> {
        let entry = match self.active_entry(course_id, requester_id).await? {
            Some(entry) if entry.status == EntryStatus::Waiting => entry,
            _ => return Ok(QueuePosition::NOT_WAITING),
        };

        let rank = self
            .store
            .sorted_set_rank(
                &keys::status_index(course_id, EntryStatus::Waiting),
                &entry.id.to_string(),
            )
            .await?;

        match rank {
            Some(rank) => Ok(QueuePosition::from_rank(rank, self.config.avg_service_ms)),
            None => {
                warn!(
                    course_id = %course_id,
                    entry_id = %entry.id,
                    "Waiting entry missing from waiting index"
                );
                Ok(QueuePosition::NOT_WAITING)
            }
        }
    }

    pub async fn get_entry(&self, entry_id: EntryId) -> Result<Option<QueueEntry>> {
        match self.store.get_object(&keys::entry(entry_id)).await? {
            Some(record) => Ok(Some(record::decode(&record)?)),
            None => Ok(None),
        }
    }

    /// The requester's current non-Done entry in a course
    pub async fn active_entry(
        &self,
        course_id: CourseId,
        requester_id: UserId,
    ) -> Result<Option<QueueEntry>> {
        let claim = self
            .store
            .get_field(&keys::active_claims(course_id), &requester_id.to_string())
            .await?;
        let Some(raw) = claim else {
            return Ok(None);
        };

        let entry = self.get_entry(record::parse_member(&raw)?).await?;
        Ok(entry.filter(|e| {
            e.status.is_active() && e.course_id == course_id && e.requester_id == requester_id
        }))
    }

    /// Open flag and per-status counts
    pub async fn summary(&self, course_id: CourseId) -> Result<QueueSummary> {
        let mut counts = [0u64; 4];
        for (slot, status) in counts.iter_mut().zip(EntryStatus::ALL) {
            *slot = self
                .store
                .sorted_set_card(&keys::status_index(course_id, status))
                .await?;
        }

        Ok(QueueSummary {
            course_id,
            open: self.is_queue_open(course_id).await?,
            waiting: counts[0],
            assigned: counts[1],
            in_progress: counts[2],
            done: counts[3],
        })
    }

    /// Every course that has had queue activity
    pub async fn courses(&self) -> Result<Vec<CourseId>> {
        self.store
            .sorted_set_range(keys::COURSES, 0, -1)
            .await?
            .iter()
            .map(|member| {
                member
                    .parse()
                    .map_err(|_| AppError::Corrupt(format!("bad course id '{}'", member)))
            })
            .collect()
    }

    async fn require_entry(&self, entry_id: EntryId) -> Result<QueueEntry> {
        self.get_entry(entry_id)
            .await?
            .ok_or_else(|| QueueError::EntryNotFound(entry_id).into())
    }

    async fn load_index(&self, index: &str) -> Result<Vec<QueueEntry>> {
        let members = self.store.sorted_set_range(index, 0, -1).await?;
        let ids = members
            .iter()
            .map(|m| record::parse_member(m))
            .collect::<Result<Vec<_>>>()?;
        let entry_keys: Vec<String> = ids.iter().map(|id| keys::entry(*id)).collect();

        let records = self.store.get_objects(&entry_keys).await?;
        records
            .iter()
            .flatten()
            .map(record::decode)
            .collect::<Result<Vec<_>>>()
    }

    /// Apply a status change as one guarded batch:
    /// record write + old index remove + new index add (+ claim release on Done)
    async fn transition<F>(&self, entry_id: EntryId, to: EntryStatus, change: F) -> Result<QueueEntry>
    where
        F: FnOnce(&mut QueueEntry, i64) -> crate::domain::error::Result<()>,
    {
        let current = self.require_entry(entry_id).await?;
        let mut next = current.clone();
        change(&mut next, self.time_provider.now_millis())?;

        let entry_key = keys::entry(entry_id);
        let member = entry_id.to_string();
        let mut batch = WriteBatch::new();
        batch
            .expect_field(&entry_key, record::STATUS_FIELD, Some(current.status.as_str()))
            .set_object(&entry_key, record::encode(&next))
            .sorted_set_remove(&keys::status_index(next.course_id, current.status), &member)
            // Score = time the entry entered its new status; requeue lands at the back
            .sorted_set_add(
                &keys::status_index(next.course_id, next.status),
                next.updated_at,
                &member,
            );
        if !next.status.is_active() {
            batch.delete_field(
                &keys::active_claims(next.course_id),
                &next.requester_id.to_string(),
            );
        }

        if !self.store.apply(batch).await? {
            return Err(self.conflict(entry_id, to).await);
        }

        info!(
            course_id = %next.course_id,
            entry_id = %entry_id,
            from = %current.status,
            to = %next.status,
            helper_id = ?next.helper_id,
            "Queue entry transitioned"
        );
        Ok(next)
    }

    /// Explain why a guarded batch did not apply
    async fn conflict(&self, entry_id: EntryId, to: EntryStatus) -> AppError {
        match self.get_entry(entry_id).await {
            Ok(Some(current)) => invalid_state(current.status, to),
            Ok(None) => QueueError::EntryNotFound(entry_id).into(),
            Err(e) => e,
        }
    }
}

/// Unguarded batch deleting an entry record and its membership in every index
fn delete_batch(entry: &QueueEntry) -> WriteBatch {
    let member = entry.id.to_string();
    let mut batch = WriteBatch::new();
    batch
        .delete_object(&keys::entry(entry.id))
        .sorted_set_remove(&keys::full_index(entry.course_id), &member);
    for status in EntryStatus::ALL {
        batch.sorted_set_remove(&keys::status_index(entry.course_id, status), &member);
    }
    batch
}

fn already_joined(course_id: CourseId, requester_id: UserId) -> AppError {
    QueueError::AlreadyJoined {
        course_id,
        requester_id,
    }
    .into()
}

fn invalid_state(from: EntryStatus, to: EntryStatus) -> AppError {
    QueueError::InvalidState { from, to }.into()
}
