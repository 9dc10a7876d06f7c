// Index reconciliation (crash recovery for partially applied index moves)
use crate::application::queue::{keys, record};
use crate::domain::{CourseId, EntryStatus, QueueEntry};
use crate::error::Result;
use crate::port::{QueueStore, Record};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

/// What a reconciliation pass repaired
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub courses: usize,
    /// Full-index members whose record no longer exists
    pub dangling_removed: usize,
    /// Status-index memberships added or removed
    pub memberships_repaired: usize,
    /// Active-entry claims written or dropped
    pub claims_rebuilt: usize,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.dangling_removed == 0 && self.memberships_repaired == 0 && self.claims_rebuilt == 0
    }

    fn absorb(&mut self, other: ReconcileReport) {
        self.courses += other.courses;
        self.dangling_removed += other.dangling_removed;
        self.memberships_repaired += other.memberships_repaired;
        self.claims_rebuilt += other.claims_rebuilt;
    }
}

/// Rebuilds status indexes and active claims from the full index
///
/// On startup, every entry's `status` field is treated as authoritative and
/// index membership as a cache. Must run while no engine traffic is served.
pub struct IndexReconciler {
    store: Arc<dyn QueueStore>,
}

impl IndexReconciler {
    pub fn new(store: Arc<dyn QueueStore>) -> Self {
        Self { store }
    }

    /// Reconcile every course listed in the course registry
    pub async fn reconcile_all(&self) -> Result<ReconcileReport> {
        let members = self.store.sorted_set_range(keys::COURSES, 0, -1).await?;
        let mut report = ReconcileReport::default();

        for member in members {
            match member.parse::<CourseId>() {
                Ok(course_id) => report.absorb(self.reconcile_course(course_id).await?),
                Err(_) => warn!(member = %member, "Skipping malformed course registry member"),
            }
        }

        info!(
            courses = report.courses,
            dangling_removed = report.dangling_removed,
            memberships_repaired = report.memberships_repaired,
            claims_rebuilt = report.claims_rebuilt,
            "Index reconciliation complete"
        );
        Ok(report)
    }

    /// Reconcile one course
    ///
    /// Algorithm:
    /// 1. Load every member of the full index; drop members without a record
    /// 2. For each status index, drop members whose record has another status
    /// 3. Add every entry missing from the index matching its status
    /// 4. Rewrite the active-claim hash from the active entries
    pub async fn reconcile_course(&self, course_id: CourseId) -> Result<ReconcileReport> {
        let mut report = ReconcileReport {
            courses: 1,
            ..Default::default()
        };

        let full = keys::full_index(course_id);
        let members = self.store.sorted_set_range(&full, 0, -1).await?;
        let entry_keys: Vec<String> = members
            .iter()
            .map(|m| record::parse_member(m).map(keys::entry))
            .collect::<Result<_>>()?;
        let records = self.store.get_objects(&entry_keys).await?;

        let mut entries: Vec<QueueEntry> = Vec::with_capacity(records.len());
        for (member, maybe_record) in members.iter().zip(records) {
            match maybe_record {
                Some(rec) => entries.push(record::decode(&rec)?),
                None => {
                    warn!(course_id = %course_id, entry = %member, "Dropping dangling index member");
                    self.store.sorted_set_remove(&full, member).await?;
                    report.dangling_removed += 1;
                }
            }
        }

        let by_id: HashMap<String, &QueueEntry> =
            entries.iter().map(|e| (e.id.to_string(), e)).collect();

        for status in EntryStatus::ALL {
            let index = keys::status_index(course_id, status);
            let indexed: HashSet<String> = self
                .store
                .sorted_set_range(&index, 0, -1)
                .await?
                .into_iter()
                .collect();

            for member in &indexed {
                let belongs = by_id.get(member).is_some_and(|e| e.status == status);
                if !belongs {
                    warn!(
                        course_id = %course_id,
                        entry = %member,
                        index = %status,
                        "Removing entry from wrong status index"
                    );
                    self.store.sorted_set_remove(&index, member).await?;
                    report.memberships_repaired += 1;
                }
            }

            for entry in entries.iter().filter(|e| e.status == status) {
                let member = entry.id.to_string();
                if !indexed.contains(&member) {
                    warn!(
                        course_id = %course_id,
                        entry_id = %entry.id,
                        index = %status,
                        "Restoring missing status index membership"
                    );
                    self.store
                        .sorted_set_add(&index, entry.updated_at, &member)
                        .await?;
                    report.memberships_repaired += 1;
                }
            }
        }

        report.claims_rebuilt = self.rebuild_claims(course_id, &entries).await?;
        Ok(report)
    }

    async fn rebuild_claims(&self, course_id: CourseId, entries: &[QueueEntry]) -> Result<usize> {
        let claims_key = keys::active_claims(course_id);

        // Entries are in join order, so the earliest active entry wins a duplicate
        let mut expected = Record::new();
        for entry in entries.iter().filter(|e| e.status.is_active()) {
            let field = entry.requester_id.to_string();
            if expected.contains_key(&field) {
                warn!(
                    course_id = %course_id,
                    requester_id = %entry.requester_id,
                    entry_id = %entry.id,
                    "Requester holds more than one active entry"
                );
                continue;
            }
            expected.insert(field, entry.id.to_string());
        }

        let current = self.store.get_object(&claims_key).await?.unwrap_or_default();
        if current == expected {
            return Ok(0);
        }

        let changed = expected
            .iter()
            .filter(|(field, value)| current.get(*field) != Some(*value))
            .count()
            + current.keys().filter(|field| !expected.contains_key(*field)).count();

        if expected.is_empty() {
            self.store.delete_object(&claims_key).await?;
        } else {
            self.store.set_object(&claims_key, &expected).await?;
        }
        Ok(changed)
    }
}
