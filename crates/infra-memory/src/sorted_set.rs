// Ordered set keyed by (score, insertion sequence)

use ohq_core::port::{normalize_range, Score};
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Default, Clone)]
pub(crate) struct SortedSet {
    positions: HashMap<String, (Score, u64)>,
    order: BTreeSet<(Score, u64, String)>,
}

impl SortedSet {
    /// Insert or re-score; `seq` must come from a store-wide increasing counter
    pub(crate) fn add(&mut self, score: Score, seq: u64, member: &str) {
        if let Some((old_score, old_seq)) = self.positions.insert(member.to_string(), (score, seq))
        {
            self.order.remove(&(old_score, old_seq, member.to_string()));
        }
        self.order.insert((score, seq, member.to_string()));
    }

    pub(crate) fn remove(&mut self, member: &str) -> bool {
        match self.positions.remove(member) {
            Some((score, seq)) => self.order.remove(&(score, seq, member.to_string())),
            None => false,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub(crate) fn range(&self, start: i64, stop: i64) -> Vec<String> {
        let range = normalize_range(self.len(), start, stop);
        self.order
            .iter()
            .skip(range.start)
            .take(range.len())
            .map(|(_, _, member)| member.clone())
            .collect()
    }

    pub(crate) fn rank(&self, member: &str) -> Option<u64> {
        let (score, seq) = self.positions.get(member)?;
        Some(self.order.range(..(*score, *seq, member.to_string())).count() as u64)
    }
}
