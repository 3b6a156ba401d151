//! # Call status store.
//!
//! Maintains the latest [`StatusRecord`] per target. Written by the dispatch
//! engine (pending / initiated / failed) and by pushed statuses from status
//! connections and the push stream.
//!
//! ## Architecture
//! ```text
//! DispatchEngine ──────────┐
//! ConnectionRegistry ──────┼──► CallStatusStore::upsert() ──► HashMap<TargetId, StatusRecord>
//! PushStream ──────────────┘
//! ```
//!
//! ## Rules
//! - **Observation ordering**: a record observed before the stored one
//!   (lower [`StatusRecord::seq`]) is rejected; on an equal stamp the later
//!   arrival wins. The stamp is monotonic, so wall-clock steps never
//!   reorder records. `observed_at` is informational.
//! - **No history**: only the latest record per target is kept.
//! - **Session scoped**: records are dropped only by [`CallStatusStore::clear`],
//!   which the engine calls when a new session starts.

use std::collections::{BTreeMap, HashMap};

use tokio::sync::RwLock;

use crate::model::{StatusKind, StatusRecord, TargetId};

/// Thread-safe map of target id to latest status record.
#[derive(Default)]
pub struct CallStatusStore {
    records: RwLock<HashMap<TargetId, StatusRecord>>,
}

impl CallStatusStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes `record` unless a newer one is already stored.
    ///
    /// ### Ordering
    /// ```text
    /// upsert(ringing,   seq=10) → applied
    /// upsert(initiated, seq=9)  → rejected (stale)
    /// upsert(answered,  seq=10) → applied (tie, later arrival)
    /// ```
    ///
    /// Returns `true` if the record was applied.
    pub async fn upsert(&self, record: StatusRecord) -> bool {
        self.upsert_latest(record).await.is_ok()
    }

    /// Same rule as [`upsert`](Self::upsert), reporting what the store holds
    /// afterwards: `Ok(applied)` or `Err(newer)` when `record` was stale.
    pub async fn upsert_latest(&self, record: StatusRecord) -> Result<StatusRecord, StatusRecord> {
        let mut records = self.records.write().await;
        if let Some(current) = records.get(&record.target_id) {
            if record.seq < current.seq {
                return Err(current.clone());
            }
        }
        records.insert(record.target_id.clone(), record.clone());
        Ok(record)
    }

    /// Latest record for a target.
    pub async fn get(&self, id: &TargetId) -> Option<StatusRecord> {
        self.records.read().await.get(id).cloned()
    }

    /// Copy of all current records.
    pub async fn snapshot(&self) -> HashMap<TargetId, StatusRecord> {
        self.records.read().await.clone()
    }

    /// Number of targets with a record.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// True if no target has a record.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Number of targets per status.
    pub async fn counts(&self) -> BTreeMap<StatusKind, usize> {
        let records = self.records.read().await;
        let mut counts = BTreeMap::new();
        for rec in records.values() {
            *counts.entry(rec.status).or_insert(0) += 1;
        }
        counts
    }

    /// Drops every record.
    pub async fn clear(&self) {
        self.records.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};

    fn rec(id: &str, status: StatusKind) -> StatusRecord {
        StatusRecord::new(TargetId::from(id), status)
    }

    #[tokio::test]
    async fn later_write_replaces_earlier() {
        let store = CallStatusStore::new();

        assert!(store.upsert(rec("1", StatusKind::Pending)).await);
        assert!(store.upsert(rec("1", StatusKind::Initiated).with_call_id("CA1")).await);

        let got = store.get(&TargetId::from("1")).await.unwrap();
        assert_eq!(got.status, StatusKind::Initiated);
        assert_eq!(got.external_call_id.as_deref(), Some("CA1"));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn stale_push_does_not_regress_newer_record() {
        let store = CallStatusStore::new();
        let ringing = rec("x", StatusKind::Ringing);
        let completed = rec("x", StatusKind::Completed);

        assert!(store.upsert(completed).await);
        assert!(!store.upsert(ringing).await);

        let got = store.get(&TargetId::from("x")).await.unwrap();
        assert_eq!(got.status, StatusKind::Completed);
    }

    #[tokio::test]
    async fn rejected_write_reports_the_stored_record() {
        let store = CallStatusStore::new();
        let pending = rec("x", StatusKind::Pending);
        let initiated = rec("x", StatusKind::Initiated).observed_with(&pending);
        store.upsert(pending).await;
        store.upsert(rec("x", StatusKind::Ringing).with_call_id("CA7")).await;

        let kept = store.upsert_latest(initiated).await.unwrap_err();
        assert_eq!(kept.status, StatusKind::Ringing);
        assert_eq!(kept.external_call_id.as_deref(), Some("CA7"));
    }

    #[tokio::test]
    async fn equal_stamps_resolve_by_arrival() {
        let store = CallStatusStore::new();
        let ringing = rec("x", StatusKind::Ringing);
        let answered = rec("x", StatusKind::Answered).observed_with(&ringing);

        store.upsert(ringing).await;
        assert!(store.upsert(answered).await);
        assert_eq!(
            store.get(&TargetId::from("x")).await.map(|r| r.status),
            Some(StatusKind::Answered)
        );
    }

    #[tokio::test]
    async fn wall_clock_going_backwards_does_not_reject_updates() {
        let store = CallStatusStore::new();
        let now = SystemTime::now();

        assert!(store.upsert(rec("x", StatusKind::Ringing).observed_at(now)).await);
        let stepped_back = rec("x", StatusKind::Completed).observed_at(now - Duration::from_secs(30));
        assert!(store.upsert(stepped_back).await);
        assert_eq!(
            store.get(&TargetId::from("x")).await.map(|r| r.status),
            Some(StatusKind::Completed)
        );
    }

    #[tokio::test]
    async fn absent_until_observed_and_cleared_on_demand() {
        let store = CallStatusStore::new();
        assert!(store.get(&TargetId::from("nobody")).await.is_none());
        assert!(store.is_empty().await);

        store.upsert(rec("a", StatusKind::Failed)).await;
        store.upsert(rec("b", StatusKind::Failed)).await;
        store.upsert(rec("c", StatusKind::Busy)).await;

        let counts = store.counts().await;
        assert_eq!(counts.get(&StatusKind::Failed), Some(&2));
        assert_eq!(counts.get(&StatusKind::Busy), Some(&1));
        assert_eq!(store.snapshot().await.len(), 3);

        store.clear().await;
        assert!(store.is_empty().await);
    }
}
