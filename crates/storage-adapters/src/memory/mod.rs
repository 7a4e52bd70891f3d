//! # In-memory repositories
//!
//! One [`MemoryStore`] implements every repository port plus [`IdSequence`].
//! Unique keys (email, subject code per year, attendance and result keys)
//! are enforced through secondary index maps claimed with `entry()`, so two
//! concurrent writers cannot both win.
//!
//! Used by the integration tests and by the binary when no database is
//! configured. Nothing survives a restart.

mod academics;
mod inbox;
mod people;

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use domains::models::{
    Assignment, AttendanceKey, AttendanceSheet, Notification, Page, PageRequest, Parent,
    ResultKey, ResultRecord, Student, Subject, Teacher, User,
};
use domains::ports::{IdSequence, Repositories};
use domains::Result;
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryStore {
    users: DashMap<Uuid, User>,
    emails: DashMap<String, Uuid>,
    students: DashMap<Uuid, Student>,
    teachers: DashMap<Uuid, Teacher>,
    parents: DashMap<Uuid, Parent>,
    subjects: DashMap<Uuid, Subject>,
    subject_codes: DashMap<(String, String), Uuid>,
    assignments: DashMap<Uuid, Assignment>,
    attendance: DashMap<Uuid, AttendanceSheet>,
    attendance_keys: DashMap<AttendanceKey, Uuid>,
    results: DashMap<Uuid, ResultRecord>,
    result_keys: DashMap<ResultKey, Uuid>,
    notifications: DashMap<Uuid, Notification>,
    sequences: DashMap<String, u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hands the same store out as every repository port.
    pub fn repositories(self: &Arc<Self>) -> Repositories {
        Repositories {
            users: self.clone(),
            students: self.clone(),
            teachers: self.clone(),
            parents: self.clone(),
            subjects: self.clone(),
            assignments: self.clone(),
            attendance: self.clone(),
            results: self.clone(),
            notifications: self.clone(),
            sequences: self.clone(),
        }
    }
}

/// Snapshot of the values matching `keep`, so no shard guard outlives the call.
fn collect<K, V>(map: &DashMap<K, V>, keep: impl Fn(&V) -> bool) -> Vec<V>
where
    K: Eq + std::hash::Hash,
    V: Clone,
{
    map.iter()
        .filter(|e| keep(e.value()))
        .map(|e| e.value().clone())
        .collect()
}

fn page_of<T>(mut items: Vec<T>, order: impl FnMut(&T, &T) -> std::cmp::Ordering, page: PageRequest) -> Page<T> {
    items.sort_by(order);
    Page::from_sorted(items, page)
}

#[async_trait]
impl IdSequence for MemoryStore {
    async fn next(&self, key: &str) -> Result<u64> {
        let mut counter = self.sequences.entry(key.to_string()).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sequences_are_per_key_and_start_at_one() {
        let store = MemoryStore::new();
        assert_eq!(store.next("STU2024").await.unwrap(), 1);
        assert_eq!(store.next("STU2024").await.unwrap(), 2);
        assert_eq!(store.next("TCH2024").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn concurrent_sequence_calls_never_repeat() {
        let store = Arc::new(MemoryStore::new());
        let handles: Vec<_> = (0..32)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.next("PAR2024").await.unwrap() })
            })
            .collect();
        let mut seen = Vec::new();
        for h in handles {
            seen.push(h.await.unwrap());
        }
        seen.sort_unstable();
        assert_eq!(seen, (1..=32).collect::<Vec<u64>>());
    }
}
