//! Aggregator: pure counting over validated event records.
//!
//! Nothing here divides, weights or decays: every output is a raw `u64` count
//! of records. Bucket order is first-seen order unless an explicit key list
//! seeds the buckets first.

use std::collections::HashMap;
use std::hash::Hash;

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::analytics::EventRecord;
use crate::models::content::EntityMeta;

/// An ordered key → count mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Buckets<K: Eq + Hash> {
    entries: Vec<(K, u64)>,
    index: HashMap<K, usize>,
}

impl<K: Eq + Hash + Clone> Default for Buckets<K> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Clone> Buckets<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `key` with count 0 if absent. Returns its position.
    pub fn ensure(&mut self, key: K) -> usize {
        if let Some(&i) = self.index.get(&key) {
            return i;
        }
        self.entries.push((key.clone(), 0));
        self.index.insert(key, self.entries.len() - 1);
        self.entries.len() - 1
    }

    pub fn increment(&mut self, key: K) {
        let i = self.ensure(key);
        self.entries[i].1 += 1;
    }

    pub fn get(&self, key: &K) -> u64 {
        self.index.get(key).map_or(0, |&i| self.entries[i].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, u64)> {
        self.entries.iter().map(|(k, c)| (k, *c))
    }
}

/// Per-type totals, keyed in first-seen order.
pub fn count_by_kind(records: &[EventRecord]) -> Buckets<String> {
    let mut buckets = Buckets::new();
    for record in records {
        buckets.increment(record.kind.clone());
    }
    buckets
}

/// Per-entity totals over records whose type is one of `kinds`.
/// Records without a foreign id cannot be attributed and are not counted.
pub fn count_by_foreign_id(records: &[EventRecord], kinds: &[&str]) -> Buckets<i64> {
    let mut buckets = Buckets::new();
    for record in records {
        if let Some(id) = record.foreign_id {
            if kinds.contains(&record.kind.as_str()) {
                buckets.increment(id);
            }
        }
    }
    buckets
}

/// Per-day totals in ascending date order.
pub fn count_by_day(records: &[EventRecord]) -> Buckets<NaiveDate> {
    let mut days: Vec<NaiveDate> = records.iter().map(|r| r.timestamp.date_naive()).collect();
    days.sort_unstable();
    let mut buckets = Buckets::new();
    for day in days {
        buckets.increment(day);
    }
    buckets
}

/// Number of records whose type is one of `kinds`.
pub fn count_kinds(records: &[EventRecord], kinds: &[&str]) -> u64 {
    count_matching(records, |r| kinds.contains(&r.kind.as_str()))
}

pub fn count_matching(records: &[EventRecord], predicate: impl Fn(&EventRecord) -> bool) -> u64 {
    records.iter().filter(|r| predicate(r)).count() as u64
}

/// One entity joined with its count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityCount {
    pub id: i64,
    pub label: String,
    pub image: Option<String>,
    pub count: u64,
}

/// Joins entity metadata with per-entity counts in entity order.
///
/// Every entity appears, with 0 when it has no events. Counts for ids that
/// match no entity (orphans left by a deleted entity) are ignored.
pub fn join_entities<E: EntityMeta>(entities: &[E], counts: &Buckets<i64>) -> Vec<EntityCount> {
    entities
        .iter()
        .map(|e| EntityCount {
            id: e.id(),
            label: e.display_name().to_string(),
            image: e.image_ref().map(str::to_string),
            count: counts.get(&e.id()),
        })
        .collect()
}
