//! Data types produced by the rate engine.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::rates::subset::Subset;

/// Column key for a year's rate, e.g. `2010`.
pub fn year_key(year: i32) -> String {
    year.to_string()
}

/// Column key for the delta between two consecutive years, e.g. `2010-2011`.
pub fn delta_key(prev: i32, year: i32) -> String {
    format!("{}-{}", prev, year)
}

/// Rate history for a single tract.
#[derive(Debug, Clone, PartialEq)]
pub struct TractEntry {
    pub id: String,
    pub id2: String,
    /// Year rates and year-pair deltas, keyed by [`year_key`] / [`delta_key`].
    pub values: BTreeMap<String, f64>,
}

impl TractEntry {
    pub fn new(id: &str, id2: &str) -> Self {
        TractEntry {
            id: id.to_string(),
            id2: id2.to_string(),
            values: BTreeMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }

    /// Text value of a report column; `None` when the tract has no data for it.
    pub fn cell(&self, key: &str) -> Option<String> {
        match key {
            "id" => Some(self.id.clone()),
            "id2" => Some(self.id2.clone()),
            _ => self.get(key).map(|v| v.to_string()),
        }
    }
}

/// Per-tract rate series keyed by tract name, in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct TractSeries {
    order: Vec<String>,
    entries: HashMap<String, TractEntry>,
}

impl TractSeries {
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&TractEntry> {
        self.entries.get(name)
    }

    /// Returns the entry for `name`, and whether it was just created.
    pub(crate) fn entry_or_insert(&mut self, name: &str, id: &str, id2: &str) -> (&mut TractEntry, bool) {
        let created = !self.entries.contains_key(name);
        if created {
            self.order.push(name.to_string());
        }
        let entry = self
            .entries
            .entry(name.to_string())
            .or_insert_with(|| TractEntry::new(id, id2));
        (entry, created)
    }

    /// Iterates over `(name, entry)` in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TractEntry)> {
        self.order
            .iter()
            .filter_map(|name| self.entries.get(name).map(|e| (name.as_str(), e)))
    }

    /// Sorted union of every column key across all tracts, `id` and `id2`
    /// included. Sorting is by string, so `2010-2011` lands between `2010`
    /// and `2011`.
    pub fn column_keys(&self) -> Vec<String> {
        let mut keys: BTreeSet<String> = BTreeSet::new();
        for entry in self.entries.values() {
            keys.insert("id".to_string());
            keys.insert("id2".to_string());
            keys.extend(entry.values.keys().cloned());
        }
        keys.into_iter().collect()
    }
}

/// Population sums for one year over the rows accepted by a subset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AggregateTotals {
    pub total: f64,
    pub foreign: f64,
}

impl AggregateTotals {
    /// Population-weighted foreign-born rate.
    pub fn rate(&self) -> f64 {
        self.foreign / self.total
    }
}

/// One line of the aggregate report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRecord {
    pub subset: Subset,
    pub year: i32,
    pub total: f64,
    pub foreign: f64,
    pub rate: f64,
}

impl AggregateRecord {
    pub fn new(subset: Subset, year: i32, totals: &AggregateTotals) -> Self {
        AggregateRecord {
            subset,
            year,
            total: totals.total,
            foreign: totals.foreign,
            rate: totals.rate(),
        }
    }
}
