//! In-memory catalog handed from stage to stage within one run.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::types::ConferenceRecord;

/// The deduplicated set of conference records.
///
/// Every pipeline stage takes the catalog by `&mut` and returns control with
/// it; nothing else holds a reference across stages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    records: Vec<ConferenceRecord>,
}

impl Catalog {
    pub fn new(records: Vec<ConferenceRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[ConferenceRecord] {
        &self.records
    }

    pub fn records_mut(&mut self) -> &mut [ConferenceRecord] {
        &mut self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ConferenceRecord> {
        self.records.iter()
    }

    /// Smallest id greater than every id in use.
    pub fn next_id(&self) -> u64 {
        self.records.iter().map(|r| r.id).max().unwrap_or(0) + 1
    }

    /// Append a record as-is.
    pub fn push(&mut self, record: ConferenceRecord) {
        self.records.push(record);
    }

    pub fn get(&self, index: usize) -> Option<&ConferenceRecord> {
        self.records.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut ConferenceRecord> {
        self.records.get_mut(index)
    }

    pub fn position_by_id(&self, id: u64) -> Option<usize> {
        self.records.iter().position(|r| r.id == id)
    }

    pub fn find_by_id_mut(&mut self, id: u64) -> Option<&mut ConferenceRecord> {
        self.records.iter_mut().find(|r| r.id == id)
    }

    /// Remove a whole record by id.
    pub fn remove_by_id(&mut self, id: u64) -> Option<ConferenceRecord> {
        let index = self.position_by_id(id)?;
        Some(self.records.remove(index))
    }

    /// Remove every record matching `pred`, returning the removed ones in order.
    pub fn remove_where(
        &mut self,
        mut pred: impl FnMut(&ConferenceRecord) -> bool,
    ) -> Vec<ConferenceRecord> {
        let (removed, kept): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.records).into_iter().partition(|r| pred(r));
        self.records = kept;
        removed
    }

    pub fn contains_source_id(&self, source_id: &str) -> bool {
        !source_id.is_empty() && self.records.iter().any(|r| r.source_id == source_id)
    }

    /// All non-empty source ids currently in use.
    pub fn source_ids(&self) -> HashSet<&str> {
        self.records
            .iter()
            .map(|r| r.source_id.as_str())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Reassign ids 1..=n in current order. Done on each full rewrite.
    pub fn renumber(&mut self) {
        for (i, record) in self.records.iter_mut().enumerate() {
            record.id = i as u64 + 1;
        }
    }
}

impl<'a> IntoIterator for &'a Catalog {
    type Item = &'a ConferenceRecord;
    type IntoIter = std::slice::Iter<'a, ConferenceRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u64, name: &str, sid: &str) -> ConferenceRecord {
        ConferenceRecord {
            id,
            name: name.into(),
            source_id: sid.into(),
            ..Default::default()
        }
    }

    #[test]
    fn next_id_skips_gaps() {
        let catalog = Catalog::new(vec![record(1, "a", ""), record(9, "b", "")]);
        assert_eq!(catalog.next_id(), 10);
        assert_eq!(Catalog::default().next_id(), 1);
    }

    #[test]
    fn remove_where_keeps_order() {
        let mut catalog = Catalog::new(vec![
            record(1, "keep", ""),
            record(2, "drop", ""),
            record(3, "keep too", ""),
        ]);
        let removed = catalog.remove_where(|r| r.name == "drop");
        assert_eq!(removed.len(), 1);
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.records()[1].name, "keep too");
    }

    #[test]
    fn renumber_is_sequential() {
        let mut catalog = Catalog::new(vec![record(5, "a", ""), record(2, "b", "")]);
        catalog.renumber();
        let ids: Vec<u64> = catalog.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn source_id_lookup_ignores_empty() {
        let catalog = Catalog::new(vec![record(1, "a", ""), record(2, "b", "s-1")]);
        assert!(catalog.contains_source_id("s-1"));
        assert!(!catalog.contains_source_id(""));
        assert_eq!(catalog.source_ids().len(), 1);
    }

    #[test]
    fn serializes_as_plain_array() {
        let catalog = Catalog::new(vec![record(1, "a", "")]);
        let json = serde_json::to_string(&catalog).expect("serialize");
        assert!(json.starts_with('['));
    }
}
