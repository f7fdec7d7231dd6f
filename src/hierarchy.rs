//! Option lists for the cascading Regency → District → Village dropdowns.
//!
//! The free functions rescan the collection on every call, which is fine for
//! a few thousand villages. `HierarchyIndex` answers the same questions from a
//! tree built once per dataset load.

use std::collections::{BTreeMap, BTreeSet};

use crate::types::Record;

/// Sorted distinct regions.
pub fn regions_of(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .map(|r| r.region.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Sorted distinct subregions of `region`; empty for an unknown region.
pub fn subregions_of(records: &[Record], region: &str) -> Vec<String> {
    records
        .iter()
        .filter(|r| r.region == region)
        .map(|r| r.subregion.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Sorted distinct localities of the (`region`, `subregion`) pair.
pub fn localities_of(records: &[Record], region: &str, subregion: &str) -> Vec<String> {
    records
        .iter()
        .filter(|r| r.region == region && r.subregion == subregion)
        .map(|r| r.locality.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HierarchyIndex {
    tree: BTreeMap<String, BTreeMap<String, BTreeSet<String>>>,
}

impl HierarchyIndex {
    pub fn build(records: &[Record]) -> Self {
        let mut tree: BTreeMap<String, BTreeMap<String, BTreeSet<String>>> = BTreeMap::new();
        for r in records {
            tree.entry(r.region.clone())
                .or_default()
                .entry(r.subregion.clone())
                .or_default()
                .insert(r.locality.clone());
        }
        HierarchyIndex { tree }
    }

    pub fn regions(&self) -> Vec<String> {
        self.tree.keys().cloned().collect()
    }

    pub fn subregions(&self, region: &str) -> Vec<String> {
        self.tree
            .get(region)
            .map(|subs| subs.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn localities(&self, region: &str, subregion: &str) -> Vec<String> {
        self.tree
            .get(region)
            .and_then(|subs| subs.get(subregion))
            .map(|locs| locs.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn subregion_count(&self) -> usize {
        self.tree.values().map(BTreeMap::len).sum()
    }

    pub fn locality_count(&self) -> usize {
        self.tree
            .values()
            .flat_map(BTreeMap::values)
            .map(BTreeSet::len)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records() -> Vec<Record> {
        vec![
            Record::new("Garut", "Tarogong", "Sukagalih"),
            Record::new("Bogor", "Cibinong", "Pakansari"),
            Record::new("Bogor", "Babakan Madang", "Citaringgul"),
            Record::new("Bogor", "Cibinong", "Harapan Jaya"),
            Record::new("Bogor", "Cibinong", "Pakansari"),
        ]
    }

    #[test]
    fn option_lists_are_sorted_and_distinct() {
        let rs = records();
        assert_eq!(regions_of(&rs), vec!["Bogor", "Garut"]);
        assert_eq!(subregions_of(&rs, "Bogor"), vec!["Babakan Madang", "Cibinong"]);
        assert_eq!(
            localities_of(&rs, "Bogor", "Cibinong"),
            vec!["Harapan Jaya", "Pakansari"]
        );
    }

    #[test]
    fn unknown_parents_give_empty_lists() {
        let rs = records();
        assert!(subregions_of(&rs, "Depok").is_empty());
        assert!(localities_of(&rs, "Garut", "Cibinong").is_empty());
    }

    #[test]
    fn prebuilt_index_agrees_with_scans() {
        let rs = records();
        let index = HierarchyIndex::build(&rs);
        assert_eq!(index.regions(), regions_of(&rs));
        assert_eq!(index.subregions("Bogor"), subregions_of(&rs, "Bogor"));
        assert_eq!(
            index.localities("Bogor", "Cibinong"),
            localities_of(&rs, "Bogor", "Cibinong")
        );
        assert!(index.subregions("Depok").is_empty());
        assert_eq!(index.subregion_count(), 3);
        assert_eq!(index.locality_count(), 4);
    }
}
