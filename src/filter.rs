//! Drill-down selection state.
//!
//! Setting a level clears everything below it and recomputes the option list
//! of the next level. Setting a child while its parent is empty is a caller
//! bug and panics.

use log::debug;

use crate::hierarchy::{localities_of, regions_of, subregions_of};
use crate::types::{FilterSelection, Record};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    selection: FilterSelection,
    region_options: Vec<String>,
    subregion_options: Vec<String>,
    locality_options: Vec<String>,
}

fn non_blank(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

impl FilterState {
    /// Empty selection with region options derived from `records`.
    pub fn new(records: &[Record]) -> Self {
        FilterState {
            region_options: regions_of(records),
            ..Self::default()
        }
    }

    pub fn selection(&self) -> &FilterSelection {
        &self.selection
    }

    pub fn region_options(&self) -> &[String] {
        &self.region_options
    }

    pub fn subregion_options(&self) -> &[String] {
        &self.subregion_options
    }

    pub fn locality_options(&self) -> &[String] {
        &self.locality_options
    }

    /// A blank `region` goes back to the province-wide view.
    pub fn set_region(&mut self, records: &[Record], region: &str) {
        self.selection = FilterSelection {
            region: non_blank(region),
            subregion: None,
            locality: None,
        };
        self.subregion_options = match &self.selection.region {
            Some(r) => subregions_of(records, r),
            None => Vec::new(),
        };
        self.locality_options.clear();
        debug!("filter: region={:?}", self.selection.region);
    }

    /// A blank `subregion` goes back to the region view.
    pub fn set_subregion(&mut self, records: &[Record], subregion: &str) {
        assert!(
            self.selection.region.is_some(),
            "set_subregion called without a selected region"
        );
        self.selection.subregion = non_blank(subregion);
        self.selection.locality = None;
        self.locality_options = match (&self.selection.region, &self.selection.subregion) {
            (Some(r), Some(s)) => localities_of(records, r, s),
            _ => Vec::new(),
        };
        debug!("filter: subregion={:?}", self.selection.subregion);
    }

    pub fn set_locality(&mut self, locality: &str) {
        assert!(
            self.selection.subregion.is_some(),
            "set_locality called without a selected subregion"
        );
        self.selection.locality = non_blank(locality);
        debug!("filter: locality={:?}", self.selection.locality);
    }

    /// Back to the initial state; region options are rebuilt for `records`,
    /// which may belong to a different domain than before.
    pub fn reset(&mut self, records: &[Record]) {
        *self = Self::new(records);
    }
}

/// Records matching every level of `selection`.
pub fn filtered<'a>(records: &'a [Record], selection: &FilterSelection) -> Vec<&'a Record> {
    records.iter().filter(|r| selection.matches(r)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records() -> Vec<Record> {
        vec![
            Record::new("A", "B", "V1"),
            Record::new("A", "B", "V2"),
            Record::new("A", "D", "V3"),
            Record::new("C", "E", "V4"),
            Record::new("C", "F", "V5"),
        ]
    }

    #[test]
    fn changing_region_clears_lower_levels() {
        let rs = records();
        let mut state = FilterState::new(&rs);
        assert_eq!(state.region_options(), ["A", "C"]);

        state.set_region(&rs, "A");
        assert_eq!(state.subregion_options(), ["B", "D"]);
        state.set_subregion(&rs, "B");
        assert_eq!(state.locality_options(), ["V1", "V2"]);
        state.set_locality("V2");
        assert_eq!(state.selection().depth(), 3);

        state.set_region(&rs, "C");
        assert_eq!(state.selection().region.as_deref(), Some("C"));
        assert!(state.selection().subregion.is_none());
        assert!(state.selection().locality.is_none());
        assert_eq!(state.subregion_options(), ["E", "F"]);
        assert!(state.locality_options().is_empty());
    }

    #[test]
    fn changing_subregion_clears_locality() {
        let rs = records();
        let mut state = FilterState::new(&rs);
        state.set_region(&rs, "A");
        state.set_subregion(&rs, "B");
        state.set_locality("V1");
        state.set_subregion(&rs, "D");
        assert!(state.selection().locality.is_none());
        assert_eq!(state.locality_options(), ["V3"]);
    }

    #[test]
    fn blank_values_step_back_up() {
        let rs = records();
        let mut state = FilterState::new(&rs);
        state.set_region(&rs, "A");
        state.set_subregion(&rs, "B");
        state.set_subregion(&rs, "");
        assert_eq!(state.selection().depth(), 1);
        assert!(state.locality_options().is_empty());
        state.set_region(&rs, " ");
        assert!(state.selection().is_empty());
        assert!(state.subregion_options().is_empty());
    }

    #[test]
    fn reset_returns_to_initial_state() {
        let rs = records();
        let mut state = FilterState::new(&rs);
        state.set_region(&rs, "A");
        state.set_subregion(&rs, "B");
        state.reset(&rs);
        assert_eq!(state, FilterState::new(&rs));
    }

    #[test]
    #[should_panic(expected = "without a selected region")]
    fn subregion_without_region_panics() {
        let rs = records();
        let mut state = FilterState::new(&rs);
        state.set_subregion(&rs, "B");
    }

    #[test]
    #[should_panic(expected = "without a selected subregion")]
    fn locality_without_subregion_panics() {
        let rs = records();
        let mut state = FilterState::new(&rs);
        state.set_region(&rs, "A");
        state.set_locality("V1");
    }

    #[test]
    fn filtered_follows_selection_depth() {
        let rs = records();
        let mut state = FilterState::new(&rs);
        assert_eq!(filtered(&rs, state.selection()).len(), 5);
        state.set_region(&rs, "A");
        assert_eq!(filtered(&rs, state.selection()).len(), 3);
        state.set_subregion(&rs, "B");
        state.set_locality("V1");
        let only = filtered(&rs, state.selection());
        assert_eq!(only.len(), 1);
        assert_eq!(only[0].locality, "V1");
    }
}
