use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tabled::Tabled;

/// One village row for a single domain table.
///
/// The hierarchy header is fixed; everything domain specific lives in
/// `metrics` (numeric) and `attributes` (categorical text). A metric that
/// was null or unparsable upstream is simply absent from `metrics`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub region: String,
    pub subregion: String,
    pub locality: String,
    pub cluster_id: u32,
    pub cluster_label: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl Record {
    pub fn new(region: &str, subregion: &str, locality: &str) -> Self {
        Record {
            region: region.to_string(),
            subregion: subregion.to_string(),
            locality: locality.to_string(),
            cluster_id: 0,
            cluster_label: String::new(),
            latitude: None,
            longitude: None,
            metrics: BTreeMap::new(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_cluster(mut self, id: u32, label: &str) -> Self {
        self.cluster_id = id;
        self.cluster_label = label.to_string();
        self
    }

    pub fn with_metric(mut self, name: &str, value: f64) -> Self {
        self.metrics.insert(name.to_string(), value);
        self
    }

    pub fn with_position(mut self, lat: f64, lon: f64) -> Self {
        self.latitude = Some(lat);
        self.longitude = Some(lon);
        self
    }

    /// Finite metric value, `None` when missing or NaN.
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied().filter(|v| v.is_finite())
    }

    pub fn position(&self) -> Option<[f64; 2]> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => Some([lat, lon]),
            _ => None,
        }
    }

    pub fn key(&self, level: GroupingLevel) -> &str {
        match level {
            GroupingLevel::Region => &self.region,
            GroupingLevel::Subregion => &self.subregion,
            GroupingLevel::Locality => &self.locality,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupingLevel {
    Region,
    Subregion,
    Locality,
}

impl GroupingLevel {
    pub fn label(self) -> &'static str {
        match self {
            GroupingLevel::Region => "Regency",
            GroupingLevel::Subregion => "District",
            GroupingLevel::Locality => "Village",
        }
    }
}

impl fmt::Display for GroupingLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A grouping level together with the parent keys it is scoped to.
///
/// Grouping by subregion is only meaningful inside one region, and grouping
/// by locality only inside one (region, subregion) pair, so the parents are
/// carried by the variant instead of being looked up from loose state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grouping {
    Regions,
    Subregions { region: String },
    Localities { region: String, subregion: String },
}

impl Grouping {
    pub fn level(&self) -> GroupingLevel {
        match self {
            Grouping::Regions => GroupingLevel::Region,
            Grouping::Subregions { .. } => GroupingLevel::Subregion,
            Grouping::Localities { .. } => GroupingLevel::Locality,
        }
    }

    /// Whether the record falls inside the parent scope of this grouping.
    pub fn contains(&self, record: &Record) -> bool {
        match self {
            Grouping::Regions => true,
            Grouping::Subregions { region } => record.region == *region,
            Grouping::Localities { region, subregion } => {
                record.region == *region && record.subregion == *subregion
            }
        }
    }
}

/// Current drill-down selection.
///
/// Invariant: `subregion` implies `region`, `locality` implies `subregion`.
/// Only `filter::FilterState` mutates it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSelection {
    pub region: Option<String>,
    pub subregion: Option<String>,
    pub locality: Option<String>,
}

impl FilterSelection {
    pub fn depth(&self) -> usize {
        match (&self.region, &self.subregion, &self.locality) {
            (None, _, _) => 0,
            (Some(_), None, _) => 1,
            (Some(_), Some(_), None) => 2,
            (Some(_), Some(_), Some(_)) => 3,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.depth() == 0
    }

    /// Grouping used for charts and rankings at this drill-down depth.
    ///
    /// A selected locality keeps the per-locality view of its subregion.
    pub fn grouping(&self) -> Grouping {
        match (&self.region, &self.subregion) {
            (Some(region), Some(subregion)) => Grouping::Localities {
                region: region.clone(),
                subregion: subregion.clone(),
            },
            (Some(region), None) => Grouping::Subregions {
                region: region.clone(),
            },
            _ => Grouping::Regions,
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        let eq = |want: &Option<String>, have: &str| want.as_deref().map_or(true, |w| w == have);
        eq(&self.region, &record.region)
            && eq(&self.subregion, &record.subregion)
            && eq(&self.locality, &record.locality)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatePoint {
    pub name: String,
    pub value: f64,
}

impl AggregatePoint {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        AggregatePoint {
            name: name.into(),
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingEntry {
    pub name: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestWorst {
    pub best: AggregatePoint,
    pub worst: AggregatePoint,
}

/// Ranking at the level implied by the current filter depth.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingSnapshot {
    pub level: GroupingLevel,
    pub metric: String,
    pub best: AggregatePoint,
    pub worst: AggregatePoint,
    pub top: Vec<RankingEntry>,
    pub bottom: Vec<RankingEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricLeaders {
    pub metric: String,
    pub label: String,
    pub best: AggregatePoint,
    pub worst: AggregatePoint,
}

/// Province-wide facts, only filled when no filter is active.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalInsights {
    pub region_count: usize,
    pub subregion_count: usize,
    pub locality_count: usize,
    pub leaders: Vec<MetricLeaders>,
}

/// Snapshot of what is on screen, handed to the chat assistant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibleDataSummary {
    pub page_id: String,
    pub region_label: String,
    pub village_count: usize,
    pub averages: BTreeMap<String, f64>,
    pub cluster_distribution: BTreeMap<String, usize>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub attribute_distributions: BTreeMap<String, BTreeMap<String, usize>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ranking: Option<RankingSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_locality: Option<Record>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_locality: Option<Record>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worst_locality: Option<Record>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_insights: Option<GlobalInsights>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapMarker {
    pub locality: String,
    pub position: [f64; 2],
    pub cluster_id: u32,
    pub cluster_label: String,
}

/// One page of a tabular detail view. `page` is 1-based.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub total_pages: usize,
}

#[derive(Debug, Tabled, Clone)]
pub struct SeriesRow {
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

#[derive(Debug, Tabled, Clone)]
pub struct RankingRow {
    #[tabled(rename = "Rank")]
    pub rank: usize,
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Score")]
    pub score: String,
}

#[derive(Debug, Tabled, Clone)]
pub struct VillageRow {
    #[tabled(rename = "Village")]
    pub locality: String,
    #[tabled(rename = "District")]
    pub subregion: String,
    #[tabled(rename = "Regency")]
    pub region: String,
    #[tabled(rename = "Cluster")]
    pub cluster_label: String,
}
