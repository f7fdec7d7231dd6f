//! One dashboard page: fetched records, drill-down state and every view
//! derived from them.
//!
//! Derived data is recomputed in full on each filter transition; nothing is
//! patched incrementally, so no view can lag behind the selection.

use log::{debug, info, warn};

use crate::aggregate::{aggregate_many, AggregateOp};
use crate::config::{AppConfig, DomainConfig, DEFAULT_MAX_MARKERS, DEFAULT_MIN_PER_CLUSTER, DEFAULT_TABLE_PAGE_SIZE};
use crate::filter::{filtered, FilterState};
use crate::loader::{fetch_all, LoadReport, RecordStore};
use crate::ranking::rank_for_selection;
use crate::sampler::sample;
use crate::summary::{SummaryBuilder, DEFAULT_TOP_K};
use crate::types::{AggregatePoint, GroupingLevel, MapMarker, Page, RankingSnapshot, Record, VisibleDataSummary};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    Loading,
    Ready,
    Failed(String),
}

/// What the page should show. `NoData` and `Error` are kept apart so a
/// filter with no matches never looks like a failed fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewState {
    Loading,
    NoData,
    Ready,
    Error(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewSettings {
    pub province: String,
    pub max_markers: usize,
    pub min_per_cluster: usize,
    pub table_page_size: usize,
    pub top_k: usize,
}

impl Default for ViewSettings {
    fn default() -> Self {
        ViewSettings {
            province: String::new(),
            max_markers: DEFAULT_MAX_MARKERS,
            min_per_cluster: DEFAULT_MIN_PER_CLUSTER,
            table_page_size: DEFAULT_TABLE_PAGE_SIZE,
            top_k: DEFAULT_TOP_K,
        }
    }
}

impl ViewSettings {
    pub fn from_app(config: &AppConfig) -> Self {
        ViewSettings {
            province: config.province.clone(),
            max_markers: config.max_markers,
            min_per_cluster: config.min_per_cluster,
            table_page_size: config.table_page_size.max(1),
            top_k: DEFAULT_TOP_K,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricSeries {
    pub metric: String,
    pub label: String,
    pub points: Vec<AggregatePoint>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DerivedView {
    pub state: ViewState,
    pub level: GroupingLevel,
    pub series: Vec<MetricSeries>,
    pub ranking: Option<RankingSnapshot>,
    pub markers: Vec<MapMarker>,
    pub summary: Option<VisibleDataSummary>,
}

impl DerivedView {
    fn empty(state: ViewState) -> Self {
        DerivedView {
            state,
            level: GroupingLevel::Region,
            series: Vec::new(),
            ranking: None,
            markers: Vec::new(),
            summary: None,
        }
    }
}

pub struct PageView {
    config: DomainConfig,
    settings: ViewSettings,
    records: Vec<Record>,
    status: LoadStatus,
    filter: FilterState,
    view: DerivedView,
}

impl PageView {
    /// A page waiting for its fetch.
    pub fn new(config: DomainConfig, settings: ViewSettings) -> Self {
        PageView {
            config,
            settings,
            records: Vec::new(),
            status: LoadStatus::Loading,
            filter: FilterState::default(),
            view: DerivedView::empty(ViewState::Loading),
        }
    }

    pub fn with_records(config: DomainConfig, settings: ViewSettings, records: Vec<Record>) -> Self {
        let mut page = Self::new(config, settings);
        page.install(records, LoadStatus::Ready);
        page
    }

    /// Fetch the domain table. A failed fetch leaves an empty collection
    /// and the `Failed` status; it is not returned as an error.
    pub fn load(&mut self, store: &dyn RecordStore, page_size: usize) -> LoadReport {
        let outcome = fetch_all(store, &self.config, page_size);
        let status = match &outcome.error {
            Some(e) => LoadStatus::Failed(e.to_string()),
            None => LoadStatus::Ready,
        };
        self.install(outcome.records, status);
        outcome.report
    }

    fn install(&mut self, records: Vec<Record>, status: LoadStatus) {
        info!("{}: {} records, status {:?}", self.config.page_id, records.len(), status);
        self.records = records;
        self.status = status;
        self.filter = FilterState::new(&self.records);
        self.refresh();
    }

    pub fn config(&self) -> &DomainConfig {
        &self.config
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn status(&self) -> &LoadStatus {
        &self.status
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub fn view(&self) -> &DerivedView {
        &self.view
    }

    pub fn set_region(&mut self, region: &str) -> &DerivedView {
        self.filter.set_region(&self.records, region);
        self.refresh();
        &self.view
    }

    pub fn set_subregion(&mut self, subregion: &str) -> &DerivedView {
        self.filter.set_subregion(&self.records, subregion);
        self.refresh();
        &self.view
    }

    pub fn set_locality(&mut self, locality: &str) -> &DerivedView {
        self.filter.set_locality(locality);
        self.refresh();
        &self.view
    }

    /// Apply a whole drill-down path at once, e.g. from command-line flags.
    ///
    /// Blank values count as "not given". A level whose parent is not
    /// selected is skipped with a warning instead of being applied.
    pub fn select_path(
        &mut self,
        region: Option<&str>,
        subregion: Option<&str>,
        locality: Option<&str>,
    ) -> &DerivedView {
        fn given(v: Option<&str>) -> Option<&str> {
            v.map(str::trim).filter(|v| !v.is_empty())
        }
        let (region, subregion, locality) = (given(region), given(subregion), given(locality));

        self.filter.reset(&self.records);
        if let Some(region) = region {
            self.filter.set_region(&self.records, region);
        }
        match subregion {
            Some(s) if self.filter.selection().region.is_some() => self.filter.set_subregion(&self.records, s),
            Some(s) => warn!("{}: district {:?} ignored without a regency", self.config.page_id, s),
            None => {}
        }
        match locality {
            Some(l) if self.filter.selection().subregion.is_some() => self.filter.set_locality(l),
            Some(l) => warn!("{}: village {:?} ignored without a district", self.config.page_id, l),
            None => {}
        }
        self.refresh();
        &self.view
    }

    pub fn reset(&mut self) -> &DerivedView {
        self.filter.reset(&self.records);
        self.refresh();
        &self.view
    }

    fn refresh(&mut self) {
        let state = match &self.status {
            LoadStatus::Loading => ViewState::Loading,
            LoadStatus::Failed(message) => ViewState::Error(message.clone()),
            LoadStatus::Ready => ViewState::Ready,
        };
        if state != ViewState::Ready {
            self.view = DerivedView::empty(state);
            return;
        }

        let selection = self.filter.selection();
        let grouping = selection.grouping();
        let policy = self.config.missing;
        let visible = filtered(&self.records, selection);

        let mut points = aggregate_many(
            &self.records,
            &grouping,
            self.config.metric_names(),
            AggregateOp::Mean,
            policy,
        );
        let series = self
            .config
            .metrics
            .iter()
            .map(|m| MetricSeries {
                metric: m.name.clone(),
                label: m.label.clone(),
                points: points.remove(&m.name).unwrap_or_default(),
            })
            .collect();

        let ranking = self
            .config
            .primary_metric()
            .and_then(|m| rank_for_selection(&self.records, selection, &m.name, policy, self.settings.top_k));

        // Only villages with coordinates compete for marker slots.
        let placeable: Vec<&Record> = visible.iter().copied().filter(|r| r.position().is_some()).collect();
        let markers = sample(&placeable, |r| r.cluster_id, self.settings.max_markers, self.settings.min_per_cluster)
            .into_iter()
            .filter_map(|r| {
                r.position().map(|position| MapMarker {
                    locality: r.locality.clone(),
                    position,
                    cluster_id: r.cluster_id,
                    cluster_label: r.cluster_label.clone(),
                })
            })
            .collect();

        let summary = SummaryBuilder::new(&self.config)
            .province(&self.settings.province)
            .top_k(self.settings.top_k)
            .build(&self.records, selection);

        let state = if visible.is_empty() {
            ViewState::NoData
        } else {
            ViewState::Ready
        };
        debug!(
            "{}: refreshed view for {:?} ({} visible records)",
            self.config.page_id,
            selection,
            visible.len()
        );
        self.view = DerivedView {
            state,
            level: grouping.level(),
            series,
            ranking,
            markers,
            summary,
        };
    }

    /// Filtered records for the detail table, `table_page_size` per page.
    pub fn table_page(&self, page: usize) -> Page<&Record> {
        let visible = filtered(&self.records, self.filter.selection());
        paginate(&visible, page, self.settings.table_page_size)
    }
}

/// 1-based page of `items`; out-of-range pages are clamped. An empty input
/// gives page 1 of 1 with no items.
pub fn paginate<T: Clone>(items: &[T], page: usize, page_size: usize) -> Page<T> {
    let page_size = page_size.max(1);
    let total_pages = items.len().div_ceil(page_size).max(1);
    let page = page.clamp(1, total_pages);
    let items = items
        .iter()
        .skip((page - 1) * page_size)
        .take(page_size)
        .cloned()
        .collect();
    Page {
        items,
        page,
        total_pages,
    }
}
