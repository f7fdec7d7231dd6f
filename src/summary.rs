use crate::aggregate::{aggregate, distribution, mean_of, AggregateOp};
use crate::config::DomainConfig;
use crate::filter::filtered;
use crate::hierarchy::HierarchyIndex;
use crate::ranking::{best_and_worst, locality_extremes, rank_for_selection};
use crate::types::{FilterSelection, GlobalInsights, Grouping, MetricLeaders, Record, VisibleDataSummary};
use crate::util::format_int;
use std::collections::BTreeMap;

pub const DEFAULT_TOP_K: usize = 5;

/// Composes aggregates, rankings and distributions into the snapshot the
/// chat assistant is grounded on.
#[derive(Debug, Clone)]
pub struct SummaryBuilder<'c> {
    config: &'c DomainConfig,
    province: String,
    top_k: usize,
}

impl<'c> SummaryBuilder<'c> {
    pub fn new(config: &'c DomainConfig) -> Self {
        SummaryBuilder {
            config,
            province: String::new(),
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn province(mut self, province: &str) -> Self {
        self.province = province.to_string();
        self
    }

    pub fn top_k(mut self, k: usize) -> Self {
        self.top_k = k;
        self
    }

    /// `None` while there are no records at all (nothing loaded yet).
    pub fn build(&self, records: &[Record], selection: &FilterSelection) -> Option<VisibleDataSummary> {
        if records.is_empty() {
            return None;
        }
        let config = self.config;
        let policy = config.missing;
        let visible = filtered(records, selection);

        let averages: BTreeMap<String, f64> = config
            .metric_names()
            .map(|m| (m.to_string(), mean_of(visible.iter().copied(), m, policy)))
            .collect();

        let cluster_distribution = distribution(visible.iter().copied(), |r| Some(r.cluster_label.as_str()));

        let attribute_distributions = config
            .categorical
            .iter()
            .map(|field| {
                let counts = distribution(visible.iter().copied(), |r| {
                    r.attributes.get(field).map(String::as_str)
                });
                (field.clone(), counts)
            })
            .filter(|(_, counts)| !counts.is_empty())
            .collect();

        let primary = config.primary_metric().map(|m| m.name.as_str());
        let ranking = primary.and_then(|m| rank_for_selection(records, selection, m, policy, self.top_k));
        let extremes = primary.and_then(|m| locality_extremes(records, &selection.grouping(), m, policy));

        let selected_locality = selection
            .locality
            .as_ref()
            .and_then(|_| visible.first().map(|r| (*r).clone()));

        let global_insights = if selection.is_empty() {
            Some(self.global_insights(records))
        } else {
            None
        };

        Some(VisibleDataSummary {
            page_id: config.page_id.clone(),
            region_label: self.region_label(selection),
            village_count: visible.len(),
            averages,
            cluster_distribution,
            attribute_distributions,
            ranking,
            selected_locality,
            best_locality: extremes.map(|(best, _)| best.clone()),
            worst_locality: extremes.map(|(_, worst)| worst.clone()),
            global_insights,
        })
    }

    /// Human readable description of the current selection.
    pub fn region_label(&self, selection: &FilterSelection) -> String {
        match (&selection.region, &selection.subregion, &selection.locality) {
            (Some(r), Some(s), Some(l)) => format!("Village {}, District {}, Regency {}", l, s, r),
            (Some(r), Some(s), None) => format!("District {}, Regency {}", s, r),
            (Some(r), None, _) => format!("Regency {}", r),
            _ => format!("Province {}", self.province),
        }
    }

    fn global_insights(&self, records: &[Record]) -> GlobalInsights {
        let index = HierarchyIndex::build(records);
        let leaders = self
            .config
            .priority_metrics()
            .filter_map(|m| {
                let points = aggregate(records, &Grouping::Regions, &m.name, AggregateOp::Mean, self.config.missing);
                best_and_worst(&points).map(|bw| MetricLeaders {
                    metric: m.name.clone(),
                    label: m.label.clone(),
                    best: bw.best,
                    worst: bw.worst,
                })
            })
            .collect();
        GlobalInsights {
            region_count: index.regions().len(),
            subregion_count: index.subregion_count(),
            locality_count: index.locality_count(),
            leaders,
        }
    }
}

/// Context text prepended to chat prompts for a page.
pub fn render_context(config: &DomainConfig, summary: &VisibleDataSummary) -> String {
    let body = serde_json::to_string_pretty(summary).unwrap_or_else(|_| "{}".to_string());
    format!(
        "Dashboard page: {} ({}). Currently showing {} with {} villages.\nVisible data:\n{}",
        config.title,
        summary.page_id,
        summary.region_label,
        format_int(summary.village_count),
        body
    )
}
