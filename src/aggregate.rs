use crate::config::MissingPolicy;
use crate::types::{AggregatePoint, Grouping, Record};
use crate::util::safe_div;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

/// Boolean test applied to a metric value for `Count` and `Percent`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Predicate {
    GreaterThan(f64),
    AtLeast(f64),
    Equals(f64),
}

impl Predicate {
    pub fn test(self, v: f64) -> bool {
        match self {
            Predicate::GreaterThan(t) => v > t,
            Predicate::AtLeast(t) => v >= t,
            Predicate::Equals(t) => (v - t).abs() < f64::EPSILON,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AggregateOp {
    Mean,
    Sum,
    /// Group size, or the number of values passing the predicate.
    Count(Option<Predicate>),
    /// Share of the group passing the predicate, 0..=100.
    Percent(Predicate),
}

/// Metric value under the missing-value policy. `None` means "leave out".
fn resolve(record: &Record, metric: &str, policy: MissingPolicy) -> Option<f64> {
    match (record.metric(metric), policy) {
        (Some(v), _) => Some(v),
        (None, MissingPolicy::Zero) => Some(0.0),
        (None, MissingPolicy::Exclude) => None,
    }
}

/// Aggregate one metric per group at `grouping`'s level, restricted to its
/// parent scope.
///
/// Groups come out in first-seen order. Values keep full precision; rounding
/// happens when they are displayed. A metric absent from every record yields
/// an all-zero series.
pub fn aggregate(
    records: &[Record],
    grouping: &Grouping,
    metric: &str,
    op: AggregateOp,
    policy: MissingPolicy,
) -> Vec<AggregatePoint> {
    #[derive(Default)]
    struct Acc {
        size: usize,
        present: usize,
        sum: f64,
        hits: usize,
    }

    let level = grouping.level();
    let mut order: Vec<(&str, Acc)> = Vec::new();
    let mut slot: HashMap<&str, usize> = HashMap::new();

    for r in records.iter().filter(|r| grouping.contains(r)) {
        let key = r.key(level);
        let idx = *slot.entry(key).or_insert_with(|| {
            order.push((key, Acc::default()));
            order.len() - 1
        });
        let acc = &mut order[idx].1;
        acc.size += 1;
        if let Some(v) = resolve(r, metric, policy) {
            acc.present += 1;
            acc.sum += v;
            if let AggregateOp::Count(Some(p)) | AggregateOp::Percent(p) = op {
                if p.test(v) {
                    acc.hits += 1;
                }
            }
        }
    }

    order
        .into_iter()
        .map(|(name, acc)| {
            let value = match op {
                AggregateOp::Mean => safe_div(acc.sum, acc.present as f64),
                AggregateOp::Sum => acc.sum,
                AggregateOp::Count(None) => acc.size as f64,
                AggregateOp::Count(Some(_)) => acc.hits as f64,
                AggregateOp::Percent(_) => safe_div(acc.hits as f64, acc.present as f64) * 100.0,
            };
            AggregatePoint::new(name, value)
        })
        .collect()
}

/// `aggregate` for several metrics, keyed by metric name.
pub fn aggregate_many<'m>(
    records: &[Record],
    grouping: &Grouping,
    metrics: impl IntoIterator<Item = &'m str>,
    op: AggregateOp,
    policy: MissingPolicy,
) -> BTreeMap<String, Vec<AggregatePoint>> {
    metrics
        .into_iter()
        .map(|m| (m.to_string(), aggregate(records, grouping, m, op, policy)))
        .collect()
}

/// Plain mean of one metric over a record subset; 0 for an empty subset.
pub fn mean_of<'a>(
    records: impl IntoIterator<Item = &'a Record>,
    metric: &str,
    policy: MissingPolicy,
) -> f64 {
    let (sum, n) = records
        .into_iter()
        .filter_map(|r| resolve(r, metric, policy))
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    safe_div(sum, n as f64)
}

/// Series sorted by value, highest first. Equal values keep their order.
pub fn sorted_desc(points: &[AggregatePoint]) -> Vec<AggregatePoint> {
    let mut sorted = points.to_vec();
    sorted.sort_by(|a, b| b.value.partial_cmp(&a.value).unwrap_or(Ordering::Equal));
    sorted
}

/// Series sorted by value, lowest first. Equal values keep their order.
pub fn sorted_asc(points: &[AggregatePoint]) -> Vec<AggregatePoint> {
    let mut sorted = points.to_vec();
    sorted.sort_by(|a, b| a.value.partial_cmp(&b.value).unwrap_or(Ordering::Equal));
    sorted
}

/// Occurrence count of a categorical key over a record subset.
pub fn distribution<'a, F>(records: impl IntoIterator<Item = &'a Record>, key: F) -> BTreeMap<String, usize>
where
    F: Fn(&'a Record) -> Option<&'a str>,
{
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for r in records {
        if let Some(k) = key(r) {
            *counts.entry(k.to_string()).or_default() += 1;
        }
    }
    counts
}
