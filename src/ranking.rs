use crate::aggregate::{aggregate, sorted_asc, sorted_desc, AggregateOp};
use crate::config::MissingPolicy;
use crate::types::{
    AggregatePoint, BestWorst, FilterSelection, Grouping, RankingEntry, RankingSnapshot, Record,
};

/// Single scan for the highest and lowest point. On ties the first point
/// seen wins, so the result depends only on input order.
pub fn best_and_worst(points: &[AggregatePoint]) -> Option<BestWorst> {
    let first = points.first()?;
    let (mut best, mut worst) = (first, first);
    for p in &points[1..] {
        if p.value > best.value {
            best = p;
        }
        if p.value < worst.value {
            worst = p;
        }
    }
    Some(BestWorst {
        best: best.clone(),
        worst: worst.clone(),
    })
}

fn entries(sorted: Vec<AggregatePoint>, k: usize) -> Vec<RankingEntry> {
    sorted
        .into_iter()
        .take(k)
        .map(|p| RankingEntry {
            name: p.name,
            score: p.value,
        })
        .collect()
}

/// Highest `k` points, best first.
pub fn top_k(points: &[AggregatePoint], k: usize) -> Vec<RankingEntry> {
    entries(sorted_desc(points), k)
}

/// Lowest `k` points, worst first.
pub fn bottom_k(points: &[AggregatePoint], k: usize) -> Vec<RankingEntry> {
    entries(sorted_asc(points), k)
}

/// Ranking whose level follows the filter depth: regions when nothing is
/// selected, subregions of the selected region, then localities of the
/// selected subregion.
pub fn rank_for_selection(
    records: &[Record],
    selection: &FilterSelection,
    metric: &str,
    policy: MissingPolicy,
    k: usize,
) -> Option<RankingSnapshot> {
    let grouping = selection.grouping();
    let points = aggregate(records, &grouping, metric, AggregateOp::Mean, policy);
    let BestWorst { best, worst } = best_and_worst(&points)?;
    Some(RankingSnapshot {
        level: grouping.level(),
        metric: metric.to_string(),
        best,
        worst,
        top: top_k(&points, k),
        bottom: bottom_k(&points, k),
    })
}

/// Best and worst whole records by `metric` inside `grouping`'s scope.
///
/// Missing values rank as 0 under `MissingPolicy::Zero` and are skipped
/// under `Exclude`.
pub fn locality_extremes<'a>(
    records: &'a [Record],
    grouping: &Grouping,
    metric: &str,
    policy: MissingPolicy,
) -> Option<(&'a Record, &'a Record)> {
    let mut scored = records.iter().filter(|r| grouping.contains(r)).filter_map(|r| {
        let v = match (r.metric(metric), policy) {
            (Some(v), _) => v,
            (None, MissingPolicy::Zero) => 0.0,
            (None, MissingPolicy::Exclude) => return None,
        };
        Some((r, v))
    });
    let first = scored.next()?;
    let (mut best, mut worst) = (first, first);
    for cur in scored {
        if cur.1 > best.1 {
            best = cur;
        }
        if cur.1 < worst.1 {
            worst = cur;
        }
    }
    Some((best.0, worst.0))
}
