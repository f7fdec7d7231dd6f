//! Deterministic proportional stratified sampling for map rendering.
//!
//! Each cluster gets `max(floor(max_total * size / total), min_per_cluster)`
//! slots, capped at its size, and fills them by taking every
//! `floor(size / take)`-th record. Clusters are laid out smallest first
//! (ties by cluster key); when the quotas overflow `max_total`, the overflow
//! is trimmed from the back, first down to each cluster's floor and then,
//! only if the floors alone exceed `max_total`, below it. The largest
//! clusters therefore absorb truncation and small clusters stay whole.

use log::debug;
use std::collections::HashMap;
use std::hash::Hash;

use crate::types::Record;

struct Stratum<'a, T, K> {
    key: K,
    members: Vec<&'a T>,
    floor: usize,
    take: usize,
}

/// Sample at most `max_total` items, keeping every cluster represented.
///
/// Identical inputs always produce the identical sample. When the input
/// already fits, everything is returned in input order.
pub fn sample<'a, T, K, F>(
    items: &'a [T],
    cluster_of: F,
    max_total: usize,
    min_per_cluster: usize,
) -> Vec<&'a T>
where
    K: Hash + Eq + Ord + Clone,
    F: Fn(&T) -> K,
{
    if items.len() <= max_total {
        return items.iter().collect();
    }
    let total = items.len();

    let mut index: HashMap<K, usize> = HashMap::new();
    let mut strata: Vec<Stratum<'a, T, K>> = Vec::new();
    for item in items {
        let key = cluster_of(item);
        let idx = *index.entry(key.clone()).or_insert_with(|| {
            strata.push(Stratum {
                key,
                members: Vec::new(),
                floor: 0,
                take: 0,
            });
            strata.len() - 1
        });
        strata[idx].members.push(item);
    }
    strata.sort_by(|a, b| a.members.len().cmp(&b.members.len()).then_with(|| a.key.cmp(&b.key)));

    for s in &mut strata {
        let size = s.members.len();
        let share = (max_total as f64 * size as f64 / total as f64).floor() as usize;
        s.floor = min_per_cluster.min(size);
        s.take = share.max(min_per_cluster).min(size);
    }

    let mut excess = strata.iter().map(|s| s.take).sum::<usize>().saturating_sub(max_total);
    for s in strata.iter_mut().rev() {
        if excess == 0 {
            break;
        }
        let cut = excess.min(s.take - s.floor);
        s.take -= cut;
        excess -= cut;
    }
    for s in strata.iter_mut().rev() {
        if excess == 0 {
            break;
        }
        let cut = excess.min(s.take);
        s.take -= cut;
        excess -= cut;
    }

    let mut out = Vec::with_capacity(max_total);
    for s in &strata {
        if s.take == 0 {
            continue;
        }
        let step = (s.members.len() / s.take).max(1);
        out.extend(s.members.iter().step_by(step).take(s.take).copied());
    }
    debug!(
        "sampled {} of {} items across {} clusters",
        out.len(),
        total,
        strata.len()
    );
    out
}

/// `sample` keyed by the record's precomputed cluster id.
pub fn sample_records(records: &[Record], max_total: usize, min_per_cluster: usize) -> Vec<&Record> {
    sample(records, |r| r.cluster_id, max_total, min_per_cluster)
}
