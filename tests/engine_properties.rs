use std::collections::HashMap;

use village_dash::aggregate::{aggregate, AggregateOp};
use village_dash::config::{DomainConfig, MissingPolicy};
use village_dash::filter::FilterState;
use village_dash::ranking::{best_and_worst, rank_for_selection};
use village_dash::sampler::sample_records;
use village_dash::summary::SummaryBuilder;
use village_dash::types::{AggregatePoint, FilterSelection, Grouping, GroupingLevel, Record};

fn two_villages() -> Vec<Record> {
    vec![
        Record::new("X", "P", "V1").with_cluster(0, "Low").with_metric("score", 10.0),
        Record::new("X", "P", "V2").with_cluster(1, "High").with_metric("score", 90.0),
    ]
}

/// Deterministic spread of villages over a few regencies and districts.
fn province() -> Vec<Record> {
    let mut out = Vec::new();
    for i in 0..120u32 {
        let region = format!("R{}", i % 4);
        let sub = format!("{}-S{}", region, i % 3);
        let mut r = Record::new(&region, &sub, &format!("V{i}"))
            .with_cluster(i % 5, &format!("C{}", i % 5))
            .with_position(-6.0 - (i as f64) * 0.01, 106.0 + (i as f64) * 0.01);
        if i % 7 != 0 {
            r = r.with_metric("score", ((i * 37) % 100) as f64);
        }
        out.push(r);
    }
    out
}

fn regions(region: &str) -> Grouping {
    Grouping::Subregions {
        region: region.to_string(),
    }
}

#[test]
fn concrete_scenario_mean_and_extremes() {
    let rs = two_villages();
    let points = aggregate(&rs, &regions("X"), "score", AggregateOp::Mean, MissingPolicy::Zero);
    assert_eq!(points, vec![AggregatePoint::new("P", 50.0)]);

    let localities = Grouping::Localities {
        region: "X".into(),
        subregion: "P".into(),
    };
    let per_village = aggregate(&rs, &localities, "score", AggregateOp::Mean, MissingPolicy::Zero);
    let bw = best_and_worst(&per_village).unwrap();
    assert_eq!(bw.best, AggregatePoint::new("V2", 90.0));
    assert_eq!(bw.worst, AggregatePoint::new("V1", 10.0));
}

#[test]
fn rollup_matches_direct_aggregation_of_region_subset() {
    let rs = province();
    for policy in [MissingPolicy::Zero, MissingPolicy::Exclude] {
        for region in ["R0", "R1", "R2", "R3"] {
            let scoped = aggregate(&rs, &regions(region), "score", AggregateOp::Mean, policy);
            let subset: Vec<Record> = rs.iter().filter(|r| r.region == region).cloned().collect();
            let direct = aggregate(&subset, &regions(region), "score", AggregateOp::Mean, policy);
            assert_eq!(scoped, direct);

            // Region mean equals the size-weighted mean of its subregions under Zero.
            if policy == MissingPolicy::Zero {
                let region_mean = aggregate(&rs, &Grouping::Regions, "score", AggregateOp::Mean, policy)
                    .into_iter()
                    .find(|p| p.name == region)
                    .unwrap()
                    .value;
                let sizes = aggregate(&rs, &regions(region), "score", AggregateOp::Count(None), policy);
                let total: f64 = sizes.iter().map(|p| p.value).sum();
                let weighted: f64 = scoped
                    .iter()
                    .zip(&sizes)
                    .map(|(m, n)| m.value * n.value)
                    .sum::<f64>()
                    / total;
                assert!((weighted - region_mean).abs() < 1e-9);
            }
        }
    }
}

#[test]
fn best_and_worst_bound_all_region_means() {
    let rs = province();
    let points = aggregate(&rs, &Grouping::Regions, "score", AggregateOp::Mean, MissingPolicy::Zero);
    let bw = best_and_worst(&points).unwrap();
    for p in &points {
        assert!(bw.best.value >= p.value && p.value >= bw.worst.value);
    }
}

#[test]
fn ranking_level_follows_filter_depth() {
    let rs = province();
    let mut state = FilterState::new(&rs);
    let rank = |sel: &FilterSelection| rank_for_selection(&rs, sel, "score", MissingPolicy::Zero, 3).unwrap();

    assert_eq!(rank(state.selection()).level, GroupingLevel::Region);
    state.set_region(&rs, "R1");
    let by_district = rank(state.selection());
    assert_eq!(by_district.level, GroupingLevel::Subregion);
    assert!(by_district.top.iter().all(|e| e.name.starts_with("R1-")));
    state.set_subregion(&rs, "R1-S1");
    let by_village = rank(state.selection());
    assert_eq!(by_village.level, GroupingLevel::Locality);
    assert_eq!(by_village.top.len(), 3);
}

#[test]
fn filter_cascade_rescopes_options() {
    let rs = vec![
        Record::new("A", "B", "V1"),
        Record::new("C", "D", "V2"),
        Record::new("C", "E", "V3"),
    ];
    let mut state = FilterState::new(&rs);
    state.set_region(&rs, "A");
    state.set_subregion(&rs, "B");
    state.set_region(&rs, "C");
    assert!(state.selection().subregion.is_none());
    assert!(state.selection().locality.is_none());
    assert_eq!(state.subregion_options(), ["D", "E"]);
}

#[test]
fn sample_of_150_30_20_keeps_every_cluster() {
    let mut rs = Vec::new();
    for (cluster, size) in [(0u32, 150usize), (1, 30), (2, 20)] {
        for i in 0..size {
            rs.push(Record::new("R", "S", &format!("{cluster}-{i}")).with_cluster(cluster, "c"));
        }
    }
    let out = sample_records(&rs, 80, 20);
    assert_eq!(out.len(), 80);
    let mut counts: HashMap<u32, usize> = HashMap::new();
    for r in &out {
        *counts.entry(r.cluster_id).or_default() += 1;
    }
    assert_eq!(counts[&2], 20);
    assert_eq!(counts[&0] + counts[&1], 60);
    assert!(counts[&0] > counts[&1]);
    assert!(counts[&1] >= 20);

    let again = sample_records(&rs, 80, 20);
    assert!(out.iter().zip(&again).all(|(a, b)| std::ptr::eq(*a, *b)));
}

#[test]
fn sample_never_exceeds_budget() {
    let rs = province();
    for max_total in [1usize, 7, 30, 64, 119] {
        for min in [0usize, 1, 5, 40] {
            let out = sample_records(&rs, max_total, min);
            assert!(out.len() <= max_total, "{max_total}/{min}");
            if 5 * min <= max_total {
                let mut counts: HashMap<u32, usize> = HashMap::new();
                for r in &out {
                    *counts.entry(r.cluster_id).or_default() += 1;
                }
                for cluster in 0..5 {
                    assert!(counts.get(&cluster).copied().unwrap_or(0) >= min);
                }
            }
        }
    }
}

#[test]
fn summary_is_idempotent() {
    let cfg = DomainConfig::new("infrastructure", "t", "Infra").priority_metric("score", "Score");
    let rs = province();
    let builder = SummaryBuilder::new(&cfg).province("Jawa Barat");
    let selection = FilterSelection {
        region: Some("R2".into()),
        subregion: None,
        locality: None,
    };
    let a = builder.build(&rs, &selection);
    let b = builder.build(&rs, &selection);
    assert!(a.is_some());
    assert_eq!(a, b);
    assert_eq!(
        serde_json::to_value(&a).unwrap(),
        serde_json::to_value(&b).unwrap()
    );
}
