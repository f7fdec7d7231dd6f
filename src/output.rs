use serde::Serialize;
use std::error::Error;
use tabled::{settings::Style, Table, Tabled};

use crate::types::{AggregatePoint, RankingEntry, RankingRow, Record, SeriesRow, VillageRow};
use crate::util::{format_number, round1};

pub fn write_json<T: Serialize>(path: &str, value: &T) -> Result<(), Box<dyn Error>> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

pub fn series_rows(points: &[AggregatePoint]) -> Vec<SeriesRow> {
    points
        .iter()
        .map(|p| SeriesRow {
            name: p.name.clone(),
            value: format_number(round1(p.value), 1),
        })
        .collect()
}

pub fn ranking_rows(entries: &[RankingEntry]) -> Vec<RankingRow> {
    entries
        .iter()
        .enumerate()
        .map(|(idx, e)| RankingRow {
            rank: idx + 1,
            name: e.name.clone(),
            score: format_number(round1(e.score), 1),
        })
        .collect()
}

pub fn village_rows(records: &[&Record]) -> Vec<VillageRow> {
    records
        .iter()
        .map(|r| VillageRow {
            locality: r.locality.clone(),
            subregion: r.subregion.clone(),
            region: r.region.clone(),
            cluster_label: r.cluster_label.clone(),
        })
        .collect()
}

/// Markdown table of at most `max_rows` rows, or a placeholder line.
pub fn render_table<T>(rows: &[T], max_rows: usize) -> String
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().cloned().take(max_rows).collect();
    if slice.is_empty() {
        return "(no rows)".to_string();
    }
    Table::new(slice).with(Style::markdown()).to_string()
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    println!("{}\n", render_table(rows, max_rows));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_round_at_the_display_boundary() {
        let rows = series_rows(&[AggregatePoint::new("Bogor", 1234.56)]);
        assert_eq!(rows[0].value, "1,234.6");
        let ranks = ranking_rows(&[
            RankingEntry { name: "a".into(), score: 9.94 },
            RankingEntry { name: "b".into(), score: 3.0 },
        ]);
        assert_eq!((ranks[0].rank, ranks[0].score.as_str()), (1, "9.9"));
        assert_eq!(ranks[1].rank, 2);
    }

    #[test]
    fn empty_tables_render_a_placeholder() {
        assert_eq!(render_table::<SeriesRow>(&[], 5), "(no rows)");
        let table = render_table(&series_rows(&[AggregatePoint::new("P", 50.0)]), 5);
        assert!(table.contains("| P"));
        assert!(table.contains("50.0"));
    }
}
