use crate::config::DomainConfig;
use crate::errors::StoreError;
use crate::types::Record;
use crate::util::{value_as_f64, value_as_string};
use chrono::{DateTime, Utc};
use csv::ReaderBuilder;
use log::{debug, info, warn};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PAGE_SIZE: usize = 1000;
const MAX_PAGES: usize = 10_000;
const UNKNOWN: &str = "Unknown";
const UNCLUSTERED: &str = "Unclustered";

/// A flat key/value row as delivered by the record store.
pub type RawRow = Map<String, Value>;

/// Remote or local tabular source, read one page at a time.
pub trait RecordStore {
    fn fetch_page(&self, table: &str, offset: usize, limit: usize)
        -> Result<Vec<RawRow>, StoreError>;
}

#[derive(Debug, Clone)]
pub struct LoadReport {
    pub table: String,
    pub pages: usize,
    pub total_rows: usize,
    pub defaulted_fields: usize,
    pub missing_metrics: usize,
    pub fetched_at: DateTime<Utc>,
}

/// Result of a full-table fetch. On failure `records` is empty and `error`
/// carries the cause; the caller decides how to surface it.
#[derive(Debug)]
pub struct FetchOutcome {
    pub records: Vec<Record>,
    pub report: LoadReport,
    pub error: Option<StoreError>,
}

/// Read pages of `page_size` rows until the store returns an empty page.
pub fn fetch_all_rows(
    store: &dyn RecordStore,
    table: &str,
    page_size: usize,
) -> Result<(Vec<RawRow>, usize), StoreError> {
    let page_size = page_size.max(1);
    let mut rows = Vec::new();
    let mut pages = 0usize;
    loop {
        let page = store.fetch_page(table, rows.len(), page_size)?;
        if page.is_empty() {
            break;
        }
        pages += 1;
        debug!("table {}: page {} with {} rows", table, pages, page.len());
        rows.extend(page);
        if pages >= MAX_PAGES {
            warn!("table {}: stopped after {} pages", table, pages);
            break;
        }
    }
    Ok((rows, pages))
}

/// Fetch and normalize one domain table. Never fails: a read error yields
/// an empty collection with the error attached.
pub fn fetch_all(store: &dyn RecordStore, config: &DomainConfig, page_size: usize) -> FetchOutcome {
    info!("Fetching table {}", config.table);
    match fetch_all_rows(store, &config.table, page_size) {
        Ok((rows, pages)) => {
            let (records, mut report) = normalize(&rows, config);
            report.pages = pages;
            info!(
                "Fetched {} rows from {} in {} pages",
                report.total_rows, config.table, pages
            );
            if report.defaulted_fields > 0 {
                warn!(
                    "{}: {} hierarchy fields were blank and defaulted to '{}'",
                    config.table, report.defaulted_fields, UNKNOWN
                );
            }
            FetchOutcome {
                records,
                report,
                error: None,
            }
        }
        Err(e) => {
            warn!("Fetch of table {} failed: {}", config.table, e);
            FetchOutcome {
                records: Vec::new(),
                report: empty_report(&config.table),
                error: Some(e),
            }
        }
    }
}

fn empty_report(table: &str) -> LoadReport {
    LoadReport {
        table: table.to_string(),
        pages: 0,
        total_rows: 0,
        defaulted_fields: 0,
        missing_metrics: 0,
        fetched_at: Utc::now(),
    }
}

/// Convert raw rows into typed records using the domain's column names.
pub fn normalize(rows: &[RawRow], config: &DomainConfig) -> (Vec<Record>, LoadReport) {
    let fields = &config.fields;
    let mut report = empty_report(&config.table);
    report.total_rows = rows.len();

    let records = rows
        .iter()
        .map(|row| {
            let mut text = |key: &str, default: &str| match value_as_string(row.get(key)) {
                Some(s) => s,
                None => {
                    report.defaulted_fields += 1;
                    default.to_string()
                }
            };
            let region = text(&fields.region, UNKNOWN);
            let subregion = text(&fields.subregion, UNKNOWN);
            let locality = text(&fields.locality, UNKNOWN);

            let cluster_id = value_as_f64(row.get(&fields.cluster_id))
                .filter(|v| *v >= 0.0)
                .map(|v| v as u32)
                .unwrap_or(0);
            let cluster_label = value_as_string(row.get(&fields.cluster_label))
                .unwrap_or_else(|| UNCLUSTERED.to_string());

            let mut metrics = BTreeMap::new();
            for name in config.metric_names() {
                match value_as_f64(row.get(name)) {
                    Some(v) => {
                        metrics.insert(name.to_string(), v);
                    }
                    None => report.missing_metrics += 1,
                }
            }

            let attributes = config
                .categorical
                .iter()
                .filter_map(|field| value_as_string(row.get(field)).map(|v| (field.clone(), v)))
                .collect();

            Record {
                region,
                subregion,
                locality,
                cluster_id,
                cluster_label,
                latitude: value_as_f64(row.get(&fields.latitude)),
                longitude: value_as_f64(row.get(&fields.longitude)),
                metrics,
                attributes,
            }
        })
        .collect();
    (records, report)
}

/// Tables held in memory, mainly for tests and demos.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    tables: HashMap<String, Vec<RawRow>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, table: &str, rows: Vec<RawRow>) {
        self.tables.insert(table.to_string(), rows);
    }
}

impl RecordStore for InMemoryStore {
    fn fetch_page(&self, table: &str, offset: usize, limit: usize) -> Result<Vec<RawRow>, StoreError> {
        let rows = self.tables.get(table).ok_or_else(|| StoreError::MissingTable {
            table: table.to_string(),
        })?;
        Ok(rows.iter().skip(offset).take(limit).cloned().collect())
    }
}

/// One `<table>.csv` export per domain table inside a directory.
///
/// The file is parsed on the first page request and cached for the rest.
#[derive(Debug)]
pub struct CsvDirStore {
    dir: PathBuf,
    cache: RefCell<HashMap<String, Vec<RawRow>>>,
}

impl CsvDirStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        CsvDirStore {
            dir: dir.into(),
            cache: RefCell::new(HashMap::new()),
        }
    }

    fn read_table(&self, table: &str) -> Result<Vec<RawRow>, StoreError> {
        let path = self.dir.join(format!("{}.csv", table));
        if !path.exists() {
            return Err(StoreError::MissingTable {
                table: table.to_string(),
            });
        }
        let mut rdr = ReaderBuilder::new().flexible(true).from_path(&path)?;
        let headers = rdr.headers()?.clone();
        let mut rows = Vec::new();
        for result in rdr.records() {
            let record = result?;
            let row: RawRow = headers
                .iter()
                .zip(record.iter())
                .map(|(h, v)| {
                    let v = v.trim();
                    let cell = if v.is_empty() {
                        Value::Null
                    } else {
                        Value::String(v.to_string())
                    };
                    (h.trim().to_string(), cell)
                })
                .collect();
            rows.push(row);
        }
        Ok(rows)
    }
}

impl RecordStore for CsvDirStore {
    fn fetch_page(&self, table: &str, offset: usize, limit: usize) -> Result<Vec<RawRow>, StoreError> {
        if !self.cache.borrow().contains_key(table) {
            let rows = self.read_table(table)?;
            self.cache.borrow_mut().insert(table.to_string(), rows);
        }
        let cache = self.cache.borrow();
        let rows = cache.get(table).map(Vec::as_slice).unwrap_or_default();
        Ok(rows.iter().skip(offset).take(limit).cloned().collect())
    }
}

/// PostgREST-style endpoint: `GET {base}/rest/v1/{table}?select=*&offset=..&limit=..`.
#[derive(Debug, Clone)]
pub struct RestStore {
    base_url: String,
    api_key: String,
    client: Client,
}

impl RestStore {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| StoreError::Http {
                table: String::new(),
                message: err.to_string(),
            })?;
        Ok(RestStore {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
        })
    }

    pub fn page_url(&self, table: &str, offset: usize, limit: usize) -> String {
        format!(
            "{}/rest/v1/{}?select=*&offset={}&limit={}",
            self.base_url, table, offset, limit
        )
    }
}

impl RecordStore for RestStore {
    fn fetch_page(&self, table: &str, offset: usize, limit: usize) -> Result<Vec<RawRow>, StoreError> {
        let response = self
            .client
            .get(self.page_url(table, offset, limit))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .send()
            .map_err(|err| StoreError::Http {
                table: table.to_string(),
                message: err.to_string(),
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(StoreError::MissingTable {
                table: table.to_string(),
            });
        }
        if !status.is_success() {
            let message = response.text().unwrap_or_else(|_| "<no body>".to_string());
            return Err(StoreError::Status {
                table: table.to_string(),
                code: status.as_u16(),
                message,
            });
        }
        response.json::<Vec<RawRow>>().map_err(|err| StoreError::Decode {
            table: table.to_string(),
            message: err.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(v: Value) -> RawRow {
        v.as_object().cloned().unwrap()
    }

    fn domain() -> DomainConfig {
        DomainConfig::new("health", "kes", "Health")
            .priority_metric("skor", "Score")
            .metric("faskes", "Facilities")
            .categorical("tipe")
    }

    #[test]
    fn normalizes_mixed_cells_and_counts_gaps() {
        let rows = vec![
            row(json!({
                "nama_kabupaten": " Bogor ", "nama_kecamatan": "Cibinong", "nama_desa": "Pakansari",
                "cluster": "2", "label_cluster": "High", "latitude": -6.48, "longitude": "106.84",
                "skor": "71.5", "faskes": null, "tipe": "Urban"
            })),
            row(json!({ "nama_kabupaten": "Bogor", "skor": 40 })),
        ];
        let (records, report) = normalize(&rows, &domain());
        assert_eq!(records.len(), 2);
        let first = &records[0];
        assert_eq!(first.region, "Bogor");
        assert_eq!(first.cluster_id, 2);
        assert_eq!(first.cluster_label, "High");
        assert_eq!(first.position(), Some([-6.48, 106.84]));
        assert_eq!(first.metric("skor"), Some(71.5));
        assert_eq!(first.metric("faskes"), None);
        assert_eq!(first.attributes.get("tipe").map(String::as_str), Some("Urban"));

        let second = &records[1];
        assert_eq!(second.subregion, UNKNOWN);
        assert_eq!(second.locality, UNKNOWN);
        assert_eq!(second.cluster_label, UNCLUSTERED);
        assert_eq!(report.defaulted_fields, 2);
        assert_eq!(report.missing_metrics, 2);
    }

    #[test]
    fn pages_until_an_empty_page() {
        let mut store = InMemoryStore::new();
        let rows: Vec<RawRow> = (0..25)
            .map(|i| row(json!({ "nama_desa": format!("V{i}") })))
            .collect();
        store.insert("kes", rows);
        let (rows, pages) = fetch_all_rows(&store, "kes", 10).unwrap();
        assert_eq!(rows.len(), 25);
        assert_eq!(pages, 3);
    }

    #[test]
    fn missing_table_yields_empty_collection_and_error() {
        let store = InMemoryStore::new();
        let outcome = fetch_all(&store, &domain(), DEFAULT_PAGE_SIZE);
        assert!(outcome.records.is_empty());
        assert!(matches!(outcome.error, Some(StoreError::MissingTable { .. })));
    }

    #[test]
    fn rest_page_url_includes_range() {
        let store = RestStore::new("https://db.example/", "k", Duration::from_secs(1)).unwrap();
        assert_eq!(
            store.page_url("kes", 1000, 1000),
            "https://db.example/rest/v1/kes?select=*&offset=1000&limit=1000"
        );
    }
}
