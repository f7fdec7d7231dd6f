//! Per-domain configuration and application settings.
//!
//! Every dashboard page runs the same engine; what differs is only which
//! columns hold the hierarchy and which metrics exist. `DomainConfig`
//! captures that, and the seven built-in domains are registered lazily.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::chat::DEFAULT_MAX_TURNS;
use crate::errors::ConfigError;
use crate::loader::DEFAULT_PAGE_SIZE;

pub const ENV_PROVINCE: &str = "VILLAGE_DASH_PROVINCE";
pub const ENV_DATA_DIR: &str = "VILLAGE_DASH_DATA_DIR";
pub const ENV_STORE_URL: &str = "VILLAGE_DASH_STORE_URL";
pub const ENV_STORE_KEY: &str = "VILLAGE_DASH_STORE_KEY";
pub const ENV_STORE_PAGE_SIZE: &str = "VILLAGE_DASH_STORE_PAGE_SIZE";
pub const ENV_LLM_BASE_URL: &str = "VILLAGE_DASH_LLM_BASE_URL";
pub const ENV_LLM_MODEL: &str = "VILLAGE_DASH_LLM_MODEL";
pub const ENV_LLM_API_KEY: &str = "VILLAGE_DASH_LLM_API_KEY";
pub const ENV_LLM_TIMEOUT_MS: &str = "VILLAGE_DASH_LLM_TIMEOUT_MS";
pub const ENV_LLM_SYSTEM_PROMPT: &str = "VILLAGE_DASH_LLM_SYSTEM_PROMPT";
pub const ENV_CHAT_MAX_TURNS: &str = "VILLAGE_DASH_CHAT_MAX_TURNS";
pub const ENV_MAX_MARKERS: &str = "VILLAGE_DASH_MAX_MARKERS";
pub const ENV_MIN_PER_CLUSTER: &str = "VILLAGE_DASH_MIN_PER_CLUSTER";
pub const ENV_TABLE_PAGE_SIZE: &str = "VILLAGE_DASH_TABLE_PAGE_SIZE";

pub const DEFAULT_CONFIG_FILE_NAME: &str = "village_dash.toml";
pub const DEFAULT_PROVINCE: &str = "Jawa Barat";
pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_LLM_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_LLM_SYSTEM_PROMPT: &str = "You are a regional development analyst. Answer using \
only the dashboard data provided as context and say so when the context does not cover a question.";
pub const DEFAULT_MAX_MARKERS: usize = 1500;
pub const DEFAULT_MIN_PER_CLUSTER: usize = 50;
pub const DEFAULT_TABLE_PAGE_SIZE: usize = 10;

/// Column names of the fixed record header in a domain table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HierarchyFields {
    pub region: String,
    pub subregion: String,
    pub locality: String,
    pub cluster_id: String,
    pub cluster_label: String,
    pub latitude: String,
    pub longitude: String,
}

impl Default for HierarchyFields {
    fn default() -> Self {
        HierarchyFields {
            region: "nama_kabupaten".to_string(),
            subregion: "nama_kecamatan".to_string(),
            locality: "nama_desa".to_string(),
            cluster_id: "cluster".to_string(),
            cluster_label: "label_cluster".to_string(),
            latitude: "latitude".to_string(),
            longitude: "longitude".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricSpec {
    pub name: String,
    pub label: String,
    /// Priority metrics drive rankings and province-wide insights.
    #[serde(default)]
    pub priority: bool,
}

/// How a missing (null, NaN or unparsable) metric value is aggregated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingPolicy {
    /// Count the record with value 0. Keeps group sizes identical across metrics.
    #[default]
    Zero,
    /// Leave the record out of that metric's numerator and denominator.
    Exclude,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainConfig {
    pub page_id: String,
    pub table: String,
    pub title: String,
    #[serde(default)]
    pub fields: HierarchyFields,
    pub metrics: Vec<MetricSpec>,
    #[serde(default)]
    pub categorical: Vec<String>,
    #[serde(default)]
    pub missing: MissingPolicy,
}

impl DomainConfig {
    pub fn new(page_id: &str, table: &str, title: &str) -> Self {
        DomainConfig {
            page_id: page_id.to_string(),
            table: table.to_string(),
            title: title.to_string(),
            fields: HierarchyFields::default(),
            metrics: Vec::new(),
            categorical: Vec::new(),
            missing: MissingPolicy::default(),
        }
    }

    pub fn metric(mut self, name: &str, label: &str) -> Self {
        self.metrics.push(MetricSpec {
            name: name.to_string(),
            label: label.to_string(),
            priority: false,
        });
        self
    }

    pub fn priority_metric(mut self, name: &str, label: &str) -> Self {
        self.metrics.push(MetricSpec {
            name: name.to_string(),
            label: label.to_string(),
            priority: true,
        });
        self
    }

    pub fn categorical(mut self, field: &str) -> Self {
        self.categorical.push(field.to_string());
        self
    }

    pub fn missing(mut self, policy: MissingPolicy) -> Self {
        self.missing = policy;
        self
    }

    pub fn fields(mut self, fields: HierarchyFields) -> Self {
        self.fields = fields;
        self
    }

    pub fn metric_names(&self) -> impl Iterator<Item = &str> {
        self.metrics.iter().map(|m| m.name.as_str())
    }

    pub fn priority_metrics(&self) -> impl Iterator<Item = &MetricSpec> {
        self.metrics.iter().filter(|m| m.priority)
    }

    /// Metric used for best/worst rankings: the first priority metric,
    /// falling back to the first metric at all.
    pub fn primary_metric(&self) -> Option<&MetricSpec> {
        self.priority_metrics().next().or_else(|| self.metrics.first())
    }

    pub fn metric_label<'a>(&'a self, name: &'a str) -> &'a str {
        self.metrics
            .iter()
            .find(|m| m.name == name)
            .map(|m| m.label.as_str())
            .unwrap_or(name)
    }
}

static BUILTIN_DOMAINS: Lazy<Vec<DomainConfig>> = Lazy::new(|| {
    vec![
        DomainConfig::new("infrastructure", "cluster_infrastruktur", "Village Infrastructure")
            .priority_metric("skor_infrastruktur", "Infrastructure Score")
            .metric("skor_jalan", "Road Access")
            .metric("skor_listrik", "Electricity")
            .metric("skor_air_bersih", "Clean Water")
            .metric("skor_sanitasi", "Sanitation"),
        DomainConfig::new("economy", "cluster_ekonomi", "Village Economy")
            .priority_metric("skor_ekonomi", "Economy Score")
            .metric("jumlah_umkm", "Small Enterprises")
            .metric("jumlah_pasar", "Markets")
            .metric("jumlah_koperasi", "Cooperatives")
            .categorical("sumber_penghasilan_utama"),
        DomainConfig::new("health", "cluster_kesehatan", "Village Health")
            .priority_metric("skor_kesehatan", "Health Score")
            .metric("jumlah_faskes", "Health Facilities")
            .metric("jumlah_tenaga_kesehatan", "Health Workers")
            .metric("jumlah_posyandu", "Integrated Health Posts"),
        DomainConfig::new("education", "cluster_pendidikan", "Village Education")
            .priority_metric("skor_pendidikan", "Education Score")
            .metric("jumlah_sd", "Primary Schools")
            .metric("jumlah_smp", "Junior High Schools")
            .metric("jumlah_sma", "Senior High Schools"),
        DomainConfig::new("environment", "cluster_lingkungan", "Village Environment")
            .priority_metric("skor_lingkungan", "Environment Score")
            .metric("skor_pengelolaan_sampah", "Waste Management")
            .metric("kejadian_bencana", "Disaster Events")
            .categorical("jenis_bencana_utama"),
        DomainConfig::new("digital", "cluster_digital", "Digital Readiness")
            .priority_metric("skor_digital", "Digital Readiness Score")
            .metric("skor_sinyal", "Signal Strength")
            .metric("akses_internet", "Internet Access")
            .metric("jumlah_bts", "Base Stations"),
        DomainConfig::new("typology", "cluster_tipologi", "Village Typology")
            .priority_metric("skor_tipologi", "Typology Score")
            .metric("luas_wilayah", "Area")
            .metric("jumlah_penduduk", "Population")
            .categorical("tipologi_desa")
            .categorical("topografi"),
    ]
});

pub fn builtin_domains() -> &'static [DomainConfig] {
    &BUILTIN_DOMAINS
}

pub fn builtin_domain(page_id: &str) -> Option<&'static DomainConfig> {
    BUILTIN_DOMAINS.iter().find(|d| d.page_id == page_id)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreSettings {
    CsvDir {
        dir: PathBuf,
    },
    Rest {
        base_url: String,
        api_key: String,
        page_size: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmSettings {
    pub base_url: String,
    pub model: String,
    pub api_key: String,
    pub timeout_ms: u64,
    pub system_prompt: String,
    pub max_turns: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub province: String,
    pub store: StoreSettings,
    pub llm: Option<LlmSettings>,
    pub max_markers: usize,
    pub min_per_cluster: usize,
    pub table_page_size: usize,
    /// Domains declared in the config file, overriding built-ins by `page_id`.
    pub domains: Vec<DomainConfig>,
}

impl AppConfig {
    pub fn from_default_sources() -> Result<Self, ConfigError> {
        let config_path = Path::new(DEFAULT_CONFIG_FILE_NAME);
        if config_path.exists() {
            return Self::from_config_file(config_path);
        }
        Self::from_env()
    }

    pub fn from_config_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|err| ConfigError::ReadFile {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        Self::from_toml_str(&content, &path.display().to_string())
    }

    pub fn from_toml_str(content: &str, origin: &str) -> Result<Self, ConfigError> {
        let value: toml::Value = toml::from_str(content).map_err(|err| ConfigError::ParseFile {
            path: origin.to_string(),
            message: err.to_string(),
        })?;
        let table = value.as_table().ok_or_else(|| ConfigError::ParseFile {
            path: origin.to_string(),
            message: "root is not a TOML table".to_string(),
        })?;

        let mut config = Self::from_env_with(|key| {
            table
                .get(key)
                .and_then(toml_value_to_string)
                .or_else(|| std::env::var(key).ok())
        })?;

        if let Some(domains) = table.get("domain") {
            config.domains = domains
                .clone()
                .try_into::<Vec<DomainConfig>>()
                .map_err(|err| ConfigError::ParseFile {
                    path: origin.to_string(),
                    message: err.to_string(),
                })?;
        }
        Ok(config)
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    pub fn from_env_with<F>(mut getter: F) -> Result<Self, ConfigError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut get = |key: &str| getter(key).filter(|v| !v.trim().is_empty());

        let province = get(ENV_PROVINCE).unwrap_or_else(|| DEFAULT_PROVINCE.to_string());

        let store = match get(ENV_STORE_URL) {
            Some(base_url) => {
                let api_key = get(ENV_STORE_KEY).ok_or(ConfigError::Missing { key: ENV_STORE_KEY })?;
                let page_size =
                    parse_usize(get(ENV_STORE_PAGE_SIZE), ENV_STORE_PAGE_SIZE, DEFAULT_PAGE_SIZE)?;
                StoreSettings::Rest {
                    base_url,
                    api_key,
                    page_size,
                }
            }
            None => StoreSettings::CsvDir {
                dir: PathBuf::from(get(ENV_DATA_DIR).unwrap_or_else(|| DEFAULT_DATA_DIR.to_string())),
            },
        };

        let llm = match get(ENV_LLM_BASE_URL) {
            Some(base_url) => {
                let model = get(ENV_LLM_MODEL).ok_or(ConfigError::Missing { key: ENV_LLM_MODEL })?;
                let api_key =
                    get(ENV_LLM_API_KEY).ok_or(ConfigError::Missing { key: ENV_LLM_API_KEY })?;
                let timeout_ms = match get(ENV_LLM_TIMEOUT_MS) {
                    Some(value) => value.parse::<u64>().map_err(|_| ConfigError::Invalid {
                        key: ENV_LLM_TIMEOUT_MS,
                        value,
                    })?,
                    None => DEFAULT_LLM_TIMEOUT_MS,
                };
                let system_prompt = get(ENV_LLM_SYSTEM_PROMPT)
                    .unwrap_or_else(|| DEFAULT_LLM_SYSTEM_PROMPT.to_string());
                let max_turns =
                    parse_usize(get(ENV_CHAT_MAX_TURNS), ENV_CHAT_MAX_TURNS, DEFAULT_MAX_TURNS)?;
                Some(LlmSettings {
                    base_url,
                    model,
                    api_key,
                    timeout_ms,
                    system_prompt,
                    max_turns,
                })
            }
            None => None,
        };

        let max_markers = parse_usize(get(ENV_MAX_MARKERS), ENV_MAX_MARKERS, DEFAULT_MAX_MARKERS)?;
        let min_per_cluster = parse_usize(
            get(ENV_MIN_PER_CLUSTER),
            ENV_MIN_PER_CLUSTER,
            DEFAULT_MIN_PER_CLUSTER,
        )?;
        let table_page_size = parse_usize(
            get(ENV_TABLE_PAGE_SIZE),
            ENV_TABLE_PAGE_SIZE,
            DEFAULT_TABLE_PAGE_SIZE,
        )?;
        if table_page_size == 0 {
            return Err(ConfigError::Invalid {
                key: ENV_TABLE_PAGE_SIZE,
                value: "0".to_string(),
            });
        }

        Ok(AppConfig {
            province,
            store,
            llm,
            max_markers,
            min_per_cluster,
            table_page_size,
            domains: Vec::new(),
        })
    }

    /// Domain by page id: file-declared domains first, then built-ins.
    pub fn domain(&self, page_id: &str) -> Result<DomainConfig, ConfigError> {
        self.domains
            .iter()
            .find(|d| d.page_id == page_id)
            .or_else(|| builtin_domain(page_id))
            .cloned()
            .ok_or_else(|| ConfigError::UnknownDomain(page_id.to_string()))
    }
}

fn parse_usize(value: Option<String>, key: &'static str, default: usize) -> Result<usize, ConfigError> {
    match value {
        Some(value) => value
            .trim()
            .parse::<usize>()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

fn toml_value_to_string(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(value) => Some(value.clone()),
        toml::Value::Integer(value) => Some(value.to_string()),
        toml::Value::Float(value) => Some(value.to_string()),
        toml::Value::Boolean(value) => Some(value.to_string()),
        _ => None,
    }
}
