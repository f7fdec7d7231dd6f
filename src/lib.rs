//! Drill-down aggregation engine for village-level regional dashboards.
//!
//! Records are fetched once per domain table, then every view (chart series,
//! rankings, map markers, detail tables and the chat summary) is derived from
//! the same immutable collection and the current Regency → District →
//! Village selection.

pub mod aggregate;
pub mod chat;
pub mod config;
pub mod dashboard;
pub mod errors;
pub mod filter;
pub mod hierarchy;
pub mod loader;
pub mod output;
pub mod ranking;
pub mod sampler;
pub mod summary;
pub mod types;
pub mod util;

pub use aggregate::{aggregate, AggregateOp, Predicate};
pub use chat::{ChatAssistant, ChatRequest, ChatResponse, CompletionClient, ConversationStore};
pub use config::{AppConfig, DomainConfig, MissingPolicy};
pub use dashboard::{PageView, ViewSettings, ViewState};
pub use errors::{ChatError, ConfigError, StoreError};
pub use filter::FilterState;
pub use loader::{fetch_all, RecordStore};
pub use ranking::{best_and_worst, bottom_k, top_k};
pub use sampler::sample;
pub use summary::SummaryBuilder;
pub use types::{AggregatePoint, FilterSelection, Grouping, GroupingLevel, Record, VisibleDataSummary};
