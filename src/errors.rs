use std::io;

use thiserror::Error;

/// Failures while reading a domain table from a record store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("table '{table}' not found in record store")]
    MissingTable { table: String },
    #[error("request for table '{table}' failed: {message}")]
    Http { table: String, message: String },
    #[error("record store answered {code} for table '{table}': {message}")]
    Status {
        table: String,
        code: u16,
        message: String,
    },
    #[error("could not decode page of table '{table}': {message}")]
    Decode { table: String, message: String },
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

/// Problems building `AppConfig` from a TOML file or the environment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("read config file failed ({path}): {message}")]
    ReadFile { path: String, message: String },
    #[error("parse config file failed ({path}): {message}")]
    ParseFile { path: String, message: String },
    #[error("missing setting: {key}")]
    Missing { key: &'static str },
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
    #[error("unknown domain '{0}'")]
    UnknownDomain(String),
}

/// Failures at the chat completion boundary. Upstream errors are opaque
/// so only the message text is kept.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error("chat assistant is not configured")]
    Disabled,
    #[error("client build failed: {message}")]
    BuildClient { message: String },
    #[error("http request failed: {message}")]
    Http { message: String },
    #[error("http status {code}: {message}")]
    Status { code: u16, message: String },
    #[error("decode response failed: {message}")]
    Decode { message: String },
    #[error("empty completion choice")]
    EmptyChoice,
}
