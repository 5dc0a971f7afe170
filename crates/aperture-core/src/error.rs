//! Error types for the aperture pipeline.
//!
//! Errors are organized by subsystem (§7): configuration, the store, the
//! scanner, the tier renderer, and per-item phase work. A phase's work loop
//! never propagates a single item's failure past itself — only
//! configuration or store-open errors abort a phase (see `PhaseError`).

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for aperture operations.
#[derive(Error, Debug)]
pub enum ApertureError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("scanner error: {0}")]
    Scanner(#[from] ScannerError),

    #[error("render error: {0}")]
    Render(#[from] RenderError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    ValidationError(String),
}

/// Store errors (§4.2). `Locked` and `Corrupt` are recoverable at the call
/// site; `Schema` is fatal at startup.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store locked after {attempts} retries: {message}")]
    Locked { attempts: u32, message: String },

    #[error("corrupt column {table}.{column} for row {row_id}: {message}")]
    Corrupt {
        table: String,
        column: String,
        row_id: String,
        message: String,
    },

    #[error("schema error: {0}")]
    Schema(String),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Scanner errors (§4.3).
#[derive(Error, Debug)]
pub enum ScannerError {
    #[error("duplicate relative path {path}: {first:?} and {second:?} both resolve to it")]
    DuplicateRelativePath {
        path: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("io error walking {path:?}: {message}")]
    Io { path: PathBuf, message: String },
}

/// Tier renderer errors (§4.4). Always caught per-image by the `render` phase.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("decode error for {path:?}: {message}")]
    Decode { path: PathBuf, message: String },

    #[error("encode error for {path:?} tier {tier}/{format}: {message}")]
    Encode {
        path: PathBuf,
        tier: String,
        format: String,
        message: String,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// External model/service errors (§7 "Model" taxonomy: timeout, rate limit,
/// non-deterministic failure). Retried by the phase framework before being
/// recorded on the signal row.
#[derive(Error, Debug, Clone)]
pub enum ModelError {
    #[error("request timed out after {0}ms")]
    Timeout(u64),

    #[error("rate limited (retry after {retry_after_s}s)")]
    RateLimited { retry_after_s: u64 },

    #[error("http {status}: {message}")]
    Http { status: u16, message: String },

    #[error("model unavailable: {0}")]
    Unavailable(String),

    #[error("response did not match the expected schema: {0}")]
    SchemaMismatch(String),
}

impl ModelError {
    /// §7 / §9: timeouts and rate limits/5xx are retryable; everything else
    /// (auth, bad request, schema mismatch) is not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ModelError::Timeout(_)
                | ModelError::RateLimited { .. }
                | ModelError::Http { status: 500..=599, .. }
        )
    }
}

/// Per-item failure within a phase's work loop. Carries a short reason
/// string so the framework can commit it without unwinding the batch (§7).
#[derive(Error, Debug, Clone)]
#[error("{reason}")]
pub struct PhaseError {
    pub reason: String,
}

impl PhaseError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl From<RenderError> for PhaseError {
    fn from(e: RenderError) -> Self {
        PhaseError::new(e.to_string())
    }
}

impl From<StoreError> for PhaseError {
    fn from(e: StoreError) -> Self {
        PhaseError::new(e.to_string())
    }
}

impl From<ModelError> for PhaseError {
    fn from(e: ModelError) -> Self {
        PhaseError::new(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ApertureError>;
pub type StoreResult<T> = std::result::Result<T, StoreError>;
