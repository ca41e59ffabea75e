// error_utils.rs
use thiserror::Error;

/// Error type shared across the seoulcrime pipeline.
///
/// The split matters to callers: `FileNotFound`, `MissingColumn`,
/// `UnsupportedFormat` and `ConfigurationMissing` are fatal for a whole
/// reconciliation pass, while the geocoding variants are scoped to a single
/// lookup and are downgraded to "no result" by the district resolver.
#[derive(Debug, Error)]
pub enum SeoulError {
    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("unsupported spreadsheet extension '{extension}': the {engine} engine is required")]
    UnsupportedFormat { extension: String, engine: String },

    #[error("required column '{0}' is missing")]
    MissingColumn(String),

    #[error("KAKAO_REST_API_KEY or KAKAO_MAP_API_KEY environment variable is not set")]
    ConfigurationMissing,

    /// HTTP 403 from the geocoding service, carrying the upstream message.
    #[error("geocoding access denied (403): {0}")]
    PermissionDenied(String),

    /// Network-level failure reaching the geocoding service. Safe to retry,
    /// though this crate never retries automatically.
    #[error("geocoding request failed: {0}")]
    Transient(String),

    #[error("geocoding upstream error ({status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("spreadsheet error: {0}")]
    Spreadsheet(String),
}
