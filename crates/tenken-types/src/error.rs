//! Error types for tenken-checker

use thiserror::Error;

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration not found")]
    NotFound,

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Failed to save configuration: {0}")]
    SaveError(String),

    #[error("Invalid partition definition: {0}")]
    InvalidPartition(String),
}

/// Which part of a sync a failure belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePhase {
    Config,
    Fetch,
    Parse,
    Server,
}

impl FailurePhase {
    pub fn label(&self) -> &'static str {
        match self {
            FailurePhase::Config => "config",
            FailurePhase::Fetch => "fetch",
            FailurePhase::Parse => "parse",
            FailurePhase::Server => "server",
        }
    }
}

impl std::fmt::Display for FailurePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Remote endpoint errors
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("No endpoint configured")]
    NoEndpoint,

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Server returned HTTP {0}")]
    HttpStatus(u16),

    #[error("Response is not valid JSON: {0}")]
    Parse(String),

    /// JSON parsed but the `data` array is missing; usually an endpoint contract change
    #[error("Unexpected response shape: {0}")]
    Shape(String),

    #[error("Server reported failure: {0}")]
    ServerReported(String),
}

impl SyncError {
    pub fn phase(&self) -> FailurePhase {
        match self {
            SyncError::NoEndpoint => FailurePhase::Config,
            SyncError::Timeout(_) | SyncError::Network(_) | SyncError::HttpStatus(_) => {
                FailurePhase::Fetch
            }
            SyncError::Parse(_) | SyncError::Shape(_) => FailurePhase::Parse,
            SyncError::ServerReported(_) => FailurePhase::Server,
        }
    }

    /// Whether a plain retry is likely to help
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SyncError::Timeout(_) | SyncError::Network(_) | SyncError::HttpStatus(_)
        )
    }

    /// Message shown to the person who pressed sync
    pub fn user_message(&self) -> String {
        match self {
            SyncError::NoEndpoint => {
                "同期先URLが未設定です (config --set-endpoint)".to_string()
            }
            SyncError::Timeout(_) => {
                format!("[{}] 同期がタイムアウトしました。再試行してください", self.phase())
            }
            SyncError::Network(_) | SyncError::HttpStatus(_) => {
                format!("[{}] 同期に失敗しました。再試行してください ({})", self.phase(), self)
            }
            SyncError::Parse(_) | SyncError::Shape(_) => {
                format!("[{}] サーバー応答の形式が想定外です ({})", self.phase(), self)
            }
            SyncError::ServerReported(msg) => {
                format!("[{}] サーバーがエラーを返しました: {}", self.phase(), msg)
            }
        }
    }
}

/// Local key/value storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage IO error: {0}")]
    Io(String),

    #[error("Failed to encode partition data: {0}")]
    Encode(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Unknown partition: {0}")]
    UnknownPartition(String),

    #[error("No record matching '{key}' in {partition}")]
    RecordNotFound { partition: String, key: String },

    #[error("Invalid date (expected YYYY-MM-DD): {0}")]
    InvalidDate(String),

    #[error("Import error: {0}")]
    Import(String),

    #[error("Excel export error: {0}")]
    Excel(String),

    #[error("Application already initialized")]
    AlreadyInitialized,
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_per_variant() {
        assert_eq!(SyncError::Timeout(15).phase(), FailurePhase::Fetch);
        assert_eq!(SyncError::HttpStatus(502).phase(), FailurePhase::Fetch);
        assert_eq!(SyncError::Parse("x".into()).phase(), FailurePhase::Parse);
        assert_eq!(SyncError::Shape("x".into()).phase(), FailurePhase::Parse);
        assert_eq!(
            SyncError::ServerReported("x".into()).phase(),
            FailurePhase::Server
        );
    }

    #[test]
    fn test_user_message_names_phase() {
        let msg = SyncError::Shape("missing data".into()).user_message();
        assert!(msg.contains("[parse]"));
        let msg = SyncError::ServerReported("sheet locked".into()).user_message();
        assert!(msg.contains("[server]"));
        assert!(msg.contains("sheet locked"));
    }

    #[test]
    fn test_transient() {
        assert!(SyncError::Timeout(15).is_transient());
        assert!(!SyncError::Shape("x".into()).is_transient());
    }
}
