use std::fmt;

/// Errors raised while syncing hotspot activity or coin history.
#[derive(Debug)]
pub enum SyncError {
    /// Transport-level failure talking to an upstream or the document store
    Http(reqwest::Error),
    /// Upstream answered with a non-success status
    Api { status: u16, body: String },
    /// Upstream answered successfully but with an unusable body
    UnexpectedResponse(String),
    Database(sea_orm::DbErr),
    Json(serde_json::Error),
    Io(std::io::Error),
    Config(String),
    /// Upstream has no record of the hotspot
    HotspotNotFound(String),
    InvalidTimestamp(String),
    /// Document store answered in a way that is neither success nor conflict
    Store(String),
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::Http(e) => write!(f, "HTTP error: {}", e),
            SyncError::Api { status, body } => write!(f, "API error {}: {}", status, body),
            SyncError::UnexpectedResponse(msg) => write!(f, "Unexpected response: {}", msg),
            SyncError::Database(e) => write!(f, "Database error: {}", e),
            SyncError::Json(e) => write!(f, "JSON error: {}", e),
            SyncError::Io(e) => write!(f, "IO error: {}", e),
            SyncError::Config(msg) => write!(f, "Configuration error: {}", msg),
            SyncError::HotspotNotFound(address) => write!(f, "Hotspot not found: {}", address),
            SyncError::InvalidTimestamp(msg) => write!(f, "Invalid timestamp: {}", msg),
            SyncError::Store(msg) => write!(f, "Document store error: {}", msg),
        }
    }
}

impl std::error::Error for SyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SyncError::Http(e) => Some(e),
            SyncError::Database(e) => Some(e),
            SyncError::Json(e) => Some(e),
            SyncError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        SyncError::Http(e)
    }
}

impl From<sea_orm::DbErr> for SyncError {
    fn from(e: sea_orm::DbErr) -> Self {
        SyncError::Database(e)
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::Json(e)
    }
}

impl From<std::io::Error> for SyncError {
    fn from(e: std::io::Error) -> Self {
        SyncError::Io(e)
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
