use thiserror::Error;

/// Failure talking to the element-set provider or persisting its output.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Login rejected: {0}")]
    Auth(String),
    #[error("Request to {url} timed out")]
    Timeout { url: String },
    #[error("Network error: {0}")]
    Network(String),
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },
    #[error("Malformed response: {0}")]
    Malformed(String),
    #[error("No satellite IDs requested")]
    NoSatellites,
    #[error("Cache write error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a single element-set pair was rejected.
#[derive(Debug, Error, PartialEq)]
pub enum TleParseError {
    #[error("line {0} has no partner")]
    Unpaired(usize),
    #[error("unexpected line number prefix")]
    LineNumber,
    #[error("line is {0} characters, expected 69")]
    Length(usize),
    #[error("malformed catalog number {0:?}")]
    CatalogId(String),
    #[error("catalog numbers differ: {0} vs {1}")]
    CatalogMismatch(u32, u32),
    #[error("{0}")]
    Elements(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("TLE cache read error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum NameMapError {
    #[error("Name map IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Name map JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
