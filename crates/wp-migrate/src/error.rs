//! Error types for migration operations.

use thiserror::Error;

/// Errors that end a migration run.
///
/// Everything in this enum is escalated to the caller. Failures that only
/// degrade a single post (a missing featured image, a rejected post) are
/// logged and recorded in the [`MigrationReport`](crate::MigrationReport)
/// instead.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// The source REST API discovery root could not be reached.
    #[error("Source API is not reachable at {url}: {reason}")]
    ApiUnreachable { url: String, reason: String },

    /// The source site rejected the supplied credentials.
    #[error("Authentication failed on {endpoint} ({code}): {message}")]
    IncorrectCredentials {
        endpoint: String,
        code: String,
        message: String,
    },

    /// Fetching one page of posts failed; the whole fetch is abandoned.
    #[error("Failed to fetch page {page} of posts: {source}")]
    PageFetch {
        page: u32,
        #[source]
        source: Box<MigrationError>,
    },

    /// The API answered with a non-success status.
    #[error("API request failed with status {status}: {body}")]
    Api { status: u16, body: String },

    /// Network error.
    #[error("Network error: {0}")]
    Network(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// JSON parsing error.
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl MigrationError {
    /// Whether this error is the incorrect-credentials short-circuit.
    pub fn is_credentials_failure(&self) -> bool {
        matches!(self, Self::IncorrectCredentials { .. })
    }
}

/// Failures inside the featured-image pipeline.
///
/// These never escape [`MediaMigrator`](crate::MediaMigrator): each one is
/// logged and turned into "no featured image" for the owning post.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("failed to fetch media metadata (status {status})")]
    Metadata { status: u16 },

    #[error("media {0} has no source URL")]
    MissingSourceUrl(u64),

    #[error("failed to download image (status {status})")]
    Download { status: u16 },

    #[error("failed to upload image (status {status}): {body}")]
    Upload { status: u16, body: String },

    #[error("invalid image upload: {0}")]
    InvalidUpload(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Result type for migration operations.
pub type Result<T> = std::result::Result<T, MigrationError>;

/// Truncates `body` to at most `max` characters for diagnostics.
pub(crate) fn truncate_body(body: &str, max: usize) -> &str {
    match body.char_indices().nth(max) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
