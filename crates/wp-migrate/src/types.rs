//! Common types for migration operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

/// Request-shape convention spoken by a site's REST API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiVariant {
    /// Versioned `wp/v2` API with field filtering and page-count headers.
    #[default]
    Modern,
    /// Pre-`wp/v2` API served directly under `/wp-json`.
    Legacy,
}

impl std::fmt::Display for ApiVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Modern => write!(f, "modern"),
            Self::Legacy => write!(f, "legacy"),
        }
    }
}

/// A text field carried in both raw and rendered form.
///
/// The modern API sends `{"raw": ..., "rendered": ...}` (with `raw` only in
/// the edit context); the legacy API sends a plain string, which is taken as
/// the rendered form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "RenderedRepr")]
pub struct RenderedText {
    pub raw: Option<String>,
    pub rendered: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RenderedRepr {
    Null,
    Plain(String),
    Object {
        #[serde(default)]
        raw: Option<String>,
        #[serde(default)]
        rendered: String,
    },
}

impl From<RenderedRepr> for RenderedText {
    fn from(repr: RenderedRepr) -> Self {
        match repr {
            RenderedRepr::Null => Self::default(),
            RenderedRepr::Plain(rendered) => Self {
                raw: None,
                rendered,
            },
            RenderedRepr::Object { raw, rendered } => Self { raw, rendered },
        }
    }
}

/// A published post as returned by the source site.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourcePost {
    #[serde(alias = "ID")]
    pub id: u64,

    #[serde(default)]
    pub title: RenderedText,

    #[serde(default)]
    pub content: RenderedText,

    #[serde(default)]
    pub excerpt: RenderedText,

    #[serde(default)]
    pub categories: Vec<u64>,

    #[serde(default)]
    pub tags: Vec<u64>,

    /// WordPress reports "no featured image" as `0`. The legacy API sends
    /// the whole attachment under `featured_image` instead.
    #[serde(default, alias = "featured_image", deserialize_with = "featured_media_id")]
    pub featured_media: Option<u64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FeaturedRepr {
    Id(u64),
    Attachment {
        #[serde(alias = "ID")]
        id: u64,
    },
}

fn featured_media_id<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<FeaturedRepr>::deserialize(deserializer)?.map(|repr| match repr {
        FeaturedRepr::Id(id) | FeaturedRepr::Attachment { id } => id,
    }))
}

impl SourcePost {
    /// The featured image to migrate, if the post has one.
    pub fn featured_image_id(&self) -> Option<u64> {
        self.featured_media.filter(|id| *id != 0)
    }
}

/// Publication status sent to the destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    #[default]
    Publish,
}

/// Body of a post-creation request on the destination site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DestinationPost {
    pub title: String,
    pub content: String,
    pub excerpt: String,
    pub status: PostStatus,
    pub categories: Vec<u64>,
    pub tags: Vec<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub featured_media: Option<u64>,
}

impl DestinationPost {
    /// Attach the destination-side featured image.
    pub fn with_featured_media(mut self, media_id: u64) -> Self {
        self.featured_media = Some(media_id);
        self
    }
}

/// Media metadata as returned by the source site.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaItem {
    #[serde(alias = "ID")]
    pub id: u64,
    #[serde(default, alias = "source")]
    pub source_url: Option<String>,
}

/// Response body of a successful creation request.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedResource {
    pub id: u64,
}

/// Options controlling how content is enumerated.
#[derive(Debug, Clone)]
pub struct MigrationOptions {
    /// Posts requested per page.
    pub per_page: u32,

    /// Pause between successive page requests.
    pub page_delay: Duration,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            per_page: 5,
            page_delay: Duration::from_secs(2),
        }
    }
}

impl MigrationOptions {
    /// Set the page size.
    pub fn with_per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page.max(1);
        self
    }

    /// Set the inter-page delay.
    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }
}

/// Report of a completed migration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MigrationReport {
    /// API variant used against the source.
    pub variant: Option<ApiVariant>,

    /// WordPress version advertised by the source, when readable.
    pub wordpress_version: Option<String>,

    /// Number of posts fetched from the source.
    pub posts_fetched: usize,

    /// Number of posts created on the destination.
    pub posts_created: usize,

    /// Number of posts the destination refused.
    pub posts_failed: usize,

    /// Number of featured images uploaded.
    pub images_migrated: usize,

    /// Number of featured images dropped after a failure.
    pub images_failed: usize,

    /// Posts created on the destination.
    pub migrated: Vec<MigratedPost>,

    /// Errors encountered during migration.
    pub errors: Vec<MigrationErrorInfo>,

    /// Warnings generated during migration.
    pub warnings: Vec<String>,

    /// Start time of migration.
    pub started_at: Option<DateTime<Utc>>,

    /// End time of migration.
    pub completed_at: Option<DateTime<Utc>>,
}

impl MigrationReport {
    /// Create a new empty report.
    pub fn new() -> Self {
        Self {
            started_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    /// Mark the migration as complete.
    pub fn complete(&mut self) {
        self.completed_at = Some(Utc::now());
    }

    /// Every fetched post was created on the destination.
    pub fn is_successful(&self) -> bool {
        self.posts_failed == 0 && self.errors.iter().all(|e| !e.is_critical)
    }

    /// Record a post created on the destination.
    pub fn add_migrated(&mut self, post: MigratedPost) {
        self.posts_created += 1;
        self.migrated.push(post);
    }

    /// Add an error to the report.
    pub fn add_error(&mut self, category: &str, message: &str, is_critical: bool) {
        self.errors.push(MigrationErrorInfo {
            category: category.to_string(),
            message: message.to_string(),
            is_critical,
        });
    }

    /// Add a warning to the report.
    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Get the duration of the migration.
    pub fn duration(&self) -> Option<chrono::Duration> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }

    /// Print a summary of the migration.
    pub fn print_summary(&self) {
        println!("\n=== Migration Summary ===\n");
        if let Some(variant) = self.variant {
            println!("Source API:         {variant}");
        }
        if let Some(version) = &self.wordpress_version {
            println!("WordPress version:  {version}");
        }
        println!("Posts fetched:      {}", self.posts_fetched);
        println!("Posts created:      {}", self.posts_created);
        println!("Posts failed:       {}", self.posts_failed);
        println!("Images migrated:    {}", self.images_migrated);
        println!("Images dropped:     {}", self.images_failed);

        if let Some(duration) = self.duration() {
            println!("\nCompleted in {} seconds", duration.num_seconds());
        }

        if !self.errors.is_empty() {
            println!("\nErrors ({}):", self.errors.len());
            for error in &self.errors {
                let severity = if error.is_critical {
                    "CRITICAL"
                } else {
                    "WARNING"
                };
                println!("  [{severity}] {}: {}", error.category, error.message);
            }
        }

        if !self.warnings.is_empty() {
            println!("\nWarnings ({}):", self.warnings.len());
            for warning in &self.warnings {
                println!("  - {warning}");
            }
        }

        let status = if self.is_successful() {
            "SUCCESS"
        } else {
            "COMPLETED WITH ERRORS"
        };
        println!("\nOverall Status: {status}");
    }
}

/// A post created on the destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigratedPost {
    pub source_id: u64,
    pub destination_id: u64,
    pub title: String,
    pub featured_media: Option<u64>,
}

/// Information about an error that occurred during migration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationErrorInfo {
    /// Category of the error (e.g., "post", "media").
    pub category: String,

    /// Error message.
    pub message: String,

    /// Whether this error is critical (blocks migration success).
    pub is_critical: bool,
}
