//! # WordPress Migration Tools
//!
//! This crate copies published posts, and each post's featured image, from
//! one WordPress site to another through their REST APIs.
//!
//! ## Pipeline
//!
//! - **Capability detection**: picks the modern `wp/v2` API or the legacy
//!   one and stops early on rejected credentials
//! - **Paginated fetch**: reads every published post from the source
//! - **Transform**: reduces each post to the fields the destination accepts
//! - **Media migration**: downloads and re-uploads featured images
//! - **Migration**: runs the steps above, one post at a time
//!
//! Migration is one-way and not idempotent: every run re-creates all posts
//! and images on the destination.
//!
//! ## Example
//!
//! ```rust,ignore
//! use wp_migrate::{ClientConfig, MigrationOptions, SiteEndpoint, WordPressMigrator, WpClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = WpClient::new(ClientConfig::default())?;
//!     let source = SiteEndpoint::new("https://old.example.com", "admin", "app-password")?;
//!     let destination = SiteEndpoint::new("https://new.example.com", "admin", "app-password")?;
//!
//!     let migrator =
//!         WordPressMigrator::new(client, source, destination, MigrationOptions::default());
//!     let report = migrator.run().await?;
//!
//!     report.print_summary();
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod detect;
pub mod error;
pub mod fetch;
pub mod media;
pub mod migrator;
pub mod progress;
pub mod transform;
pub mod types;

// Re-export main types
pub use client::{ClientConfig, Credentials, SiteEndpoint, WpClient};
pub use detect::{Capabilities, CapabilityDetector, ProbeOutcome, ProbeResult};
pub use error::{MediaError, MigrationError, Result};
pub use fetch::PostFetcher;
pub use media::MediaMigrator;
pub use migrator::{PostOutcome, WordPressMigrator};
pub use progress::{MigrationPhase, MigrationProgress, ProgressCallback, ProgressUpdate};
pub use types::*;

/// Version of the migration tools.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_user_agent_carries_version() {
        let config = ClientConfig::default();
        assert_eq!(config.user_agent, format!("wp-migrate/{VERSION}"));
        assert_eq!(config.request_timeout, std::time::Duration::from_secs(60));
    }

    #[test]
    fn test_report_starts_empty() {
        let report = MigrationReport::new();
        assert!(report.is_successful());
        assert_eq!(report.posts_created, 0);
        assert!(report.started_at.is_some());
    }
}
