//! End-to-end migration of posts between two WordPress sites.

use crate::client::{SiteEndpoint, WpClient};
use crate::detect::CapabilityDetector;
use crate::error::{truncate_body, MigrationError, Result};
use crate::fetch::PostFetcher;
use crate::media::MediaMigrator;
use crate::progress::{MigrationPhase, MigrationProgress};
use crate::transform;
use crate::types::{CreatedResource, MigratedPost, MigrationOptions, MigrationReport, SourcePost};

use reqwest::StatusCode;
use tracing::{error, info, warn};

const ERROR_BODY_PREFIX: usize = 1000;

/// What happened to a single post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostOutcome {
    /// Created on the destination under `id`.
    Created { id: u64, featured_media: Option<u64> },
    /// The destination refused the post.
    Rejected { status: u16, body: String },
}

/// Migrates every published post, with its featured image, from one site
/// to another.
///
/// The run is strictly sequential: capability detection, a full fetch of
/// the source posts, then one post at a time (image first, post second).
pub struct WordPressMigrator {
    client: WpClient,
    source: SiteEndpoint,
    destination: SiteEndpoint,
    options: MigrationOptions,
    progress: MigrationProgress,
}

impl WordPressMigrator {
    /// Create a new migrator.
    pub fn new(
        client: WpClient,
        source: SiteEndpoint,
        destination: SiteEndpoint,
        options: MigrationOptions,
    ) -> Self {
        Self {
            client,
            source,
            destination,
            options,
            progress: MigrationProgress::new(),
        }
    }

    /// Set a progress callback.
    pub fn with_progress(mut self, progress: MigrationProgress) -> Self {
        self.progress = progress;
        self
    }

    /// Run the migration.
    ///
    /// # Errors
    ///
    /// Fatal errors only: an unreachable or credential-rejecting source, a
    /// failed page fetch, or a transport failure while creating a post.
    /// Per-post rejections and image failures are recorded in the report.
    pub async fn run(&self) -> Result<MigrationReport> {
        let mut report = MigrationReport::new();

        info!(
            source = %self.source.base_url(),
            destination = %self.destination.base_url(),
            "Starting post migration"
        );
        warn!("Posts and media are created without deduplication; re-running duplicates content on the destination");
        self.progress.set_phase(MigrationPhase::Initializing, 1);

        // Step 1: Detect the source API variant
        self.progress.set_phase(MigrationPhase::DetectingCapabilities, 1);
        let capabilities = CapabilityDetector::new(self.client.clone())
            .detect(&self.source)
            .await?;
        let source = self.source.clone().with_variant(capabilities.variant);
        report.variant = Some(capabilities.variant);
        report.wordpress_version = capabilities.wordpress_version;

        // Step 2: Fetch every published post
        self.progress.set_phase(MigrationPhase::FetchingPosts, 1);
        let posts = PostFetcher::new(self.client.clone(), &self.options)
            .fetch_all(&source)
            .await?;
        report.posts_fetched = posts.len();

        // Step 3: Migrate posts one by one
        self.progress.set_phase(MigrationPhase::MigratingPosts, posts.len() as u64);
        let media = MediaMigrator::new(self.client.clone());

        for post in &posts {
            match self.migrate_post(post, &source, &media, &mut report).await? {
                PostOutcome::Created { id, featured_media } => {
                    report.add_migrated(MigratedPost {
                        source_id: post.id,
                        destination_id: id,
                        title: post.title.rendered.clone(),
                        featured_media,
                    });
                }
                PostOutcome::Rejected { status, body } => {
                    report.posts_failed += 1;
                    report.add_error(
                        "post",
                        &format!("post {} rejected with status {status}: {body}", post.id),
                        false,
                    );
                }
            }
            self.progress.increment(Some(post.title.rendered.as_str()));
        }

        self.progress.set_phase(MigrationPhase::Complete, 1);
        report.complete();

        info!(
            created = report.posts_created,
            failed = report.posts_failed,
            "Post migration complete"
        );

        Ok(report)
    }

    /// Migrate one post: its featured image first, then the post itself.
    async fn migrate_post(
        &self,
        post: &SourcePost,
        source: &SiteEndpoint,
        media: &MediaMigrator,
        report: &mut MigrationReport,
    ) -> Result<PostOutcome> {
        let title = if post.title.rendered.is_empty() {
            "Untitled"
        } else {
            post.title.rendered.as_str()
        };
        info!(post_id = post.id, "Migrating post: {title}");

        let mut payload = transform::to_destination(post);

        if let Some(media_id) = post.featured_image_id() {
            match media.migrate(media_id, source, &self.destination).await {
                Some(new_id) => {
                    report.images_migrated += 1;
                    payload = payload.with_featured_media(new_id);
                }
                None => {
                    report.images_failed += 1;
                    report.add_warning(format!(
                        "post {} created without its featured image {media_id}",
                        post.id
                    ));
                }
            }
        }

        let response = self
            .client
            .authed_post(&self.destination, &self.destination.posts_url())
            .json(&payload)
            .timeout(self.client.request_timeout())
            .send()
            .await
            .map_err(|e| {
                error!(post_id = post.id, "Error migrating post: {e}");
                MigrationError::Network(e.to_string())
            })?;

        let status = response.status();
        if status == StatusCode::CREATED {
            let created: CreatedResource = response.json().await?;
            info!(post_id = post.id, new_id = created.id, "Post migrated");
            return Ok(PostOutcome::Created {
                id: created.id,
                featured_media: payload.featured_media,
            });
        }

        let body = response.text().await.unwrap_or_default();
        let body = truncate_body(&body, ERROR_BODY_PREFIX).to_string();
        error!(post_id = post.id, status = status.as_u16(), "Error migrating post");
        error!("Response: {body}");

        Ok(PostOutcome::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientConfig;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount_modern_source(server: &MockServer, posts: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/wp-json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/wp-json/wp/v2/posts"))
            .and(query_param("per_page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/wp-json/wp/v2/posts"))
            .and(query_param("page", "1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(posts)
                    .insert_header("X-WP-TotalPages", "1"),
            )
            .mount(server)
            .await;
    }

    fn migrator(source: &MockServer, destination: &MockServer) -> WordPressMigrator {
        let client = WpClient::new(ClientConfig::default()).unwrap();
        let src = SiteEndpoint::new(&source.uri(), "src", "pass").unwrap();
        let dst = SiteEndpoint::new(&destination.uri(), "dst", "pass").unwrap();
        let options = MigrationOptions::default().with_page_delay(Duration::ZERO);
        WordPressMigrator::new(client, src, dst, options)
    }

    fn post(id: u64, title: &str) -> serde_json::Value {
        json!({
            "id": id,
            "title": {"rendered": title},
            "content": {"rendered": format!("<p>{title}</p>")},
            "excerpt": {"rendered": ""},
            "categories": [2],
            "tags": [3],
            "featured_media": 0
        })
    }

    #[tokio::test]
    async fn test_continues_past_rejected_post() {
        let source = MockServer::start().await;
        let destination = MockServer::start().await;
        mount_modern_source(
            &source,
            json!([post(1, "One"), post(2, "Two"), post(3, "Three")]),
        )
        .await;

        Mock::given(method("POST"))
            .and(path("/wp-json/wp/v2/posts"))
            .and(body_partial_json(json!({"title": "Two"})))
            .respond_with(ResponseTemplate::new(500).set_body_string("database error"))
            .with_priority(1)
            .expect(1)
            .mount(&destination)
            .await;
        Mock::given(method("POST"))
            .and(path("/wp-json/wp/v2/posts"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 500})))
            .expect(2)
            .mount(&destination)
            .await;

        let report = migrator(&source, &destination).run().await.unwrap();

        assert_eq!(report.posts_fetched, 3);
        assert_eq!(report.posts_created, 2);
        assert_eq!(report.posts_failed, 1);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].message.contains("database error"));
        assert!(!report.is_successful());
    }

    #[tokio::test]
    async fn test_payload_is_published_with_ids() {
        let source = MockServer::start().await;
        let destination = MockServer::start().await;
        mount_modern_source(&source, json!([post(1, "One")])).await;

        Mock::given(method("POST"))
            .and(path("/wp-json/wp/v2/posts"))
            .and(body_partial_json(json!({
                "title": "One",
                "content": "<p>One</p>",
                "status": "publish",
                "categories": [2],
                "tags": [3]
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 77})))
            .expect(1)
            .mount(&destination)
            .await;

        let report = migrator(&source, &destination).run().await.unwrap();

        assert_eq!(report.migrated.len(), 1);
        assert_eq!(report.migrated[0].destination_id, 77);
        assert_eq!(report.migrated[0].featured_media, None);

        let requests = destination.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert!(body.get("featured_media").is_none());
    }

    #[tokio::test]
    async fn test_failed_image_does_not_block_post() {
        let source = MockServer::start().await;
        let destination = MockServer::start().await;
        let mut with_image = post(1, "Pictured");
        with_image["featured_media"] = json!(12);
        mount_modern_source(&source, json!([with_image])).await;

        Mock::given(method("GET"))
            .and(path("/wp-json/wp/v2/media/12"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&source)
            .await;
        Mock::given(method("POST"))
            .and(path("/wp-json/wp/v2/posts"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 8})))
            .expect(1)
            .mount(&destination)
            .await;

        let report = migrator(&source, &destination).run().await.unwrap();

        assert_eq!(report.posts_created, 1);
        assert_eq!(report.images_failed, 1);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.is_successful());
    }

    #[tokio::test]
    async fn test_credentials_failure_prevents_fetch() {
        let source = MockServer::start().await;
        let destination = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/wp-json"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&source)
            .await;
        Mock::given(method("GET"))
            .and(path("/wp-json/wp/v2/posts"))
            .and(query_param("per_page", "1"))
            .respond_with(
                ResponseTemplate::new(500).set_body_json(json!({"code": "incorrect_password"})),
            )
            .mount(&source)
            .await;
        Mock::given(method("GET"))
            .and(path("/wp-json/wp/v2/posts"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(0)
            .mount(&source)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&destination)
            .await;

        let err = migrator(&source, &destination).run().await.unwrap_err();

        assert!(err.is_credentials_failure());
    }

    #[tokio::test]
    async fn test_fetch_failure_is_fatal() {
        let source = MockServer::start().await;
        let destination = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/wp-json"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&source)
            .await;
        Mock::given(method("GET"))
            .and(path("/wp-json/wp/v2/posts"))
            .and(query_param("per_page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&source)
            .await;
        Mock::given(method("GET"))
            .and(path("/wp-json/wp/v2/posts"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&source)
            .await;

        let err = migrator(&source, &destination).run().await.unwrap_err();

        assert!(matches!(err, MigrationError::PageFetch { page: 1, .. }));
    }

    #[tokio::test]
    async fn test_post_transport_failure_is_fatal() {
        let source = MockServer::start().await;
        mount_modern_source(&source, json!([post(1, "One"), post(2, "Two")])).await;

        // Bind and release a port so nothing is listening on it.
        let closed = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let destination_url = format!("http://{}", closed.local_addr().unwrap());
        drop(closed);

        let client = WpClient::new(ClientConfig::default()).unwrap();
        let src = SiteEndpoint::new(&source.uri(), "src", "pass").unwrap();
        let dst = SiteEndpoint::new(&destination_url, "dst", "pass").unwrap();
        let options = MigrationOptions::default().with_page_delay(Duration::ZERO);
        let migrator = WordPressMigrator::new(client, src, dst, options);

        let err = migrator.run().await.unwrap_err();

        assert!(matches!(err, MigrationError::Network(_)));
        assert!(!err.is_credentials_failure());
    }
}
