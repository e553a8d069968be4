//! Paginated enumeration of published posts.

use crate::client::{SiteEndpoint, WpClient};
use crate::error::{truncate_body, MigrationError, Result};
use crate::types::{ApiVariant, MigrationOptions, SourcePost};

use reqwest::Response;
use std::time::Duration;
use tracing::{debug, error, info};

/// Fields requested from the modern API.
const POST_FIELDS: &str = "id,title,content,excerpt,featured_media,categories,tags";

/// Header carrying the total page count on the modern API.
const TOTAL_PAGES_HEADER: &str = "x-wp-totalpages";

const LOG_BODY_PREFIX: usize = 500;
const ERROR_BODY_PREFIX: usize = 1000;

/// Walks the source's posts collection page by page.
pub struct PostFetcher {
    client: WpClient,
    per_page: u32,
    page_delay: Duration,
}

impl PostFetcher {
    pub fn new(client: WpClient, options: &MigrationOptions) -> Self {
        Self {
            client,
            per_page: options.per_page.max(1),
            page_delay: options.page_delay,
        }
    }

    /// Fetch every published post from `site`, in API order.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::PageFetch`] for the first page that fails;
    /// posts collected before that page are discarded.
    pub async fn fetch_all(&self, site: &SiteEndpoint) -> Result<Vec<SourcePost>> {
        let variant = site.variant();
        let url = site.posts_url();
        let mut posts = Vec::new();
        let mut page: u32 = 1;

        info!(variant = %variant, "Collecting posts");

        loop {
            debug!(page, "Fetching page of posts");

            let (current, total_pages) = self
                .fetch_page(site, &url, page)
                .await
                .map_err(|e| {
                    error!(page, "Failed to fetch page: {e}");
                    MigrationError::PageFetch {
                        page,
                        source: Box::new(e),
                    }
                })?;

            if current.is_empty() {
                break;
            }

            let returned = current.len();
            posts.extend(current);
            info!("Collected {} posts so far", posts.len());

            let last_page = match variant {
                ApiVariant::Legacy => returned < self.per_page as usize,
                ApiVariant::Modern => page >= total_pages,
            };
            if last_page {
                break;
            }

            page += 1;
            tokio::time::sleep(self.page_delay).await;
        }

        info!("Collected {} posts in total", posts.len());
        Ok(posts)
    }

    /// Fetch one page, returning its posts and the reported page count.
    async fn fetch_page(
        &self,
        site: &SiteEndpoint,
        url: &str,
        page: u32,
    ) -> Result<(Vec<SourcePost>, u32)> {
        let mut request = self
            .client
            .authed_get(site, url)
            .query(&[
                ("page", page.to_string()),
                ("per_page", self.per_page.to_string()),
                ("status", "publish".to_string()),
            ])
            .timeout(self.client.request_timeout());

        if site.variant() == ApiVariant::Modern {
            request = request.query(&[("_fields", POST_FIELDS)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| MigrationError::Network(e.to_string()))?;

        let status = response.status();
        let total_pages = total_pages(&response);
        debug!(status = status.as_u16(), "Status code");
        debug!("Headers: {:?}", response.headers());

        let body = response
            .text()
            .await
            .map_err(|e| MigrationError::Network(e.to_string()))?;
        debug!("Response: {}", truncate_body(&body, LOG_BODY_PREFIX));

        if !status.is_success() {
            return Err(MigrationError::Api {
                status: status.as_u16(),
                body: truncate_body(&body, ERROR_BODY_PREFIX).to_string(),
            });
        }

        let posts: Vec<SourcePost> = serde_json::from_str(&body)?;
        Ok((posts, total_pages))
    }
}

/// Page count reported by the modern API; absent or unparsable counts as 0.
fn total_pages(response: &Response) -> u32 {
    response
        .headers()
        .get(TOTAL_PAGES_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}
