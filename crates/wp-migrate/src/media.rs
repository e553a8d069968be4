//! Featured image migration.
//!
//! An image is copied in three steps: read its metadata from the source,
//! download the file, upload it to the destination. Any failure drops the
//! image and lets the owning post continue without one.

use crate::client::{SiteEndpoint, WpClient};
use crate::error::{truncate_body, MediaError};
use crate::types::{CreatedResource, MediaItem};

use futures::StreamExt;
use reqwest::header::ACCEPT;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use tracing::{debug, error, info};
use url::Url;

const ERROR_BODY_PREFIX: usize = 1000;

/// Copies featured images from the source site to the destination.
pub struct MediaMigrator {
    client: WpClient,
}

impl MediaMigrator {
    pub fn new(client: WpClient) -> Self {
        Self { client }
    }

    /// Copy media `media_id` and return its id on the destination.
    ///
    /// Returns `None` when any step fails; the failure is logged.
    pub async fn migrate(
        &self,
        media_id: u64,
        source: &SiteEndpoint,
        destination: &SiteEndpoint,
    ) -> Option<u64> {
        info!(media_id, "Processing featured image");

        match self.try_migrate(media_id, source, destination).await {
            Ok(new_id) => {
                info!(media_id, new_id, "Image uploaded");
                Some(new_id)
            }
            Err(e) => {
                error!(media_id, "Featured image dropped: {e}");
                None
            }
        }
    }

    async fn try_migrate(
        &self,
        media_id: u64,
        source: &SiteEndpoint,
        destination: &SiteEndpoint,
    ) -> Result<u64, MediaError> {
        let source_url = self.fetch_source_url(media_id, source).await?;

        info!(url = %source_url, "Downloading image");
        let data = self.download(&source_url).await?;

        let file_name = file_name_from_url(&source_url, media_id);
        info!(file_name = %file_name, bytes = data.len(), "Uploading image to destination");
        self.upload(data, file_name, destination).await
    }

    async fn fetch_source_url(
        &self,
        media_id: u64,
        source: &SiteEndpoint,
    ) -> Result<String, MediaError> {
        let response = self
            .client
            .authed_get(source, &source.media_item_url(media_id))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(MediaError::Metadata {
                status: response.status().as_u16(),
            });
        }

        let item: MediaItem = response.json().await?;
        item.source_url
            .filter(|url| !url.is_empty())
            .ok_or(MediaError::MissingSourceUrl(item.id))
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, MediaError> {
        let response = self.client.get(url).header(ACCEPT, "*/*").send().await?;

        if !response.status().is_success() {
            return Err(MediaError::Download {
                status: response.status().as_u16(),
            });
        }

        let mut data = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            data.extend_from_slice(&chunk?);
        }

        debug!(bytes = data.len(), "Image downloaded");
        Ok(data)
    }

    async fn upload(
        &self,
        data: Vec<u8>,
        file_name: String,
        destination: &SiteEndpoint,
    ) -> Result<u64, MediaError> {
        let mime = mime_guess::from_path(&file_name).first_or_octet_stream();
        let part = Part::bytes(data)
            .file_name(file_name)
            .mime_str(mime.essence_str())
            .map_err(|e| MediaError::InvalidUpload(e.to_string()))?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .authed_post(destination, &destination.media_url())
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::CREATED {
            let body = response.text().await.unwrap_or_default();
            return Err(MediaError::Upload {
                status: status.as_u16(),
                body: truncate_body(&body, ERROR_BODY_PREFIX).to_string(),
            });
        }

        let created: CreatedResource = response.json().await?;
        Ok(created.id)
    }
}

/// Upload file name: the last path segment of the source URL.
fn file_name_from_url(source_url: &str, media_id: u64) -> String {
    Url::parse(source_url)
        .ok()
        .and_then(|url| {
            url.path_segments()
                .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
                .map(str::to_string)
        })
        .unwrap_or_else(|| format!("image-{media_id}"))
}
