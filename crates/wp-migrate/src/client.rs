//! HTTP client and site endpoints for the WordPress REST API.

use crate::error::{MigrationError, Result};
use crate::types::ApiVariant;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{Client, RequestBuilder};
use std::time::Duration;
use url::Url;

/// Path of the REST API discovery root.
const API_ROOT: &str = "/wp-json";

/// Path prefix of the modern, versioned API.
const MODERN_PREFIX: &str = "/wp-json/wp/v2";

/// Settings for the shared HTTP client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Timeout for content list and create calls.
    pub request_timeout: Duration,

    /// Client-wide bound for every other call (probes, media transfer).
    pub default_timeout: Duration,

    /// User agent sent with every request.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(60),
            default_timeout: Duration::from_secs(300),
            user_agent: format!("wp-migrate/{}", crate::VERSION),
        }
    }
}

impl ClientConfig {
    /// Set the timeout for content list and create calls.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// HTTP client shared by every pipeline stage.
///
/// Built once per run and reused for source and destination calls. Cloning
/// is cheap; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct WpClient {
    http: Client,
    config: ClientConfig,
}

impl WpClient {
    /// Create a new client.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .timeout(config.default_timeout)
            .build()
            .map_err(|e| MigrationError::Network(e.to_string()))?;

        Ok(Self { http, config })
    }

    /// Timeout applied to content list and create calls.
    pub fn request_timeout(&self) -> Duration {
        self.config.request_timeout
    }

    /// Unauthenticated GET.
    pub fn get(&self, url: &str) -> RequestBuilder {
        self.http.get(url)
    }

    /// GET with the site's basic-auth credentials.
    pub fn authed_get(&self, site: &SiteEndpoint, url: &str) -> RequestBuilder {
        site.credentials.apply(self.http.get(url))
    }

    /// POST with the site's basic-auth credentials.
    pub fn authed_post(&self, site: &SiteEndpoint, url: &str) -> RequestBuilder {
        site.credentials.apply(self.http.post(url))
    }
}

/// Basic-auth credentials for one site.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    /// Create a credential pair.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// The account name.
    pub fn username(&self) -> &str {
        &self.username
    }

    fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        request.basic_auth(&self.username, Some(&self.password))
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A WordPress site: base URL, credentials and resolved API variant.
#[derive(Debug, Clone)]
pub struct SiteEndpoint {
    base_url: String,
    credentials: Credentials,
    variant: ApiVariant,
}

impl SiteEndpoint {
    /// Create an endpoint using the modern API variant.
    ///
    /// Trailing slashes are stripped from `base_url`.
    pub fn new(
        base_url: &str,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self> {
        let parsed = Url::parse(base_url)
            .map_err(|e| MigrationError::InvalidConfig(format!("Invalid URL {base_url}: {e}")))?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(MigrationError::InvalidConfig(format!(
                "Unsupported URL scheme in {base_url}. Expected http or https"
            )));
        }

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials: Credentials::new(username, password),
            variant: ApiVariant::Modern,
        })
    }

    /// The same endpoint speaking another API variant.
    #[must_use]
    pub fn with_variant(mut self, variant: ApiVariant) -> Self {
        self.variant = variant;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn variant(&self) -> ApiVariant {
        self.variant
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// REST API discovery root.
    pub fn api_root(&self) -> String {
        format!("{}{API_ROOT}", self.base_url)
    }

    /// A collection under the modern API, regardless of the resolved variant.
    pub fn modern_collection_url(&self, collection: &str) -> String {
        format!("{}{MODERN_PREFIX}/{collection}", self.base_url)
    }

    /// A collection under the legacy API, regardless of the resolved variant.
    pub fn legacy_collection_url(&self, collection: &str) -> String {
        format!("{}{API_ROOT}/{collection}", self.base_url)
    }

    fn collection_url(&self, collection: &str) -> String {
        match self.variant {
            ApiVariant::Modern => self.modern_collection_url(collection),
            ApiVariant::Legacy => self.legacy_collection_url(collection),
        }
    }

    /// Posts collection for the resolved variant.
    pub fn posts_url(&self) -> String {
        self.collection_url("posts")
    }

    /// Media collection for the resolved variant.
    pub fn media_url(&self) -> String {
        self.collection_url("media")
    }

    /// A single media item for the resolved variant.
    pub fn media_item_url(&self, id: u64) -> String {
        format!("{}/{id}", self.media_url())
    }

    /// File that carries the `$wp_version` marker.
    pub fn version_marker_url(&self) -> String {
        format!("{}/wp-includes/version.php", self.base_url)
    }

    /// Admin diagnostic endpoint.
    pub fn admin_diagnostic_url(&self) -> String {
        format!("{}/wp-admin/admin-ajax.php", self.base_url)
    }
}
