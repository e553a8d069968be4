//! REST API capability detection.
//!
//! Decides whether the source speaks the modern `wp/v2` API or only the
//! legacy one, and stops the run early when the source rejects the
//! credentials.

use crate::client::{SiteEndpoint, WpClient};
use crate::error::{truncate_body, MigrationError, Result};
use crate::types::ApiVariant;

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, error, info, warn};

/// Collections probed, in order, to validate the modern API.
pub const PROBED_COLLECTIONS: [&str; 4] = ["posts", "pages", "categories", "tags"];

/// Error codes WordPress returns for bad basic-auth credentials.
const CREDENTIAL_ERROR_CODES: [&str; 2] = ["incorrect_password", "invalid_username"];

const LOG_BODY_PREFIX: usize = 500;

/// Outcome of a single capability probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Available,
    Failed(String),
}

impl ProbeOutcome {
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available)
    }
}

/// Result of probing one collection.
#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub collection: &'static str,
    pub outcome: ProbeOutcome,
}

/// What the detector learned about a site.
#[derive(Debug, Clone)]
pub struct Capabilities {
    /// Variant to use for the rest of the run.
    pub variant: ApiVariant,

    /// Per-collection probe results, in probe order.
    pub probes: Vec<ProbeResult>,

    /// Version read from the version marker, if exposed.
    pub wordpress_version: Option<String>,

    /// Whether the admin diagnostic endpoint answered.
    pub admin_diagnostics_reachable: bool,
}

#[derive(Debug, Deserialize)]
struct WpErrorBody {
    code: Option<String>,
    message: Option<String>,
}

/// Probes a site to pick an API variant.
pub struct CapabilityDetector {
    client: WpClient,
}

impl CapabilityDetector {
    pub fn new(client: WpClient) -> Self {
        Self { client }
    }

    /// Detect the API variant of `site`.
    ///
    /// # Errors
    ///
    /// * [`MigrationError::ApiUnreachable`] if the discovery root fails
    /// * [`MigrationError::IncorrectCredentials`] if any probe reports bad
    ///   credentials; no later probe is sent
    pub async fn detect(&self, site: &SiteEndpoint) -> Result<Capabilities> {
        info!(site = %site.base_url(), "Checking API accessibility");

        self.check_discovery_root(site).await?;

        let mut probes = Vec::with_capacity(PROBED_COLLECTIONS.len());
        for collection in PROBED_COLLECTIONS {
            let outcome = self.probe(site, collection).await?;
            probes.push(ProbeResult {
                collection,
                outcome,
            });
        }

        let mut variant = ApiVariant::Modern;
        if probes.iter().all(|p| !p.outcome.is_available()) {
            warn!("Every modern API probe failed, trying the legacy REST API");
            if self.probe_legacy(site).await {
                info!("Using the legacy REST API");
                variant = ApiVariant::Legacy;
            } else {
                warn!("Legacy REST API is not available either, keeping the modern API");
            }
        }

        let wordpress_version = self.read_version_marker(site).await;
        let admin_diagnostics_reachable = self.check_admin_diagnostics(site).await;

        info!(variant = %variant, "API check complete");

        Ok(Capabilities {
            variant,
            probes,
            wordpress_version,
            admin_diagnostics_reachable,
        })
    }

    async fn check_discovery_root(&self, site: &SiteEndpoint) -> Result<()> {
        let url = site.api_root();

        let response = self.client.get(&url).send().await.map_err(|e| {
            error!(url = %url, "Connection error: {e}");
            MigrationError::ApiUnreachable {
                url: url.clone(),
                reason: e.to_string(),
            }
        })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        debug!(
            status = status.as_u16(),
            "API root response: {}",
            truncate_body(&body, LOG_BODY_PREFIX)
        );

        if !status.is_success() {
            return Err(MigrationError::ApiUnreachable {
                url,
                reason: format!("status {status}"),
            });
        }

        Ok(())
    }

    async fn probe(&self, site: &SiteEndpoint, collection: &'static str) -> Result<ProbeOutcome> {
        let url = site.modern_collection_url(collection);

        let response = match self
            .client
            .authed_get(site, &url)
            .query(&[("per_page", "1")])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!(collection, "Probe request failed: {e}");
                return Ok(ProbeOutcome::Failed(e.to_string()));
            }
        };

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        debug!(collection, status = status.as_u16(), "Probe response");
        debug!("Response: {}", truncate_body(&body, LOG_BODY_PREFIX));

        if status.is_success() {
            return Ok(ProbeOutcome::Available);
        }

        if status.is_server_error() {
            if let Ok(err) = serde_json::from_str::<WpErrorBody>(&body) {
                if let Some(code) = err
                    .code
                    .filter(|c| CREDENTIAL_ERROR_CODES.contains(&c.as_str()))
                {
                    error!(collection, code = %code, "Authentication error: the supplied password is incorrect");
                    error!("Please check the username and password provided");
                    return Err(MigrationError::IncorrectCredentials {
                        endpoint: url,
                        code,
                        message: err.message.unwrap_or_default(),
                    });
                }
            }
        }

        error!(collection, status = status.as_u16(), "Probe failed");
        Ok(ProbeOutcome::Failed(format!("status {status}")))
    }

    async fn probe_legacy(&self, site: &SiteEndpoint) -> bool {
        let url = site.legacy_collection_url("posts");
        match self.client.authed_get(site, &url).send().await {
            Ok(response) => {
                debug!(status = response.status().as_u16(), "Legacy probe response");
                response.status().is_success()
            }
            Err(e) => {
                warn!("Legacy probe failed: {e}");
                false
            }
        }
    }

    async fn read_version_marker(&self, site: &SiteEndpoint) -> Option<String> {
        let response = match self.client.get(&site.version_marker_url()).send().await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                debug!(status = response.status().as_u16(), "Version marker not exposed");
                return None;
            }
            Err(e) => {
                warn!("Could not check WordPress version: {e}");
                return None;
            }
        };

        let text = response.text().await.ok()?;
        let version = parse_wp_version(&text);
        if let Some(version) = &version {
            info!(version = %version, "WordPress version");
        }
        version
    }

    async fn check_admin_diagnostics(&self, site: &SiteEndpoint) -> bool {
        match self
            .client
            .get(&site.admin_diagnostic_url())
            .query(&[("action", "php_info")])
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {
                info!("PHP info accessible");
                true
            }
            Ok(_) => false,
            Err(e) => {
                warn!("Could not check server configuration: {e}");
                false
            }
        }
    }
}

/// Extract `$wp_version` from the contents of `wp-includes/version.php`.
pub fn parse_wp_version(source: &str) -> Option<String> {
    let re = Regex::new(r"\$wp_version\s*=\s*'([^']+)'").ok()?;
    re.captures(source)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientConfig;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount_root(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/wp-json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "Test"})))
            .mount(server)
            .await;
    }

    async fn mount_probe(server: &MockServer, collection: &str, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(format!("/wp-json/wp/v2/{collection}")))
            .and(query_param("per_page", "1"))
            .respond_with(response)
            .mount(server)
            .await;
    }

    fn detector_and_site(server: &MockServer) -> (CapabilityDetector, SiteEndpoint) {
        let client = WpClient::new(ClientConfig::default()).unwrap();
        let site = SiteEndpoint::new(&server.uri(), "admin", "secret").unwrap();
        (CapabilityDetector::new(client), site)
    }

    #[test]
    fn test_parse_wp_version() {
        let source = "<?php\n$wp_version = '6.4.2';\n$wp_db_version = 56657;";
        assert_eq!(parse_wp_version(source), Some("6.4.2".to_string()));
        assert_eq!(parse_wp_version("<?php echo 'hi';"), None);
    }

    #[tokio::test]
    async fn test_detects_modern_api() {
        let server = MockServer::start().await;
        mount_root(&server).await;
        for collection in PROBED_COLLECTIONS {
            mount_probe(
                &server,
                collection,
                ResponseTemplate::new(200).set_body_json(json!([])),
            )
            .await;
        }

        let (detector, site) = detector_and_site(&server);
        let caps = detector.detect(&site).await.unwrap();

        assert_eq!(caps.variant, ApiVariant::Modern);
        assert_eq!(caps.probes.len(), 4);
        assert!(caps.probes.iter().all(|p| p.outcome.is_available()));
        assert!(caps.wordpress_version.is_none());
        assert!(!caps.admin_diagnostics_reachable);
    }

    #[tokio::test]
    async fn test_unreachable_root_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/wp-json"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let (detector, site) = detector_and_site(&server);
        let err = detector.detect(&site).await.unwrap_err();

        assert!(matches!(err, MigrationError::ApiUnreachable { .. }));
    }

    #[tokio::test]
    async fn test_incorrect_password_stops_probing() {
        let server = MockServer::start().await;
        mount_root(&server).await;
        mount_probe(
            &server,
            "posts",
            ResponseTemplate::new(500).set_body_json(json!({
                "code": "incorrect_password",
                "message": "The password you entered is incorrect."
            })),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/wp-json/wp/v2/pages"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let (detector, site) = detector_and_site(&server);
        let err = detector.detect(&site).await.unwrap_err();

        assert!(err.is_credentials_failure());
        match err {
            MigrationError::IncorrectCredentials { code, message, .. } => {
                assert_eq!(code, "incorrect_password");
                assert!(message.contains("incorrect"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_username_on_later_probe_is_fatal() {
        let server = MockServer::start().await;
        mount_root(&server).await;
        for collection in ["posts", "pages", "categories"] {
            mount_probe(&server, collection, ResponseTemplate::new(200).set_body_json(json!([])))
                .await;
        }
        mount_probe(
            &server,
            "tags",
            ResponseTemplate::new(500).set_body_json(json!({"code": "invalid_username"})),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/wp-json/posts"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let (detector, site) = detector_and_site(&server);
        let err = detector.detect(&site).await.unwrap_err();

        assert!(err.is_credentials_failure());
        assert!(matches!(
            err,
            MigrationError::IncorrectCredentials { ref code, .. } if code == "invalid_username"
        ));
    }

    #[tokio::test]
    async fn test_other_server_errors_keep_probing() {
        let server = MockServer::start().await;
        mount_root(&server).await;
        mount_probe(
            &server,
            "posts",
            ResponseTemplate::new(500).set_body_json(json!({"code": "internal_error"})),
        )
        .await;
        mount_probe(
            &server,
            "tags",
            ResponseTemplate::new(200).set_body_json(json!([])),
        )
        .await;

        let (detector, site) = detector_and_site(&server);
        let caps = detector.detect(&site).await.unwrap();

        assert_eq!(caps.variant, ApiVariant::Modern);
        assert!(!caps.probes[0].outcome.is_available());
        assert!(caps.probes[3].outcome.is_available());
    }

    #[tokio::test]
    async fn test_falls_back_to_legacy_api() {
        let server = MockServer::start().await;
        mount_root(&server).await;
        for collection in PROBED_COLLECTIONS {
            mount_probe(&server, collection, ResponseTemplate::new(500)).await;
        }
        Mock::given(method("GET"))
            .and(path("/wp-json/posts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let (detector, site) = detector_and_site(&server);
        let caps = detector.detect(&site).await.unwrap();

        assert_eq!(caps.variant, ApiVariant::Legacy);
    }

    #[tokio::test]
    async fn test_stays_modern_when_legacy_also_fails() {
        let server = MockServer::start().await;
        mount_root(&server).await;

        let (detector, site) = detector_and_site(&server);
        let caps = detector.detect(&site).await.unwrap();

        assert_eq!(caps.variant, ApiVariant::Modern);
        assert!(caps.probes.iter().all(|p| !p.outcome.is_available()));
    }

    #[tokio::test]
    async fn test_reads_version_marker() {
        let server = MockServer::start().await;
        mount_root(&server).await;
        mount_probe(
            &server,
            "posts",
            ResponseTemplate::new(200).set_body_json(json!([])),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/wp-includes/version.php"))
            .respond_with(ResponseTemplate::new(200).set_body_string("$wp_version = '5.9.3';"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/wp-admin/admin-ajax.php"))
            .and(query_param("action", "php_info"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let (detector, site) = detector_and_site(&server);
        let caps = detector.detect(&site).await.unwrap();

        assert_eq!(caps.wordpress_version.as_deref(), Some("5.9.3"));
        assert!(caps.admin_diagnostics_reachable);
    }
}
