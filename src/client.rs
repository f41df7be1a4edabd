//! GlotPress translation update-check client.
//!
//! One POST per item to `{uri}/wp-json/gp/translations/update-check/{version}/`.
//! Every failure is reported as "no result" to the updater; the typed
//! [`QueryError`] is only exposed through [`TranslationClient::try_check_for_updates`].

use crate::config::{Config, DevOverrides};
use crate::error::QueryError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;
use tracing::{debug, warn};
use url::{Host, Url};

/// Route under the GlotPress base URI, without the version segment.
pub const UPDATE_CHECK_ROUTE: &str = "wp-json/gp/translations/update-check";

/// Replaces or vetoes the computed endpoint. Receives the endpoint and the
/// raw service URI; returning `None` skips the item.
pub type EndpointOverride = Arc<dyn Fn(&str, &str) -> Option<String> + Send + Sync>;

/// Body sent to the translation server.
#[derive(Debug, Serialize)]
pub struct RemoteQueryPayload<'a> {
    pub item: &'a str,
    pub locale: &'a [String],
    pub translations: &'a Value,
}

/// One language a translation server has a package for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageUpdate {
    pub language: String,
    /// Passed through as sent; some servers use a unix timestamp.
    #[serde(deserialize_with = "string_or_number")]
    pub updated: String,
    pub package: String,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or number, got {}",
            other
        ))),
    }
}

#[derive(Clone)]
pub struct TranslationClient {
    http: reqwest::Client,
    api_version: String,
    dev: DevOverrides,
    endpoint_override: Option<EndpointOverride>,
}

impl std::fmt::Debug for TranslationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslationClient")
            .field("api_version", &self.api_version)
            .field("dev", &self.dev)
            .field("endpoint_override", &self.endpoint_override.is_some())
            .finish()
    }
}

impl TranslationClient {
    pub fn new(config: &Config) -> Result<Self> {
        if config.dev.accept_invalid_certs {
            warn!("TLS certificate verification is disabled for GlotPress requests");
        }

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .danger_accept_invalid_certs(config.dev.accept_invalid_certs)
            .build()
            .context("Failed to build HTTP client for GlotPress requests")?;

        Ok(Self {
            http,
            api_version: config.api_version.clone(),
            dev: config.dev,
            endpoint_override: None,
        })
    }

    pub fn with_endpoint_override(mut self, endpoint_override: EndpointOverride) -> Self {
        self.endpoint_override = Some(endpoint_override);
        self
    }

    /// Resolve the update-check endpoint for a service URI without
    /// touching the network.
    pub fn endpoint_for(&self, service_uri: &str) -> Result<Url, QueryError> {
        let base = parse_http_url(service_uri)
            .ok_or_else(|| QueryError::InvalidServiceUri(service_uri.to_string()))?;

        let mut endpoint = base.to_string();
        if !endpoint.ends_with('/') {
            endpoint.push('/');
        }
        endpoint.push_str(&format!("{}/{}/", UPDATE_CHECK_ROUTE, self.api_version));

        let endpoint = match &self.endpoint_override {
            Some(f) => f(&endpoint, service_uri)
                .ok_or_else(|| QueryError::EndpointRejected(service_uri.to_string()))?,
            None => endpoint,
        };

        let url = parse_http_url(&endpoint)
            .ok_or_else(|| QueryError::EndpointRejected(service_uri.to_string()))?;

        if !self.dev.allow_local_destinations && is_local_host(&url) {
            return Err(QueryError::LocalDestination(
                url.host_str().unwrap_or_default().to_string(),
            ));
        }

        Ok(url)
    }

    /// Ask a GlotPress server for translation updates. `None` on any failure.
    pub async fn check_for_updates(
        &self,
        service_uri: &str,
        service_path: &str,
        locales: &[String],
        translations: &Value,
    ) -> Option<Vec<LanguageUpdate>> {
        match self
            .try_check_for_updates(service_uri, service_path, locales, translations)
            .await
        {
            Ok(updates) => Some(updates),
            Err(e) if e.is_pre_flight() => {
                debug!("Skipping '{}' without a request: {}", service_path, e);
                None
            }
            Err(e) => {
                warn!("No translation updates for '{}': {}", service_path, e);
                None
            }
        }
    }

    pub async fn try_check_for_updates(
        &self,
        service_uri: &str,
        service_path: &str,
        locales: &[String],
        translations: &Value,
    ) -> Result<Vec<LanguageUpdate>, QueryError> {
        let endpoint = self.endpoint_for(service_uri)?;
        let url = endpoint.to_string();

        let payload = RemoteQueryPayload {
            item: service_path,
            locale: locales,
            translations,
        };

        debug!("POST {} for '{}' ({} locales)", url, service_path, locales.len());

        let response = self
            .http
            .post(endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|source| QueryError::Transport {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| QueryError::Transport {
                url: url.clone(),
                source,
            })?;

        if status != reqwest::StatusCode::OK {
            return Err(QueryError::UnexpectedStatus {
                url,
                status: status.as_u16(),
                body,
            });
        }

        parse_updates(&url, &body)
    }
}

/// Decode a GlotPress response body into language descriptors.
fn parse_updates(url: &str, body: &str) -> Result<Vec<LanguageUpdate>, QueryError> {
    let value: Value = serde_json::from_str(body).map_err(|e| QueryError::MalformedResponse {
        url: url.to_string(),
        message: e.to_string(),
        body: body.to_string(),
    })?;

    let entries: Vec<Value> = match value {
        Value::Array(values) => values,
        Value::Object(map) => map.into_iter().map(|(_, v)| v).collect(),
        _ => Vec::new(),
    };

    if entries.is_empty() {
        return Err(QueryError::EmptyResponse {
            url: url.to_string(),
        });
    }

    let total = entries.len();
    let updates: Vec<LanguageUpdate> = entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<LanguageUpdate>(entry) {
            Ok(update) => Some(update),
            Err(e) => {
                warn!("Skipping malformed language entry from {}: {}", url, e);
                None
            }
        })
        .collect();

    if updates.is_empty() {
        return Err(QueryError::MalformedResponse {
            url: url.to_string(),
            message: format!("none of {} entries is a language update", total),
            body: body.to_string(),
        });
    }

    Ok(updates)
}

/// Absolute http(s) URL with a host.
fn parse_http_url(raw: &str) -> Option<Url> {
    let url = Url::parse(raw.trim()).ok()?;
    let has_host = url.host_str().is_some_and(|h| !h.is_empty());
    (matches!(url.scheme(), "http" | "https") && has_host).then_some(url)
}

fn is_local_host(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => {
            let domain = domain.to_ascii_lowercase();
            domain == "localhost" || domain.ends_with(".localhost")
        }
        Some(Host::Ipv4(ip)) => is_local_ipv4(ip),
        Some(Host::Ipv6(ip)) => is_local_ipv6(ip),
        None => true,
    }
}

fn is_local_ipv4(ip: Ipv4Addr) -> bool {
    ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
}

fn is_local_ipv6(ip: Ipv6Addr) -> bool {
    if let Some(v4) = ip.to_ipv4_mapped() {
        return is_local_ipv4(v4);
    }
    let first = ip.segments()[0];
    ip.is_loopback()
        || ip.is_unspecified()
        || (first & 0xfe00) == 0xfc00
        || (first & 0xffc0) == 0xfe80
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::{
        matchers::{body_json, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    const ROUTE: &str = "/wp-json/gp/translations/update-check/1.1/";

    fn create_test_config() -> Config {
        Config {
            dev: DevOverrides {
                allow_local_destinations: true,
                accept_invalid_certs: false,
            },
            ..Config::default()
        }
    }

    fn create_client() -> TranslationClient {
        TranslationClient::new(&create_test_config()).expect("client should build")
    }

    fn locales() -> Vec<String> {
        vec!["de_DE".to_string()]
    }

    fn create_updates_response() -> Value {
        json!([
            {
                "language": "de_DE",
                "updated": "2024-01-01 00:00:00",
                "package": "https://example.com/pkg.zip"
            }
        ])
    }

    // ==================== Endpoint Tests ====================

    #[test]
    fn test_endpoint_for_appends_versioned_route() {
        let client = TranslationClient::new(&Config::default()).unwrap();
        assert_eq!(
            client.endpoint_for("https://gp.example.com").unwrap().as_str(),
            "https://gp.example.com/wp-json/gp/translations/update-check/1.1/"
        );
        assert_eq!(
            client.endpoint_for("https://example.com/glotpress/").unwrap().as_str(),
            "https://example.com/glotpress/wp-json/gp/translations/update-check/1.1/"
        );
    }

    #[test]
    fn test_endpoint_for_uses_configured_version() {
        let config = Config {
            api_version: "2.0".to_string(),
            ..Config::default()
        };
        let client = TranslationClient::new(&config).unwrap();
        assert!(client
            .endpoint_for("https://gp.example.com")
            .unwrap()
            .as_str()
            .ends_with("/update-check/2.0/"));
    }

    #[test]
    fn test_endpoint_for_rejects_invalid_uris() {
        let client = TranslationClient::new(&Config::default()).unwrap();
        for uri in ["", "example.com", "/relative/path", "ftp://example.com", "mailto:a@b.c"] {
            let err = client.endpoint_for(uri).unwrap_err();
            assert!(
                matches!(err, QueryError::InvalidServiceUri(_)),
                "{} should be invalid, got {:?}",
                uri,
                err
            );
        }
    }

    #[test]
    fn test_endpoint_for_rejects_local_destinations_by_default() {
        let client = TranslationClient::new(&Config::default()).unwrap();
        for uri in [
            "http://localhost:8080",
            "http://127.0.0.1",
            "http://10.0.0.5",
            "http://192.168.1.10",
            "http://[::1]",
            "http://[fd00::1]",
        ] {
            let err = client.endpoint_for(uri).unwrap_err();
            assert!(
                matches!(err, QueryError::LocalDestination(_)),
                "{} should be local, got {:?}",
                uri,
                err
            );
        }
    }

    #[test]
    fn test_endpoint_for_allows_local_with_dev_overrides() {
        let client = create_client();
        assert!(client.endpoint_for("http://127.0.0.1:8080").is_ok());
    }

    #[test]
    fn test_endpoint_override_replaces_endpoint() {
        let client = TranslationClient::new(&Config::default())
            .unwrap()
            .with_endpoint_override(Arc::new(|_endpoint: &str, uri: &str| {
                Some(format!("{}/custom/check/", uri.trim_end_matches('/')))
            }));

        assert_eq!(
            client.endpoint_for("https://gp.example.com/").unwrap().as_str(),
            "https://gp.example.com/custom/check/"
        );
    }

    #[test]
    fn test_endpoint_override_can_veto() {
        let client = TranslationClient::new(&Config::default())
            .unwrap()
            .with_endpoint_override(Arc::new(|_: &str, _: &str| -> Option<String> { None }));

        assert!(matches!(
            client.endpoint_for("https://gp.example.com"),
            Err(QueryError::EndpointRejected(_))
        ));
    }

    #[test]
    fn test_endpoint_override_result_is_validated() {
        let client = TranslationClient::new(&Config::default())
            .unwrap()
            .with_endpoint_override(Arc::new(|_: &str, _: &str| Some("nonsense".to_string())));

        assert!(matches!(
            client.endpoint_for("https://gp.example.com"),
            Err(QueryError::EndpointRejected(_))
        ));
    }

    // ==================== Response Parsing Tests ====================

    #[test]
    fn test_parse_updates_array() {
        let body = create_updates_response().to_string();
        let updates = parse_updates("https://x", &body).unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].language, "de_DE");
    }

    #[test]
    fn test_parse_updates_keyed_object() {
        let body = json!({
            "de_DE": {"language": "de_DE", "updated": "2024-01-01", "package": "https://x/de.zip"}
        })
        .to_string();
        let updates = parse_updates("https://x", &body).unwrap();
        assert_eq!(updates[0].package, "https://x/de.zip");
    }

    #[test]
    fn test_parse_updates_empty_and_malformed() {
        assert!(matches!(
            parse_updates("https://x", "[]"),
            Err(QueryError::EmptyResponse { .. })
        ));
        assert!(matches!(
            parse_updates("https://x", "\"ok\""),
            Err(QueryError::EmptyResponse { .. })
        ));
        assert!(matches!(
            parse_updates("https://x", "<html>"),
            Err(QueryError::MalformedResponse { .. })
        ));
        assert!(matches!(
            parse_updates("https://x", "[{\"language\": 1}]"),
            Err(QueryError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn test_parse_updates_accepts_numeric_updated() {
        let body = json!([
            {"language": "de_DE", "updated": 1704067200, "package": "https://x/de.zip"},
            {"language": "fr_FR", "updated": true, "package": "https://x/fr.zip"}
        ])
        .to_string();
        let updates = parse_updates("https://x", &body).unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].updated, "1704067200");
    }

    #[test]
    fn test_parse_updates_skips_bad_entries() {
        let body = json!([
            {"language": "de_DE"},
            {"language": "fr_FR", "updated": "2024-01-01", "package": "https://x/fr.zip"}
        ])
        .to_string();
        let updates = parse_updates("https://x", &body).unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].language, "fr_FR");
    }

    // ==================== Integration Tests with Wiremock ====================

    #[tokio::test]
    async fn test_check_for_updates_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(ROUTE))
            .and(body_json(json!({
                "item": "my-plugin",
                "locale": ["de_DE"],
                "translations": {"de_DE": {"updated": "2023-01-01 00:00:00"}}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(create_updates_response()))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_client();
        let updates = client
            .check_for_updates(
                &mock_server.uri(),
                "my-plugin",
                &locales(),
                &json!({"de_DE": {"updated": "2023-01-01 00:00:00"}}),
            )
            .await
            .expect("Should return updates");

        assert_eq!(
            updates,
            vec![LanguageUpdate {
                language: "de_DE".to_string(),
                updated: "2024-01-01 00:00:00".to_string(),
                package: "https://example.com/pkg.zip".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_check_for_updates_server_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(ROUTE))
            .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
            .expect(2)
            .mount(&mock_server)
            .await;

        let client = create_client();
        let result = client
            .try_check_for_updates(&mock_server.uri(), "my-plugin", &locales(), &json!({}))
            .await;

        match result {
            Err(QueryError::UnexpectedStatus { status, body, .. }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "Internal Server Error");
            }
            other => panic!("expected UnexpectedStatus, got {:?}", other),
        }

        let none = client
            .check_for_updates(&mock_server.uri(), "my-plugin", &locales(), &json!({}))
            .await;
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn test_check_for_updates_non_200_success_is_failure() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(ROUTE))
            .respond_with(ResponseTemplate::new(201).set_body_json(create_updates_response()))
            .mount(&mock_server)
            .await;

        let client = create_client();
        let result = client
            .try_check_for_updates(&mock_server.uri(), "my-plugin", &locales(), &json!({}))
            .await;

        assert!(matches!(
            result,
            Err(QueryError::UnexpectedStatus { status: 201, .. })
        ));
    }

    #[tokio::test]
    async fn test_check_for_updates_empty_list() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(ROUTE))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&mock_server)
            .await;

        let client = create_client();
        let result = client
            .check_for_updates(&mock_server.uri(), "my-plugin", &locales(), &json!({}))
            .await;

        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_check_for_updates_timeout() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(ROUTE))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(create_updates_response())
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&mock_server)
            .await;

        let config = Config {
            request_timeout: Duration::from_millis(200),
            ..create_test_config()
        };
        let client = TranslationClient::new(&config).unwrap();

        let start = std::time::Instant::now();
        let result = client
            .try_check_for_updates(&mock_server.uri(), "my-plugin", &locales(), &json!({}))
            .await;
        let elapsed = start.elapsed();

        assert!(matches!(result, Err(QueryError::Transport { .. })));
        assert!(
            elapsed < Duration::from_secs(2),
            "Should give up at the timeout, took {:?}",
            elapsed
        );
    }

    #[tokio::test]
    async fn test_check_for_updates_invalid_uri_makes_no_request() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(create_updates_response()))
            .expect(0)
            .mount(&mock_server)
            .await;

        let client = create_client();
        let result = client
            .check_for_updates("not-a-url", "my-plugin", &locales(), &json!({}))
            .await;

        assert!(result.is_none());
        let received = mock_server.received_requests().await.unwrap_or_default();
        assert_eq!(received.len(), 0);
    }

    #[tokio::test]
    async fn test_check_for_updates_local_destination_blocked_without_dev() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(create_updates_response()))
            .expect(0)
            .mount(&mock_server)
            .await;

        let client = TranslationClient::new(&Config::default()).unwrap();
        let result = client
            .try_check_for_updates(&mock_server.uri(), "my-plugin", &locales(), &json!({}))
            .await;

        assert!(matches!(result, Err(QueryError::LocalDestination(_))));
    }
}
