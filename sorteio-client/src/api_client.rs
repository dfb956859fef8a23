//! Authenticated REST client for the image endpoint.

use crate::config::{AuthConfig, ClientConfig};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_DISPOSITION, CONTENT_TYPE};
use sorteio_core::{FetchError, FetchedImage, ImageFetcher};
use std::time::Duration;

/// Longest error body kept in [`ApiClientError::Status`].
const MAX_ERROR_BODY_BYTES: usize = 512;

#[derive(Debug, thiserror::Error)]
pub enum ApiClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Invalid request path: {0}")]
    InvalidPath(String),
    #[error("Config error: {0}")]
    Config(String),
}

impl From<ApiClientError> for FetchError {
    fn from(err: ApiClientError) -> Self {
        match err {
            ApiClientError::Status { status, body } => FetchError::Status { status, body },
            ApiClientError::Http(e) => FetchError::Http {
                reason: e.to_string(),
            },
            ApiClientError::InvalidPath(path) => FetchError::InvalidPath { path },
            ApiClientError::Config(reason) => FetchError::Http { reason },
        }
    }
}

#[derive(Clone)]
pub struct RestClient {
    client: reqwest::Client,
    base_url: String,
    auth_header: HeaderMap,
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Headers carry credentials.
        f.debug_struct("RestClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl RestClient {
    /// Build a client for the configured backend.
    ///
    /// Fetching needs an absolute base URL, so unlike URL building this
    /// rejects a config without `api_base_url`.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiClientError> {
        let base_url = config
            .api_base_url
            .as_deref()
            .map(|base| base.trim().trim_end_matches('/'))
            .filter(|base| !base.is_empty())
            .ok_or_else(|| {
                ApiClientError::Config("api_base_url is required to fetch images".to_string())
            })?
            .to_string();

        let timeout = Duration::from_millis(config.request_timeout_ms);
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        let auth_header = build_auth_headers(&config.auth)?;
        Ok(Self {
            client,
            base_url,
            auth_header,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for an endpoint-relative path.
    ///
    /// Rejects empty paths and `.`/`..` segments.
    pub fn url_for(&self, path: &str) -> Result<String, ApiClientError> {
        let relative = path.trim().trim_start_matches('/');
        let traverses = relative.split('/').any(|segment| segment == "." || segment == "..");
        if relative.is_empty() || traverses {
            return Err(ApiClientError::InvalidPath(path.to_string()));
        }
        Ok(format!("{}/{}", self.base_url, relative))
    }

    /// GET a binary resource, keeping the headers the resolver cares about.
    pub async fn get_bytes(&self, path: &str) -> Result<FetchedImage, ApiClientError> {
        let url = self.url_for(path)?;
        let response = self
            .client
            .get(url)
            .headers(self.auth_header.clone())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiClientError::Status {
                status: status.as_u16(),
                body: truncate_body(body),
            });
        }

        let headers = response.headers();
        let content_type = header_string(headers, &CONTENT_TYPE);
        let content_disposition = header_string(headers, &CONTENT_DISPOSITION);
        let bytes = response.bytes().await?;

        Ok(FetchedImage {
            bytes: bytes.to_vec(),
            content_type,
            content_disposition,
        })
    }
}

#[async_trait]
impl ImageFetcher for RestClient {
    async fn fetch_image(&self, path: &str) -> Result<FetchedImage, FetchError> {
        self.get_bytes(path).await.map_err(FetchError::from)
    }
}

fn truncate_body(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY_BYTES {
        let mut end = MAX_ERROR_BODY_BYTES;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
        body.push_str("...");
    }
    body
}

fn header_string(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn build_auth_headers(auth: &AuthConfig) -> Result<HeaderMap, ApiClientError> {
    let mut headers = HeaderMap::new();
    if let Some(api_key) = &auth.api_key {
        headers.insert(
            HeaderName::from_static("x-api-key"),
            HeaderValue::from_str(api_key).map_err(|e| ApiClientError::Config(e.to_string()))?,
        );
    }
    if let Some(token) = &auth.bearer_token {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|e| ApiClientError::Config(e.to_string()))?;
        value.set_sensitive(true);
        headers.insert(HeaderName::from_static("authorization"), value);
    }
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth(bearer: Option<&str>, key: Option<&str>) -> AuthConfig {
        AuthConfig {
            bearer_token: bearer.map(str::to_string),
            api_key: key.map(str::to_string),
        }
    }

    #[test]
    fn test_auth_headers_bearer_and_key() {
        let headers = build_auth_headers(&auth(Some("abc"), Some("k1"))).unwrap();
        assert_eq!(headers.get("authorization").unwrap(), "Bearer abc");
        assert!(headers.get("authorization").unwrap().is_sensitive());
        assert_eq!(headers.get("x-api-key").unwrap(), "k1");
    }

    #[test]
    fn test_auth_headers_reject_invalid_values() {
        assert!(matches!(
            build_auth_headers(&auth(Some("line\nbreak"), None)),
            Err(ApiClientError::Config(_))
        ));
    }

    #[test]
    fn test_status_error_maps_to_fetch_error() {
        let err: FetchError = ApiClientError::Status {
            status: 404,
            body: "missing".to_string(),
        }
        .into();
        assert!(err.is_not_found());
    }

    fn config(base: Option<&str>) -> ClientConfig {
        let mut config = ClientConfig::from_toml_str(
            r#"
request_timeout_ms = 1000
image_endpoint = "item/img"
legacy_prefix = "uploads/"

[auth]
bearer_token = "t"

[cache]
storage_key = "k"
ttl_days = 7

[logging]
json = false
"#,
        )
        .unwrap();
        config.api_base_url = base.map(str::to_string);
        config
    }

    #[test]
    fn test_client_requires_base_url() {
        assert!(matches!(RestClient::new(&config(None)), Err(ApiClientError::Config(_))));
        assert!(matches!(
            RestClient::new(&config(Some("  "))),
            Err(ApiClientError::Config(_))
        ));
    }

    #[test]
    fn test_url_for_joins_and_rejects_traversal() {
        let client = RestClient::new(&config(Some("https://api.sorteio.app/v1/"))).unwrap();
        assert_eq!(client.base_url(), "https://api.sorteio.app/v1");
        assert_eq!(
            client.url_for("/item/img/a.png").unwrap(),
            "https://api.sorteio.app/v1/item/img/a.png"
        );
        assert!(matches!(client.url_for(""), Err(ApiClientError::InvalidPath(_))));
        assert!(matches!(
            client.url_for("item/../admin"),
            Err(ApiClientError::InvalidPath(_))
        ));

        let err: FetchError = ApiClientError::InvalidPath("..".to_string()).into();
        assert_eq!(err, FetchError::InvalidPath { path: "..".to_string() });
    }

    #[test]
    fn test_error_body_is_truncated() {
        assert_eq!(truncate_body("short".to_string()), "short");

        let long = "é".repeat(400);
        let truncated = truncate_body(long);
        assert!(truncated.len() <= MAX_ERROR_BODY_BYTES + 3);
        assert!(truncated.ends_with("..."));
        assert!(truncated.trim_end_matches("...").chars().all(|c| c == 'é'));
    }

    #[test]
    fn test_header_string() {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_DISPOSITION,
            HeaderValue::from_static("inline; filename=\"a.png\""),
        );
        assert_eq!(
            header_string(&headers, &CONTENT_DISPOSITION).as_deref(),
            Some("inline; filename=\"a.png\"")
        );
        assert_eq!(header_string(&headers, &CONTENT_TYPE), None);
    }
}
