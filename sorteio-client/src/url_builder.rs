//! Direct URL construction for resolved filenames.
//!
//! Pure and synchronous: turns a filename into an absolute URL under the
//! backend's image endpoint, or a root-relative one when no usable base URL
//! is configured.

use reqwest::Url;
use sorteio_core::{ReferenceClassifier, DEFAULT_IMAGE_ENDPOINT};

/// Percent-encode each `/`-delimited segment independently.
///
/// Slashes stay path separators; `.` and `..` segments and empty segments
/// are dropped.
pub fn encode_path(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty() && *segment != "." && *segment != "..")
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Builds display URLs for filenames under the image endpoint.
#[derive(Debug, Clone)]
pub struct DirectUrlBuilder {
    base_url: Option<String>,
    endpoint: String,
    classifier: ReferenceClassifier,
}

impl Default for DirectUrlBuilder {
    fn default() -> Self {
        Self::new(None, DEFAULT_IMAGE_ENDPOINT, ReferenceClassifier::default())
    }
}

impl DirectUrlBuilder {
    pub fn new(
        base_url: Option<&str>,
        endpoint: &str,
        classifier: ReferenceClassifier,
    ) -> Self {
        let base_url = base_url
            .map(str::trim)
            .filter(|base| !base.is_empty())
            .map(|base| {
                if base.ends_with('/') {
                    base.to_string()
                } else {
                    format!("{}/", base)
                }
            });
        Self {
            base_url,
            endpoint: endpoint.trim().trim_matches('/').to_string(),
            classifier,
        }
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    pub fn classifier(&self) -> &ReferenceClassifier {
        &self.classifier
    }

    /// Endpoint-relative path for a filename, e.g. `item/img/rifa%201.png`.
    ///
    /// Returns `None` when nothing is left after sanitization.
    pub fn endpoint_path(&self, filename: &str) -> Option<String> {
        let sanitized = self.classifier.strip_legacy_prefix(filename);
        let encoded = encode_path(&sanitized.replace('\\', "/"));
        if encoded.is_empty() {
            return None;
        }
        if self.endpoint.is_empty() {
            Some(encoded)
        } else {
            Some(format!("{}/{}", self.endpoint, encoded))
        }
    }

    /// Display URL for a filename.
    ///
    /// Resolves against the base URL when one is configured and parses;
    /// otherwise falls back to a root-relative path.
    pub fn build(&self, filename: &str) -> Option<String> {
        let relative = self.endpoint_path(filename)?;
        let joined = self.base_url.as_deref().and_then(|base| {
            Url::parse(base)
                .and_then(|base| base.join(&relative))
                .ok()
        });
        Some(match joined {
            Some(url) => url.to_string(),
            None => format!("/{}", relative),
        })
    }
}
