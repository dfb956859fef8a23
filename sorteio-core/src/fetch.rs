//! Authenticated image fetch seam.
//!
//! The resolver only needs one thing from the HTTP layer: fetch the bytes
//! behind an image endpoint path and expose the response headers that
//! matter. The REST client implements this; tests script it.

use async_trait::async_trait;

use crate::disposition::parse_disposition_filename;
use crate::FetchError;

/// Binary body and relevant headers of a successful image fetch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    /// Value of the `Content-Type` header, if any.
    pub content_type: Option<String>,
    /// Value of the `Content-Disposition` header, if any.
    pub content_disposition: Option<String>,
}

impl FetchedImage {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            ..Default::default()
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_content_disposition(mut self, disposition: impl Into<String>) -> Self {
        self.content_disposition = Some(disposition.into());
        self
    }

    /// Filename the server confirmed through `Content-Disposition`.
    pub fn confirmed_filename(&self) -> Option<String> {
        self.content_disposition
            .as_deref()
            .and_then(parse_disposition_filename)
    }
}

/// Fetches image bytes from the authenticated backend.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Fetch `path`, relative to the API base URL (e.g. `item/img/photo.jpg`).
    ///
    /// The path is already percent-encoded per segment.
    async fn fetch_image(&self, path: &str) -> Result<FetchedImage, FetchError>;
}
