//! Reference-to-display-URL resolution.
//!
//! Resolution is split into three steps so callers can own the await point:
//!
//! 1. [`ImageResolver::plan`] classifies the reference and answers whatever
//!    it can synchronously (absent, direct URL, cache hit, derived filename,
//!    unresolvable).
//! 2. [`ImageResolver::fetch`] performs the authenticated fetch for a
//!    [`FetchPlan`]. It touches neither the cache nor the object URL
//!    registry, so a superseded fetch can be dropped without side effects.
//! 3. [`ImageResolver::settle`] applies the outcome: remembers a confirmed
//!    filename, parks unconfirmed bytes behind an object URL, or forgets the
//!    reference on failure.
//!
//! [`ImageResolver::resolve`] runs all three for one-shot callers.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use sorteio_core::{Classification, Clock, FetchError, FetchedImage, ImageFetcher};
use sorteio_storage::{FileStore, FilenameCache, MemoryStore, PersistentStore};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::object_url::{ObjectUrl, ObjectUrlRegistry};
use crate::url_builder::DirectUrlBuilder;

/// What a consumer displays: a URL, an error flag, or neither.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolvedResource {
    pub url: Option<String>,
    pub error: bool,
}

impl ResolvedResource {
    /// No reference; nothing to show and nothing wrong.
    pub fn absent() -> Self {
        Self::default()
    }

    pub fn resolved(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            error: false,
        }
    }

    pub fn failed() -> Self {
        Self {
            url: None,
            error: true,
        }
    }
}

/// How a result was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    Absent,
    /// The reference already was a URL.
    Direct,
    /// A remembered filename.
    Cache,
    /// A filename segment derived from the reference itself.
    Derived,
    /// A filename confirmed by the server's `Content-Disposition`.
    Confirmed,
    /// Fetched bytes without a usable filename.
    ObjectUrl,
    Unresolvable,
    FetchFailed,
}

/// Whether the synchronous cache and derived paths may answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResolveMode {
    #[default]
    Cached,
    /// Always go to the backend. Used when a displayed URL turned out to be
    /// broken and the cached filename can no longer be trusted.
    Revalidate,
}

/// A fetch the resolver wants performed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchPlan {
    /// Trimmed reference, the cache key.
    pub reference: String,
    /// Endpoint-relative path, e.g. `item/img/photo.jpg`.
    pub path: String,
}

/// Result of the synchronous step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    Ready {
        resource: ResolvedResource,
        source: ResolutionSource,
    },
    Fetch(FetchPlan),
}

impl Plan {
    fn ready(resource: ResolvedResource, source: ResolutionSource) -> Self {
        Self::Ready { resource, source }
    }

    fn unresolvable() -> Self {
        Self::ready(ResolvedResource::failed(), ResolutionSource::Unresolvable)
    }
}

/// A finished resolution.
///
/// Holds the object URL guard when the result points at fetched bytes; the
/// URL is revoked when the resolution is dropped.
#[derive(Debug)]
pub struct Resolution {
    pub resource: ResolvedResource,
    pub source: ResolutionSource,
    pub object_url: Option<ObjectUrl>,
}

impl Resolution {
    fn ready(resource: ResolvedResource, source: ResolutionSource) -> Self {
        Self {
            resource,
            source,
            object_url: None,
        }
    }
}

/// Resolves image references to display URLs.
pub struct ImageResolver {
    fetcher: Arc<dyn ImageFetcher>,
    cache: Arc<FilenameCache>,
    urls: DirectUrlBuilder,
    objects: ObjectUrlRegistry,
}

impl fmt::Debug for ImageResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageResolver")
            .field("cache", &self.cache)
            .field("urls", &self.urls)
            .field("objects", &self.objects)
            .finish_non_exhaustive()
    }
}

impl ImageResolver {
    pub fn new(
        fetcher: Arc<dyn ImageFetcher>,
        cache: Arc<FilenameCache>,
        urls: DirectUrlBuilder,
    ) -> Self {
        Self {
            fetcher,
            cache,
            urls,
            objects: ObjectUrlRegistry::new(),
        }
    }

    /// Build a resolver from configuration.
    ///
    /// The cache persists to `cache.directory` when set, and lives in memory
    /// otherwise.
    pub fn from_config(
        config: &ClientConfig,
        fetcher: Arc<dyn ImageFetcher>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ClientError> {
        let store: Arc<dyn PersistentStore> = match &config.cache.directory {
            Some(dir) => Arc::new(FileStore::open(dir)?),
            None => Arc::new(MemoryStore::new()),
        };
        let cache = FilenameCache::with_clock(store, clock, config.cache_config());
        Ok(Self::new(fetcher, Arc::new(cache), config.url_builder()))
    }

    pub fn cache(&self) -> &Arc<FilenameCache> {
        &self.cache
    }

    pub fn objects(&self) -> &ObjectUrlRegistry {
        &self.objects
    }

    pub fn urls(&self) -> &DirectUrlBuilder {
        &self.urls
    }

    /// Answer synchronously where possible; otherwise describe the fetch.
    pub fn plan(&self, reference: Option<&str>, mode: ResolveMode) -> Plan {
        let raw = reference.unwrap_or_default();
        let (reference, candidate) = match self.urls.classifier().classify(raw) {
            Classification::Absent => {
                return Plan::ready(ResolvedResource::absent(), ResolutionSource::Absent)
            }
            Classification::Direct(url) => {
                return Plan::ready(ResolvedResource::resolved(url), ResolutionSource::Direct)
            }
            Classification::Candidate {
                reference,
                filename,
            } => (reference, Some(filename)),
            Classification::Unresolvable { reference } => (reference, None),
        };

        if mode == ResolveMode::Revalidate {
            let target = self.cache.lookup(&reference).or(candidate);
            return match target.and_then(|name| self.urls.endpoint_path(&name)) {
                Some(path) => {
                    debug!(reference = %reference, path = %path, "Revalidating image reference");
                    Plan::Fetch(FetchPlan { reference, path })
                }
                None => Plan::unresolvable(),
            };
        }

        if let Some(url) = self
            .cache
            .lookup(&reference)
            .and_then(|name| self.urls.build(&name))
        {
            return Plan::ready(ResolvedResource::resolved(url), ResolutionSource::Cache);
        }

        let Some(filename) = candidate else {
            debug!(reference = %reference, "Unresolvable image reference");
            return Plan::unresolvable();
        };

        if filename != reference {
            if let Some(url) = self.urls.build(&filename) {
                self.cache.remember(&reference, &filename);
                return Plan::ready(ResolvedResource::resolved(url), ResolutionSource::Derived);
            }
        }

        match self.urls.endpoint_path(&filename) {
            Some(path) => Plan::Fetch(FetchPlan { reference, path }),
            None => Plan::unresolvable(),
        }
    }

    /// Perform the fetch for `plan`. No shared state is touched.
    pub async fn fetch(&self, plan: &FetchPlan) -> Result<FetchedImage, FetchError> {
        debug!(reference = %plan.reference, path = %plan.path, "Fetching image");
        self.fetcher.fetch_image(&plan.path).await
    }

    /// Apply a fetch outcome to the cache and produce the final result.
    pub fn settle(
        &self,
        plan: &FetchPlan,
        outcome: Result<FetchedImage, FetchError>,
    ) -> Resolution {
        let image = match outcome {
            Ok(image) => image,
            Err(e) => {
                self.cache.forget(&plan.reference);
                warn!(reference = %plan.reference, path = %plan.path, error = %e, "Image fetch failed");
                return Resolution::ready(ResolvedResource::failed(), ResolutionSource::FetchFailed);
            }
        };

        let confirmed = image
            .confirmed_filename()
            .and_then(|hint| self.urls.classifier().candidate_segment(&hint));
        if let Some(filename) = confirmed {
            self.cache.remember(&plan.reference, &filename);
            if let Some(url) = self.urls.build(&filename) {
                info!(reference = %plan.reference, filename = %filename, "Resolved image filename");
                return Resolution::ready(ResolvedResource::resolved(url), ResolutionSource::Confirmed);
            }
        }

        let bytes = image.bytes.len();
        let handle = self.objects.create(image.bytes, image.content_type);
        debug!(reference = %plan.reference, url = %handle.as_str(), bytes, "Serving image from object URL");
        Resolution {
            resource: ResolvedResource::resolved(handle.as_str()),
            source: ResolutionSource::ObjectUrl,
            object_url: Some(handle),
        }
    }

    /// Resolve a reference end to end.
    pub async fn resolve(&self, reference: Option<&str>) -> Resolution {
        self.resolve_with(reference, ResolveMode::Cached).await
    }

    pub async fn resolve_with(&self, reference: Option<&str>, mode: ResolveMode) -> Resolution {
        match self.plan(reference, mode) {
            Plan::Ready { resource, source } => Resolution::ready(resource, source),
            Plan::Fetch(plan) => {
                let outcome = self.fetch(&plan).await;
                self.settle(&plan, outcome)
            }
        }
    }
}
