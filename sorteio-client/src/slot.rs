//! Consumer-side image slot.
//!
//! An [`ImageSlot`] tracks one changing reference (a list cell, a card, a
//! detail view) and publishes its resolved URL on a watch channel. Each
//! reference change starts a new generation; a fetch finishing for an older
//! generation is discarded without touching the cache or the channel.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::object_url::ObjectUrl;
use crate::resolver::{ImageResolver, Plan, ResolutionSource, ResolveMode, ResolvedResource};

/// What [`ImageSlot::set_reference`] started.
#[derive(Debug)]
pub enum SlotUpdate {
    /// The result is already published.
    Ready,
    /// A fetch is running; the result is published when it completes.
    InFlight(JoinHandle<()>),
}

impl SlotUpdate {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Wait until this update has been applied or discarded.
    pub async fn settled(self) {
        if let Self::InFlight(handle) = self {
            if let Err(e) = handle.await {
                warn!(error = %e, "Image resolution task failed");
            }
        }
    }
}

#[derive(Debug, Default)]
struct SlotState {
    generation: u64,
    reference: Option<String>,
    /// `None` while a fetch is in flight.
    source: Option<ResolutionSource>,
    object_url: Option<ObjectUrl>,
}

#[derive(Debug)]
struct SlotShared {
    state: Mutex<SlotState>,
    tx: watch::Sender<ResolvedResource>,
}

impl SlotShared {
    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Resolves a changing reference and keeps the latest result.
///
/// Fetches run on the ambient tokio runtime. Dropping the slot invalidates
/// any fetch in flight and revokes the object URL it holds.
#[derive(Debug)]
pub struct ImageSlot {
    resolver: Arc<ImageResolver>,
    shared: Arc<SlotShared>,
    fallback: Option<String>,
}

impl ImageSlot {
    pub fn new(resolver: Arc<ImageResolver>) -> Self {
        let (tx, _rx) = watch::channel(ResolvedResource::absent());
        Self {
            resolver,
            shared: Arc::new(SlotShared {
                state: Mutex::new(SlotState::default()),
                tx,
            }),
            fallback: None,
        }
    }

    /// URL shown by [`display_url`](Self::display_url) when nothing resolved.
    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = Some(fallback.into());
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<ResolvedResource> {
        self.shared.tx.subscribe()
    }

    pub fn current(&self) -> ResolvedResource {
        self.shared.tx.borrow().clone()
    }

    pub fn reference(&self) -> Option<String> {
        self.shared.lock().reference.clone()
    }

    /// How the current result was reached; `None` while fetching.
    pub fn source(&self) -> Option<ResolutionSource> {
        self.shared.lock().source
    }

    pub fn fallback(&self) -> Option<&str> {
        self.fallback.as_deref()
    }

    /// The URL to render: the resolved one, else the fallback.
    pub fn display_url(&self) -> Option<String> {
        self.current().url.or_else(|| self.fallback.clone())
    }

    pub fn set_reference(&self, reference: Option<&str>) -> SlotUpdate {
        self.start(reference.map(str::to_string), ResolveMode::Cached)
    }

    /// Resolve the current reference again.
    pub fn reload(&self) -> SlotUpdate {
        let reference = self.reference();
        self.start(reference, ResolveMode::Cached)
    }

    /// The displayed URL failed to load; refetch and drop the cached
    /// filename if the backend no longer serves it.
    pub fn report_broken(&self) -> SlotUpdate {
        let reference = self.reference();
        self.start(reference, ResolveMode::Revalidate)
    }

    fn start(&self, reference: Option<String>, mode: ResolveMode) -> SlotUpdate {
        let mut state = self.shared.lock();
        state.generation += 1;
        let generation = state.generation;
        state.reference = reference;
        state.object_url = None;

        let fetch = match self.resolver.plan(state.reference.as_deref(), mode) {
            Plan::Ready { resource, source } => {
                state.source = Some(source);
                self.shared.tx.send_replace(resource);
                return SlotUpdate::Ready;
            }
            Plan::Fetch(fetch) => fetch,
        };

        let Ok(runtime) = Handle::try_current() else {
            warn!(reference = %fetch.reference, "No async runtime available to fetch image");
            state.source = Some(ResolutionSource::FetchFailed);
            self.shared.tx.send_replace(ResolvedResource::failed());
            return SlotUpdate::Ready;
        };

        state.source = None;
        self.shared.tx.send_replace(ResolvedResource::absent());
        drop(state);

        let resolver = Arc::clone(&self.resolver);
        let shared = Arc::clone(&self.shared);
        SlotUpdate::InFlight(runtime.spawn(async move {
            let outcome = resolver.fetch(&fetch).await;

            let mut state = shared.lock();
            if state.generation != generation {
                debug!(reference = %fetch.reference, "Discarding superseded image fetch");
                return;
            }
            let resolution = resolver.settle(&fetch, outcome);
            state.source = Some(resolution.source);
            state.object_url = resolution.object_url;
            shared.tx.send_replace(resolution.resource);
        }))
    }
}

impl Drop for ImageSlot {
    fn drop(&mut self) {
        let mut state = self.shared.lock();
        state.generation += 1;
        state.object_url = None;
    }
}
