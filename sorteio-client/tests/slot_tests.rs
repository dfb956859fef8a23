//! Image slot ordering and resource cleanup.

use std::sync::Arc;

use sorteio_client::{
    DirectUrlBuilder, ImageResolver, ImageSlot, ResolutionSource, ResolvedResource,
};
use sorteio_core::ReferenceClassifier;
use sorteio_storage::{CacheConfig, FilenameCache, MemoryStore};
use sorteio_test_utils::{not_found, png_image, png_image_named, MockImageFetcher};

fn setup() -> (Arc<ImageResolver>, Arc<MockImageFetcher>) {
    let fetcher = Arc::new(MockImageFetcher::new());
    let cache = FilenameCache::new(Arc::new(MemoryStore::new()), CacheConfig::default());
    let resolver = ImageResolver::new(
        fetcher.clone(),
        Arc::new(cache),
        DirectUrlBuilder::new(
            Some("https://api.sorteio.app"),
            "item/img",
            ReferenceClassifier::default(),
        ),
    );
    (Arc::new(resolver), fetcher)
}

#[tokio::test]
async fn synchronous_results_are_published_immediately() {
    let (resolver, _fetcher) = setup();
    let slot = ImageSlot::new(resolver).with_fallback("/static/placeholder.png");

    assert!(slot.set_reference(Some("https://cdn.x/a.png")).is_ready());
    assert_eq!(slot.current(), ResolvedResource::resolved("https://cdn.x/a.png"));
    assert_eq!(slot.source(), Some(ResolutionSource::Direct));

    assert!(slot.set_reference(Some("not a filename!!")).is_ready());
    assert_eq!(slot.current(), ResolvedResource::failed());
    assert_eq!(slot.display_url().as_deref(), Some("/static/placeholder.png"));

    assert!(slot.set_reference(None).is_ready());
    assert_eq!(slot.current(), ResolvedResource::absent());
    assert_eq!(slot.reference(), None);
}

#[tokio::test]
async fn fetched_result_is_published_to_subscribers() {
    let (resolver, fetcher) = setup();
    fetcher.respond("item/img/a.png", png_image_named("a.png"));
    let slot = ImageSlot::new(resolver);
    let mut rx = slot.subscribe();

    let update = slot.set_reference(Some("a.png"));
    assert!(!update.is_ready());
    assert_eq!(slot.source(), None);
    update.settled().await;

    assert!(rx.has_changed().unwrap());
    assert_eq!(
        rx.borrow_and_update().url.as_deref(),
        Some("https://api.sorteio.app/item/img/a.png")
    );
    assert_eq!(slot.source(), Some(ResolutionSource::Confirmed));
}

#[tokio::test]
async fn stale_response_is_discarded() {
    let (resolver, fetcher) = setup();
    let gate_a = fetcher.respond_gated("item/img/a.png", png_image());
    let gate_b = fetcher.respond_gated("item/img/b.png", png_image());
    let slot = ImageSlot::new(resolver.clone());

    let update_a = slot.set_reference(Some("a.png"));
    let update_b = slot.set_reference(Some("b.png"));

    gate_b.open();
    update_b.settled().await;
    let shown = slot.current();
    assert!(shown.url.as_deref().unwrap().starts_with("blob:sorteio/"));
    assert_eq!(resolver.objects().live_count(), 1);

    gate_a.open();
    update_a.settled().await;

    assert_eq!(slot.current(), shown);
    assert_eq!(slot.reference().as_deref(), Some("b.png"));
    assert_eq!(resolver.objects().live_count(), 1);
    assert_eq!(resolver.cache().lookup("a.png"), None);
    assert_eq!(fetcher.calls_for("item/img/a.png"), 1);
}

#[tokio::test]
async fn stale_failure_does_not_forget_or_overwrite() {
    let (resolver, fetcher) = setup();
    resolver.cache().remember("a.png", "a.png");
    let gate = fetcher.fail_gated("item/img/a.png", not_found());
    let slot = ImageSlot::new(resolver.clone());
    slot.set_reference(Some("a.png"));

    let broken = slot.report_broken();
    assert_eq!(slot.current(), ResolvedResource::absent());
    assert!(slot.set_reference(Some("https://cdn.x/b.png")).is_ready());

    gate.open();
    broken.settled().await;

    assert_eq!(slot.current(), ResolvedResource::resolved("https://cdn.x/b.png"));
    assert_eq!(resolver.cache().lookup("a.png").as_deref(), Some("a.png"));
}

#[tokio::test]
async fn changing_reference_releases_object_url() {
    let (resolver, fetcher) = setup();
    fetcher.respond("item/img/a.png", png_image());
    let slot = ImageSlot::new(resolver.clone());

    slot.set_reference(Some("a.png")).settled().await;
    assert_eq!(slot.source(), Some(ResolutionSource::ObjectUrl));
    assert_eq!(resolver.objects().live_count(), 1);

    slot.set_reference(Some("https://cdn.x/b.png"));
    assert_eq!(resolver.objects().live_count(), 0);
}

#[tokio::test]
async fn dropping_slot_releases_and_discards() {
    let (resolver, fetcher) = setup();
    fetcher.respond("item/img/a.png", png_image());
    let gate = fetcher.respond_gated("item/img/b.png", png_image());

    let slot = ImageSlot::new(resolver.clone());
    slot.set_reference(Some("a.png")).settled().await;
    assert_eq!(resolver.objects().live_count(), 1);

    let pending = ImageSlot::new(resolver.clone());
    let update = pending.set_reference(Some("b.png"));

    drop(slot);
    drop(pending);
    gate.open();
    update.settled().await;
    assert_eq!(resolver.objects().live_count(), 0);
}

#[tokio::test]
async fn report_broken_forgets_missing_file() {
    let (resolver, fetcher) = setup();
    resolver.cache().remember("rifa 42", "premio.webp");
    fetcher.fail("item/img/premio.webp", not_found());

    let slot = ImageSlot::new(resolver.clone()).with_fallback("/static/placeholder.png");
    assert!(slot.set_reference(Some("rifa 42")).is_ready());
    assert_eq!(slot.source(), Some(ResolutionSource::Cache));
    assert_eq!(
        slot.display_url().as_deref(),
        Some("https://api.sorteio.app/item/img/premio.webp")
    );

    slot.report_broken().settled().await;
    assert_eq!(slot.current(), ResolvedResource::failed());
    assert_eq!(slot.source(), Some(ResolutionSource::FetchFailed));
    assert_eq!(slot.display_url().as_deref(), Some("/static/placeholder.png"));
    assert_eq!(resolver.cache().lookup("rifa 42"), None);

    // Without the cached filename the reference cannot be resolved again.
    assert!(slot.reload().is_ready());
    assert_eq!(slot.current(), ResolvedResource::failed());
    assert_eq!(fetcher.call_count(), 1);
}

#[test]
fn without_runtime_fetch_fails_instead_of_hanging() {
    let (resolver, fetcher) = setup();
    let slot = ImageSlot::new(resolver);
    assert!(slot.set_reference(Some("a.png")).is_ready());
    assert_eq!(slot.current(), ResolvedResource::failed());
    assert_eq!(fetcher.call_count(), 0);
}
