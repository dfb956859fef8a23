//! Resolve image references from the command line.
//!
//! ```text
//! sorteio-resolve --config sorteio.toml uploads/rifa-01.png https://cdn.x/a.png
//! ```
//!
//! Prints one JSON object per reference on stdout.

use std::sync::Arc;

use serde::Serialize;
use sorteio_client::{
    init_tracing, ClientConfig, ClientError, ImageResolver, ResolutionSource, RestClient,
};
use sorteio_core::SystemClock;

#[derive(Debug, Serialize)]
struct Report<'a> {
    reference: &'a str,
    url: Option<&'a str>,
    error: bool,
    source: ResolutionSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    bytes: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    let config = ClientConfig::load()?;
    init_tracing(&config.logging)?;

    let fetcher = Arc::new(RestClient::new(&config)?);
    let resolver = ImageResolver::from_config(&config, fetcher, Arc::new(SystemClock))?;

    for reference in references_from_args() {
        let resolution = resolver.resolve(Some(&reference)).await;
        let bytes = resolution
            .object_url
            .as_ref()
            .and_then(|handle| resolver.objects().get(handle.as_str()))
            .map(|blob| blob.bytes.len());
        let report = Report {
            reference: &reference,
            url: resolution.resource.url.as_deref(),
            error: resolution.resource.error,
            source: resolution.source,
            bytes,
        };
        println!("{}", serde_json::to_string(&report)?);
    }

    let stats = resolver.cache().stats();
    tracing::info!(
        hits = stats.hits(),
        misses = stats.misses,
        entries = stats.entry_count,
        flush_failures = stats.flush_failures,
        "Filename cache summary"
    );
    Ok(())
}

/// Positional arguments, skipping `--config <path>`.
fn references_from_args() -> Vec<String> {
    let mut references = Vec::new();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            args.next();
            continue;
        }
        references.push(arg);
    }
    references
}
