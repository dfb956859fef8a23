//! Sorteio image client.
//!
//! Turns the image references stored on raffle records into display URLs.
//! References that already are URLs pass through; filenames resolve against
//! the authenticated image endpoint, with discovered filenames remembered
//! in a persistent cache so later lookups skip the network.

pub mod api_client;
pub mod config;
pub mod error;
pub mod object_url;
pub mod resolver;
pub mod slot;
pub mod telemetry;
pub mod url_builder;

pub use api_client::{ApiClientError, RestClient};
pub use config::{AuthConfig, CacheSettings, ClientConfig, LoggingConfig};
pub use error::ClientError;
pub use object_url::{ObjectBlob, ObjectUrl, ObjectUrlRegistry};
pub use resolver::{
    FetchPlan, ImageResolver, Plan, Resolution, ResolutionSource, ResolveMode, ResolvedResource,
};
pub use slot::{ImageSlot, SlotUpdate};
pub use telemetry::init_tracing;
pub use url_builder::{encode_path, DirectUrlBuilder};
