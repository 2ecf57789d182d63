mod client;
mod request;

use futures::future::BoxFuture;
use serde_json::Value;
use thiserror::Error;

use crate::domain::ListingId;

pub use client::WantedClient;
pub use request::DEFAULT_API_BASE;

/// Source of job-details payloads.
pub trait DetailsApi: Send + Sync + 'static {
    fn fetch_details(&self, listing_id: ListingId) -> BoxFuture<'_, Result<Value, ApiError>>;
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("details {listing_id} failed: {status}")]
    Status {
        listing_id: ListingId,
        status: reqwest::StatusCode,
    },
    #[error("details request for {listing_id} failed: {source}")]
    Transport {
        listing_id: ListingId,
        #[source]
        source: reqwest::Error,
    },
    #[error("details {listing_id} returned malformed JSON: {source}")]
    Decode {
        listing_id: ListingId,
        #[source]
        source: serde_json::Error,
    },
    #[error("details request for {listing_id} panicked")]
    Panicked { listing_id: ListingId },
    #[error("invalid details URL: {0}")]
    Url(#[from] url::ParseError),
}
