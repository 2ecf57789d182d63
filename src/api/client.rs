use chrono::Utc;
use futures::future::BoxFuture;
use reqwest::Client;
use serde_json::Value;
use url::Url;

use crate::{config::ApiConfig, domain::ListingId};

use super::{
    request::{default_headers, details_url},
    ApiError, DetailsApi,
};

/// Job-details client for wanted.co.kr.
#[derive(Clone)]
pub struct WantedClient {
    http: Client,
    base: Url,
    config: ApiConfig,
}

impl WantedClient {
    pub fn new(http: Client, config: ApiConfig) -> Result<Self, ApiError> {
        let base = Url::parse(&config.base_url)?;
        Ok(Self { http, base, config })
    }

    pub async fn details(&self, listing_id: ListingId) -> Result<Value, ApiError> {
        let url = details_url(&self.base, listing_id, Utc::now().timestamp_millis())?;

        let mut request = self.http.get(url).headers(default_headers(&self.config));
        if let Some(timeout) = self.config.timeout {
            request = request.timeout(timeout);
        }

        let response = request
            .send()
            .await
            .map_err(|source| ApiError::Transport { listing_id, source })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status { listing_id, status });
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| ApiError::Transport { listing_id, source })?;
        serde_json::from_slice(&body).map_err(|source| ApiError::Decode { listing_id, source })
    }
}

impl DetailsApi for WantedClient {
    fn fetch_details(&self, listing_id: ListingId) -> BoxFuture<'_, Result<Value, ApiError>> {
        Box::pin(self.details(listing_id))
    }
}
