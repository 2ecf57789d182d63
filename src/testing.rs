use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use reqwest::StatusCode;
use serde_json::{json, Value};

use crate::{
    api::{ApiError, DetailsApi},
    domain::{Clock, ListingId},
};

pub fn fixed_clock(at: DateTime<Utc>) -> Clock {
    Arc::new(move || at)
}

pub fn applied_body(status: Option<&str>) -> Value {
    match status {
        Some(status) => json!({ "data": { "application": { "status_text": status } } }),
        None => json!({ "data": { "application": {} } }),
    }
}

pub fn not_applied_body() -> Value {
    json!({ "data": { "application": null } })
}

#[derive(Clone)]
enum Scripted {
    Body(Value),
    Status(u16),
    Panic,
}

/// Scripted `DetailsApi` that records calls and tracks how many requests are
/// outstanding at once. Unscripted listings answer "not applied".
#[derive(Default)]
pub struct FakeApi {
    responses: Mutex<HashMap<ListingId, Scripted>>,
    calls: Mutex<Vec<ListingId>>,
    latency: Mutex<Duration>,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, listing_id: ListingId, body: Value) {
        self.responses.lock().insert(listing_id, Scripted::Body(body));
    }

    pub fn fail_with_status(&self, listing_id: ListingId, status: u16) {
        self.responses.lock().insert(listing_id, Scripted::Status(status));
    }

    pub fn panic_on(&self, listing_id: ListingId) {
        self.responses.lock().insert(listing_id, Scripted::Panic);
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn calls_for(&self, listing_id: ListingId) -> usize {
        self.calls.lock().iter().filter(|id| **id == listing_id).count()
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    async fn answer(&self, listing_id: ListingId) -> Result<Value, ApiError> {
        self.calls.lock().push(listing_id);
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(active, Ordering::SeqCst);

        let latency = *self.latency.lock();
        if latency.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(latency).await;
        }

        self.active.fetch_sub(1, Ordering::SeqCst);
        let scripted = self.responses.lock().get(&listing_id).cloned();
        match scripted {
            Some(Scripted::Body(body)) => Ok(body),
            Some(Scripted::Status(code)) => Err(ApiError::Status {
                listing_id,
                status: StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            }),
            Some(Scripted::Panic) => panic!("scripted panic for listing {listing_id}"),
            None => Ok(not_applied_body()),
        }
    }
}

impl DetailsApi for FakeApi {
    fn fetch_details(&self, listing_id: ListingId) -> BoxFuture<'_, Result<Value, ApiError>> {
        Box::pin(self.answer(listing_id))
    }
}
