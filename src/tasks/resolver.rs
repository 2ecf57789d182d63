use crate::{
    api::{ApiError, DetailsApi},
    domain::{Clock, ListingId, Verdict},
};

/// Outcome of resolving one listing, posted back to the scheduler loop.
#[derive(Debug)]
pub struct Completion {
    pub listing_id: ListingId,
    pub outcome: Result<Verdict, ApiError>,
}

/// Fetches job details and turns them into a verdict stamped with the
/// completion time.
pub async fn resolve_listing(api: &dyn DetailsApi, listing_id: ListingId, clock: &Clock) -> Completion {
    let outcome = api
        .fetch_details(listing_id)
        .await
        .map(|body| Verdict::from_details(&body, clock()));
    Completion { listing_id, outcome }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::*;
    use crate::testing::{fixed_clock, FakeApi};

    #[tokio::test]
    async fn success_builds_verdict_with_clock_time() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let api = FakeApi::new();
        api.respond(ListingId(3), json!({ "data": { "application": { "status_text": "서류검토" } } }));

        let completion = resolve_listing(&api, ListingId(3), &fixed_clock(at)).await;
        let verdict = completion.outcome.unwrap();
        assert!(verdict.applied);
        assert_eq!(verdict.status_text.as_deref(), Some("서류검토"));
        assert_eq!(verdict.updated_at, at);
    }

    #[tokio::test]
    async fn http_failure_is_returned_not_raised() {
        let api = FakeApi::new();
        api.fail_with_status(ListingId(7), 503);

        let completion = resolve_listing(&api, ListingId(7), &fixed_clock(Utc::now())).await;
        assert_eq!(completion.listing_id, ListingId(7));
        assert!(matches!(completion.outcome, Err(ApiError::Status { .. })));
    }
}
