use chrono::{DateTime, Utc};
use serde_json::Value;

use super::types::Verdict;

impl Verdict {
    /// Builds a verdict from a job-details payload.
    ///
    /// Shape: `{ data?: { application?: { status_text?: string } | null } }`.
    /// Anything missing or of the wrong type reads as "not applied".
    pub fn from_details(body: &Value, now: DateTime<Utc>) -> Self {
        let application = body
            .get("data")
            .and_then(|data| data.get("application"))
            .filter(|app| !app.is_null());

        let status_text = application
            .and_then(|app| app.get("status_text"))
            .and_then(Value::as_str)
            .map(str::to_string);

        Self {
            applied: application.is_some(),
            status_text,
            updated_at: now,
        }
    }
}
