use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, COOKIE};
use url::Url;

use crate::{config::ApiConfig, domain::ListingId};

pub const DEFAULT_API_BASE: &str = "https://www.wanted.co.kr/api/chaos/jobs/v4";

/// `<base>/<id>/details?ts=<epoch-ms>`. The timestamp defeats intermediary caches.
pub fn details_url(base: &Url, listing_id: ListingId, ts_millis: i64) -> Result<Url, url::ParseError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
        .pop_if_empty()
        .push(&listing_id.to_string())
        .push("details");
    url.query_pairs_mut().append_pair("ts", &ts_millis.to_string());
    Ok(url)
}

pub fn default_headers(config: &ApiConfig) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/plain, */*"));
    headers.insert(
        HeaderName::from_static("wanted-user-agent"),
        HeaderValue::from_static("user-web"),
    );
    insert_text(&mut headers, "wanted-user-country", &config.user_country);
    insert_text(&mut headers, "wanted-user-language", &config.user_language);
    if let Some(cookie) = &config.session_cookie {
        match HeaderValue::from_str(cookie) {
            Ok(mut value) => {
                value.set_sensitive(true);
                headers.insert(COOKIE, value);
            }
            Err(err) => {
                tracing::warn!(target: "api", error = %err, "session cookie is not a valid header value; sending requests without it");
            }
        }
    }
    headers
}

fn insert_text(headers: &mut HeaderMap, name: &'static str, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(HeaderName::from_static(name), value);
        }
        Err(err) => {
            tracing::warn!(target: "api", header = name, error = %err, "skipping invalid header value");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_config(cookie: Option<&str>) -> ApiConfig {
        ApiConfig {
            base_url: DEFAULT_API_BASE.to_string(),
            session_cookie: cookie.map(str::to_string),
            user_country: "KR".to_string(),
            user_language: "ko".to_string(),
            timeout: None,
        }
    }

    #[test]
    fn details_url_appends_id_and_timestamp() {
        let base = Url::parse(DEFAULT_API_BASE).unwrap();
        let url = details_url(&base, ListingId(123), 1_771_891_200_000).unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.wanted.co.kr/api/chaos/jobs/v4/123/details?ts=1771891200000"
        );

        let trailing = Url::parse("https://example.test/api/jobs/").unwrap();
        let url = details_url(&trailing, ListingId(9), 1).unwrap();
        assert_eq!(url.as_str(), "https://example.test/api/jobs/9/details?ts=1");
    }

    #[test]
    fn headers_identify_the_web_client() {
        let headers = default_headers(&api_config(Some("WWW_ONEID_ACCESS_TOKEN=abc")));
        assert_eq!(headers["wanted-user-agent"], "user-web");
        assert_eq!(headers["wanted-user-country"], "KR");
        assert_eq!(headers["wanted-user-language"], "ko");
        assert_eq!(headers[ACCEPT], "application/json, text/plain, */*");
        assert_eq!(headers[COOKIE], "WWW_ONEID_ACCESS_TOKEN=abc");
        assert!(headers[COOKIE].is_sensitive());
    }

    #[test]
    fn unusable_cookie_is_dropped() {
        let headers = default_headers(&api_config(Some("bad\ncookie")));
        assert!(headers.get(COOKIE).is_none());
        assert!(default_headers(&api_config(None)).get(COOKIE).is_none());
    }
}
