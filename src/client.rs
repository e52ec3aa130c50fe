//! Blocking HTTP client for the Giant Bomb video catalog.
//!
//! One call is one GET: build the URL, send it with a timeout, check the
//! status, decode the `results` envelope. Nothing is cached or retried.

use crate::error::{CatalogError, snippet};
use crate::model::{Envelope, ShowSummary, VideoSummary};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};
use url::Url;

/// Origin every endpoint path is appended to.
pub const API_ORIGIN: &str = "https://www.giantbomb.com/api";
pub const SHOWS_PATH: &str = "/video_shows/";
pub const VIDEOS_PATH: &str = "/videos/";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
/// Largest page the API will return.
pub const MAX_LIMIT: u32 = 100;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Upper bound for a whole request, connect through body.
    pub timeout: Duration,
    /// Page size; `None` leaves it to the API default.
    pub limit: Option<u32>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            limit: None,
        }
    }
}

/// Client for the `video_shows` and `videos` listings.
///
/// Holds no mutable state; clones share one connection pool and every
/// method takes `&self`, so calls can run from any number of threads.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    http: reqwest::blocking::Client,
    origin: String,
    limit: Option<u32>,
}

impl CatalogClient {
    pub fn new() -> Result<Self, CatalogError> {
        Self::with_options(ClientOptions::default())
    }

    pub fn with_options(options: ClientOptions) -> Result<Self, CatalogError> {
        Self::build(API_ORIGIN, options)
    }

    #[cfg(test)]
    pub(crate) fn with_origin(origin: &str, options: ClientOptions) -> Result<Self, CatalogError> {
        Self::build(origin, options)
    }

    fn build(origin: &str, options: ClientOptions) -> Result<Self, CatalogError> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(options.timeout)
            .connect_timeout(options.timeout)
            .build()
            .map_err(CatalogError::Transport)?;
        Ok(Self {
            http,
            origin: origin.trim_end_matches('/').to_string(),
            limit: options.limit.map(|limit| limit.clamp(1, MAX_LIMIT)),
        })
    }

    /// Fetches the show listing in API order.
    pub fn fetch_shows(&self, credential: &str) -> Result<Vec<ShowSummary>, CatalogError> {
        self.fetch_listing(SHOWS_PATH, credential)
            .map(|envelope| envelope.results)
    }

    /// Fetches the video listing in API order.
    pub fn fetch_videos(&self, credential: &str) -> Result<Vec<VideoSummary>, CatalogError> {
        self.fetch_listing(VIDEOS_PATH, credential)
            .map(|envelope| envelope.results)
    }

    /// Fetches one page of `path` and decodes every entry as `T`.
    fn fetch_listing<T>(&self, path: &str, credential: &str) -> Result<Envelope<T>, CatalogError>
    where
        T: DeserializeOwned,
    {
        let credential = credential.trim();
        if credential.is_empty() {
            return Err(CatalogError::InvalidArgument(
                "API key must not be empty".to_string(),
            ));
        }

        let mut query = vec![("format", "json".to_string()), ("api_key", credential.to_string())];
        if let Some(limit) = self.limit {
            query.push(("limit", limit.to_string()));
        }
        let url = Url::parse_with_params(&format!("{}{}", self.origin, path), &query)
            .map_err(|err| CatalogError::InvalidArgument(format!("bad endpoint {}: {}", path, err)))?;

        debug!(endpoint = path, limit = ?self.limit, "requesting listing");
        let started = Instant::now();

        // The error would otherwise carry the full URL, api_key included.
        let response = self.http.get(url).send().map_err(|err| {
            let err = err.without_url();
            warn!(endpoint = path, error = %err, "request failed");
            CatalogError::Transport(err)
        })?;

        let status = response.status();
        debug!(
            endpoint = path,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "response received"
        );

        if status != reqwest::StatusCode::OK {
            // Diagnostics only; a body that fails to read still yields the status error.
            let body = response.text().unwrap_or_default();
            warn!(endpoint = path, status = status.as_u16(), "unexpected status");
            return Err(CatalogError::Api {
                status: status.as_u16(),
                body: snippet(&body),
            });
        }

        let body = response
            .text()
            .map_err(|err| CatalogError::Transport(err.without_url()))?;
        let envelope = decode_envelope::<T>(&body, status.as_u16()).inspect_err(|err| {
            warn!(endpoint = path, error = %err, "failed to decode listing");
        })?;

        trace!(
            endpoint = path,
            count = envelope.results.len(),
            total = ?envelope.number_of_total_results,
            "decoded listing"
        );
        Ok(envelope)
    }
}

/// Envelope fields other than `results`.
#[derive(Debug, Deserialize)]
struct EnvelopeHeader {
    error: Option<String>,
    status_code: Option<i64>,
    number_of_total_results: Option<u64>,
    number_of_page_results: Option<u64>,
    limit: Option<u64>,
    offset: Option<u64>,
}

/// Decodes a listing body. Each element is decoded on its own so a failure
/// can name the entry (`results[3]`) and, when known, the field.
pub fn decode_envelope<T>(body: &str, http_status: u16) -> Result<Envelope<T>, CatalogError>
where
    T: DeserializeOwned,
{
    let root: Value = serde_json::from_str(body).map_err(|err| CatalogError::Decode {
        path: "$".to_string(),
        raw: snippet(body),
        message: err.to_string(),
    })?;

    let header = EnvelopeHeader::deserialize(&root).map_err(|err| CatalogError::Decode {
        path: "$".to_string(),
        raw: snippet(body),
        message: err.to_string(),
    })?;

    // Giant Bomb reports a bad key or filter as a 200 with a non-1 status_code.
    if let Some(code) = header.status_code
        && code != 1
    {
        return Err(CatalogError::Api {
            status: http_status,
            body: header
                .error
                .unwrap_or_else(|| format!("status_code {}", code)),
        });
    }

    let items = match root.get("results") {
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(CatalogError::Decode {
                path: "results".to_string(),
                raw: snippet(&other.to_string()),
                message: "expected an array".to_string(),
            });
        }
        None => {
            return Err(CatalogError::Decode {
                path: "results".to_string(),
                raw: snippet(body),
                message: "missing field `results`".to_string(),
            });
        }
    };

    let results = items
        .iter()
        .enumerate()
        .map(|(idx, item)| decode_item(idx, item))
        .collect::<Result<Vec<T>, _>>()?;

    Ok(Envelope {
        error: header.error,
        status_code: header.status_code,
        number_of_total_results: header.number_of_total_results,
        number_of_page_results: header.number_of_page_results,
        limit: header.limit,
        offset: header.offset,
        results,
    })
}

fn decode_item<T>(idx: usize, item: &Value) -> Result<T, CatalogError>
where
    T: DeserializeOwned,
{
    T::deserialize(item).map_err(|err| {
        let message = err.to_string();
        let field = field_name(&message);
        let path = match field {
            Some(field) => format!("results[{}].{}", idx, field),
            None => format!("results[{}]", idx),
        };
        let raw = field.and_then(|field| item.get(field)).unwrap_or(item);
        CatalogError::Decode {
            path,
            raw: snippet(&raw.to_string()),
            message,
        }
    })
}

/// Picks the field name out of "missing field `x`" style messages.
fn field_name(message: &str) -> Option<&str> {
    let start = message.find("field `")? + "field `".len();
    let len = message[start..].find('`')?;
    Some(&message[start..start + len])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use mockito::{Matcher, Server, ServerGuard};
    use std::net::TcpListener;

    const SHOWS_BODY: &str = r#"{
        "error": "OK",
        "limit": 100,
        "offset": 0,
        "number_of_page_results": 3,
        "number_of_total_results": 3,
        "status_code": 1,
        "results": [
            {
                "api_detail_url": "https://www.giantbomb.com/api/video_show/2340-3/",
                "deck": "A look at new games.",
                "id": 3,
                "title": "Quick Look",
                "site_detail_url": "https://www.giantbomb.com/shows/quick-look/2300-3/"
            },
            {
                "api_detail_url": "https://www.giantbomb.com/api/video_show/2340-10/",
                "deck": null,
                "id": 10,
                "title": "Endurance Run",
                "site_detail_url": "https://www.giantbomb.com/shows/endurance-run/2300-10/"
            },
            {
                "api_detail_url": "https://www.giantbomb.com/api/video_show/2340-7/",
                "deck": "",
                "id": 7,
                "title": "Bombcast",
                "site_detail_url": "https://www.giantbomb.com/shows/bombcast/2300-7/"
            }
        ]
    }"#;

    const VIDEOS_BODY: &str = r#"{
        "error": "OK",
        "status_code": 1,
        "results": [
            {
                "api_detail_url": "https://www.giantbomb.com/api/video/2300-9001/",
                "site_detail_url": "https://www.giantbomb.com/videos/quick-look-example/2300-9001/",
                "embed_player": "https://www.giantbomb.com/videos/embed/9001/",
                "url": "https://v.giantbomb.com/video/ql_example.mp4",
                "image": { "medium_url": "https://www.giantbomb.com/a/uploads/scale_medium/9001.jpg" },
                "hd_url": "https://v.giantbomb.com/video/ql_example_4000.mp4",
                "high_url": "https://v.giantbomb.com/video/ql_example_3200.mp4",
                "low_url": "",
                "id": 9001,
                "guid": "2300-9001",
                "deck": "We take a look.",
                "length_seconds": 1834,
                "name": "Quick Look: Example",
                "publish_date": "2014-11-11 12:00:00",
                "user": "jeff",
                "youtube_id": null,
                "video_show": { "title": "Quick Look" }
            }
        ]
    }"#;

    fn client_for(server: &ServerGuard) -> CatalogClient {
        CatalogClient::with_origin(&server.url(), ClientOptions::default()).unwrap()
    }

    fn listing_query(key: &str) -> Matcher {
        Matcher::AllOf(vec![
            Matcher::UrlEncoded("format".into(), "json".into()),
            Matcher::UrlEncoded("api_key".into(), key.into()),
        ])
    }

    #[test]
    fn test_fetch_shows_preserves_order() {
        let mut server = Server::new();
        let mock = server
            .mock("GET", "/video_shows/")
            .match_query(listing_query("secret"))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(SHOWS_BODY)
            .create();

        let shows = client_for(&server).fetch_shows("secret").unwrap();
        mock.assert();

        let ids: Vec<u64> = shows.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![3, 10, 7]);
        assert_eq!(shows[0].name, "Quick Look");
        assert_eq!(shows[0].summary, "A look at new games.");
        assert_eq!(shows[1].summary, "");
        assert_eq!(
            shows[2].site_url.as_str(),
            "https://www.giantbomb.com/shows/bombcast/2300-7/"
        );
        assert_eq!(
            shows[2].detail_url.as_str(),
            "https://www.giantbomb.com/api/video_show/2340-7/"
        );
    }

    #[test]
    fn test_empty_listing_is_ok() {
        let mut server = Server::new();
        let _mock = server
            .mock("GET", "/videos/")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"error": "OK", "status_code": 1, "results": []}"#)
            .create();

        let videos = client_for(&server).fetch_videos("secret").unwrap();
        assert!(videos.is_empty());
    }

    #[test]
    fn test_not_found_is_api_error() {
        let mut server = Server::new();
        let _mock = server
            .mock("GET", "/video_shows/")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body("<html>Not Found</html>")
            .create();

        let err = client_for(&server).fetch_shows("secret").unwrap_err();
        match err {
            CatalogError::Api { status, body } => {
                assert_eq!(status, 404);
                assert!(body.contains("Not Found"));
            }
            other => panic!("expected API error, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_key_status_code_is_api_error() {
        let mut server = Server::new();
        let _mock = server
            .mock("GET", "/videos/")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"error": "Invalid API Key", "status_code": 100, "results": []}"#)
            .create();

        let err = client_for(&server).fetch_videos("wrong").unwrap_err();
        assert_eq!(err.status(), Some(200));
        assert!(err.to_string().contains("Invalid API Key"));
    }

    #[test]
    fn test_missing_id_is_decode_error() {
        let body = r#"{"status_code": 1, "results": [
            {
                "api_detail_url": "https://www.giantbomb.com/api/video_show/2340-3/",
                "id": 3,
                "title": "Quick Look",
                "site_detail_url": "https://www.giantbomb.com/shows/quick-look/2300-3/"
            },
            {
                "api_detail_url": "https://www.giantbomb.com/api/video_show/2340-4/",
                "title": "No Id",
                "site_detail_url": "https://www.giantbomb.com/shows/no-id/2300-4/"
            }
        ]}"#;
        let mut server = Server::new();
        let _mock = server
            .mock("GET", "/video_shows/")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(body)
            .create();

        let err = client_for(&server).fetch_shows("secret").unwrap_err();
        match err {
            CatalogError::Decode { path, raw, message } => {
                assert_eq!(path, "results[1].id");
                assert!(raw.contains("No Id"));
                assert!(message.contains("missing field `id`"));
            }
            other => panic!("expected decode error, got {:?}", other),
        }
    }

    #[test]
    fn test_wrong_type_is_decode_error() {
        let body = r#"{"results": [{
            "api_detail_url": "https://www.giantbomb.com/api/video_show/2340-3/",
            "id": "three",
            "title": "Quick Look",
            "site_detail_url": "https://www.giantbomb.com/shows/quick-look/2300-3/"
        }]}"#;
        match decode_envelope::<ShowSummary>(body, 200).unwrap_err() {
            CatalogError::Decode { path, raw, message } => {
                assert_eq!(path, "results[0].id");
                assert_eq!(raw, "\"three\"");
                assert!(message.contains("expected u64"), "{}", message);
            }
            other => panic!("expected decode error, got {:?}", other),
        }
    }

    #[test]
    fn test_out_of_range_value_names_field() {
        let body = VIDEOS_BODY.replace("\"length_seconds\": 1834", "\"length_seconds\": -5");
        match decode_envelope::<VideoSummary>(&body, 200).unwrap_err() {
            CatalogError::Decode { path, raw, .. } => {
                assert_eq!(path, "results[0].length_seconds");
                assert_eq!(raw, "-5");
            }
            other => panic!("expected decode error, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_json_is_decode_error() {
        let err = decode_envelope::<ShowSummary>("{\"results\": [", 200).unwrap_err();
        assert!(matches!(err, CatalogError::Decode { ref path, .. } if path == "$"));

        let err = decode_envelope::<ShowSummary>(r#"{"results": {}}"#, 200).unwrap_err();
        assert!(matches!(err, CatalogError::Decode { ref path, .. } if path == "results"));

        let err = decode_envelope::<ShowSummary>(r#"{"status_code": 1}"#, 200).unwrap_err();
        assert!(matches!(err, CatalogError::Decode { ref path, .. } if path == "results"));
    }

    #[test]
    fn test_empty_credential_sends_nothing() {
        let mut server = Server::new();
        let mock = server
            .mock("GET", Matcher::Any)
            .expect(0)
            .create();

        let client = client_for(&server);
        assert!(matches!(
            client.fetch_shows(""),
            Err(CatalogError::InvalidArgument(_))
        ));
        assert!(matches!(
            client.fetch_videos("   "),
            Err(CatalogError::InvalidArgument(_))
        ));
        mock.assert();
    }

    #[test]
    fn test_limit_is_sent_and_clamped() {
        let mut server = Server::new();
        let mock = server
            .mock("GET", "/videos/")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("api_key".into(), "secret".into()),
                Matcher::UrlEncoded("limit".into(), "100".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"results": []}"#)
            .create();

        let client = CatalogClient::with_origin(
            &server.url(),
            ClientOptions {
                limit: Some(500),
                ..ClientOptions::default()
            },
        )
        .unwrap();
        client.fetch_videos("secret").unwrap();
        mock.assert();
    }

    #[test]
    fn test_video_fixture_decodes_exactly() {
        let mut server = Server::new();
        let _mock = server
            .mock("GET", "/videos/")
            .match_query(listing_query("secret"))
            .with_status(200)
            .with_body(VIDEOS_BODY)
            .create();

        let videos = client_for(&server).fetch_videos("secret").unwrap();
        assert_eq!(videos.len(), 1);
        let video = &videos[0];

        assert_eq!(video.id, 9001);
        assert_eq!(video.guid.as_deref(), Some("2300-9001"));
        assert_eq!(video.name, "Quick Look: Example");
        assert_eq!(video.summary, "We take a look.");
        assert_eq!(video.length_seconds, 1834);
        assert_eq!(video.author, "jeff");
        assert_eq!(video.youtube_id, None);
        assert_eq!(video.show_title.as_deref(), Some("Quick Look"));
        assert_eq!(
            video.detail_url,
            url::Url::parse("https://www.giantbomb.com/api/video/2300-9001/").unwrap()
        );
        assert_eq!(
            video.hd_url,
            Some(url::Url::parse("https://v.giantbomb.com/video/ql_example_4000.mp4").unwrap())
        );
        assert_eq!(
            video.video_file_url,
            Some(url::Url::parse("https://v.giantbomb.com/video/ql_example.mp4").unwrap())
        );
        assert_eq!(video.low_res_url, None);
        // Noon PST.
        assert_eq!(
            video.published_at,
            Some(Utc.with_ymd_and_hms(2014, 11, 11, 20, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_concurrent_fetches_are_independent() {
        let mut server = Server::new();
        let mock = server
            .mock("GET", "/videos/")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(VIDEOS_BODY)
            .expect(50)
            .create();

        let client = client_for(&server);
        let results: Vec<Result<Vec<VideoSummary>, CatalogError>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..50)
                .map(|_| scope.spawn(|| client.fetch_videos("secret")))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        mock.assert();
        assert_eq!(results.len(), 50);
        for result in results {
            let videos = result.unwrap();
            assert_eq!(videos.len(), 1);
            assert_eq!(videos[0].id, 9001);
            assert_eq!(videos[0].name, "Quick Look: Example");
        }
    }

    #[test]
    fn test_silent_server_times_out() {
        // Connections queue in the backlog and never get an answer.
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let origin = format!("http://{}", listener.local_addr().unwrap());
        let timeout = Duration::from_millis(300);
        let client = CatalogClient::with_origin(
            &origin,
            ClientOptions {
                timeout,
                limit: None,
            },
        )
        .unwrap();

        let started = Instant::now();
        let err = client.fetch_shows("secret").unwrap_err();
        let elapsed = started.elapsed();

        assert!(matches!(err, CatalogError::Transport(_)), "{:?}", err);
        assert!(err.is_timeout(), "{:?}", err);
        assert!(elapsed < timeout + Duration::from_secs(2), "{:?}", elapsed);
        drop(listener);
    }

    #[test]
    fn test_transport_error_hides_key() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let origin = format!("http://{}", listener.local_addr().unwrap());
        let client = CatalogClient::with_origin(
            &origin,
            ClientOptions {
                timeout: Duration::from_millis(200),
                limit: None,
            },
        )
        .unwrap();

        let err = client.fetch_videos("very-secret-key").unwrap_err();
        assert!(!err.to_string().contains("very-secret-key"));
        drop(listener);
    }

    #[test]
    fn test_field_name_extraction() {
        assert_eq!(field_name("missing field `id`"), Some("id"));
        assert_eq!(
            field_name("invalid value for field `hd_url`: \"x\" is not an absolute URL"),
            Some("hd_url")
        );
        assert_eq!(field_name("invalid type: string \"x\", expected u64"), None);
    }
}
