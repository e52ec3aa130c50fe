//! Canonical data model for the Giant Bomb video catalog.
//!
//! Wire field names follow the upstream API (`api_detail_url`, `deck`, ...);
//! the Rust field names follow what the values mean. Serialization uses the
//! Rust names.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::US::Pacific;
use serde::de::{self, Deserialize, DeserializeOwned, Deserializer};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use url::Url;

/// Wall-clock format used by `publish_date`. Values are US/Pacific local time.
pub const PUBLISH_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The listing wrapper every collection endpoint returns.
#[derive(Debug, Clone)]
pub struct Envelope<T> {
    /// `"OK"` on success, a human-readable message otherwise.
    pub error: Option<String>,
    /// Upstream status; `1` means OK (e.g. `100` is an invalid API key).
    pub status_code: Option<i64>,
    pub number_of_total_results: Option<u64>,
    pub number_of_page_results: Option<u64>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub results: Vec<T>,
}

/// One entry of the `video_shows` listing.
#[derive(Debug, Clone, Serialize)]
pub struct ShowSummary {
    pub detail_url: Url,
    /// Free-text description, empty when the API has none.
    pub summary: String,
    pub id: u64,
    pub name: String,
    pub site_url: Url,
}

/// One entry of the `videos` listing.
#[derive(Debug, Clone, Serialize)]
pub struct VideoSummary {
    pub detail_url: Url,
    pub site_url: Url,
    pub embed_player_url: Option<Url>,
    pub video_file_url: Option<Url>,
    pub image_url: Option<Url>,
    pub hd_url: Option<Url>,
    pub high_res_url: Option<Url>,
    pub low_res_url: Option<Url>,
    pub id: u64,
    pub guid: Option<String>,
    pub summary: String,
    pub length_seconds: u64,
    pub name: String,
    /// `None` for unpublished or draft entries.
    pub published_at: Option<DateTime<Utc>>,
    /// Uploader name, may be empty.
    pub author: String,
    pub youtube_id: Option<String>,
    /// Title of the show this video belongs to, if any.
    pub show_title: Option<String>,
}

/// Media rendition of a video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    #[default]
    Hd,
    High,
    Low,
}

impl Resolution {
    /// Lookup order when the requested rendition is missing: the request
    /// itself, then lower renditions, then higher ones.
    fn fallback_order(self) -> [Resolution; 3] {
        match self {
            Resolution::Hd => [Resolution::Hd, Resolution::High, Resolution::Low],
            Resolution::High => [Resolution::High, Resolution::Low, Resolution::Hd],
            Resolution::Low => [Resolution::Low, Resolution::High, Resolution::Hd],
        }
    }
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hd" => Ok(Resolution::Hd),
            "high" => Ok(Resolution::High),
            "low" => Ok(Resolution::Low),
            _ => Err(format!(
                "Unknown resolution: {}. Available: hd, high, low",
                s
            )),
        }
    }
}

// Case-insensitive, so `resolution = "HD"` in older config files still loads.
impl<'de> Deserialize<'de> for Resolution {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Resolution::Hd => "hd",
            Resolution::High => "high",
            Resolution::Low => "low",
        };
        f.write_str(label)
    }
}

impl VideoSummary {
    /// The URL of exactly this rendition.
    pub fn media_url(&self, resolution: Resolution) -> Option<&Url> {
        match resolution {
            Resolution::Hd => self.hd_url.as_ref(),
            Resolution::High => self.high_res_url.as_ref(),
            Resolution::Low => self.low_res_url.as_ref(),
        }
    }

    /// The closest available rendition to `resolution`.
    pub fn best_media_url(&self, resolution: Resolution) -> Option<&Url> {
        resolution
            .fallback_order()
            .into_iter()
            .find_map(|res| self.media_url(res))
    }
}

// Identity is the catalog id; every other field is payload.
impl PartialEq for ShowSummary {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ShowSummary {}

impl Hash for ShowSummary {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialEq for VideoSummary {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for VideoSummary {}

impl Hash for VideoSummary {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Common accessors used by the listing filters.
pub trait CatalogEntry {
    fn id(&self) -> u64;
    fn name(&self) -> &str;
}

impl CatalogEntry for ShowSummary {
    fn id(&self) -> u64 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl CatalogEntry for VideoSummary {
    fn id(&self) -> u64 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl<'de> Deserialize<'de> for ShowSummary {
    /// Shows carry their display name in `title`; older payloads use `name`.
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Values stay raw until `typed` so a wrong type names its field.
        #[derive(serde::Deserialize)]
        struct Proxy {
            api_detail_url: Option<Value>,
            deck: Option<Value>,
            id: Option<Value>,
            title: Option<Value>,
            name: Option<Value>,
            site_detail_url: Option<Value>,
        }

        let proxy = Proxy::deserialize(deserializer)?;

        let show = (|| -> Result<ShowSummary, FieldError> {
            let title = typed("title", proxy.title)?.or(typed("name", proxy.name)?);
            Ok(ShowSummary {
                detail_url: required_url(
                    "api_detail_url",
                    typed("api_detail_url", proxy.api_detail_url)?,
                )?,
                summary: typed("deck", proxy.deck)?.unwrap_or_default(),
                id: positive_id(typed("id", proxy.id)?)?,
                name: non_empty("title", title)?,
                site_url: required_url(
                    "site_detail_url",
                    typed("site_detail_url", proxy.site_detail_url)?,
                )?,
            })
        })();

        show.map_err(de::Error::custom)
    }
}

impl<'de> Deserialize<'de> for VideoSummary {
    /// Flattens the nested `image` and `video_show` objects into the record.
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(serde::Deserialize)]
        struct Proxy {
            api_detail_url: Option<Value>,
            site_detail_url: Option<Value>,
            embed_player: Option<Value>,
            url: Option<Value>,
            image: Option<Value>,
            hd_url: Option<Value>,
            high_url: Option<Value>,
            low_url: Option<Value>,
            id: Option<Value>,
            guid: Option<Value>,
            deck: Option<Value>,
            length_seconds: Option<Value>,
            name: Option<Value>,
            publish_date: Option<Value>,
            user: Option<Value>,
            youtube_id: Option<Value>,
            video_show: Option<Value>,
        }

        let proxy = Proxy::deserialize(deserializer)?;

        let video = (|| -> Result<VideoSummary, FieldError> {
            let image_url = match proxy.image {
                None | Some(Value::Null) => None,
                Some(Value::String(raw)) => optional_url("image", Some(raw))?,
                Some(Value::Object(map)) => {
                    // `medium_url` is what listings display; fall back to the smaller cut.
                    let raw = map
                        .get("medium_url")
                        .and_then(|v| v.as_str())
                        .filter(|s| !s.trim().is_empty())
                        .or_else(|| map.get("small_url").and_then(|v| v.as_str()))
                        .map(str::to_string);
                    optional_url("image", raw)?
                }
                Some(other) => {
                    return Err(FieldError::invalid(
                        "image",
                        format!("expected string or object, got {}", other),
                    ));
                }
            };

            let show_title = proxy.video_show.as_ref().and_then(|show| {
                show.get("title")
                    .or_else(|| show.get("name"))
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
            });

            let publish_date: Option<String> = typed("publish_date", proxy.publish_date)?;
            let published_at = match publish_date.filter(|s| !s.trim().is_empty()) {
                Some(raw) => Some(
                    parse_publish_date(&raw)
                        .map_err(|reason| FieldError::invalid("publish_date", reason))?,
                ),
                None => None,
            };

            Ok(VideoSummary {
                detail_url: required_url(
                    "api_detail_url",
                    typed("api_detail_url", proxy.api_detail_url)?,
                )?,
                site_url: required_url(
                    "site_detail_url",
                    typed("site_detail_url", proxy.site_detail_url)?,
                )?,
                embed_player_url: optional_url(
                    "embed_player",
                    typed("embed_player", proxy.embed_player)?,
                )?,
                video_file_url: optional_url("url", typed("url", proxy.url)?)?,
                image_url,
                hd_url: optional_url("hd_url", typed("hd_url", proxy.hd_url)?)?,
                high_res_url: optional_url("high_url", typed("high_url", proxy.high_url)?)?,
                low_res_url: optional_url("low_url", typed("low_url", proxy.low_url)?)?,
                id: positive_id(typed("id", proxy.id)?)?,
                guid: typed::<String>("guid", proxy.guid)?.filter(|s| !s.is_empty()),
                summary: typed("deck", proxy.deck)?.unwrap_or_default(),
                length_seconds: typed("length_seconds", proxy.length_seconds)?
                    .ok_or(FieldError::Missing("length_seconds"))?,
                name: non_empty("name", typed("name", proxy.name)?)?,
                published_at,
                author: typed("user", proxy.user)?.unwrap_or_default(),
                youtube_id: typed::<String>("youtube_id", proxy.youtube_id)?
                    .filter(|s| !s.trim().is_empty()),
                show_title,
            })
        })();

        video.map_err(de::Error::custom)
    }
}

/// Parses a `publish_date` value into UTC.
///
/// The API emits US/Pacific wall-clock time; RFC 3339 input is accepted as is.
/// During the autumn DST overlap the earlier instant wins.
pub fn parse_publish_date(raw: &str) -> Result<DateTime<Utc>, String> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(raw, PUBLISH_DATE_FORMAT)
        .map_err(|e| format!("{:?} is not a valid date ({})", raw, e))?;
    Pacific
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| format!("{:?} does not exist in US/Pacific", raw))
}

/// Validation failure for a single wire field. The messages mirror serde's
/// own (`missing field `x``) so callers can pick the field name out of either.
#[derive(Debug)]
enum FieldError {
    Missing(&'static str),
    Invalid { field: &'static str, reason: String },
}

impl FieldError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        FieldError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldError::Missing(field) => write!(f, "missing field `{}`", field),
            FieldError::Invalid { field, reason } => {
                write!(f, "invalid value for field `{}`: {}", field, reason)
            }
        }
    }
}

/// Converts one raw wire value, naming `field` when the type is wrong.
/// JSON `null` counts as absent.
fn typed<T>(field: &'static str, raw: Option<Value>) -> Result<Option<T>, FieldError>
where
    T: DeserializeOwned,
{
    match raw {
        None | Some(Value::Null) => Ok(None),
        Some(value) => T::deserialize(value)
            .map(Some)
            .map_err(|e| FieldError::invalid(field, e.to_string())),
    }
}

fn optional_url(field: &'static str, raw: Option<String>) -> Result<Option<Url>, FieldError> {
    let Some(raw) = raw.filter(|s| !s.trim().is_empty()) else {
        return Ok(None);
    };
    Url::parse(raw.trim()).map(Some).map_err(|e| {
        FieldError::invalid(field, format!("{:?} is not an absolute URL ({})", raw, e))
    })
}

fn required_url(field: &'static str, raw: Option<String>) -> Result<Url, FieldError> {
    optional_url(field, raw)?.ok_or(FieldError::Missing(field))
}

fn positive_id(id: Option<u64>) -> Result<u64, FieldError> {
    match id {
        None => Err(FieldError::Missing("id")),
        Some(0) => Err(FieldError::invalid("id", "must be positive")),
        Some(id) => Ok(id),
    }
}

fn non_empty(field: &'static str, value: Option<String>) -> Result<String, FieldError> {
    match value {
        None => Err(FieldError::Missing(field)),
        Some(s) if s.trim().is_empty() => Err(FieldError::invalid(field, "must not be empty")),
        Some(s) => Ok(s),
    }
}
