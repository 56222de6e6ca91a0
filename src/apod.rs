//! # APOD API Client
//!
//! Fetches the Astronomy Picture of the Day metadata for a given date.
//!
//! ## API Endpoint
//! ```text
//! https://api.nasa.gov/planetary/apod?date=YYYY-MM-DD&api_key=<key>
//! ```
//!
//! Parameters:
//! - `date`: The day to look up; the archive starts on 1995-06-16
//! - `api_key`: A registered key, or `DEMO_KEY` for light use
//!
//! ## Response
//! Only `url` is required. `explanation` and `copyright` are optional (public
//! domain images carry no copyright), and every other field is ignored apart
//! from `title` and `media_type`, which are kept for logging.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::AppConfig;

/// Why a fetch produced no picture.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The service answered with a non-success status.
    #[error("{}", status_line(.status, .reason))]
    Service { status: u16, reason: String },

    /// The body was not JSON, or had no usable `url`.
    #[error("{message}")]
    Malformed { message: String },

    /// The request never got an answer (connection refused, timeout, ...).
    #[error("{message}")]
    Transport { message: String },
}

/// `"404 Not Found"`, or just `"599"` when the status has no reason phrase.
fn status_line(status: &u16, reason: &str) -> String {
    if reason.is_empty() {
        status.to_string()
    } else {
        format!("{status} {reason}")
    }
}

impl FetchError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }
}

/// Raw reply from the HTTP capability. The body is not yet interpreted.
#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: u16,
    pub reason: String,
    pub body: String,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The outbound HTTP capability used by [`PictureFetcher`].
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Issues `GET url` with `Accept: application/json`.
    async fn get_json(&self, url: &str) -> Result<HttpReply, FetchError>;
}

/// [`HttpTransport`] over a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Creates an HTTP client with the given request timeout.
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Transport {
                message: format!("Failed to create HTTP client: {e}"),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get_json(&self, url: &str) -> Result<HttpReply, FetchError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| FetchError::Transport {
                message: if e.is_timeout() {
                    "Request timed out - check your internet connection".to_string()
                } else {
                    format!("Failed to reach the APOD service: {e}")
                },
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| FetchError::Transport {
            message: format!("Failed to read response body: {e}"),
        })?;

        Ok(HttpReply {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("").to_string(),
            body,
        })
    }
}

/// Raw APOD response. Fields map directly to the JSON keys.
///
/// Only `url` must have the right type; the descriptive fields read as `None`
/// when they hold anything but a string.
#[derive(Debug, Deserialize)]
struct ApodResponse {
    url: Option<String>,
    #[serde(default, deserialize_with = "string_or_none")]
    explanation: Option<String>,
    #[serde(default, deserialize_with = "string_or_none")]
    copyright: Option<String>,
    #[serde(default, deserialize_with = "string_or_none")]
    title: Option<String>,
    #[serde(default, deserialize_with = "string_or_none")]
    media_type: Option<String>,
}

fn string_or_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Some(s),
        _ => None,
    })
}

/// One day's picture, ready to hand to the display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PictureRecord {
    pub url: String,
    /// Empty when the service sent none.
    pub explanation: String,
    pub copyright: Option<String>,
    pub title: Option<String>,
    /// `"image"` or `"video"` when the service reports it.
    pub media_type: Option<String>,
}

impl TryFrom<ApodResponse> for PictureRecord {
    type Error = FetchError;

    fn try_from(data: ApodResponse) -> Result<Self, Self::Error> {
        let url = data
            .url
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| FetchError::malformed("Response has no picture URL"))?;

        reqwest::Url::parse(url.trim())
            .map_err(|e| FetchError::malformed(format!("Invalid picture URL \"{url}\": {e}")))?;

        Ok(Self {
            url: url.trim().to_string(),
            explanation: data.explanation.unwrap_or_default(),
            // APOD pads credits with newlines
            copyright: data
                .copyright
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
            title: data.title,
            media_type: data.media_type,
        })
    }
}

/// Builds APOD requests and turns the replies into [`PictureRecord`]s.
#[derive(Debug, Clone)]
pub struct PictureFetcher<T> {
    transport: T,
    endpoint: String,
    api_key: String,
}

impl PictureFetcher<ReqwestTransport> {
    /// Creates a fetcher backed by reqwest, using the configured endpoint,
    /// key and timeout.
    pub fn from_config(config: &AppConfig) -> Result<Self, FetchError> {
        let transport = ReqwestTransport::new(Duration::from_secs(config.request_timeout_secs))?;
        Ok(Self::new(transport, &config.endpoint, &config.api_key))
    }
}

impl<T: HttpTransport> PictureFetcher<T> {
    pub fn new(transport: T, endpoint: &str, api_key: &str) -> Self {
        Self {
            transport,
            endpoint: endpoint.trim_end_matches('?').to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// The full request URL for `date`.
    pub fn request_url(&self, date: NaiveDate) -> String {
        format!(
            "{}?date={}&api_key={}",
            self.endpoint,
            date.format("%Y-%m-%d"),
            self.api_key
        )
    }

    /// Fetches the picture metadata for `date`.
    ///
    /// # Returns
    /// * `Ok(PictureRecord)` - the reply carried a usable picture URL
    /// * `Err(FetchError::Service)` - non-success HTTP status
    /// * `Err(FetchError::Malformed)` - body is not JSON or lacks `url`
    /// * `Err(FetchError::Transport)` - no reply at all
    pub async fn fetch(&self, date: NaiveDate) -> Result<PictureRecord, FetchError> {
        let url = self.request_url(date);
        debug!(%date, endpoint = %self.endpoint, "requesting picture");

        let reply = self.transport.get_json(&url).await?;

        if !reply.is_success() {
            info!(%date, status = reply.status, "APOD service returned an error");
            return Err(FetchError::Service {
                status: reply.status,
                reason: reply.reason,
            });
        }

        let data: ApodResponse = serde_json::from_str(&reply.body)
            .map_err(|e| FetchError::malformed(format!("Failed to parse APOD response: {e}")))?;

        let record = PictureRecord::try_from(data)?;
        info!(
            %date,
            title = record.title.as_deref().unwrap_or(""),
            media_type = record.media_type.as_deref().unwrap_or("unknown"),
            "picture metadata received"
        );
        Ok(record)
    }
}
