//! Strava API client.
//!
//! Implements [`ActivityService`] on top of the Strava v3 REST API:
//! - OAuth refresh-token exchange when the client is created
//! - Recent activity listing for the watermark and duplicate checks
//! - Multipart GPX upload
//!
//! HTTP 429 is turned into [`RemoteError::RateLimited`]. Strava rarely sends
//! `Retry-After`, so without it we wait for the next 15-minute rate window.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::RemoteError;
use crate::remote::{ActivityService, RemoteActivity, UploadReceipt};

const API_BASE: &str = "https://www.strava.com/api/v3";
const TOKEN_URL: &str = "https://www.strava.com/oauth/token";

// Strava counts requests in 15-minute windows aligned to the quarter hour
const RATE_WINDOW_SECS: i64 = 15 * 60;

const REQUEST_TIMEOUT_SECS: u64 = 60;

// Sent with every upload so Strava does not guess the sport from the file
const UPLOAD_ACTIVITY_TYPE: &str = "run";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_at: Option<i64>,
}

/// Body returned by `POST /uploads`
#[derive(Debug, Deserialize)]
struct UploadResponse {
    id: u64,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Authenticated Strava client.
pub struct StravaClient {
    client: Client,
    access_token: String,
}

impl StravaClient {
    /// Exchange a refresh token for an access token and build a client.
    ///
    /// Failure here means the credentials are unusable and the run cannot start.
    pub async fn connect(
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
    ) -> Result<Self, RemoteError> {
        let client = build_http_client()?;

        let response = client
            .post(TOKEN_URL)
            .form(&[
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Auth(format!("HTTP {}: {}", status, body)));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| RemoteError::Decode(format!("token response: {}", e)))?;

        info!(
            "[StravaClient] Authenticated, token expires at {:?}",
            token.expires_at
        );

        Ok(Self {
            client,
            access_token: token.access_token,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, RemoteError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .query(query)
            .send()
            .await
            .map_err(transport_error)?;

        let response = check_status(response, status_error).await?;
        response
            .json()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))
    }
}

impl ActivityService for StravaClient {
    async fn latest_activity_start(&self) -> Result<Option<DateTime<Utc>>, RemoteError> {
        let activities = self.recent_activities(1).await?;
        Ok(activities.first().map(|a| a.start_time))
    }

    async fn recent_activities(&self, limit: usize) -> Result<Vec<RemoteActivity>, RemoteError> {
        let url = format!("{}/athlete/activities", API_BASE);
        let activities: Vec<RemoteActivity> = self
            .get_json(&url, &[("per_page", limit.to_string()), ("page", "1".to_string())])
            .await?;
        debug!("[StravaClient] Fetched {} recent activities", activities.len());
        Ok(activities)
    }

    async fn upload_file(&self, path: &Path, format: &str) -> Result<UploadReceipt, RemoteError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| RemoteError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let file_name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("activity.gpx")
            .to_string();

        let form = Form::new()
            .text("data_type", format.to_string())
            .text("activity_type", UPLOAD_ACTIVITY_TYPE)
            .part("file", Part::bytes(bytes).file_name(file_name));

        let response = self
            .client
            .post(format!("{}/uploads", API_BASE))
            .bearer_auth(&self.access_token)
            .multipart(form)
            .send()
            .await
            .map_err(transport_error)?;

        let response = check_status(response, upload_error).await?;
        let upload: UploadResponse = response
            .json()
            .await
            .map_err(|e| RemoteError::Decode(format!("upload response: {}", e)))?;

        into_receipt(upload)
    }
}

fn build_http_client() -> Result<Client, RemoteError> {
    Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .tcp_keepalive(Duration::from_secs(30))
        .build()
        .map_err(|e| RemoteError::Http {
            message: format!("Failed to create HTTP client: {}", e),
            status_code: None,
        })
}

fn transport_error(e: reqwest::Error) -> RemoteError {
    RemoteError::Http {
        message: e.to_string(),
        status_code: e.status().map(|s| s.as_u16()),
    }
}

/// Maps a non-success status, its headers and body to an error.
type Classify = fn(StatusCode, &HeaderMap, String, DateTime<Utc>) -> RemoteError;

async fn check_status(response: Response, classify: Classify) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let headers = response.headers().clone();
    let body = response.text().await.unwrap_or_default();
    Err(classify(status, &headers, body, Utc::now()))
}

/// Error for a failed API call.
///
/// - 429 → [`RemoteError::RateLimited`], waiting as long as [`retry_after`] says
/// - 401/403 → [`RemoteError::Auth`]
/// - anything else → [`RemoteError::Http`] with the status code
fn status_error(
    status: StatusCode,
    headers: &HeaderMap,
    body: String,
    now: DateTime<Utc>,
) -> RemoteError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => RemoteError::RateLimited {
            retry_after: retry_after(headers, now),
        },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteError::Auth(body),
        _ => RemoteError::Http {
            message: body,
            status_code: Some(status.as_u16()),
        },
    }
}

/// Error for a failed upload. 400/409/422 mean Strava refused this file, which
/// only affects this track; everything else is classified as for any API call.
fn upload_error(
    status: StatusCode,
    headers: &HeaderMap,
    body: String,
    now: DateTime<Utc>,
) -> RemoteError {
    match status {
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
            RemoteError::UploadRejected(body)
        }
        _ => status_error(status, headers, body, now),
    }
}

fn into_receipt(upload: UploadResponse) -> Result<UploadReceipt, RemoteError> {
    match upload.error {
        Some(error) if !error.is_empty() => Err(RemoteError::UploadRejected(error)),
        _ => Ok(UploadReceipt {
            upload_id: upload.id,
            status: upload.status,
        }),
    }
}

/// How long to back off after a 429.
///
/// Uses `Retry-After` (in seconds) when present, otherwise the time left until the
/// next 15-minute window starts.
pub fn retry_after(headers: &HeaderMap, now: DateTime<Utc>) -> Duration {
    let from_header = headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok());

    match from_header {
        Some(secs) => Duration::from_secs(secs),
        None => {
            let into_window = now.timestamp().rem_euclid(RATE_WINDOW_SECS);
            Duration::from_secs((RATE_WINDOW_SECS - into_window) as u64)
        }
    }
}
