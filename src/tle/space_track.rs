use std::time::Duration;

use serde::Deserialize;

use super::error::FetchError;
use super::provider::{ElementSetProvider, ProviderSession};

pub const DEFAULT_BASE_URL: &str = "https://www.space-track.org";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Space-Track.org client. Each login gets its own cookie jar.
pub struct SpaceTrackClient {
    base_url: String,
    identity: String,
    password: String,
    timeout: Duration,
}

impl SpaceTrackClient {
    pub fn new(base_url: &str, identity: &str, password: &str, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            identity: identity.to_string(),
            password: password.to_string(),
            timeout,
        }
    }
}

pub struct SpaceTrackSession {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct SatcatEntry {
    object_name: Option<String>,
    satname: Option<String>,
}

impl ElementSetProvider for SpaceTrackClient {
    type Session = SpaceTrackSession;

    async fn login(&self) -> Result<SpaceTrackSession, FetchError> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(self.timeout)
            .build()
            .map_err(|e| FetchError::Network(format!("Failed to create HTTP client: {}", e)))?;

        let url = format!("{}/ajaxauth/login", self.base_url);
        let response = client
            .post(&url)
            .form(&[
                ("identity", self.identity.as_str()),
                ("password", self.password.as_str()),
            ])
            .send()
            .await
            .map_err(|e| request_error(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Auth(format!("HTTP {}", status)));
        }

        // A rejected login still answers 200 with {"Login":"Failed"}
        let body = response.text().await.map_err(|e| request_error(&url, e))?;
        if body.contains("Failed") {
            return Err(FetchError::Auth("credentials rejected".into()));
        }

        log::debug!("Logged in to {}", self.base_url);
        Ok(SpaceTrackSession {
            client,
            base_url: self.base_url.clone(),
        })
    }
}

impl SpaceTrackSession {
    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| request_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        response.text().await.map_err(|e| request_error(url, e))
    }
}

impl ProviderSession for SpaceTrackSession {
    async fn fetch_elements(&self, catalog_ids: &[u32]) -> Result<String, FetchError> {
        let ids = join_ids(catalog_ids);
        let url = format!(
            "{}/basicspacedata/query/class/gp/NORAD_CAT_ID/{}/format/tle",
            self.base_url, ids
        );
        self.get_text(&url).await
    }

    async fn lookup_name(&self, catalog_id: u32) -> Result<String, FetchError> {
        let url = format!(
            "{}/basicspacedata/query/class/satcat/NORAD_CAT_ID/{}/format/json",
            self.base_url, catalog_id
        );
        let body = self.get_text(&url).await?;
        parse_satcat_name(&body)
            .ok_or_else(|| FetchError::Malformed(format!("no name for {} in satcat", catalog_id)))
    }
}

fn join_ids(ids: &[u32]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn parse_satcat_name(body: &str) -> Option<String> {
    let entries: Vec<SatcatEntry> = serde_json::from_str(body).ok()?;
    let entry = entries.into_iter().next()?;
    entry
        .object_name
        .into_iter()
        .chain(entry.satname)
        .map(|name| name.trim().to_string())
        .find(|name| !name.is_empty())
}

fn request_error(url: &str, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Network(format!("Request to {} failed: {}", url, e))
    }
}
