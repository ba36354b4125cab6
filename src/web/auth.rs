use axum::{
    extract::{FromRequestParts, Query},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashSet;
use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use crate::tle::{RefreshService, SpaceTrackClient, TleStore};

use super::config::{AuthConfig, Config};

pub struct AppState<P = SpaceTrackClient> {
    pub config: Arc<Config>,
    pub store: Arc<TleStore>,
    pub refresh: Arc<RefreshService<P>>,
    pub gate: Arc<AccessGate>,
}

impl<P> Clone for AppState<P> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            store: self.store.clone(),
            refresh: self.refresh.clone(),
            gate: self.gate.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AccessDenied {
    #[error("Missing API key")]
    MissingKey,
    #[error("Invalid API key")]
    InvalidKey,
}

impl IntoResponse for AccessDenied {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}

/// Allow-list check against a newline-delimited key file.
///
/// The file is read on every call so keys can be added or revoked without a restart.
#[derive(Debug, Clone)]
pub struct AccessGate {
    enabled: bool,
    key_file: PathBuf,
}

impl AccessGate {
    pub fn new(enabled: bool, key_file: PathBuf) -> Self {
        Self { enabled, key_file }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.enabled, config.api_key_file.clone())
    }

    pub async fn authorize(&self, key: Option<&str>) -> Result<(), AccessDenied> {
        if !self.enabled {
            return Ok(());
        }
        let key = key
            .filter(|k| !k.is_empty())
            .ok_or(AccessDenied::MissingKey)?;

        if self.load_keys().await.contains(key) {
            Ok(())
        } else {
            Err(AccessDenied::InvalidKey)
        }
    }

    async fn load_keys(&self) -> HashSet<String> {
        match tokio::fs::read_to_string(&self.key_file).await {
            Ok(content) => parse_keys(&content),
            Err(e) => {
                log::error!(
                    "Cannot read API key file {}: {}",
                    self.key_file.display(),
                    e
                );
                HashSet::new()
            }
        }
    }
}

fn parse_keys(content: &str) -> HashSet<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(String::from)
        .collect()
}

/// The caller's API key, if any.
///
/// Taken from the `apiKey` query parameter, or from an `&apiKey=` suffix glued onto the last
/// path segment (`/25544/.../10&apiKey=KEY`).
#[derive(Debug, Clone, Default)]
pub struct ApiKey(pub Option<String>);

#[derive(Deserialize)]
struct ApiKeyQuery {
    #[serde(rename = "apiKey")]
    api_key: Option<String>,
}

impl<S: Send + Sync> FromRequestParts<S> for ApiKey {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let from_query = Query::<ApiKeyQuery>::try_from_uri(&parts.uri)
            .ok()
            .and_then(|Query(q)| q.api_key);

        Ok(ApiKey(
            from_query.or_else(|| key_from_path(parts.uri.path())),
        ))
    }
}

fn key_from_path(path: &str) -> Option<String> {
    let last = path.rsplit('/').next()?;
    let (_, params) = last.split_once('&')?;
    params
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(name, _)| *name == "apiKey")
        .map(|(_, value)| value.to_string())
}

/// Strip an embedded `&...` suffix from a path segment.
pub fn strip_embedded_params(segment: &str) -> &str {
    segment.split_once('&').map_or(segment, |(head, _)| head)
}
