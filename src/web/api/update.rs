use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::tle::{ElementSetProvider, FetchError, RefreshError, StoreError};
use crate::web::auth::{ApiKey, AppState};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UpdateQuery {
    /// Comma-separated catalog numbers to fetch in addition to the configured list
    pub extra_ids: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum UpdateResponse {
    Ok {
        fetched_ids: Vec<u32>,
        added_ids: Vec<u32>,
    },
    Error {
        message: String,
    },
}

#[utoipa::path(
    get,
    path = "/update_tle",
    tag = "tle",
    params(
        UpdateQuery,
        ("apiKey" = Option<String>, Query, description = "API key, when access control is enabled")
    ),
    responses(
        (status = 200, description = "TLE cache refreshed", body = UpdateResponse),
        (status = 400, description = "Malformed extra_ids", body = UpdateResponse),
        (status = 401, description = "Missing or invalid API key", body = UpdateResponse),
        (status = 500, description = "Cache could not be written", body = UpdateResponse),
        (status = 502, description = "Upstream login or retrieval failed", body = UpdateResponse)
    )
)]
pub async fn update_tle<P: ElementSetProvider + 'static>(
    State(state): State<AppState<P>>,
    ApiKey(key): ApiKey,
    Query(query): Query<UpdateQuery>,
) -> (StatusCode, Json<UpdateResponse>) {
    if let Err(e) = state.gate.authorize(key.as_deref()).await {
        return failure(StatusCode::UNAUTHORIZED, e.to_string());
    }

    let extra_ids = match parse_extra_ids(query.extra_ids.as_deref()) {
        Ok(ids) => ids,
        Err(message) => return failure(StatusCode::BAD_REQUEST, message),
    };

    match state.refresh.refresh(&extra_ids).await {
        Ok(report) => (
            StatusCode::OK,
            Json(UpdateResponse::Ok {
                fetched_ids: report.fetched_ids,
                added_ids: report.added_ids,
            }),
        ),
        Err(e) => {
            log::error!("On-demand TLE refresh failed: {}", e);
            failure(refresh_status(&e), e.to_string())
        }
    }
}

fn failure(status: StatusCode, message: String) -> (StatusCode, Json<UpdateResponse>) {
    (status, Json(UpdateResponse::Error { message }))
}

fn parse_extra_ids(raw: Option<&str>) -> Result<Vec<u32>, String> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u32>()
                .ok()
                .filter(|id| *id > 0)
                .ok_or_else(|| format!("extra_ids: '{}' is not a catalog number", s))
        })
        .collect()
}

fn refresh_status(e: &RefreshError) -> StatusCode {
    match e {
        RefreshError::Fetch(FetchError::NoSatellites) => StatusCode::BAD_REQUEST,
        RefreshError::Fetch(FetchError::Io(_)) | RefreshError::Store(StoreError::Io(_)) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        RefreshError::Busy => StatusCode::SERVICE_UNAVAILABLE,
        RefreshError::Fetch(_) => StatusCode::BAD_GATEWAY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extra_ids_parsing() {
        assert_eq!(parse_extra_ids(None), Ok(vec![]));
        assert_eq!(parse_extra_ids(Some("")), Ok(vec![]));
        assert_eq!(parse_extra_ids(Some("1, 2,,3")), Ok(vec![1, 2, 3]));
        assert!(parse_extra_ids(Some("1,abc")).unwrap_err().contains("abc"));
        assert!(parse_extra_ids(Some("-4")).is_err());
    }

    #[test]
    fn upstream_failures_are_bad_gateway() {
        let auth = RefreshError::Fetch(FetchError::Auth("rejected".into()));
        let io = RefreshError::Fetch(FetchError::Io(std::io::Error::other("disk full")));
        assert_eq!(refresh_status(&auth), StatusCode::BAD_GATEWAY);
        assert_eq!(refresh_status(&io), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn response_shape() {
        let ok = serde_json::to_value(UpdateResponse::Ok {
            fetched_ids: vec![1, 2],
            added_ids: vec![2],
        })
        .unwrap();
        assert_eq!(
            ok,
            serde_json::json!({"status": "ok", "fetched_ids": [1, 2], "added_ids": [2]})
        );

        let err = serde_json::to_value(UpdateResponse::Error {
            message: "nope".into(),
        })
        .unwrap();
        assert_eq!(err, serde_json::json!({"status": "error", "message": "nope"}));
    }
}
