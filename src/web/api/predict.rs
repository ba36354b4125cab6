use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::predict::{predict_passes, Observer, PassQuery, PassRecord, Qualifier};
use crate::tle::{ElementSetProvider, TleStore};
use crate::web::api::error::{ApiError, ApiResult};
use crate::web::auth::{strip_embedded_params, ApiKey, AppState};
use crate::web::config::PredictConfig;

/// Raw path segments; parsed by hand so each failure can name its parameter.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Path)]
pub struct PredictPath {
    /// NORAD catalog number
    pub satid: String,
    /// Observer latitude in degrees
    pub lat: String,
    /// Observer longitude in degrees
    pub lon: String,
    /// Observer altitude in kilometres
    pub alt: String,
    /// Prediction window in days from now
    pub days: String,
    /// Minimum pass duration (minutes) or maximum elevation (degrees), per deployment
    pub qualifier: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SatInfo {
    pub satid: u32,
    pub satname: String,
    pub transactionscount: usize,
    pub passescount: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PredictResponse {
    pub info: SatInfo,
    pub passes: Vec<PassRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PredictRequest {
    satid: u32,
    observer: Observer,
    days: u32,
    qualifier: Qualifier,
}

#[utoipa::path(
    get,
    path = "/{satid}/{lat}/{lon}/{alt}/{days}/{qualifier}",
    tag = "predict",
    params(
        PredictPath,
        ("apiKey" = Option<String>, Query, description = "API key, when access control is enabled")
    ),
    responses(
        (status = 200, description = "Qualifying passes in time order", body = PredictResponse),
        (status = 400, description = "Malformed parameter", body = super::error::ErrorResponse),
        (status = 401, description = "Missing or invalid API key", body = super::error::ErrorResponse),
        (status = 404, description = "Satellite not in the TLE cache", body = super::error::ErrorResponse),
        (status = 500, description = "Propagation failure", body = super::error::ErrorResponse)
    )
)]
pub async fn predict<P: ElementSetProvider + 'static>(
    State(state): State<AppState<P>>,
    ApiKey(key): ApiKey,
    Path(path): Path<PredictPath>,
) -> ApiResult<Json<PredictResponse>> {
    state.gate.authorize(key.as_deref()).await?;

    let request = parse_request(&path, &state.config.predict)?;
    let response = predict_for(
        &state.store,
        &request,
        state.config.predict.horizon_deg,
        Utc::now(),
    )?;
    Ok(Json(response))
}

fn parse_request(path: &PredictPath, config: &PredictConfig) -> ApiResult<PredictRequest> {
    let satid = path
        .satid
        .trim()
        .parse::<u32>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| bad_request("satid must be a positive integer catalog number"))?;

    let lat = parse_number(&path.lat, "lat")?;
    if !(-90.0..=90.0).contains(&lat) {
        return Err(bad_request("lat must be between -90 and 90 degrees"));
    }
    let lon = parse_number(&path.lon, "lon")?;
    if !(-180.0..=360.0).contains(&lon) {
        return Err(bad_request("lon must be between -180 and 360 degrees"));
    }
    let alt = parse_number(&path.alt, "alt")?;
    let observer =
        Observer::new(lat, lon, alt).ok_or_else(|| bad_request("invalid observer location"))?;

    let days = path
        .days
        .trim()
        .parse::<u32>()
        .ok()
        .filter(|d| (1..=config.max_days).contains(d))
        .ok_or_else(|| {
            bad_request(format!(
                "days must be an integer between 1 and {}",
                config.max_days
            ))
        })?;

    let threshold = strip_embedded_params(&path.qualifier)
        .trim()
        .parse::<u32>()
        .map_err(|_| bad_request("qualifier must be a non-negative integer"))?;

    Ok(PredictRequest {
        satid,
        observer,
        days,
        qualifier: config.qualifier.with_threshold(f64::from(threshold)),
    })
}

fn parse_number(raw: &str, name: &str) -> ApiResult<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| bad_request(format!("{} must be a number", name)))
}

fn bad_request(message: impl Into<String>) -> ApiError {
    ApiError::BadRequest(message.into())
}

fn predict_for(
    store: &TleStore,
    request: &PredictRequest,
    horizon_deg: f64,
    now: DateTime<Utc>,
) -> ApiResult<PredictResponse> {
    let record = store
        .get(request.satid)
        .ok_or(ApiError::UnknownSatellite(request.satid))?;

    let start = now.trunc_subsecs(0);
    let query = PassQuery {
        observer: request.observer,
        start,
        end: start + chrono::Duration::days(i64::from(request.days)),
        horizon_deg,
        qualifier: request.qualifier,
    };
    let passes = predict_passes(record.catalog_id, &record.line1, &record.line2, &query)?;
    log::info!(
        "{} passes of {} ({}) over {} days",
        passes.len(),
        record.catalog_id,
        record.name,
        request.days
    );

    Ok(PredictResponse {
        info: SatInfo {
            satid: record.catalog_id,
            satname: record.name,
            transactionscount: passes.len(),
            passescount: passes.len(),
        },
        passes,
    })
}
