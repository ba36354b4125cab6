use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Rise,
    Culminate,
    Set,
}

/// One rise/culminate/set event with the look angles at that instant.
#[derive(Debug, Clone, PartialEq)]
pub struct PassEvent {
    pub kind: EventKind,
    pub time: DateTime<Utc>,
    pub elevation_deg: f64,
    pub azimuth_deg: f64,
}

/// Threshold deciding whether a completed pass is reported.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Qualifier {
    DurationMinutes(f64),
    MaxElevationDegrees(f64),
}

/// How a deployment interprets the bare qualifier path parameter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QualifierKind {
    #[default]
    DurationMinutes,
    MaxElevationDegrees,
}

impl QualifierKind {
    pub fn with_threshold(self, threshold: f64) -> Qualifier {
        match self {
            QualifierKind::DurationMinutes => Qualifier::DurationMinutes(threshold),
            QualifierKind::MaxElevationDegrees => Qualifier::MaxElevationDegrees(threshold),
        }
    }
}

/// A completed, qualifying pass
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PassRecord {
    pub start_az: f64,
    pub start_az_compass: String,
    #[serde(rename = "startUTC")]
    pub start_utc: i64,
    pub max_az: f64,
    pub max_az_compass: String,
    pub max_el: f64,
    #[serde(rename = "maxUTC")]
    pub max_utc: i64,
    pub end_az: f64,
    pub end_az_compass: String,
    #[serde(rename = "endUTC")]
    pub end_utc: i64,
}

impl PassRecord {
    pub fn duration_minutes(&self) -> f64 {
        (self.end_utc - self.start_utc) as f64 / 60.0
    }
}
