use chrono::{DateTime, Utc};
use sgp4::{Constants, Elements};

use crate::predict::error::PredictError;
use crate::predict::events::pass_events;
use crate::predict::ground_station::Observer;
use crate::predict::pass_reducer::reduce;
use crate::predict::types::{PassRecord, Qualifier};

/// Everything needed to predict passes for one satellite, apart from its elements.
#[derive(Debug, Clone, Copy)]
pub struct PassQuery {
    pub observer: Observer,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub horizon_deg: f64,
    pub qualifier: Qualifier,
}

/// Find all qualifying passes for a satellite within the query window
pub fn predict_passes(
    norad_id: u32,
    line1: &str,
    line2: &str,
    query: &PassQuery,
) -> Result<Vec<PassRecord>, PredictError> {
    let invalid = |message: String| PredictError::InvalidTle { norad_id, message };

    let elements = Elements::from_tle(None, line1.as_bytes(), line2.as_bytes())
        .map_err(|e| invalid(e.to_string()))?;
    let constants = Constants::from_elements(&elements).map_err(|e| invalid(e.to_string()))?;

    let events = pass_events(
        &query.observer,
        &elements,
        &constants,
        query.start,
        query.end,
        query.horizon_deg,
    )?;
    log::debug!("{} events for {} between {} and {}", events.len(), norad_id, query.start, query.end);

    Ok(reduce(&events, query.qualifier))
}
