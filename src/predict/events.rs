use chrono::{DateTime, Duration, Utc};
use sgp4::{Constants, Elements};

use crate::predict::error::PredictError;
use crate::predict::ground_station::Observer;
use crate::predict::propagation::look_angles;
use crate::predict::types::{EventKind, PassEvent};

const COARSE_STEP_SECONDS: i64 = 60; // 1 minute for initial scan
const FINE_STEP_SECONDS: i64 = 1; // 1 second for refinement

/// State of a visible stretch found by the coarse scan.
struct Stretch {
    best_time: DateTime<Utc>,
    best_el: f64,
}

/// Find rise, culmination and set instants within `[start, end]`.
///
/// Windows that open or close mid-pass produce no Rise or Set for that pass respectively.
/// A culmination is only reported when the peak lies strictly inside the window.
pub fn find_events(
    observer: &Observer,
    elements: &Elements,
    constants: &Constants,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    horizon_deg: f64,
) -> Result<Vec<(DateTime<Utc>, EventKind)>, PredictError> {
    if end <= start {
        return Err(PredictError::InvalidWindow(format!(
            "end {} is not after start {}",
            end, start
        )));
    }

    let coarse_step = Duration::seconds(COARSE_STEP_SECONDS);
    let elevation = |t: DateTime<Utc>| -> Result<f64, PredictError> {
        Ok(look_angles(observer, elements, constants, t)?.elevation_deg)
    };

    let mut events = Vec::new();
    let mut prev_time = start;
    let first_el = elevation(start)?;
    let mut stretch = (first_el >= horizon_deg).then_some(Stretch {
        best_time: start,
        best_el: first_el,
    });

    loop {
        let cursor = if prev_time + coarse_step >= end {
            end
        } else {
            prev_time + coarse_step
        };

        let el = elevation(cursor)?;
        let visible = el >= horizon_deg;

        match (stretch.as_mut(), visible) {
            (None, true) => {
                let rise = refine_crossing(&elevation, prev_time, cursor, horizon_deg, true)?;
                events.push((rise, EventKind::Rise));
                stretch = Some(Stretch {
                    best_time: cursor,
                    best_el: el,
                });
            }
            (Some(s), true) => {
                if el > s.best_el {
                    s.best_el = el;
                    s.best_time = cursor;
                }
            }
            (Some(s), false) => {
                if let Some(peak) = refine_culmination(&elevation, s.best_time, start, end)? {
                    events.push((peak, EventKind::Culminate));
                }
                let set = refine_crossing(&elevation, prev_time, cursor, horizon_deg, false)?;
                events.push((set, EventKind::Set));
                stretch = None;
            }
            (None, false) => {}
        }

        if cursor >= end {
            break;
        }
        prev_time = cursor;
    }

    // Pass still in progress when the window closes
    if let Some(s) = stretch {
        if let Some(peak) = refine_culmination(&elevation, s.best_time, start, end)? {
            events.push((peak, EventKind::Culminate));
        }
    }

    events.sort_by_key(|(t, _)| *t);
    Ok(events)
}

/// Find events and attach the look angles at each instant.
pub fn pass_events(
    observer: &Observer,
    elements: &Elements,
    constants: &Constants,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    horizon_deg: f64,
) -> Result<Vec<PassEvent>, PredictError> {
    find_events(observer, elements, constants, start, end, horizon_deg)?
        .into_iter()
        .map(|(time, kind)| {
            let angles = look_angles(observer, elements, constants, time)?;
            Ok(PassEvent {
                kind,
                time,
                elevation_deg: angles.elevation_deg,
                azimuth_deg: angles.azimuth_deg,
            })
        })
        .collect()
}

/// Binary search to find exact horizon crossing time
fn refine_crossing<F>(
    elevation: &F,
    before: DateTime<Utc>,
    after: DateTime<Utc>,
    horizon_deg: f64,
    rising: bool,
) -> Result<DateTime<Utc>, PredictError>
where
    F: Fn(DateTime<Utc>) -> Result<f64, PredictError>,
{
    let mut low = before;
    let mut high = after;

    while (high - low).num_seconds() > FINE_STEP_SECONDS {
        let mid = low + (high - low) / 2;
        let above = elevation(mid)? >= horizon_deg;
        if above == rising {
            high = mid;
        } else {
            low = mid;
        }
    }

    Ok(if rising { high } else { low })
}

/// Scan one second at a time around the coarse maximum.
fn refine_culmination<F>(
    elevation: &F,
    coarse_peak: DateTime<Utc>,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>, PredictError>
where
    F: Fn(DateTime<Utc>) -> Result<f64, PredictError>,
{
    let span = Duration::seconds(COARSE_STEP_SECONDS);
    let fine_step = Duration::seconds(FINE_STEP_SECONDS);
    let low = (coarse_peak - span).max(window_start);
    let high = (coarse_peak + span).min(window_end);

    let mut best_time = low;
    let mut best_el = elevation(low)?;
    let mut cursor = low + fine_step;
    while cursor <= high {
        let el = elevation(cursor)?;
        if el > best_el {
            best_el = el;
            best_time = cursor;
        }
        cursor += fine_step;
    }

    let interior = best_time > window_start && best_time < window_end;
    Ok(interior.then_some(best_time))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predict::pass_reducer::reduce;
    use crate::predict::types::Qualifier;
    use chrono::{NaiveDateTime, TimeZone};

    const ISS_LINE1: &str = "1 25544U 98067A   20194.88612269 -.00002218  00000-0 -31515-4 0  9992";
    const ISS_LINE2: &str = "2 25544  51.6461 221.2784 0001413  89.1723 280.4612 15.49507896236008";

    fn iss() -> (Elements, Constants) {
        let elements =
            Elements::from_tle(None, ISS_LINE1.as_bytes(), ISS_LINE2.as_bytes()).unwrap();
        let constants = Constants::from_elements(&elements).unwrap();
        (elements, constants)
    }

    fn epoch(elements: &Elements) -> DateTime<Utc> {
        let naive: NaiveDateTime = elements.datetime;
        Utc.from_utc_datetime(&naive)
    }

    fn observer() -> Observer {
        Observer::new(45.0, 10.0, 0.1).unwrap()
    }

    #[test]
    fn rejects_empty_window() {
        let (elements, constants) = iss();
        let t = epoch(&elements);
        let result = find_events(&observer(), &elements, &constants, t, t, 0.0);
        assert!(matches!(result, Err(PredictError::InvalidWindow(_))));
    }

    #[test]
    fn one_day_of_iss_passes() {
        let (elements, constants) = iss();
        let start = epoch(&elements);
        let end = start + Duration::days(1);

        let events = pass_events(&observer(), &elements, &constants, start, end, 0.0).unwrap();
        assert!(events.windows(2).all(|w| w[0].time <= w[1].time));

        let passes = reduce(&events, Qualifier::DurationMinutes(0.0));
        assert!(!passes.is_empty());
        for pass in &passes {
            assert!(pass.end_utc >= pass.start_utc);
            assert!(pass.duration_minutes() < 20.0);
            assert!(pass.max_el >= 0.0 && pass.max_el <= 90.0);
            assert!(pass.max_utc >= pass.start_utc && pass.max_utc <= pass.end_utc);
        }
    }

    #[test]
    fn window_opening_mid_pass_yields_no_record() {
        let (elements, constants) = iss();
        let start = epoch(&elements);
        let day = pass_events(&observer(), &elements, &constants, start, start + Duration::days(1), 0.0)
            .unwrap();
        let passes = reduce(&day, Qualifier::DurationMinutes(0.0));
        let longest = passes
            .iter()
            .max_by_key(|p| p.end_utc - p.start_utc)
            .unwrap();

        let mid_start = Utc.timestamp_opt(longest.start_utc + 120, 0).single().unwrap();
        let mid_end = Utc.timestamp_opt(longest.end_utc + 600, 0).single().unwrap();
        let events =
            pass_events(&observer(), &elements, &constants, mid_start, mid_end, 0.0).unwrap();

        assert_ne!(events.first().map(|e| e.kind), Some(EventKind::Rise));
        assert!(reduce(&events, Qualifier::DurationMinutes(0.0)).is_empty());
    }
}
