use crate::predict::compass::compass;
use crate::predict::types::{EventKind, PassEvent, PassRecord, Qualifier};

/// A look angle captured at one event.
#[derive(Debug, Clone)]
struct Fix {
    azimuth_deg: f64,
    elevation_deg: f64,
    utc: i64,
}

impl Fix {
    fn from_event(event: &PassEvent) -> Self {
        Fix {
            azimuth_deg: event.azimuth_deg,
            elevation_deg: event.elevation_deg,
            utc: event.time.timestamp(),
        }
    }
}

enum State {
    Idle,
    Open { start: Fix, max: Option<Fix> },
}

/// Fold a chronological rise/culminate/set stream into completed passes.
///
/// Culminate and Set events seen while no pass is open are dropped, so a window that starts
/// mid-pass never yields a record without a start. A second Rise discards the open pass.
pub fn reduce(events: &[PassEvent], qualifier: Qualifier) -> Vec<PassRecord> {
    let mut passes = Vec::new();
    let mut state = State::Idle;

    for event in events {
        state = match (state, event.kind) {
            (State::Open { .. }, EventKind::Rise) => {
                log::debug!("Rise at {} while a pass was open, restarting", event.time);
                State::Open {
                    start: Fix::from_event(event),
                    max: None,
                }
            }
            (State::Idle, EventKind::Rise) => State::Open {
                start: Fix::from_event(event),
                max: None,
            },
            (State::Open { start, .. }, EventKind::Culminate) => State::Open {
                start,
                max: Some(Fix::from_event(event)),
            },
            (State::Open { start, max }, EventKind::Set) => {
                let record = close_pass(start, max, Fix::from_event(event));
                if qualifies(&record, qualifier) {
                    passes.push(record);
                }
                State::Idle
            }
            (State::Idle, kind) => {
                log::debug!("Ignoring {:?} at {} with no open pass", kind, event.time);
                State::Idle
            }
        };
    }

    passes
}

fn close_pass(start: Fix, max: Option<Fix>, end: Fix) -> PassRecord {
    // No culmination observed: report the start as the maximum with zero elevation.
    let max = max.unwrap_or(Fix {
        azimuth_deg: start.azimuth_deg,
        elevation_deg: 0.0,
        utc: start.utc,
    });

    PassRecord {
        start_az: round2(start.azimuth_deg),
        start_az_compass: compass(start.azimuth_deg).to_string(),
        start_utc: start.utc,
        max_az: round2(max.azimuth_deg),
        max_az_compass: compass(max.azimuth_deg).to_string(),
        max_el: round2(max.elevation_deg),
        max_utc: max.utc,
        end_az: round2(end.azimuth_deg),
        end_az_compass: compass(end.azimuth_deg).to_string(),
        end_utc: end.utc,
    }
}

fn qualifies(record: &PassRecord, qualifier: Qualifier) -> bool {
    match qualifier {
        Qualifier::DurationMinutes(min) => record.duration_minutes() >= min,
        Qualifier::MaxElevationDegrees(min) => record.max_el >= min,
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
