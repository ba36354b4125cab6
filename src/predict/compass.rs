const COMPASS_POINTS: [&str; 16] = [
    "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW", "NW",
    "NNW",
];

const SECTOR_DEG: f64 = 22.5;

/// Map an azimuth in degrees to a 16-point compass label.
///
/// Any finite input is accepted; values outside `[0, 360)` wrap around, so `-1.0` maps like
/// `359.0`.
pub fn compass(degrees: f64) -> &'static str {
    let sector = ((degrees + SECTOR_DEG / 2.0) / SECTOR_DEG).floor();
    let index = if sector.is_finite() {
        (sector as i64).rem_euclid(16) as usize
    } else {
        0
    };
    COMPASS_POINTS[index]
}
