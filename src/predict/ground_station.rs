// WGS-84 constants
const EARTH_EQUATORIAL_RADIUS_KM: f64 = 6378.137;
const EARTH_ECCENTRICITY_SQ: f64 = 0.00669437999014;

/// A ground observer on the WGS-84 ellipsoid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observer {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub altitude_km: f64,
}

impl Observer {
    pub fn new(latitude_deg: f64, longitude_deg: f64, altitude_km: f64) -> Option<Self> {
        let valid = latitude_deg.is_finite()
            && longitude_deg.is_finite()
            && altitude_km.is_finite()
            && (-90.0..=90.0).contains(&latitude_deg)
            && (-180.0..=360.0).contains(&longitude_deg);
        valid.then_some(Self {
            latitude_deg,
            longitude_deg,
            altitude_km,
        })
    }

    pub fn lat_rad(&self) -> f64 {
        self.latitude_deg.to_radians()
    }

    pub fn lon_rad(&self) -> f64 {
        self.longitude_deg.to_radians()
    }

    pub fn position_ecef_km(&self) -> [f64; 3] {
        let lat = self.lat_rad();
        let lon = self.lon_rad();
        let sin_lat = lat.sin();
        let cos_lat = lat.cos();
        let n = EARTH_EQUATORIAL_RADIUS_KM / (1.0 - EARTH_ECCENTRICITY_SQ * sin_lat * sin_lat).sqrt();
        let x = (n + self.altitude_km) * cos_lat * lon.cos();
        let y = (n + self.altitude_km) * cos_lat * lon.sin();
        let z = (n * (1.0 - EARTH_ECCENTRICITY_SQ) + self.altitude_km) * sin_lat;
        [x, y, z]
    }
}
