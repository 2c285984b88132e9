//! Position sample types and the small amount of spherical geometry the
//! playback interpolation needs.

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A geographic coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoCoordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoCoordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }
}

/// A single timestamped position produced by exactly one feed.
///
/// Immutable once produced; bearing and speed are optional because a sensor
/// cannot always determine them.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionSample {
    pub coordinates: GeoCoordinates,
    /// Direction of travel in degrees clockwise from true north, if known.
    pub bearing_deg: Option<f64>,
    /// Ground speed in meters per second, if known.
    pub speed_mps: Option<f64>,
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
}

impl PositionSample {
    pub fn new(coordinates: GeoCoordinates, timestamp_ms: u64) -> Self {
        Self {
            coordinates,
            bearing_deg: None,
            speed_mps: None,
            timestamp_ms,
        }
    }

    pub fn with_bearing(mut self, bearing_deg: f64) -> Self {
        self.bearing_deg = Some(bearing_deg);
        self
    }

    pub fn with_speed(mut self, speed_mps: f64) -> Self {
        self.speed_mps = Some(speed_mps);
        self
    }
}

/// Great-circle distance between two coordinates in meters (haversine).
pub fn haversine_m(a: GeoCoordinates, b: GeoCoordinates) -> f64 {
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

/// Initial bearing from `a` to `b` in degrees clockwise from true north,
/// normalized to `[0, 360)`.
pub fn initial_bearing_deg(a: GeoCoordinates, b: GeoCoordinates) -> f64 {
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let y = d_lon.sin() * lat_b.cos();
    let x = lat_a.cos() * lat_b.sin() - lat_a.sin() * lat_b.cos() * d_lon.cos();
    (y.atan2(x).to_degrees() + 360.0) % 360.0
}

/// Linear interpolation between two coordinates.
///
/// Accurate enough at route-segment scale; segments in real route geometry
/// are short relative to the Earth's curvature.
pub fn interpolate(a: GeoCoordinates, b: GeoCoordinates, fraction: f64) -> GeoCoordinates {
    let f = fraction.clamp(0.0, 1.0);
    GeoCoordinates::new(
        a.latitude + (b.latitude - a.latitude) * f,
        a.longitude + (b.longitude - a.longitude) * f,
    )
}
