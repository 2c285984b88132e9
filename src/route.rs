//! Route geometry consumed by the playback generator.
//!
//! A route is opaque to the arbiter itself: the only property arbitration
//! relies on is whether the route has at least one traversable section.

use std::time::Duration;

use crate::sample::{GeoCoordinates, haversine_m};

/// One leg of a route: a polyline plus the nominal time a vehicle takes to
/// traverse it at real speed.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteSection {
    geometry: Vec<GeoCoordinates>,
    duration: Duration,
}

impl RouteSection {
    pub fn new(geometry: Vec<GeoCoordinates>, duration: Duration) -> Self {
        Self { geometry, duration }
    }

    pub fn geometry(&self) -> &[GeoCoordinates] {
        &self.geometry
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Total polyline length in meters.
    pub fn length_m(&self) -> f64 {
        self.geometry
            .windows(2)
            .map(|pair| haversine_m(pair[0], pair[1]))
            .sum()
    }
}

/// An ordered sequence of traversable sections.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    sections: Vec<RouteSection>,
}

impl Route {
    pub fn new(sections: Vec<RouteSection>) -> Self {
        Self { sections }
    }

    pub fn sections(&self) -> &[RouteSection] {
        &self.sections
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    /// A route with no sections cannot be played back.
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

impl From<Vec<RouteSection>> for Route {
    fn from(sections: Vec<RouteSection>) -> Self {
        Self::new(sections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_route() {
        let route = Route::new(Vec::new());
        assert!(route.is_empty());
        assert_eq!(route.section_count(), 0);
    }

    #[test]
    fn test_section_length_sums_segments() {
        let section = RouteSection::new(
            vec![
                GeoCoordinates::new(0.0, 0.0),
                GeoCoordinates::new(0.0, 0.01),
                GeoCoordinates::new(0.0, 0.02),
            ],
            Duration::from_secs(60),
        );

        // Two ~1.11 km segments along the equator.
        let length = section.length_m();
        assert!((length - 2_226.0).abs() < 10.0, "got {length}");
    }

    #[test]
    fn test_route_from_sections() {
        let section = RouteSection::new(
            vec![GeoCoordinates::new(0.0, 0.0), GeoCoordinates::new(0.0, 0.01)],
            Duration::from_secs(30),
        );
        let route: Route = vec![section].into();
        assert_eq!(route.section_count(), 1);
        assert!(!route.is_empty());
    }
}
