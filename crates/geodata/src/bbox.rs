use serde::{Deserialize, Serialize};

use crate::observation::Observation;

/// Axis-aligned lat/lng rectangle reported by the map viewport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl BoundingBox {
    /// Build from any two opposite corners.
    pub fn from_corners(a: (f64, f64), b: (f64, f64)) -> Self {
        Self {
            south: a.0.min(b.0),
            west: a.1.min(b.1),
            north: a.0.max(b.0),
            east: a.1.max(b.1),
        }
    }

    /// Inclusive on every edge.
    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        lat >= self.south
            && lat <= self.north
            && lng >= self.west
            && lng <= self.east
    }
}

/// Keep only geo-objects with at least one vertex inside `bbox`, and
/// drop observations left without geo-objects.
pub fn filter_by_bounding_box(
    observations: &[Observation],
    bbox: &BoundingBox,
) -> Vec<Observation> {
    observations
        .iter()
        .filter_map(|observation| {
            let geo_objects: Vec<_> = observation
                .geo_objects
                .iter()
                .filter(|geo| {
                    geo.geometry
                        .vertices()
                        .iter()
                        .any(|&(lat, lng)| bbox.contains(lat, lng))
                })
                .cloned()
                .collect();

            if geo_objects.is_empty() {
                None
            } else {
                Some(Observation {
                    geo_objects,
                    ..observation.clone()
                })
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::parse_payload;

    fn observations() -> Vec<Observation> {
        parse_payload(
            r#"{ "observations": [
                { "startDateTime": "2024-01-01T00:00:00Z", "geoObjects": [
                    { "type": "a", "geometry": { "type": "Point", "coordinates": [5, 5] } },
                    { "type": "b", "geometry": { "type": "LineString",
                        "coordinates": [[50, 50], [60, 60]] } }
                ] },
                { "startDateTime": "2024-01-02T00:00:00Z", "geoObjects": [
                    { "type": "c", "geometry": { "type": "Rectangle",
                        "coordinates": [[-20, -20], [1, 1]] } }
                ] },
                { "startDateTime": "2024-01-03T00:00:00Z", "geoObjects": [
                    { "type": "d", "geometry": { "type": "Polygon",
                        "coordinates": [[100, 100], [110, 100], [110, 110]] } }
                ] }
            ] }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_contains_is_inclusive() {
        let bbox = BoundingBox::from_corners((10.0, 10.0), (0.0, 0.0));
        assert_eq!(bbox.south, 0.0);
        assert_eq!(bbox.north, 10.0);
        assert!(bbox.contains(0.0, 0.0));
        assert!(bbox.contains(10.0, 10.0));
        assert!(!bbox.contains(10.000_1, 5.0));
    }

    #[test]
    fn test_filter_keeps_objects_with_a_vertex_inside() {
        let bbox = BoundingBox::from_corners((0.0, 0.0), (10.0, 10.0));
        let filtered = filter_by_bounding_box(&observations(), &bbox);

        assert_eq!(filtered.len(), 2);
        assert_eq!(filtered[0].geo_objects.len(), 1);
        assert_eq!(filtered[0].geo_objects[0].kind, "a");
        assert_eq!(filtered[1].geo_objects[0].kind, "c");
    }

    #[test]
    fn test_filter_excluding_everything_is_empty() {
        let bbox =
            BoundingBox::from_corners((-500.0, -500.0), (-400.0, -400.0));
        assert!(filter_by_bounding_box(&observations(), &bbox).is_empty());
    }
}
