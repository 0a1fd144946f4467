use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::timestamp::{Timestamp, serde_timestamp};

/// One timestamped snapshot of geo-objects.
///
/// Observations are never patched: a load replaces the whole set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    #[serde(with = "serde_timestamp")]
    pub start_date_time: Timestamp,
    #[serde(default)]
    pub geo_objects: Vec<GeoObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_image_data: Option<BackgroundImage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoObject {
    #[serde(rename = "type")]
    pub kind: String,
    pub geometry: Geometry,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_attributes: Option<Map<String, Value>>,
}

impl GeoObject {
    /// Numeric custom attribute, if present.
    pub fn numeric_attribute(&self, field: &str) -> Option<f64> {
        self.custom_attributes
            .as_ref()
            .and_then(|attrs| attrs.get(field))
            .and_then(Value::as_f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeometryKind {
    Point,
    Polygon,
    Rectangle,
    LineString,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    #[serde(rename = "type")]
    pub kind: GeometryKind,
    pub coordinates: Coordinates,
}

impl Geometry {
    pub fn vertices(&self) -> Vec<(f64, f64)> {
        self.coordinates.vertices()
    }
}

/// Coordinate payload of a geometry.
///
/// Data sources nest positions differently per geometry (`[y, x]`,
/// `[[y, x]]`, rings of positions), so the shape is kept recursive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Coordinates {
    Position(Vec<f64>),
    Nested(Vec<Coordinates>),
}

impl Coordinates {
    /// All `(lat, lng)` pairs, in document order.
    pub fn vertices(&self) -> Vec<(f64, f64)> {
        let mut out = Vec::new();
        self.collect_vertices(&mut out);
        out
    }

    fn collect_vertices(&self, out: &mut Vec<(f64, f64)>) {
        match self {
            Coordinates::Position(p) => {
                if let [lat, lng, ..] = p.as_slice() {
                    out.push((*lat, *lng));
                }
            }
            Coordinates::Nested(children) => {
                for child in children {
                    child.collect_vertices(out);
                }
            }
        }
    }
}

/// Raster drawn under the geo-objects, in flat pixel coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackgroundImage {
    pub url: String,
    pub width: f64,
    pub height: f64,
}

impl BackgroundImage {
    /// Image bounds on the flat map: `[[-height, 0], [0, width]]`.
    pub fn bounds(&self) -> crate::BoundingBox {
        crate::BoundingBox {
            south: -self.height,
            west: 0.0,
            north: 0.0,
            east: self.width,
        }
    }

    pub fn center(&self) -> (f64, f64) {
        (-(self.height / 2.0), self.width / 2.0)
    }
}

/// First background image carried by any observation.
pub fn background_image(
    observations: &[Observation],
) -> Option<&BackgroundImage> {
    observations
        .iter()
        .find_map(|o| o.background_image_data.as_ref())
}

/// Document shape exchanged with data sources, uploads and exports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationDocument {
    pub observations: Vec<Observation>,
}

#[derive(Deserialize)]
struct RawPayload {
    #[serde(default)]
    observations: Option<Vec<Observation>>,
}

#[derive(thiserror::Error, Debug)]
pub enum DataFormatError {
    #[error("invalid observation JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("payload has no `observations` field")]
    MissingObservations,
}

/// Parse a data-source or upload payload.
pub fn parse_payload(
    json: &str,
) -> Result<Vec<Observation>, DataFormatError> {
    let payload: RawPayload = serde_json::from_str(json)?;
    payload
        .observations
        .ok_or(DataFormatError::MissingObservations)
}
