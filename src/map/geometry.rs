//! Geometry and feature records exchanged with the map capability

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Well-known id of a coordinate system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpatialReference {
    pub wkid: u32,
}

impl SpatialReference {
    pub const fn new(wkid: u32) -> Self {
        Self { wkid }
    }
}

/// Pixel position on the rendered view
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

/// Position in map coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapPoint {
    pub x: f64,
    pub y: f64,
    pub spatial_reference: SpatialReference,
}

/// A click delivered by the view: where on screen, and where on the map
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapClick {
    pub screen: ScreenPoint,
    pub map_point: MapPoint,
}

/// Bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl Extent {
    pub fn center(&self) -> (f64, f64) {
        ((self.xmin + self.xmax) / 2.0, (self.ymin + self.ymax) / 2.0)
    }
}

/// Geometry kinds a layer or collection can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeometryType {
    Point,
    Multipoint,
    Polyline,
    Polygon,
    Multipatch,
    Mesh,
}

impl GeometryType {
    /// Collections of these kinds receive trace selections
    pub fn accepts_selection(self) -> bool {
        matches!(
            self,
            GeometryType::Point | GeometryType::Polyline | GeometryType::Polygon
        )
    }
}

/// Feature shape, in the coordinates of the view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Geometry {
    Point { x: f64, y: f64 },
    Polyline { paths: Vec<Vec<[f64; 2]>> },
    Polygon { rings: Vec<Vec<[f64; 2]>> },
}

impl Geometry {
    fn vertices(&self) -> Box<dyn Iterator<Item = [f64; 2]> + '_> {
        match self {
            Geometry::Point { x, y } => Box::new(std::iter::once([*x, *y])),
            Geometry::Polyline { paths } => Box::new(paths.iter().flatten().copied()),
            Geometry::Polygon { rings } => Box::new(rings.iter().flatten().copied()),
        }
    }

    /// Bounding box, `None` for points and empty shapes
    pub fn extent(&self) -> Option<Extent> {
        if matches!(self, Geometry::Point { .. }) {
            return None;
        }

        self.vertices().fold(None, |acc, [x, y]| {
            Some(match acc {
                None => Extent {
                    xmin: x,
                    ymin: y,
                    xmax: x,
                    ymax: y,
                },
                Some(e) => Extent {
                    xmin: e.xmin.min(x),
                    ymin: e.ymin.min(y),
                    xmax: e.xmax.max(x),
                    ymax: e.ymax.max(y),
                },
            })
        })
    }

    /// Where a popup for this shape is anchored: extent center, or the point itself
    pub fn anchor(&self) -> Option<(f64, f64)> {
        match self {
            Geometry::Point { x, y } => Some((*x, *y)),
            _ => self.extent().map(|e| e.center()),
        }
    }

    /// Smallest vertex distance to `(x, y)`
    pub fn distance_to(&self, x: f64, y: f64) -> f64 {
        self.vertices()
            .map(|[vx, vy]| ((vx - x).powi(2) + (vy - y).powi(2)).sqrt())
            .fold(f64::INFINITY, f64::min)
    }
}

/// A feature (or external record): object id, attributes, optional shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feature {
    pub object_id: i64,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Geometry>,
}

impl Feature {
    /// String attribute lookup; field names match case-insensitively like the
    /// feature services they come from
    pub fn attribute_str(&self, field: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(field))
            .and_then(|(_, value)| value.as_str())
    }
}
