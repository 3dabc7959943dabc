//! Feature and layer model for the annotation canvas.
//!
//! Coordinates are `kurbo::Point` with `x` = longitude and `y` = latitude, in
//! degrees. Geometries serialize to and from GeoJSON geometry objects so that
//! replicated values stay interoperable with the wire format.

mod layer;

pub use layer::{FeaturePatch, Layer, LayerPatch};

use crate::geo;
use kurbo::Point;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for features.
pub type FeatureId = Uuid;
/// Unique identifier for layers.
pub type LayerId = Uuid;

/// Current wall-clock time in milliseconds since the Unix epoch.
pub(crate) fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

/// Kind of a drawn annotation.
///
/// Rectangles and circles are stored as polygon geometries; the kind records
/// how the feature was authored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureType {
    Point,
    Line,
    Polygon,
    Rectangle,
    Circle,
}

impl FeatureType {
    /// Display label used for default feature names.
    pub fn label(&self) -> &'static str {
        match self {
            FeatureType::Point => "Point",
            FeatureType::Line => "Line",
            FeatureType::Polygon => "Polygon",
            FeatureType::Rectangle => "Rectangle",
            FeatureType::Circle => "Circle",
        }
    }
}

/// Geometry of a feature.
///
/// Polygons carry a single closed exterior ring; interior rings in foreign
/// GeoJSON input are dropped on read (the core never produces them).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawGeometry", into = "RawGeometry")]
pub enum Geometry {
    Point(Point),
    LineString(Vec<Point>),
    Polygon(Vec<Point>),
}

/// GeoJSON wire mirror of [`Geometry`], coordinate pairs as `[lng, lat]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
enum RawGeometry {
    Point { coordinates: [f64; 2] },
    LineString { coordinates: Vec<[f64; 2]> },
    Polygon { coordinates: Vec<Vec<[f64; 2]>> },
}

fn to_pair(p: Point) -> [f64; 2] {
    [p.x, p.y]
}

fn from_pair(c: [f64; 2]) -> Point {
    Point::new(c[0], c[1])
}

impl From<Geometry> for RawGeometry {
    fn from(g: Geometry) -> Self {
        match g {
            Geometry::Point(p) => RawGeometry::Point {
                coordinates: to_pair(p),
            },
            Geometry::LineString(pts) => RawGeometry::LineString {
                coordinates: pts.into_iter().map(to_pair).collect(),
            },
            Geometry::Polygon(ring) => RawGeometry::Polygon {
                coordinates: vec![ring.into_iter().map(to_pair).collect()],
            },
        }
    }
}

impl From<RawGeometry> for Geometry {
    fn from(raw: RawGeometry) -> Self {
        match raw {
            RawGeometry::Point { coordinates } => Geometry::Point(from_pair(coordinates)),
            RawGeometry::LineString { coordinates } => {
                Geometry::LineString(coordinates.into_iter().map(from_pair).collect())
            }
            RawGeometry::Polygon { coordinates } => Geometry::Polygon(
                coordinates
                    .into_iter()
                    .next()
                    .map(|ring| ring.into_iter().map(from_pair).collect())
                    .unwrap_or_default(),
            ),
        }
    }
}

impl Geometry {
    /// Number of coordinates in the geometry.
    pub fn coord_count(&self) -> usize {
        match self {
            Geometry::Point(_) => 1,
            Geometry::LineString(pts) => pts.len(),
            Geometry::Polygon(ring) => ring.len(),
        }
    }

    /// Geographic bounding box of the geometry.
    pub fn bounds(&self) -> kurbo::Rect {
        match self {
            Geometry::Point(p) => kurbo::Rect::new(p.x, p.y, p.x, p.y),
            Geometry::LineString(pts) => geo::bounds_of(pts),
            Geometry::Polygon(ring) => geo::bounds_of(ring),
        }
    }
}

/// Style applied to a layer or feature.
///
/// Colors are hex strings (`"#FFD700"`) as consumed by the map renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationStyle {
    /// Stroke color.
    pub stroke_color: String,
    /// Stroke width in pixels.
    pub stroke_width: f64,
    /// Fill color (None = no fill).
    pub fill_color: Option<String>,
    /// Fill opacity (0.0 = fully transparent, 1.0 = fully opaque).
    pub fill_opacity: f64,
    /// Dash pattern for strokes (None = solid).
    #[serde(default)]
    pub stroke_dasharray: Option<Vec<f64>>,
}

impl Default for AnnotationStyle {
    fn default() -> Self {
        Self {
            stroke_color: "#FFD700".to_string(),
            stroke_width: 2.0,
            fill_color: Some("#FFD700".to_string()),
            fill_opacity: 0.2,
            stroke_dasharray: None,
        }
    }
}

/// Partial style update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StylePatch {
    pub stroke_color: Option<String>,
    pub stroke_width: Option<f64>,
    pub fill_color: Option<Option<String>>,
    pub fill_opacity: Option<f64>,
    pub stroke_dasharray: Option<Option<Vec<f64>>>,
}

impl AnnotationStyle {
    /// Merge a partial update into this style.
    pub fn apply(&mut self, patch: &StylePatch) {
        if let Some(c) = &patch.stroke_color {
            self.stroke_color = c.clone();
        }
        if let Some(w) = patch.stroke_width {
            self.stroke_width = w;
        }
        if let Some(f) = &patch.fill_color {
            self.fill_color = f.clone();
        }
        if let Some(o) = patch.fill_opacity {
            self.fill_opacity = o;
        }
        if let Some(d) = &patch.stroke_dasharray {
            self.stroke_dasharray = d.clone();
        }
    }
}

/// Metadata carried by every feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureProperties {
    /// Display name.
    pub name: String,
    /// How the feature was authored.
    pub feature_type: FeatureType,
    /// Owning layer.
    pub layer_id: LayerId,
    /// Style overrides for this feature.
    pub style: AnnotationStyle,
    /// Author identity.
    pub created_by: String,
    /// Creation time, ms since epoch.
    pub created_at: i64,
    /// Last update time, ms since epoch.
    pub updated_at: i64,
}

/// One drawn geospatial annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub id: FeatureId,
    pub geometry: Geometry,
    pub properties: FeatureProperties,
}

impl Feature {
    /// Assemble a feature from an already-built geometry.
    pub fn from_parts(
        feature_type: FeatureType,
        geometry: Geometry,
        style: AnnotationStyle,
        layer_id: LayerId,
        created_by: &str,
    ) -> Self {
        let id = Uuid::new_v4();
        let now = now_ms();
        let short = id.simple().to_string();
        Self {
            id,
            geometry,
            properties: FeatureProperties {
                name: format!("{} {}", feature_type.label(), &short[..8]),
                feature_type,
                layer_id,
                style,
                created_by: created_by.to_string(),
                created_at: now,
                updated_at: now,
            },
        }
    }

    /// Create a point feature.
    pub fn point(coord: Point, style: AnnotationStyle, layer_id: LayerId, author: &str) -> Self {
        Self::from_parts(FeatureType::Point, Geometry::Point(coord), style, layer_id, author)
    }

    /// Create a line feature from its vertices.
    ///
    /// Callers must supply at least two vertices.
    pub fn line(coords: Vec<Point>, style: AnnotationStyle, layer_id: LayerId, author: &str) -> Self {
        Self::from_parts(
            FeatureType::Line,
            Geometry::LineString(coords),
            style,
            layer_id,
            author,
        )
    }

    /// Create a polygon feature; the ring is closed if it is not already.
    ///
    /// Callers must supply at least three vertices.
    pub fn polygon(
        coords: Vec<Point>,
        style: AnnotationStyle,
        layer_id: LayerId,
        author: &str,
        feature_type: FeatureType,
    ) -> Self {
        Self::from_parts(
            feature_type,
            Geometry::Polygon(geo::close_ring(coords)),
            style,
            layer_id,
            author,
        )
    }

    /// Create an axis-aligned rectangle feature from two opposite corners.
    pub fn rectangle(
        a: Point,
        b: Point,
        style: AnnotationStyle,
        layer_id: LayerId,
        author: &str,
    ) -> Self {
        Self::from_parts(
            FeatureType::Rectangle,
            Geometry::Polygon(geo::rectangle_from_corners(a, b)),
            style,
            layer_id,
            author,
        )
    }

    /// Create a circle feature approximated as a polygon.
    pub fn circle(
        center: Point,
        radius_meters: f64,
        style: AnnotationStyle,
        layer_id: LayerId,
        author: &str,
    ) -> Self {
        Self::from_parts(
            FeatureType::Circle,
            Geometry::Polygon(geo::circle_approx(center, radius_meters, geo::CIRCLE_SEGMENTS)),
            style,
            layer_id,
            author,
        )
    }

    /// Apply a partial update, bumping `updated_at`.
    pub fn apply_patch(&mut self, patch: &FeaturePatch) {
        if let Some(name) = &patch.name {
            self.properties.name = name.clone();
        }
        if let Some(geometry) = &patch.geometry {
            self.geometry = geometry.clone();
        }
        if let Some(style) = &patch.style {
            self.properties.style = style.clone();
        }
        self.properties.updated_at = now_ms();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polygon_constructor_closes_ring() {
        let layer = Uuid::new_v4();
        let feature = Feature::polygon(
            vec![
                Point::new(0.0, 0.0),
                Point::new(1.0, 0.0),
                Point::new(1.0, 1.0),
            ],
            AnnotationStyle::default(),
            layer,
            "alice",
            FeatureType::Polygon,
        );
        match &feature.geometry {
            Geometry::Polygon(ring) => {
                assert_eq!(ring.first(), ring.last());
                assert_eq!(ring.len(), 4);
            }
            other => panic!("expected polygon, got {other:?}"),
        }
    }

    #[test]
    fn test_rectangle_and_circle_constructors() {
        let layer = Uuid::new_v4();
        let rect = Feature::rectangle(
            Point::new(0.0, 0.0),
            Point::new(2.0, 1.0),
            AnnotationStyle::default(),
            layer,
            "alice",
        );
        assert_eq!(rect.properties.feature_type, FeatureType::Rectangle);
        match &rect.geometry {
            Geometry::Polygon(ring) => {
                assert_eq!(ring.len(), 5);
                assert_eq!(ring.first(), ring.last());
            }
            other => panic!("expected polygon, got {other:?}"),
        }

        let circle = Feature::circle(
            Point::new(10.0, 20.0),
            500.0,
            AnnotationStyle::default(),
            layer,
            "alice",
        );
        assert_eq!(circle.properties.feature_type, FeatureType::Circle);
        match &circle.geometry {
            Geometry::Polygon(ring) => {
                assert_eq!(ring.len(), geo::CIRCLE_SEGMENTS + 1);
                assert_eq!(ring.first(), ring.last());
            }
            other => panic!("expected polygon, got {other:?}"),
        }
    }

    #[test]
    fn test_geometry_geojson_roundtrip() {
        let geom = Geometry::LineString(vec![Point::new(10.0, 20.0), Point::new(11.5, 21.25)]);
        let json = serde_json::to_value(&geom).expect("serialize");
        assert_eq!(json["type"], "LineString");
        assert_eq!(json["coordinates"][0][0], 10.0);
        assert_eq!(json["coordinates"][1][1], 21.25);

        let back: Geometry = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, geom);
    }

    #[test]
    fn test_polygon_geojson_ring_nesting() {
        let geom = Geometry::Polygon(vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(0.0, 0.0),
        ]);
        let json = serde_json::to_value(&geom).expect("serialize");
        assert_eq!(json["type"], "Polygon");
        // GeoJSON polygons wrap the exterior ring in a ring list.
        assert_eq!(json["coordinates"][0][0][0], 0.0);
        let back: Geometry = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, geom);
    }

    #[test]
    fn test_geometry_bounds_and_coord_count() {
        let line = Geometry::LineString(vec![
            Point::new(-3.0, 2.0),
            Point::new(7.0, -1.0),
            Point::new(1.0, 5.0),
        ]);
        assert_eq!(line.coord_count(), 3);
        assert_eq!(line.bounds(), kurbo::Rect::new(-3.0, -1.0, 7.0, 5.0));

        let point = Geometry::Point(Point::new(10.0, 20.0));
        assert_eq!(point.coord_count(), 1);
        assert_eq!(point.bounds(), kurbo::Rect::new(10.0, 20.0, 10.0, 20.0));
    }

    #[test]
    fn test_style_patch_merge() {
        let mut style = AnnotationStyle::default();
        style.apply(&StylePatch {
            stroke_color: Some("#FF0000".into()),
            fill_color: Some(None),
            ..StylePatch::default()
        });
        assert_eq!(style.stroke_color, "#FF0000");
        assert_eq!(style.fill_color, None);
        assert!((style.stroke_width - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_feature_patch_bumps_updated_at() {
        let layer = Uuid::new_v4();
        let mut feature = Feature::point(
            Point::new(10.0, 20.0),
            AnnotationStyle::default(),
            layer,
            "alice",
        );
        feature.properties.updated_at = 0;
        feature.apply_patch(&FeaturePatch {
            name: Some("Rally point".into()),
            ..FeaturePatch::default()
        });
        assert_eq!(feature.properties.name, "Rally point");
        assert!(feature.properties.updated_at > 0);
    }
}
