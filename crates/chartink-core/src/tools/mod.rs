//! Drawing tool state machine.
//!
//! Pointer events drive an explicit `Idle`/`Drawing` state machine that
//! produces finished geometries as [`PendingCommit`] values. The controller
//! never writes to the store: the editor persists an accepted commit and then
//! calls [`DrawingController::finish`], so a refused commit (for example with
//! no active layer selected) leaves the session untouched.

use crate::error::DrawError;
use crate::features::{AnnotationStyle, FeatureType, Geometry, StylePatch};
use crate::geo;
use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Minimum vertices for a committable line.
pub const LINE_MIN_VERTICES: usize = 2;
/// Minimum vertices for a committable polygon (before ring closing).
pub const POLYGON_MIN_VERTICES: usize = 3;

/// Available tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ToolKind {
    #[default]
    Select,
    Point,
    Line,
    Polygon,
    Rectangle,
    Circle,
}

impl ToolKind {
    /// Whether this tool creates features (everything but Select).
    pub fn is_drawing_tool(&self) -> bool {
        !matches!(self, ToolKind::Select)
    }
}

/// Ephemeral state of an in-progress, multi-step geometry construction.
///
/// Local-only; never replicated.
#[derive(Debug, Clone)]
pub struct DrawingSession {
    /// Tool that opened the session.
    pub tool: ToolKind,
    /// Accumulated click vertices (line/polygon tools).
    pub vertices: Vec<Point>,
    /// Anchor corner/center (rectangle/circle tools).
    pub anchor: Option<Point>,
    /// Last observed pointer position.
    pub cursor: Point,
}

/// State of the drawing interaction.
#[derive(Debug, Clone, Default)]
pub enum SessionState {
    /// No interaction in progress.
    #[default]
    Idle,
    /// A multi-step construction is in progress.
    Drawing(DrawingSession),
}

/// A finished geometry awaiting persistence by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingCommit {
    pub feature_type: FeatureType,
    pub geometry: Geometry,
}

/// Converts pointer events into committed geometries.
#[derive(Debug, Clone, Default)]
pub struct DrawingController {
    /// Currently selected tool.
    pub current_tool: ToolKind,
    /// Current interaction state.
    pub state: SessionState,
    /// Style applied to newly committed features.
    pub current_style: AnnotationStyle,
}

impl DrawingController {
    /// Create a controller with the Select tool active.
    pub fn new() -> Self {
        Self::default()
    }

    /// Switch tools. Switching while drawing forcibly cancels the session;
    /// no partial commit is ever produced.
    pub fn set_tool(&mut self, tool: ToolKind) {
        self.current_tool = tool;
        self.state = SessionState::Idle;
    }

    /// Merge a partial style update into the style for new features.
    pub fn set_style(&mut self, patch: &StylePatch) {
        self.current_style.apply(patch);
    }

    /// Whether a drawing session is in progress.
    pub fn is_drawing(&self) -> bool {
        matches!(self.state, SessionState::Drawing(_))
    }

    /// Handle a pointer click at a geographic position.
    ///
    /// Returns a [`PendingCommit`] when the click completes a geometry: every
    /// click of the Point tool, and the second click of the Rectangle/Circle
    /// tools. The session is left in place until [`finish`](Self::finish).
    pub fn click(&mut self, point: Point) -> Option<PendingCommit> {
        match self.current_tool {
            ToolKind::Select => None,
            ToolKind::Point => Some(PendingCommit {
                feature_type: FeatureType::Point,
                geometry: Geometry::Point(point),
            }),
            ToolKind::Line | ToolKind::Polygon => {
                match &mut self.state {
                    SessionState::Idle => {
                        self.state = SessionState::Drawing(DrawingSession {
                            tool: self.current_tool,
                            vertices: vec![point],
                            anchor: None,
                            cursor: point,
                        });
                    }
                    SessionState::Drawing(session) => {
                        session.vertices.push(point);
                        session.cursor = point;
                    }
                }
                None
            }
            ToolKind::Rectangle | ToolKind::Circle => match &mut self.state {
                SessionState::Idle => {
                    self.state = SessionState::Drawing(DrawingSession {
                        tool: self.current_tool,
                        vertices: Vec::new(),
                        anchor: Some(point),
                        cursor: point,
                    });
                    None
                }
                SessionState::Drawing(session) => {
                    session.cursor = point;
                    let anchor = session.anchor?;
                    Some(two_point_commit(session.tool, anchor, point))
                }
            },
        }
    }

    /// Handle a double-click, committing a line or polygon session.
    ///
    /// Too few vertices is a synchronous validation error; the session stays
    /// in `Drawing`. Invoking this outside a line/polygon session is a state
    /// error.
    pub fn double_click(&mut self, point: Point) -> Result<PendingCommit, DrawError> {
        let SessionState::Drawing(session) = &mut self.state else {
            return Err(DrawError::NotDrawing);
        };
        session.cursor = point;
        match session.tool {
            ToolKind::Line => {
                if session.vertices.len() < LINE_MIN_VERTICES {
                    return Err(DrawError::TooFewVertices {
                        needed: LINE_MIN_VERTICES,
                        got: session.vertices.len(),
                    });
                }
                Ok(PendingCommit {
                    feature_type: FeatureType::Line,
                    geometry: Geometry::LineString(session.vertices.clone()),
                })
            }
            ToolKind::Polygon => {
                if session.vertices.len() < POLYGON_MIN_VERTICES {
                    return Err(DrawError::TooFewVertices {
                        needed: POLYGON_MIN_VERTICES,
                        got: session.vertices.len(),
                    });
                }
                Ok(PendingCommit {
                    feature_type: FeatureType::Polygon,
                    geometry: Geometry::Polygon(geo::close_ring(session.vertices.clone())),
                })
            }
            _ => Err(DrawError::NotDrawing),
        }
    }

    /// Track pointer movement for the live preview.
    pub fn pointer_move(&mut self, point: Point) {
        if let SessionState::Drawing(session) = &mut self.state {
            session.cursor = point;
        }
    }

    /// Cancel the in-progress session (Escape), discarding its vertices.
    pub fn cancel(&mut self) {
        self.state = SessionState::Idle;
    }

    /// Clear the session after the caller persisted a commit.
    pub fn finish(&mut self) {
        self.state = SessionState::Idle;
    }

    /// Live preview of the in-progress geometry, including the cursor as a
    /// provisional vertex. Transient and never replicated.
    pub fn preview_geometry(&self) -> Option<Geometry> {
        let SessionState::Drawing(session) = &self.state else {
            return None;
        };
        match session.tool {
            ToolKind::Line => {
                let mut pts = session.vertices.clone();
                pts.push(session.cursor);
                Some(Geometry::LineString(pts))
            }
            ToolKind::Polygon => {
                let mut pts = session.vertices.clone();
                pts.push(session.cursor);
                if pts.len() >= POLYGON_MIN_VERTICES {
                    Some(Geometry::Polygon(geo::close_ring(pts)))
                } else {
                    Some(Geometry::LineString(pts))
                }
            }
            ToolKind::Rectangle => {
                let anchor = session.anchor?;
                Some(Geometry::Polygon(geo::rectangle_from_corners(
                    anchor,
                    session.cursor,
                )))
            }
            ToolKind::Circle => {
                let anchor = session.anchor?;
                let radius = geo::haversine_distance(anchor, session.cursor);
                Some(Geometry::Polygon(geo::circle_approx(
                    anchor,
                    radius,
                    geo::CIRCLE_SEGMENTS,
                )))
            }
            ToolKind::Select | ToolKind::Point => None,
        }
    }
}

/// Build the commit for an anchor + second-corner tool.
fn two_point_commit(tool: ToolKind, anchor: Point, point: Point) -> PendingCommit {
    match tool {
        ToolKind::Circle => {
            let radius = geo::haversine_distance(anchor, point);
            PendingCommit {
                feature_type: FeatureType::Circle,
                geometry: Geometry::Polygon(geo::circle_approx(anchor, radius, geo::CIRCLE_SEGMENTS)),
            }
        }
        _ => PendingCommit {
            feature_type: FeatureType::Rectangle,
            geometry: Geometry::Polygon(geo::rectangle_from_corners(anchor, point)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_tool_emits_nothing() {
        let mut dc = DrawingController::new();
        assert_eq!(dc.current_tool, ToolKind::Select);
        assert!(dc.click(Point::new(0.0, 0.0)).is_none());
        assert!(!dc.is_drawing());
    }

    #[test]
    fn test_point_tool_commits_per_click_and_stays_idle() {
        let mut dc = DrawingController::new();
        dc.set_tool(ToolKind::Point);

        let commit = dc.click(Point::new(10.0, 20.0)).expect("commit");
        assert_eq!(commit.feature_type, FeatureType::Point);
        assert_eq!(commit.geometry, Geometry::Point(Point::new(10.0, 20.0)));
        assert!(!dc.is_drawing());

        // A second click commits again without any session.
        assert!(dc.click(Point::new(11.0, 21.0)).is_some());
    }

    #[test]
    fn test_line_accumulates_and_commits_on_double_click() {
        let mut dc = DrawingController::new();
        dc.set_tool(ToolKind::Line);

        assert!(dc.click(Point::new(0.0, 0.0)).is_none());
        assert!(dc.is_drawing());
        assert!(dc.click(Point::new(1.0, 1.0)).is_none());

        let commit = dc.double_click(Point::new(1.0, 1.0)).expect("commit");
        assert_eq!(commit.feature_type, FeatureType::Line);
        assert_eq!(
            commit.geometry,
            Geometry::LineString(vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0)])
        );

        dc.finish();
        assert!(!dc.is_drawing());
    }

    #[test]
    fn test_line_too_few_vertices_keeps_session() {
        let mut dc = DrawingController::new();
        dc.set_tool(ToolKind::Line);
        dc.click(Point::new(0.0, 0.0));

        let err = dc.double_click(Point::new(0.0, 0.0)).expect_err("refuse");
        assert_eq!(err, DrawError::TooFewVertices { needed: 2, got: 1 });
        assert!(dc.is_drawing(), "session must survive a refused commit");

        // One more vertex and the commit goes through.
        dc.click(Point::new(1.0, 0.0));
        assert!(dc.double_click(Point::new(1.0, 0.0)).is_ok());
    }

    #[test]
    fn test_polygon_commit_closes_ring() {
        let mut dc = DrawingController::new();
        dc.set_tool(ToolKind::Polygon);
        dc.click(Point::new(0.0, 0.0));
        dc.click(Point::new(4.0, 0.0));
        dc.click(Point::new(4.0, 4.0));

        let commit = dc.double_click(Point::new(4.0, 4.0)).expect("commit");
        assert_eq!(commit.feature_type, FeatureType::Polygon);
        match commit.geometry {
            Geometry::Polygon(ring) => {
                assert_eq!(ring.len(), 4);
                assert_eq!(ring.first(), ring.last());
            }
            other => panic!("expected polygon, got {other:?}"),
        }
    }

    #[test]
    fn test_polygon_too_few_vertices() {
        let mut dc = DrawingController::new();
        dc.set_tool(ToolKind::Polygon);
        dc.click(Point::new(0.0, 0.0));
        dc.click(Point::new(1.0, 0.0));

        let err = dc.double_click(Point::new(1.0, 0.0)).expect_err("refuse");
        assert_eq!(err, DrawError::TooFewVertices { needed: 3, got: 2 });
        assert!(dc.is_drawing());
    }

    #[test]
    fn test_double_click_outside_session_is_state_error() {
        let mut dc = DrawingController::new();
        dc.set_tool(ToolKind::Line);
        assert_eq!(
            dc.double_click(Point::new(0.0, 0.0)),
            Err(DrawError::NotDrawing)
        );
    }

    #[test]
    fn test_rectangle_anchor_then_commit() {
        let mut dc = DrawingController::new();
        dc.set_tool(ToolKind::Rectangle);

        assert!(dc.click(Point::new(0.0, 0.0)).is_none());
        assert!(dc.is_drawing());

        dc.pointer_move(Point::new(2.0, 1.0));
        match dc.preview_geometry() {
            Some(Geometry::Polygon(ring)) => assert_eq!(ring.len(), 5),
            other => panic!("expected polygon preview, got {other:?}"),
        }

        let commit = dc.click(Point::new(3.0, 2.0)).expect("commit");
        assert_eq!(commit.feature_type, FeatureType::Rectangle);
        match commit.geometry {
            Geometry::Polygon(ring) => {
                assert_eq!(ring[0], Point::new(0.0, 0.0));
                assert_eq!(ring[2], Point::new(3.0, 2.0));
            }
            other => panic!("expected polygon, got {other:?}"),
        }
    }

    #[test]
    fn test_circle_radius_from_anchor_distance() {
        let mut dc = DrawingController::new();
        dc.set_tool(ToolKind::Circle);
        dc.click(Point::new(0.0, 0.0));

        let commit = dc.click(Point::new(1.0, 0.0)).expect("commit");
        assert_eq!(commit.feature_type, FeatureType::Circle);
        match commit.geometry {
            Geometry::Polygon(ring) => {
                assert_eq!(ring.len(), geo::CIRCLE_SEGMENTS + 1);
                assert_eq!(ring.first(), ring.last());
            }
            other => panic!("expected polygon, got {other:?}"),
        }
    }

    #[test]
    fn test_escape_discards_vertices() {
        let mut dc = DrawingController::new();
        dc.set_tool(ToolKind::Polygon);
        dc.click(Point::new(0.0, 0.0));
        dc.click(Point::new(1.0, 0.0));

        dc.cancel();
        assert!(!dc.is_drawing());
        assert!(dc.preview_geometry().is_none());

        // The next click starts a fresh session with a single vertex.
        dc.click(Point::new(5.0, 5.0));
        match &dc.state {
            SessionState::Drawing(session) => assert_eq!(session.vertices.len(), 1),
            SessionState::Idle => panic!("expected a new session"),
        }
    }

    #[test]
    fn test_tool_switch_cancels_session() {
        let mut dc = DrawingController::new();
        dc.set_tool(ToolKind::Line);
        dc.click(Point::new(0.0, 0.0));
        assert!(dc.is_drawing());

        dc.set_tool(ToolKind::Rectangle);
        assert!(!dc.is_drawing());
    }

    #[test]
    fn test_line_preview_tracks_cursor() {
        let mut dc = DrawingController::new();
        dc.set_tool(ToolKind::Line);
        dc.click(Point::new(0.0, 0.0));
        dc.pointer_move(Point::new(2.0, 2.0));

        match dc.preview_geometry() {
            Some(Geometry::LineString(pts)) => {
                assert_eq!(pts, vec![Point::new(0.0, 0.0), Point::new(2.0, 2.0)]);
            }
            other => panic!("expected line preview, got {other:?}"),
        }
    }
}
