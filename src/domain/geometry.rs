//! Geometric types for code outlines in frame-pixel space

use serde::{Deserialize, Serialize};

/// Integer point in frame-pixel space (top-left origin, y grows downward)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl From<(i32, i32)> for Point {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    /// Create a new rectangle from coordinates
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Corners in clockwise order starting top-left
    pub fn corners(&self) -> [Point; 4] {
        [
            Point::new(self.left, self.top),
            Point::new(self.right, self.top),
            Point::new(self.right, self.bottom),
            Point::new(self.left, self.bottom),
        ]
    }
}

/// Closed outline of a detected code.
///
/// Points are kept in insertion order, which is also the drawing order; the
/// last point connects back to the first. An outline holds either no points or
/// at least two, a lone point is dropped on construction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Point>", into = "Vec<Point>")]
pub struct Polygon(Vec<Point>);

impl From<Vec<Point>> for Polygon {
    fn from(points: Vec<Point>) -> Self {
        Self::new(points)
    }
}

impl From<Polygon> for Vec<Point> {
    fn from(polygon: Polygon) -> Self {
        polygon.0
    }
}

impl Polygon {
    pub fn new(points: Vec<Point>) -> Self {
        if points.len() < 2 {
            return Self(Vec::new());
        }
        Self(points)
    }

    pub fn points(&self) -> &[Point] {
        &self.0
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether the outline has enough points to render a boundary
    pub fn is_drawable(&self) -> bool {
        self.0.len() >= 2
    }

    /// Edges as (from, to) pairs, closing last to first
    pub fn edges(&self) -> impl Iterator<Item = (Point, Point)> + '_ {
        let n = self.0.len();
        (0..n).map(move |i| (self.0[(i + n - 1) % n], self.0[i]))
    }

    /// Even-odd containment test for a frame-space position.
    ///
    /// Outlines with fewer than three points enclose no area.
    pub fn contains(&self, x: f32, y: f32) -> bool {
        if self.0.len() < 3 {
            return false;
        }
        let mut inside = false;
        for (a, b) in self.edges() {
            let (ax, ay) = (a.x as f32, a.y as f32);
            let (bx, by) = (b.x as f32, b.y as f32);
            if (ay > y) != (by > y) {
                let cross_x = ax + (y - ay) * (bx - ax) / (by - ay);
                if x < cross_x {
                    inside = !inside;
                }
            }
        }
        inside
    }
}

impl From<Rect> for Polygon {
    fn from(rect: Rect) -> Self {
        Self(rect.corners().to_vec())
    }
}
