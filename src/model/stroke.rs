//! Captured ink primitives: points, pen styles and strokes.

use serde::{Deserialize, Serialize};

/// A single captured pen sample in surface coordinates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    /// Capture timestamp in milliseconds
    pub t: i64,
}

impl Point {
    pub fn new(x: f64, y: f64, t: i64) -> Self {
        Self { x, y, t }
    }

    pub fn distance_to(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Visual style attached to a stroke. Not interpreted by the engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PenStyle {
    pub color: String,
    pub width: f64,
}

impl Default for PenStyle {
    fn default() -> Self {
        Self {
            color: "#000000".to_string(),
            width: 2.0,
        }
    }
}

/// Axis-aligned bounds of a set of points.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    fn from_point(point: &Point) -> Self {
        Self {
            min_x: point.x,
            min_y: point.y,
            max_x: point.x,
            max_y: point.y,
        }
    }

    fn include(&mut self, point: &Point) {
        self.min_x = self.min_x.min(point.x);
        self.min_y = self.min_y.min(point.y);
        self.max_x = self.max_x.max(point.x);
        self.max_y = self.max_y.max(point.y);
    }

    /// Smallest box containing both boxes
    pub fn union(self, other: BoundingBox) -> BoundingBox {
        BoundingBox {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

/// An ordered sequence of points between pen-down and pen-up.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Stroke {
    pub points: Vec<Point>,
    pub style: PenStyle,
}

impl Stroke {
    pub fn new(first: Point, style: PenStyle) -> Self {
        Self {
            points: vec![first],
            style,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last_point(&self) -> Option<&Point> {
        self.points.last()
    }

    /// Append a point unless it lies within `min_distance` of the previous one.
    ///
    /// Returns whether the point was kept.
    pub fn push_filtered(&mut self, point: Point, min_distance: f64) -> bool {
        if let Some(last) = self.points.last() {
            if min_distance > 0.0 && last.distance_to(&point) < min_distance {
                return false;
            }
        }
        self.points.push(point);
        true
    }

    pub fn bounds(&self) -> Option<BoundingBox> {
        let (first, rest) = self.points.split_first()?;
        let mut bounds = BoundingBox::from_point(first);
        for point in rest {
            bounds.include(point);
        }
        Some(bounds)
    }

    pub fn xs(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.x).collect()
    }

    pub fn ys(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.y).collect()
    }

    pub fn timestamps(&self) -> Vec<i64> {
        self.points.iter().map(|p| p.t).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_filtered_drops_close_points() {
        let mut stroke = Stroke::new(Point::new(0.0, 0.0, 0), PenStyle::default());
        assert!(!stroke.push_filtered(Point::new(0.5, 0.5, 1), 1.0));
        assert!(stroke.push_filtered(Point::new(3.0, 4.0, 2), 1.0));
        assert_eq!(stroke.len(), 2);
    }

    #[test]
    fn test_push_filtered_zero_distance_keeps_everything() {
        let mut stroke = Stroke::new(Point::new(1.0, 1.0, 0), PenStyle::default());
        assert!(stroke.push_filtered(Point::new(1.0, 1.0, 1), 0.0));
        assert_eq!(stroke.len(), 2);
    }

    #[test]
    fn test_bounds() {
        let mut stroke = Stroke::new(Point::new(5.0, -2.0, 0), PenStyle::default());
        stroke.push_filtered(Point::new(-1.0, 8.0, 1), 0.0);
        stroke.push_filtered(Point::new(3.0, 3.0, 2), 0.0);

        let bounds = stroke.bounds().unwrap();
        assert_eq!(bounds.min_x, -1.0);
        assert_eq!(bounds.min_y, -2.0);
        assert_eq!(bounds.max_x, 5.0);
        assert_eq!(bounds.max_y, 8.0);
        assert_eq!(bounds.width(), 6.0);
        assert_eq!(bounds.height(), 10.0);
    }
}
