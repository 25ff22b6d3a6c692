//! Axis-aligned rectangles and segment clipping.

use crate::point::Point2D;

/// An axis-aligned rectangle, used for system bounds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
}

impl Rect {
    /// Construct a rectangle from its top-left corner and dimensions.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Construct a rectangle centred on `center`.
    pub fn centered(center: Point2D, width: f64, height: f64) -> Self {
        Self::new(center.x - width / 2.0, center.y - height / 2.0, width, height)
    }

    /// Whether the point lies inside or on the boundary.
    pub fn contains(&self, p: Point2D) -> bool {
        p.x >= self.x
            && p.x <= self.x + self.width
            && p.y >= self.y
            && p.y <= self.y + self.height
    }

    /// Whether the segment from `a` to `b` intersects this rectangle.
    ///
    /// Liang-Barsky clipping; touching the boundary counts as an
    /// intersection.
    pub fn intersects_segment(&self, a: Point2D, b: Point2D) -> bool {
        let (xmin, xmax) = (self.x, self.x + self.width);
        let (ymin, ymax) = (self.y, self.y + self.height);
        let dx = b.x - a.x;
        let dy = b.y - a.y;

        let mut t0 = 0.0f64;
        let mut t1 = 1.0f64;

        // Each boundary contributes one (p, q) clip pair.
        for (p, q) in [
            (-dx, a.x - xmin),
            (dx, xmax - a.x),
            (-dy, a.y - ymin),
            (dy, ymax - a.y),
        ] {
            if p == 0.0 {
                if q < 0.0 {
                    return false; // Parallel and outside.
                }
                continue;
            }
            let r = q / p;
            if p < 0.0 {
                if r > t1 {
                    return false;
                }
                t0 = t0.max(r);
            } else {
                if r < t0 {
                    return false;
                }
                t1 = t1.min(r);
            }
        }

        t0 <= t1
    }
}
