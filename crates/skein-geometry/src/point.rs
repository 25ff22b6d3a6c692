//! Points, vectors, and segment projection.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub};

/// A position in the 2D plane.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point2D {
    /// Horizontal coordinate, in pixels.
    pub x: f64,
    /// Vertical coordinate, in pixels.
    pub y: f64,
}

impl Point2D {
    /// Construct a point from coordinates.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance_to(self, other: Point2D) -> f64 {
        (other - self).magnitude()
    }

    /// Midpoint between two points.
    pub fn midpoint(self, other: Point2D) -> Point2D {
        Point2D::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }

    /// Linear interpolation toward `other`; `t` in [0, 1].
    pub fn lerp(self, other: Point2D, t: f64) -> Point2D {
        Point2D::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
        )
    }
}

impl fmt::Display for Point2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.1}, {:.1})", self.x, self.y)
    }
}

impl Add<Vec2D> for Point2D {
    type Output = Point2D;
    fn add(self, v: Vec2D) -> Point2D {
        Point2D::new(self.x + v.x, self.y + v.y)
    }
}

impl AddAssign<Vec2D> for Point2D {
    fn add_assign(&mut self, v: Vec2D) {
        self.x += v.x;
        self.y += v.y;
    }
}

impl Sub for Point2D {
    type Output = Vec2D;
    fn sub(self, other: Point2D) -> Vec2D {
        Vec2D::new(self.x - other.x, self.y - other.y)
    }
}

/// A displacement or velocity in the 2D plane.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2D {
    /// Horizontal component.
    pub x: f64,
    /// Vertical component.
    pub y: f64,
}

impl Vec2D {
    /// The zero vector.
    pub const ZERO: Vec2D = Vec2D { x: 0.0, y: 0.0 };

    /// Construct a vector from components.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean length.
    pub fn magnitude(self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Unit vector in the same direction; the zero vector stays zero.
    pub fn normalize(self) -> Vec2D {
        let mag = self.magnitude();
        if mag == 0.0 {
            Vec2D::ZERO
        } else {
            Vec2D::new(self.x / mag, self.y / mag)
        }
    }

    /// Scale by a factor.
    pub fn scale(self, factor: f64) -> Vec2D {
        Vec2D::new(self.x * factor, self.y * factor)
    }

    /// Dot product.
    pub fn dot(self, other: Vec2D) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// The vector rotated 90° counter-clockwise.
    pub fn perpendicular(self) -> Vec2D {
        Vec2D::new(-self.y, self.x)
    }
}

impl fmt::Display for Vec2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{:.1}, {:.1}>", self.x, self.y)
    }
}

impl Add for Vec2D {
    type Output = Vec2D;
    fn add(self, other: Vec2D) -> Vec2D {
        Vec2D::new(self.x + other.x, self.y + other.y)
    }
}

impl Sub for Vec2D {
    type Output = Vec2D;
    fn sub(self, other: Vec2D) -> Vec2D {
        Vec2D::new(self.x - other.x, self.y - other.y)
    }
}

impl Mul<f64> for Vec2D {
    type Output = Vec2D;
    fn mul(self, factor: f64) -> Vec2D {
        self.scale(factor)
    }
}

impl Neg for Vec2D {
    type Output = Vec2D;
    fn neg(self) -> Vec2D {
        Vec2D::new(-self.x, -self.y)
    }
}

/// Closest point to `target` on the segment from `start` to `end`.
///
/// Degenerate segments (zero length) return `start`.
pub fn closest_point_on_segment(start: Point2D, end: Point2D, target: Point2D) -> Point2D {
    let seg = end - start;
    let len_sq = seg.dot(seg);
    if len_sq == 0.0 {
        return start;
    }
    let t = ((target - start).dot(seg) / len_sq).clamp(0.0, 1.0);
    start.lerp(end, t)
}
