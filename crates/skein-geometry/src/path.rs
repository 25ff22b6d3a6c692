//! Sampled wire paths.
//!
//! A wire's path runs from its source port through its ordered bends to
//! its destination port. [`WirePath`] samples that path once, as a rigid
//! polyline or as a smooth curve, and answers arc-length queries against
//! the samples: total length, position and tangent at a progress
//! fraction, and closest point.
//!
//! Smooth mode pins every bend exactly on the path: two control points
//! degenerate to a line, three produce a pair of quadratic Bézier arcs
//! meeting at the bend, and four or more produce a Catmull-Rom spline
//! through all control points.

use crate::point::{closest_point_on_segment, Point2D, Vec2D};

/// How control points are turned into a traversable path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathStyle {
    /// Straight segments between consecutive control points.
    Polyline,
    /// Smooth curve through the control points, bends pinned.
    Smooth,
}

impl PathStyle {
    /// Select a style from the smooth-curves setting.
    pub fn from_smooth(smooth: bool) -> Self {
        if smooth {
            Self::Smooth
        } else {
            Self::Polyline
        }
    }
}

/// Fraction of the chord length used to offset the quadratic control
/// point perpendicular to the chord.
const CURVE_CONTROL_FRACTION: f64 = 0.3;

/// The closest point on a path to some query position.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClosestPoint {
    /// The point on the path.
    pub point: Point2D,
    /// Arc-length progress of that point, in [0, 1].
    pub progress: f64,
    /// Distance from the query position to the path.
    pub distance: f64,
}

/// A sampled wire path with an arc-length table.
#[derive(Clone, Debug)]
pub struct WirePath {
    points: Vec<Point2D>,
    cumulative: Vec<f64>,
    total: f64,
}

impl WirePath {
    /// Sample a path through `control` points in the given style.
    ///
    /// At least two control points are required; fewer yield a degenerate
    /// path of zero length anchored at the first point (or the origin).
    pub fn new(control: &[Point2D], style: PathStyle) -> Self {
        let points = match style {
            PathStyle::Polyline => control.to_vec(),
            PathStyle::Smooth => sample_smooth(control),
        };
        Self::from_samples(points)
    }

    fn from_samples(points: Vec<Point2D>) -> Self {
        let mut cumulative = Vec::with_capacity(points.len());
        let mut total = 0.0;
        for (i, p) in points.iter().enumerate() {
            if i > 0 {
                total += points[i - 1].distance_to(*p);
            }
            cumulative.push(total);
        }
        Self {
            points,
            cumulative,
            total,
        }
    }

    /// Total arc length of the sampled path.
    pub fn total_length(&self) -> f64 {
        self.total
    }

    /// The sampled points, in traversal order.
    pub fn points(&self) -> &[Point2D] {
        &self.points
    }

    /// Position at an arc-length fraction `progress` in [0, 1].
    ///
    /// Out-of-range values are clamped; a degenerate path returns its
    /// anchor point.
    pub fn position_at(&self, progress: f64) -> Point2D {
        if self.points.len() < 2 || self.total == 0.0 {
            return self.points.first().copied().unwrap_or_default();
        }
        let target = progress.clamp(0.0, 1.0) * self.total;
        let seg = self.segment_for_distance(target);
        let seg_start = self.cumulative[seg];
        let seg_len = self.cumulative[seg + 1] - seg_start;
        let t = if seg_len == 0.0 {
            0.0
        } else {
            (target - seg_start) / seg_len
        };
        self.points[seg].lerp(self.points[seg + 1], t)
    }

    /// Unit tangent at an arc-length fraction `progress`.
    ///
    /// A degenerate path has no direction and returns the zero vector.
    pub fn tangent_at(&self, progress: f64) -> Vec2D {
        if self.points.len() < 2 || self.total == 0.0 {
            return Vec2D::ZERO;
        }
        let target = progress.clamp(0.0, 1.0) * self.total;
        let seg = self.segment_for_distance(target);
        (self.points[seg + 1] - self.points[seg]).normalize()
    }

    /// Closest point on the path to `target`, with its progress fraction.
    pub fn closest_point(&self, target: Point2D) -> ClosestPoint {
        if self.points.len() < 2 {
            let anchor = self.points.first().copied().unwrap_or_default();
            return ClosestPoint {
                point: anchor,
                progress: 0.0,
                distance: anchor.distance_to(target),
            };
        }

        let mut best = ClosestPoint {
            point: self.points[0],
            progress: 0.0,
            distance: f64::MAX,
        };
        for i in 0..self.points.len() - 1 {
            let candidate = closest_point_on_segment(self.points[i], self.points[i + 1], target);
            let distance = candidate.distance_to(target);
            if distance < best.distance {
                let along = self.cumulative[i] + self.points[i].distance_to(candidate);
                best = ClosestPoint {
                    point: candidate,
                    progress: if self.total == 0.0 {
                        0.0
                    } else {
                        (along / self.total).clamp(0.0, 1.0)
                    },
                    distance,
                };
            }
        }
        best
    }

    /// Index of the sample segment covering arc-length `distance`.
    fn segment_for_distance(&self, distance: f64) -> usize {
        // partition_point yields the first cumulative entry beyond the
        // target; the segment starts one sample earlier.
        let idx = self
            .cumulative
            .partition_point(|&c| c < distance)
            .saturating_sub(1);
        idx.min(self.points.len().saturating_sub(2))
    }
}

/// Index of the control-point segment nearest to `target`, with the
/// projection of `target` onto it.
///
/// Used for bend insertion: a bend dropped near segment `i` (between
/// control points `i` and `i + 1`) becomes bend index `i`.
pub fn nearest_control_segment(control: &[Point2D], target: Point2D) -> Option<(usize, Point2D)> {
    if control.len() < 2 {
        return None;
    }
    let mut best: Option<(usize, Point2D, f64)> = None;
    for i in 0..control.len() - 1 {
        let candidate = closest_point_on_segment(control[i], control[i + 1], target);
        let distance = candidate.distance_to(target);
        if best.map_or(true, |(_, _, d)| distance < d) {
            best = Some((i, candidate, distance));
        }
    }
    best.map(|(i, p, _)| (i, p))
}

/// Number of interpolation steps for one curve segment of chord length
/// `len`: at least 15, one step per 5 px beyond that.
fn segment_steps(len: f64) -> usize {
    ((len / 5.0).floor() as usize).max(15)
}

fn sample_smooth(control: &[Point2D]) -> Vec<Point2D> {
    match control.len() {
        0 | 1 | 2 => control.to_vec(),
        3 => {
            // One bend: a pair of quadratic arcs pinned at the bend.
            let mut points = sample_quadratic_arc(control[0], control[1]);
            let second = sample_quadratic_arc(control[1], control[2]);
            points.extend(second.into_iter().skip(1));
            points
        }
        _ => sample_catmull_rom(control),
    }
}

/// Quadratic Bézier arc between two points, bulging perpendicular to the
/// chord. Both endpoints are exact.
fn sample_quadratic_arc(start: Point2D, end: Point2D) -> Vec<Point2D> {
    let chord = end - start;
    let len = chord.magnitude();
    let ctrl = start.midpoint(end) + chord.perpendicular().normalize() * (len * CURVE_CONTROL_FRACTION);

    let steps = segment_steps(len);
    let mut points = Vec::with_capacity(steps + 1);
    for i in 0..=steps {
        let t = i as f64 / steps as f64;
        points.push(quadratic_point(start, ctrl, end, t));
    }
    points
}

fn quadratic_point(p0: Point2D, p1: Point2D, p2: Point2D, t: f64) -> Point2D {
    let u = 1.0 - t;
    Point2D::new(
        u * u * p0.x + 2.0 * u * t * p1.x + t * t * p2.x,
        u * u * p0.y + 2.0 * u * t * p1.y + t * t * p2.y,
    )
}

/// Catmull-Rom spline through every control point, with linearly
/// extrapolated phantom endpoints.
fn sample_catmull_rom(control: &[Point2D]) -> Vec<Point2D> {
    let n = control.len();
    let mut points = vec![control[0]];

    for i in 0..n - 1 {
        let p0 = if i == 0 {
            extrapolate(control[1], control[0])
        } else {
            control[i - 1]
        };
        let p1 = control[i];
        let p2 = control[i + 1];
        let p3 = if i + 2 < n {
            control[i + 2]
        } else {
            extrapolate(control[i], control[i + 1])
        };

        let steps = segment_steps(p1.distance_to(p2));
        for s in 1..=steps {
            let t = s as f64 / steps as f64;
            points.push(catmull_rom_point(p0, p1, p2, p3, t));
        }
    }
    points
}

/// Extend the line from `from` through `to` one step past `to`'s mirror:
/// the phantom point before `to` on the `from`→`to` line.
fn extrapolate(from: Point2D, to: Point2D) -> Point2D {
    Point2D::new(to.x - (from.x - to.x), to.y - (from.y - to.y))
}

fn catmull_rom_point(p0: Point2D, p1: Point2D, p2: Point2D, p3: Point2D, t: f64) -> Point2D {
    let t2 = t * t;
    let t3 = t2 * t;
    let b0 = -0.5 * t3 + t2 - 0.5 * t;
    let b1 = 1.5 * t3 - 2.5 * t2 + 1.0;
    let b2 = -1.5 * t3 + 2.0 * t2 + 0.5 * t;
    let b3 = 0.5 * t3 - 0.5 * t2;
    Point2D::new(
        b0 * p0.x + b1 * p1.x + b2 * p2.x + b3 * p3.x,
        b0 * p0.y + b1 * p1.y + b2 * p2.y + b3 * p3.y,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn straight() -> WirePath {
        WirePath::new(
            &[Point2D::new(0.0, 0.0), Point2D::new(100.0, 0.0)],
            PathStyle::Polyline,
        )
    }

    // ── Polyline sampling ────────────────────────────────────────

    #[test]
    fn straight_line_length() {
        assert_eq!(straight().total_length(), 100.0);
    }

    #[test]
    fn position_at_maps_progress_linearly() {
        let path = straight();
        assert_eq!(path.position_at(0.0), Point2D::new(0.0, 0.0));
        assert_eq!(path.position_at(0.25), Point2D::new(25.0, 0.0));
        assert_eq!(path.position_at(1.0), Point2D::new(100.0, 0.0));
    }

    #[test]
    fn position_at_clamps_out_of_range() {
        let path = straight();
        assert_eq!(path.position_at(-0.5), Point2D::new(0.0, 0.0));
        assert_eq!(path.position_at(1.5), Point2D::new(100.0, 0.0));
    }

    #[test]
    fn polyline_with_bend_sums_segments() {
        let path = WirePath::new(
            &[
                Point2D::new(0.0, 0.0),
                Point2D::new(0.0, 30.0),
                Point2D::new(40.0, 30.0),
            ],
            PathStyle::Polyline,
        );
        assert_eq!(path.total_length(), 70.0);
        // Progress 30/70 is exactly the bend.
        let bend = path.position_at(30.0 / 70.0);
        assert!(bend.distance_to(Point2D::new(0.0, 30.0)) < 1e-9);
    }

    #[test]
    fn tangent_follows_segment_direction() {
        let path = WirePath::new(
            &[
                Point2D::new(0.0, 0.0),
                Point2D::new(0.0, 30.0),
                Point2D::new(40.0, 30.0),
            ],
            PathStyle::Polyline,
        );
        assert_eq!(path.tangent_at(0.1), Vec2D::new(0.0, 1.0));
        assert_eq!(path.tangent_at(0.9), Vec2D::new(1.0, 0.0));
    }

    // ── Smooth sampling ──────────────────────────────────────────

    #[test]
    fn smooth_two_points_is_a_line() {
        let path = WirePath::new(
            &[Point2D::new(0.0, 0.0), Point2D::new(100.0, 0.0)],
            PathStyle::Smooth,
        );
        assert_eq!(path.total_length(), 100.0);
    }

    #[test]
    fn smooth_pins_single_bend() {
        let bend = Point2D::new(50.0, 40.0);
        let path = WirePath::new(
            &[Point2D::new(0.0, 0.0), bend, Point2D::new(100.0, 0.0)],
            PathStyle::Smooth,
        );
        let closest = path.closest_point(bend);
        assert!(closest.distance < 1e-9, "bend must lie on the path");
    }

    #[test]
    fn smooth_pins_all_catmull_rom_controls() {
        let controls = [
            Point2D::new(0.0, 0.0),
            Point2D::new(30.0, 40.0),
            Point2D::new(70.0, -20.0),
            Point2D::new(120.0, 10.0),
            Point2D::new(160.0, 0.0),
        ];
        let path = WirePath::new(&controls, PathStyle::Smooth);
        for c in controls {
            assert!(
                path.closest_point(c).distance < 1e-9,
                "control {c} must lie on the path"
            );
        }
    }

    #[test]
    fn smooth_curve_is_longer_than_chord() {
        let path = WirePath::new(
            &[
                Point2D::new(0.0, 0.0),
                Point2D::new(50.0, 50.0),
                Point2D::new(100.0, 0.0),
            ],
            PathStyle::Smooth,
        );
        let chord = 2.0 * Point2D::new(0.0, 0.0).distance_to(Point2D::new(50.0, 50.0));
        assert!(path.total_length() > chord);
    }

    // ── Closest point and segment helpers ────────────────────────

    #[test]
    fn closest_point_progress_is_consistent() {
        let path = straight();
        let c = path.closest_point(Point2D::new(30.0, 15.0));
        assert_eq!(c.point, Point2D::new(30.0, 0.0));
        assert!((c.progress - 0.3).abs() < 1e-9);
        assert_eq!(c.distance, 15.0);
    }

    #[test]
    fn nearest_control_segment_picks_by_projection() {
        let controls = [
            Point2D::new(0.0, 0.0),
            Point2D::new(100.0, 0.0),
            Point2D::new(100.0, 100.0),
        ];
        let (idx, proj) = nearest_control_segment(&controls, Point2D::new(50.0, 10.0)).unwrap();
        assert_eq!(idx, 0);
        assert_eq!(proj, Point2D::new(50.0, 0.0));
        let (idx, _) = nearest_control_segment(&controls, Point2D::new(90.0, 60.0)).unwrap();
        assert_eq!(idx, 1);
    }

    #[test]
    fn step_count_floor() {
        assert_eq!(segment_steps(10.0), 15);
        assert_eq!(segment_steps(200.0), 40);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn arb_point() -> impl Strategy<Value = Point2D> {
            (-500.0f64..500.0, -500.0f64..500.0).prop_map(|(x, y)| Point2D::new(x, y))
        }

        proptest! {
            #[test]
            fn position_at_stays_on_path(
                a in arb_point(),
                b in arb_point(),
                c in arb_point(),
                progress in 0.0f64..1.0,
            ) {
                prop_assume!(a.distance_to(b) > 1.0 && b.distance_to(c) > 1.0);
                let path = WirePath::new(&[a, b, c], PathStyle::Smooth);
                let pos = path.position_at(progress);
                let closest = path.closest_point(pos);
                prop_assert!(closest.distance < 1e-6);
            }

            #[test]
            fn progress_roundtrip_monotone(
                a in arb_point(),
                b in arb_point(),
                p1 in 0.0f64..1.0,
                p2 in 0.0f64..1.0,
            ) {
                prop_assume!(a.distance_to(b) > 1.0);
                let path = WirePath::new(&[a, b], PathStyle::Polyline);
                let (lo, hi) = if p1 <= p2 { (p1, p2) } else { (p2, p1) };
                let d_lo = path.position_at(lo).distance_to(a);
                let d_hi = path.position_at(hi).distance_to(a);
                prop_assert!(d_lo <= d_hi + 1e-9);
            }
        }
    }
}
