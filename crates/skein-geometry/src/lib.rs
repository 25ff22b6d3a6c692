//! 2D geometry and wire-path math for the Skein network simulation.
//!
//! Provides the [`Point2D`]/[`Vec2D`] primitives, axis-aligned [`Rect`]
//! bounds with segment clipping, and [`WirePath`], the sampled path a
//! packet follows along a wire, in either rigid-polyline or smooth-curve
//! mode.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod path;
pub mod point;
pub mod rect;

pub use path::{nearest_control_segment, ClosestPoint, PathStyle, WirePath};
pub use point::{closest_point_on_segment, Point2D, Vec2D};
pub use rect::Rect;
