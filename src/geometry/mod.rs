//! Geometry primitives shared by the filter and the calibration workflow.

mod plane;
mod polygon;
mod roi;

pub use plane::{BasePlane, ElevationRange};
pub use polygon::Contour;
pub use roi::Roi;
