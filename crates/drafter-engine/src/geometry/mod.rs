//! Shape sources and GPU record layouts.
//!
//! Coordinates are world-space `f64`; projection to NDC happens on the GPU
//! through the active [`ClipProjectionData`].

mod hatch;
mod polyline;
mod records;

pub use hatch::{Hatch, HatchSource};
pub use polyline::{Polyline, PolylineSource, SectionInfo, SectionKind};
pub use records::*;
