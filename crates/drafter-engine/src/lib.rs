//! Drafter engine crate.
//!
//! Streams vector primitives (polylines, hatches, clip projections, hatch
//! textures) into fixed-size GPU buffers, submitting work whenever a buffer
//! fills up.

pub mod device;
pub mod geometry;
pub mod style;

pub mod logging;
pub mod render;
