//! GPU rendering subsystem.
//!
//! Convention:
//! - Shape coordinates are world-space `f64`; clip projections map them to NDC.
//! - Every device buffer is addressed by byte offset from its base address.

pub mod draw_resources;

pub use draw_resources::{DrawBackend, DrawResourcesConfig, DrawResourcesFiller, IntendedSubmit};
