//! Stroke and fill appearance.

mod line_style;

pub use line_style::{LineStyle, LineStyleInfo, STIPPLE_PATTERN_MAX_SIZE};
