//! GPU-visible record layouts.
//!
//! Every type here is `#[repr(C)]` + `Pod` so it can be copied byte-for-byte
//! into the staging mirrors. Layouts must match the shader-side declarations.

use bytemuck::{Pod, Zeroable};

/// Sentinel stored in [`MainObject::clip_projection_address`] when no clip
/// projection is active.
pub const INVALID_CLIP_PROJECTION_ADDRESS: u64 = u64::MAX;

/// Sentinel texture slot (shaders treat it as "no texture").
pub const INVALID_TEXTURE_IDX: u32 = u32::MAX;

/// Primitive kind tag carried in the low 16 bits of
/// [`DrawObject::type_subsection_idx`].
#[repr(u16)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ObjectType {
    Line = 0,
    QuadBezier = 1,
    CurveBox = 2,
    PolylineConnector = 3,
}

impl ObjectType {
    /// Number of draw objects (cages) one element of this kind expands into.
    #[inline]
    pub const fn cages_per_object(self) -> u32 {
        match self {
            ObjectType::QuadBezier => CAGES_PER_QUAD_BEZIER,
            ObjectType::Line | ObjectType::CurveBox | ObjectType::PolylineConnector => 1,
        }
    }
}

/// Cages emitted per quadratic bezier. All of them share one geometry entry.
pub const CAGES_PER_QUAD_BEZIER: u32 = 3;

/// One logical drawable: style + clip projection.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct MainObject {
    pub style_idx: u32,
    pub _pad: u32,
    pub clip_projection_address: u64,
}

impl MainObject {
    #[inline]
    pub fn new(style_idx: u32, clip_projection_address: Option<u64>) -> Self {
        Self {
            style_idx,
            _pad: 0,
            clip_projection_address: clip_projection_address
                .unwrap_or(INVALID_CLIP_PROJECTION_ADDRESS),
        }
    }

    #[inline]
    pub fn clip_projection(&self) -> Option<u64> {
        (self.clip_projection_address != INVALID_CLIP_PROJECTION_ADDRESS)
            .then_some(self.clip_projection_address)
    }
}

/// Fixed-size cage record read by the vertex shader.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct DrawObject {
    /// `type` in bits 0..16, cage sub-index in bits 16..32.
    pub type_subsection_idx: u32,
    pub main_obj_index: u32,
    pub geometry_address: u64,
}

impl DrawObject {
    #[inline]
    pub fn new(kind: ObjectType, sub_index: u16, main_obj_index: u32, geometry_address: u64) -> Self {
        Self {
            type_subsection_idx: (kind as u32) | ((sub_index as u32) << 16),
            main_obj_index,
            geometry_address,
        }
    }

    #[inline]
    pub fn object_type(&self) -> u16 {
        (self.type_subsection_idx & 0xFFFF) as u16
    }

    #[inline]
    pub fn sub_index(&self) -> u16 {
        (self.type_subsection_idx >> 16) as u16
    }
}

/// One polyline vertex in world space.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct LinePointInfo {
    pub p: [f64; 2],
    pub phase_shift: f32,
    pub stretch_value: f32,
}

impl LinePointInfo {
    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { p: [x, y], phase_shift: 0.0, stretch_value: 1.0 }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct QuadraticBezierInfo {
    pub p: [[f64; 2]; 3],
    pub phase_shift: f32,
    pub stretch_value: f32,
}

impl QuadraticBezierInfo {
    #[inline]
    pub const fn new(p0: [f64; 2], p1: [f64; 2], p2: [f64; 2]) -> Self {
        Self { p: [p0, p1, p2], phase_shift: 0.0, stretch_value: 1.0 }
    }
}

/// Round/miter join between two polyline segments.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct PolylineConnector {
    pub circle_center: [f64; 2],
    pub v: [f32; 2],
    pub cos_angle_difference_half: f32,
    pub _pad: f32,
}

/// Hatch fill cell: an AABB bounded left/right by two monotonic curves.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct CurveBox {
    pub aabb_min: [f64; 2],
    pub aabb_max: [f64; 2],
    pub curve_min: [[f32; 2]; 3],
    pub curve_max: [[f32; 2]; 3],
}

/// Projection to NDC plus the NDC clip rectangle.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct ClipProjectionData {
    /// Row-major 3x3.
    pub projection_to_ndc: [[f64; 3]; 3],
    pub min_clip_ndc: [f32; 2],
    pub max_clip_ndc: [f32; 2],
}

impl Default for ClipProjectionData {
    fn default() -> Self {
        Self {
            projection_to_ndc: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            min_clip_ndc: [-1.0, -1.0],
            max_clip_ndc: [1.0, 1.0],
        }
    }
}

impl ClipProjectionData {
    /// Scale + translate projection with the full NDC clip rect.
    pub fn scale_translate(sx: f64, sy: f64, tx: f64, ty: f64) -> Self {
        Self {
            projection_to_ndc: [[sx, 0.0, tx], [0.0, sy, ty], [0.0, 0.0, 1.0]],
            ..Self::default()
        }
    }
}

pub const MAIN_OBJECT_SIZE: u64 = size_of::<MainObject>() as u64;
pub const DRAW_OBJECT_SIZE: u64 = size_of::<DrawObject>() as u64;
pub const LINE_POINT_SIZE: u64 = size_of::<LinePointInfo>() as u64;
pub const QUAD_BEZIER_SIZE: u64 = size_of::<QuadraticBezierInfo>() as u64;
pub const CONNECTOR_SIZE: u64 = size_of::<PolylineConnector>() as u64;
pub const CURVE_BOX_SIZE: u64 = size_of::<CurveBox>() as u64;
pub const CLIP_PROJECTION_SIZE: u64 = size_of::<ClipProjectionData>() as u64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_sizes_match_shader_layout() {
        assert_eq!(MAIN_OBJECT_SIZE, 16);
        assert_eq!(DRAW_OBJECT_SIZE, 16);
        assert_eq!(LINE_POINT_SIZE, 24);
        assert_eq!(QUAD_BEZIER_SIZE, 56);
        assert_eq!(CONNECTOR_SIZE, 32);
        assert_eq!(CURVE_BOX_SIZE, 80);
        assert_eq!(CLIP_PROJECTION_SIZE, 88);
    }

    #[test]
    fn draw_object_packs_type_and_sub_index() {
        let obj = DrawObject::new(ObjectType::QuadBezier, 2, 7, 0x40);
        assert_eq!(obj.object_type(), ObjectType::QuadBezier as u16);
        assert_eq!(obj.sub_index(), 2);
        assert_eq!(obj.type_subsection_idx, 1 | (2 << 16));
    }

    #[test]
    fn main_object_without_clip_uses_sentinel() {
        let obj = MainObject::new(3, None);
        assert_eq!(obj.clip_projection_address, INVALID_CLIP_PROJECTION_ADDRESS);
        assert_eq!(obj.clip_projection(), None);
        assert_eq!(MainObject::new(3, Some(88)).clip_projection(), Some(88));
    }
}
