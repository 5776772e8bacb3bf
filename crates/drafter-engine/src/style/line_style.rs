use bytemuck::{Pod, Zeroable};

/// Maximum number of stipple entries the GPU record can hold.
pub const STIPPLE_PATTERN_MAX_SIZE: usize = 14;

/// GPU-side line style.
///
/// Hatches reuse this record: `screen_space_line_width` then carries a texture
/// slot (bit cast, read back with `asuint` in the shader).
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, Pod, Zeroable)]
pub struct LineStyle {
    pub color: [f32; 4],
    pub screen_space_line_width: f32,
    pub world_space_line_width: f32,
    pub stipple_pattern_size: u32,
    pub reciprocal_stipple_pattern_len: f32,
    pub stipple_pattern: [f32; STIPPLE_PATTERN_MAX_SIZE],
    pub phase_shift: f32,
    pub is_road_style: u32,
}

impl LineStyle {
    /// Bitwise equality; `-0.0 != 0.0` and identical NaNs compare equal.
    #[inline]
    pub fn bitwise_eq(&self, other: &Self) -> bool {
        bytemuck::bytes_of(self) == bytemuck::bytes_of(other)
    }

    /// Texture slot aliased into the width field (hatch styles only).
    #[inline]
    pub fn texture_idx(&self) -> u32 {
        self.screen_space_line_width.to_bits()
    }
}

/// CPU-side stroke description.
///
/// `stipple_pattern` alternates dash and gap lengths in world units
/// (positive = dash, the following value = gap). An empty pattern draws a
/// solid line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineStyleInfo {
    /// Straight-alpha RGBA.
    pub color: [f32; 4],
    pub screen_space_line_width: f32,
    pub world_space_line_width: f32,
    pub stipple_pattern: Vec<f32>,
    pub phase_shift: f32,
    pub is_road_style: bool,
}

impl LineStyleInfo {
    pub fn solid(color: [f32; 4], screen_space_line_width: f32) -> Self {
        Self {
            color,
            screen_space_line_width,
            ..Self::default()
        }
    }

    /// Fill style for hatches; `texture_idx` goes into the width field.
    pub fn hatch_fill(color: [f32; 4], texture_idx: u32) -> Self {
        Self {
            color,
            screen_space_line_width: f32::from_bits(texture_idx),
            ..Self::default()
        }
    }

    pub fn with_stipple(mut self, pattern: &[f32]) -> Self {
        self.stipple_pattern = pattern.to_vec();
        self
    }

    /// `false` for fully transparent or zero-width strokes.
    pub fn is_visible(&self) -> bool {
        self.color[3] > 0.0
            && (self.screen_space_line_width > 0.0 || self.world_space_line_width > 0.0)
    }

    /// Converts to the GPU record, normalizing the stipple pattern to `[0, 1]`.
    pub fn to_gpu(&self) -> LineStyle {
        let mut out = LineStyle {
            color: self.color,
            screen_space_line_width: self.screen_space_line_width,
            world_space_line_width: self.world_space_line_width,
            phase_shift: self.phase_shift,
            is_road_style: self.is_road_style as u32,
            ..LineStyle::default()
        };

        let pattern = self.stipple_pattern.as_slice();
        let used = if pattern.len() > STIPPLE_PATTERN_MAX_SIZE {
            log::warn!(
                "stipple pattern has {} entries, truncating to {}",
                pattern.len(),
                STIPPLE_PATTERN_MAX_SIZE
            );
            &pattern[..STIPPLE_PATTERN_MAX_SIZE]
        } else {
            pattern
        };

        // Normalize over what the GPU actually receives.
        let total: f32 = used.iter().map(|v| v.abs()).sum();
        if used.is_empty() || total <= 0.0 {
            return out;
        }

        let inv = 1.0 / total;
        for (dst, v) in out.stipple_pattern.iter_mut().zip(used) {
            *dst = v.abs() * inv;
        }
        out.stipple_pattern_size = used.len() as u32;
        out.reciprocal_stipple_pattern_len = inv;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_alpha_is_invisible() {
        assert!(!LineStyleInfo::solid([1.0, 0.0, 0.0, 0.0], 2.0).is_visible());
        assert!(!LineStyleInfo::solid([1.0, 0.0, 0.0, 1.0], 0.0).is_visible());
        assert!(LineStyleInfo::solid([1.0, 0.0, 0.0, 1.0], 2.0).is_visible());
    }

    #[test]
    fn stipple_is_normalized() {
        let gpu = LineStyleInfo::solid([0.0, 0.0, 0.0, 1.0], 1.0)
            .with_stipple(&[3.0, 1.0])
            .to_gpu();
        assert_eq!(gpu.stipple_pattern_size, 2);
        assert_eq!(gpu.stipple_pattern[0], 0.75);
        assert_eq!(gpu.stipple_pattern[1], 0.25);
        assert_eq!(gpu.reciprocal_stipple_pattern_len, 0.25);
    }

    #[test]
    fn oversized_stipple_is_truncated() {
        let mut pattern = vec![1.0; STIPPLE_PATTERN_MAX_SIZE];
        pattern.extend_from_slice(&[10.0; 4]);
        let gpu = LineStyleInfo::solid([0.0, 0.0, 0.0, 1.0], 1.0)
            .with_stipple(&pattern)
            .to_gpu();
        assert_eq!(gpu.stipple_pattern_size as usize, STIPPLE_PATTERN_MAX_SIZE);

        // Dropped entries take no part in the normalization.
        let sum: f32 = gpu.stipple_pattern.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5, "entries sum to {sum}");
        assert_eq!(gpu.reciprocal_stipple_pattern_len, 1.0 / STIPPLE_PATTERN_MAX_SIZE as f32);
    }

    #[test]
    fn hatch_fill_round_trips_texture_idx() {
        let gpu = LineStyleInfo::hatch_fill([1.0; 4], 17).to_gpu();
        assert_eq!(gpu.texture_idx(), 17);
    }

    #[test]
    fn bitwise_eq_distinguishes_signed_zero() {
        let a = LineStyleInfo::solid([0.0, 0.0, 0.0, 1.0], 1.0).to_gpu();
        let mut b = a;
        assert!(a.bitwise_eq(&b));
        b.phase_shift = -0.0;
        assert!(!a.bitwise_eq(&b));
    }
}
