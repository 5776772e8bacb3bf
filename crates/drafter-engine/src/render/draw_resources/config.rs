use anyhow::{ensure, Result};

use crate::geometry::{
    CAGES_PER_QUAD_BEZIER, CLIP_PROJECTION_SIZE, CONNECTOR_SIZE, CURVE_BOX_SIZE, LINE_POINT_SIZE,
    QUAD_BEZIER_SIZE,
};

/// Upper bound on main-object indices the shaders can address.
pub const MAX_INDEXABLE_MAIN_OBJECTS: u32 = (1 << 24) - 1;

/// Indices per cage (two triangles of a quad).
pub const INDICES_PER_CAGE: u32 = 6;

/// Capacities of the filler's regions.
///
/// Fixed at construction; overflow is handled by flushing, never by growing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawResourcesConfig {
    pub max_main_objects: u32,
    pub max_draw_objects: u32,
    /// Size of the cage index buffer. Bounds draw objects per batch to
    /// `max_indices / 6`.
    pub max_indices: u32,
    /// Geometry heap size in bytes.
    pub geometry_buffer_size: u64,
    pub max_line_styles: u32,
    /// Texture-array layers, which is also the texture cache capacity.
    pub max_textures: u32,
    /// Side length in texels of one texture-array layer.
    pub texture_extent: u32,
}

impl Default for DrawResourcesConfig {
    fn default() -> Self {
        Self {
            max_main_objects: 16 * 1024,
            max_draw_objects: 64 * 1024,
            max_indices: 64 * 1024 * INDICES_PER_CAGE,
            geometry_buffer_size: 8 * 1024 * 1024,
            max_line_styles: 1024,
            max_textures: 128,
            texture_extent: 32,
        }
    }
}

impl DrawResourcesConfig {
    pub fn set_max_main_objects(&mut self, n: u32) -> &mut Self {
        self.max_main_objects = n;
        self
    }

    /// Also resizes the index buffer to match.
    pub fn set_max_draw_objects(&mut self, n: u32) -> &mut Self {
        self.max_draw_objects = n;
        self.max_indices = n.saturating_mul(INDICES_PER_CAGE);
        self
    }

    pub fn set_max_indices(&mut self, n: u32) -> &mut Self {
        self.max_indices = n;
        self
    }

    pub fn set_geometry_buffer_size(&mut self, bytes: u64) -> &mut Self {
        self.geometry_buffer_size = bytes;
        self
    }

    pub fn set_max_line_styles(&mut self, n: u32) -> &mut Self {
        self.max_line_styles = n;
        self
    }

    pub fn set_max_textures(&mut self, n: u32) -> &mut Self {
        self.max_textures = n;
        self
    }

    /// Draw objects that fit one batch: the tighter of the object and index budgets.
    #[inline]
    pub fn cages_per_batch(&self) -> u32 {
        self.max_draw_objects.min(self.max_indices / INDICES_PER_CAGE)
    }

    /// Smallest heap that can hold one clip projection plus any single payload.
    pub fn min_geometry_buffer_size() -> u64 {
        let largest_payload = [2 * LINE_POINT_SIZE, QUAD_BEZIER_SIZE, CONNECTOR_SIZE, CURVE_BOX_SIZE]
            .into_iter()
            .max()
            .unwrap_or(0);
        CLIP_PROJECTION_SIZE + largest_payload
    }

    /// Rejects capacities under which a flush could fail to make room for a
    /// single element.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.max_main_objects > 0, "max_main_objects must be non-zero");
        ensure!(
            self.max_main_objects <= MAX_INDEXABLE_MAIN_OBJECTS,
            "max_main_objects {} exceeds indexable limit {}",
            self.max_main_objects,
            MAX_INDEXABLE_MAIN_OBJECTS
        );
        ensure!(self.max_line_styles > 0, "max_line_styles must be non-zero");
        ensure!(self.max_textures > 0, "max_textures must be non-zero");
        ensure!(self.texture_extent > 0, "texture_extent must be non-zero");
        ensure!(
            self.cages_per_batch() >= CAGES_PER_QUAD_BEZIER,
            "a batch must fit one quadratic bezier ({} cages), got {} (max_draw_objects {}, max_indices {})",
            CAGES_PER_QUAD_BEZIER,
            self.cages_per_batch(),
            self.max_draw_objects,
            self.max_indices
        );
        ensure!(
            self.geometry_buffer_size >= Self::min_geometry_buffer_size(),
            "geometry_buffer_size {} is below the minimum {}",
            self.geometry_buffer_size,
            Self::min_geometry_buffer_size()
        );
        Ok(())
    }
}

/// Index pattern for `cages` quads: `4i+1, 4i, 4i+2, 4i+1, 4i+2, 4i+3`.
pub fn cage_indices(cages: u32) -> Vec<u32> {
    let mut indices = Vec::with_capacity((cages * INDICES_PER_CAGE) as usize);
    for i in 0..cages {
        let base = i * 4;
        indices.extend_from_slice(&[base + 1, base, base + 2, base + 1, base + 2, base + 3]);
    }
    indices
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        DrawResourcesConfig::default().validate().unwrap();
    }

    #[test]
    fn set_max_draw_objects_keeps_index_budget_in_step() {
        let mut c = DrawResourcesConfig::default();
        c.set_max_draw_objects(4);
        assert_eq!(c.max_indices, 24);
        assert_eq!(c.cages_per_batch(), 4);
    }

    #[test]
    fn index_budget_can_be_the_tighter_limit() {
        let mut c = DrawResourcesConfig::default();
        c.set_max_draw_objects(100).set_max_indices(60);
        assert_eq!(c.cages_per_batch(), 10);
    }

    #[test]
    fn rejects_batches_smaller_than_one_bezier() {
        let mut c = DrawResourcesConfig::default();
        c.set_max_draw_objects(2);
        assert!(c.validate().is_err());
    }

    #[test]
    fn rejects_tiny_geometry_heap() {
        let mut c = DrawResourcesConfig::default();
        c.set_geometry_buffer_size(DrawResourcesConfig::min_geometry_buffer_size() - 1);
        assert!(c.validate().is_err());
    }

    #[test]
    fn rejects_zero_capacities() {
        let mut c = DrawResourcesConfig::default();
        c.set_max_line_styles(0);
        assert!(c.validate().is_err());

        let mut c = DrawResourcesConfig::default();
        c.set_max_main_objects(0);
        assert!(c.validate().is_err());
    }

    #[test]
    fn cage_indices_form_two_triangles_per_quad() {
        assert_eq!(cage_indices(2), vec![1, 0, 2, 1, 2, 3, 5, 4, 6, 5, 6, 7]);
    }
}
