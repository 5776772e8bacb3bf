use anyhow::Result;

use super::config::INDICES_PER_CAGE;

/// Device buffers owned by the filler's backend, in flush order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DrawBufferKind {
    MainObjects,
    DrawObjects,
    Geometry,
    LineStyles,
}

impl DrawBufferKind {
    pub const ALL: [DrawBufferKind; 4] = [
        DrawBufferKind::MainObjects,
        DrawBufferKind::DrawObjects,
        DrawBufferKind::Geometry,
        DrawBufferKind::LineStyles,
    ];

    pub fn label(self) -> &'static str {
        match self {
            DrawBufferKind::MainObjects => "main objects",
            DrawBufferKind::DrawObjects => "draw objects",
            DrawBufferKind::Geometry => "geometry",
            DrawBufferKind::LineStyles => "line styles",
        }
    }
}

/// Texture array backing the texture cache: `layers` square RGBA8 layers.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TextureArrayDesc {
    pub layers: u32,
    pub extent: u32,
}

/// Layout transition applied to a batch of texture-array layers.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LayerTransition {
    /// Undefined / shader-read → transfer destination.
    ToTransferDst,
    /// Transfer destination → shader read-only.
    ToShaderRead,
}

/// Source sub-rectangle and its row pitch inside [`TextureCopy::bytes`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TextureRegion {
    pub width: u32,
    pub height: u32,
    pub bytes_per_row: u32,
}

impl TextureRegion {
    /// Tightly packed RGBA8 region.
    pub const fn rgba8(width: u32, height: u32) -> Self {
        Self { width, height, bytes_per_row: width * 4 }
    }

    pub const fn byte_len(&self) -> usize {
        (self.bytes_per_row * self.height) as usize
    }
}

/// Queued upload of one texture into one array layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureCopy {
    pub bytes: Vec<u8>,
    pub region: TextureRegion,
    pub layer: u32,
}

/// Collaborators the filler needs from the device layer.
///
/// Creation calls happen once, in `DrawResourcesFiller::new`; failures are fatal.
/// Uploads are fire-and-forget: they only have to be visible to the next
/// submission.
pub trait DrawBackend {
    /// Creates the device buffer for `kind` and returns its base device address.
    fn create_buffer(&mut self, kind: DrawBufferKind, size: u64) -> Result<u64>;

    /// Creates the immutable cage index buffer.
    fn create_index_buffer(&mut self, indices: &[u32]) -> Result<()>;

    fn create_texture_array(&mut self, desc: TextureArrayDesc) -> Result<()>;

    /// Copies `bytes` into `kind` at `byte_offset`.
    fn upload_range(&mut self, kind: DrawBufferKind, byte_offset: u64, bytes: &[u8]);

    /// One batched barrier covering every listed layer.
    fn transition_texture_layers(&mut self, layers: &[u32], transition: LayerTransition);

    fn upload_texture_region(&mut self, copy: &TextureCopy);

    /// Highest submission value the GPU is known to have finished.
    fn completed_signal_value(&self) -> u64;

    /// Blocks until `value` has been signalled.
    fn wait_for_signal_value(&mut self, value: u64);
}

/// The submission being accumulated.
///
/// `next_signal_value` is the value the completion semaphore will reach once
/// that submission finishes; resources touched now are safe to reuse after it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct IntendedSubmit {
    next_signal_value: u64,
}

impl IntendedSubmit {
    /// `completed` is the last value already signalled (0 before any submission).
    pub const fn new(completed: u64) -> Self {
        Self { next_signal_value: completed + 1 }
    }

    #[inline]
    pub const fn next_signal_value(&self) -> u64 {
        self.next_signal_value
    }

    /// Moves on to the following submission.
    #[inline]
    pub fn advance(&mut self) {
        self.next_signal_value += 1;
    }
}

impl Default for IntendedSubmit {
    fn default() -> Self {
        Self::new(0)
    }
}

/// What the submit callback has to draw: `draw_object_count` cages starting at
/// index 0, i.e. `draw_object_count * INDICES_PER_CAGE` indices.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DrawBatch {
    pub draw_object_count: u32,
    pub main_object_count: u32,
    pub line_style_count: u32,
    pub geometry_bytes: u64,
    pub signal_value: u64,
}

impl DrawBatch {
    #[inline]
    pub fn index_count(&self) -> u32 {
        self.draw_object_count * INDICES_PER_CAGE
    }
}

/// Invoked whenever accumulated work has to run before buffers can be reused.
pub type SubmitDrawsFn<B> = Box<dyn FnMut(&mut B, &IntendedSubmit, DrawBatch)>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_index_count_covers_every_cage() {
        let batch = DrawBatch {
            draw_object_count: 5,
            main_object_count: 1,
            line_style_count: 1,
            geometry_bytes: 0,
            signal_value: 1,
        };
        assert_eq!(batch.index_count(), 5 * INDICES_PER_CAGE);
        assert_eq!(super::super::config::cage_indices(5).len() as u32, batch.index_count());
    }
}
