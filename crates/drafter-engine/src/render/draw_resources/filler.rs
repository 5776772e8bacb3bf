use std::fmt;
use std::num::NonZeroUsize;

use anyhow::{ensure, Context, Result};

use crate::geometry::{
    ClipProjectionData, DrawObject, HatchSource, MainObject, PolylineSource, INVALID_TEXTURE_IDX,
};
use crate::style::{LineStyle, LineStyleInfo};

use super::backend::{
    DrawBackend, DrawBatch, DrawBufferKind, IntendedSubmit, LayerTransition, SubmitDrawsFn,
    TextureArrayDesc, TextureCopy, TextureRegion,
};
use super::clip::ClipProjectionStack;
use super::config::{cage_indices, DrawResourcesConfig, INDICES_PER_CAGE, MAX_INDEXABLE_MAIN_OBJECTS};
use super::decompose::{add_hatch_boxes, add_polyline_connectors, add_section_objects, CageBatch};
use super::region::RegionStates;
use super::staging::{GeometryArena, StagingArray};
use super::texture_cache::{TextureHash, TextureInsert, TextureLruCache, TextureSlotAllocator};

/// Why a batch was submitted early.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum FlushReason {
    LineStyles,
    MainObjects,
    ClipProjection,
    /// A shape did not fit the remaining cage budget.
    MidShape,
    TextureSlots,
    EndOfFrame,
}

impl fmt::Display for FlushReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FlushReason::LineStyles => "line styles full",
            FlushReason::MainObjects => "main objects full",
            FlushReason::ClipProjection => "no room for clip projection",
            FlushReason::MidShape => "cage batch full mid-shape",
            FlushReason::TextureSlots => "no reusable texture slot",
            FlushReason::EndOfFrame => "end of frame",
        };
        f.write_str(s)
    }
}

/// Streams vector primitives into fixed-size GPU buffers.
///
/// Each `draw_*` call interns a line style, allocates a main object and
/// decomposes the shape into cages. Whenever a region would overflow, pending
/// data is flushed, the submit callback runs, the region is reset and the
/// insertion resumes; callers only observe more frequent submissions.
///
/// Flush order is fixed: main objects, draw objects, geometry, line styles,
/// textures.
pub struct DrawResourcesFiller<B: DrawBackend> {
    backend: B,
    config: DrawResourcesConfig,

    main_objects: StagingArray<MainObject>,
    line_styles: StagingArray<LineStyle>,
    batch: CageBatch,
    clip_projections: ClipProjectionStack,

    texture_cache: TextureLruCache,
    texture_slots: TextureSlotAllocator,
    texture_copies: Vec<TextureCopy>,

    submit_draws: Option<SubmitDrawsFn<B>>,
    submissions: u64,
}

impl<B: DrawBackend> DrawResourcesFiller<B> {
    /// Validates `config` and creates every device resource through `backend`.
    pub fn new(mut backend: B, config: DrawResourcesConfig) -> Result<Self> {
        config.validate().context("invalid draw resources config")?;

        let cages = config.max_indices / INDICES_PER_CAGE;
        backend
            .create_index_buffer(&cage_indices(cages))
            .context("failed to create cage index buffer")?;

        let sizes = [
            (DrawBufferKind::MainObjects, config.max_main_objects as u64 * size_of::<MainObject>() as u64),
            (DrawBufferKind::DrawObjects, config.max_draw_objects as u64 * size_of::<DrawObject>() as u64),
            (DrawBufferKind::Geometry, config.geometry_buffer_size),
            (DrawBufferKind::LineStyles, config.max_line_styles as u64 * size_of::<LineStyle>() as u64),
        ];
        let mut geometry_address = 0;
        for (kind, size) in sizes {
            let address = backend
                .create_buffer(kind, size)
                .with_context(|| format!("failed to create {} buffer ({size} bytes)", kind.label()))?;
            if kind == DrawBufferKind::Geometry {
                geometry_address = address;
            }
        }

        backend
            .create_texture_array(TextureArrayDesc {
                layers: config.max_textures,
                extent: config.texture_extent,
            })
            .context("failed to create texture array")?;

        let texture_capacity = NonZeroUsize::new(config.max_textures as usize)
            .context("max_textures must be non-zero")?;

        log::debug!(
            "draw resources: {} main objects, {} draw objects, {} B geometry @ {:#x}, {} styles, {} textures",
            config.max_main_objects,
            config.max_draw_objects,
            config.geometry_buffer_size,
            geometry_address,
            config.max_line_styles,
            config.max_textures,
        );

        Ok(Self {
            main_objects: StagingArray::new(config.max_main_objects),
            line_styles: StagingArray::new(config.max_line_styles),
            batch: CageBatch::new(
                config.max_draw_objects,
                config.max_indices,
                GeometryArena::new(config.geometry_buffer_size, geometry_address),
            ),
            clip_projections: ClipProjectionStack::default(),
            texture_cache: TextureLruCache::new(texture_capacity),
            texture_slots: TextureSlotAllocator::new(config.max_textures),
            texture_copies: Vec::new(),
            submit_draws: None,
            submissions: 0,
            backend,
            config,
        })
    }

    /// Installs the callback run whenever accumulated work must execute.
    pub fn set_submit_draws_function(&mut self, submit: SubmitDrawsFn<B>) {
        self.submit_draws = Some(submit);
    }

    // ── accessors ─────────────────────────────────────────────────────────

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn config(&self) -> &DrawResourcesConfig {
        &self.config
    }

    /// Number of times the submit callback has run.
    pub fn submissions(&self) -> u64 {
        self.submissions
    }

    pub fn region_states(&self) -> RegionStates {
        RegionStates {
            main_objects: self.main_objects.state(),
            draw_objects: self.batch.draw_objects.state(),
            geometry: self.batch.geometry.state(),
            line_styles: self.line_styles.state(),
        }
    }

    pub fn main_object(&self, idx: u32) -> Option<&MainObject> {
        self.main_objects.get(idx)
    }

    pub fn draw_objects(&self) -> &[DrawObject] {
        self.batch.draw_objects.as_slice()
    }

    pub fn line_styles(&self) -> &[LineStyle] {
        self.line_styles.as_slice()
    }

    pub fn geometry_bytes(&self) -> &[u8] {
        self.batch.geometry.bytes()
    }

    pub fn pending_texture_copies(&self) -> &[TextureCopy] {
        &self.texture_copies
    }

    // ── clip projections ──────────────────────────────────────────────────

    pub fn push_clip_projection(&mut self, data: ClipProjectionData) {
        self.clip_projections.push(data);
    }

    /// No-op when the stack is empty.
    pub fn pop_clip_projection(&mut self) {
        self.clip_projections.pop();
    }

    pub fn clip_projection_depth(&self) -> usize {
        self.clip_projections.depth()
    }

    /// Device address of the top clip projection, writing it into the
    /// geometry heap if this epoch has not done so yet.
    pub fn acquire_current_clip_projection_address(
        &mut self,
        intended: &mut IntendedSubmit,
    ) -> Option<u64> {
        let data = *self.clip_projections.top()?;
        if let Some(address) = self.clip_projections.top_address() {
            return Some(address);
        }
        let address = self.add_clip_projection_submit_if_needed(&data, intended);
        self.clip_projections.set_top_address(address);
        Some(address)
    }

    fn add_clip_projection_submit_if_needed(
        &mut self,
        data: &ClipProjectionData,
        intended: &mut IntendedSubmit,
    ) -> u64 {
        if let Some(address) = self.batch.geometry.write(std::slice::from_ref(data)) {
            return address;
        }

        self.flush_and_submit(intended, FlushReason::ClipProjection);
        self.reset_geometry_counters();
        self.reset_main_object_counters();

        match self.batch.geometry.write(std::slice::from_ref(data)) {
            Some(address) => address,
            None => panic!("clip projection does not fit an empty geometry heap"),
        }
    }

    // ── interning ─────────────────────────────────────────────────────────

    fn try_add_line_style(&mut self, style: &LineStyle) -> Option<u32> {
        if let Some(i) = self.line_styles.as_slice().iter().position(|s| s.bitwise_eq(style)) {
            return Some(i as u32);
        }
        self.line_styles.try_push(*style)
    }

    /// Interns `style`, flushing and resetting every region when the style
    /// region is full.
    pub fn add_line_style_submit_if_needed(
        &mut self,
        style: &LineStyleInfo,
        intended: &mut IntendedSubmit,
    ) -> u32 {
        let gpu_style = style.to_gpu();
        if let Some(idx) = self.try_add_line_style(&gpu_style) {
            return idx;
        }

        // Main objects and their geometry index styles, so everything goes.
        self.flush_and_submit(intended, FlushReason::LineStyles);
        self.reset_geometry_counters();
        self.reset_main_object_counters();
        self.reset_line_style_counters();

        match self.try_add_line_style(&gpu_style) {
            Some(idx) => idx,
            None => panic!("line style does not fit an empty style region"),
        }
    }

    fn try_add_main_object(&mut self, main_object: MainObject) -> Option<u32> {
        if self.main_objects.len() >= MAX_INDEXABLE_MAIN_OBJECTS {
            return None;
        }
        self.main_objects.try_push(main_object)
    }

    /// Allocates a main object bound to the current clip projection.
    ///
    /// On overflow, geometry and main objects reset together (the clip
    /// projection lives in geometry); line styles survive.
    pub fn add_main_object_submit_if_needed(
        &mut self,
        style_idx: u32,
        intended: &mut IntendedSubmit,
    ) -> u32 {
        let clip = self.acquire_current_clip_projection_address(intended);
        if let Some(idx) = self.try_add_main_object(MainObject::new(style_idx, clip)) {
            return idx;
        }

        self.flush_and_submit(intended, FlushReason::MainObjects);
        self.reset_geometry_counters();
        self.reset_main_object_counters();

        let clip = self.acquire_current_clip_projection_address(intended);
        match self.try_add_main_object(MainObject::new(style_idx, clip)) {
            Some(idx) => idx,
            None => panic!("main object does not fit an empty main object region"),
        }
    }

    // ── drawing ───────────────────────────────────────────────────────────

    /// Draws `polyline` with `style`. Invisible styles are skipped.
    pub fn draw_polyline<P: PolylineSource + ?Sized>(
        &mut self,
        polyline: &P,
        style: &LineStyleInfo,
        intended: &mut IntendedSubmit,
    ) {
        if !style.is_visible() {
            log::trace!("skipping polyline with invisible style");
            return;
        }
        let style_idx = self.add_line_style_submit_if_needed(style, intended);
        let main_obj_idx = self.add_main_object_submit_if_needed(style_idx, intended);
        self.draw_polyline_with_main_object(polyline, main_obj_idx, intended);
    }

    /// Draws `polyline` against an already allocated main object.
    ///
    /// # Panics
    /// Panics if `main_obj_idx` is not live in the current batch.
    pub fn draw_polyline_with_main_object<P: PolylineSource + ?Sized>(
        &mut self,
        polyline: &P,
        main_obj_idx: u32,
        intended: &mut IntendedSubmit,
    ) {
        self.assert_live_main_object(main_obj_idx);

        for section_idx in 0..polyline.section_count() {
            let section = polyline.section_at(section_idx);
            self.stream_cages(section.count, main_obj_idx, intended, |batch, cursor| {
                add_section_objects(batch, polyline, &section, cursor, main_obj_idx)
            });
        }

        let connectors = polyline.connectors().len() as u32;
        self.stream_cages(connectors, main_obj_idx, intended, |batch, cursor| {
            add_polyline_connectors(batch, polyline, cursor, main_obj_idx)
        });
    }

    /// Fills `hatch` with `color`, optionally sampling a cached texture.
    ///
    /// A texture that is not resident is ignored.
    pub fn draw_hatch<H: HatchSource + ?Sized>(
        &mut self,
        hatch: &H,
        color: [f32; 4],
        texture: Option<TextureHash>,
        intended: &mut IntendedSubmit,
    ) {
        let texture_idx = match texture {
            Some(hash) => match self.texture_cache.get(hash, intended.next_signal_value()) {
                Some(r) => r.alloc_idx,
                None => {
                    log::debug!("hatch texture {hash:#x} is not cached; drawing untextured");
                    INVALID_TEXTURE_IDX
                }
            },
            None => INVALID_TEXTURE_IDX,
        };

        let style = LineStyleInfo::hatch_fill(color, texture_idx);
        let style_idx = self.add_line_style_submit_if_needed(&style, intended);
        let main_obj_idx = self.add_main_object_submit_if_needed(style_idx, intended);

        self.stream_cages(hatch.hatch_box_count(), main_obj_idx, intended, |batch, cursor| {
            add_hatch_boxes(batch, hatch, cursor, main_obj_idx)
        });

        // The last cages may sit in a later submission than the first.
        if let Some(hash) = texture {
            self.texture_cache.get(hash, intended.next_signal_value());
        }
    }

    /// Background fill, then the textured foreground on top. Fully
    /// transparent layers are skipped.
    pub fn draw_hatch_two_tone<H: HatchSource + ?Sized>(
        &mut self,
        hatch: &H,
        foreground: [f32; 4],
        background: [f32; 4],
        texture: Option<TextureHash>,
        intended: &mut IntendedSubmit,
    ) {
        if background[3] > 0.0 {
            self.draw_hatch(hatch, background, None, intended);
        }
        if foreground[3] > 0.0 {
            self.draw_hatch(hatch, foreground, texture, intended);
        }
    }

    /// Runs `step` until `total` elements are uploaded, flushing whenever a
    /// pass stops short.
    fn stream_cages<F>(
        &mut self,
        total: u32,
        main_obj_idx: u32,
        intended: &mut IntendedSubmit,
        mut step: F,
    ) where
        F: FnMut(&mut CageBatch, u32) -> u32,
    {
        let mut cursor = 0;
        let mut after_reset = false;
        while cursor < total {
            let next = step(&mut self.batch, cursor);
            assert!(
                !(after_reset && next == cursor),
                "empty cage batch cannot hold element {cursor} of {total}"
            );
            cursor = next;
            if cursor < total {
                self.submit_current_objects_and_reset(intended, main_obj_idx);
                after_reset = true;
            }
        }
    }

    fn assert_live_main_object(&self, main_obj_idx: u32) {
        assert!(
            main_obj_idx < self.main_objects.len(),
            "main object {main_obj_idx} is not live ({} allocated this batch)",
            self.main_objects.len()
        );
    }

    // ── textures ──────────────────────────────────────────────────────────

    /// Returns the texture-array slot holding `hash`, queueing an upload of
    /// `bytes` on a cache miss.
    ///
    /// Fails without touching the cache when `region` does not fit one array
    /// layer or `bytes` is too short for it.
    pub fn add_texture(
        &mut self,
        bytes: &[u8],
        region: TextureRegion,
        hash: TextureHash,
        intended: &mut IntendedSubmit,
    ) -> Result<u32> {
        let extent = self.config.texture_extent;
        ensure!(
            region.width > 0 && region.height > 0,
            "texture {hash:#x} has an empty {}x{} region",
            region.width,
            region.height
        );
        ensure!(
            region.width <= extent && region.height <= extent,
            "texture {hash:#x} region {}x{} exceeds the {extent}x{extent} layer",
            region.width,
            region.height
        );
        ensure!(
            region.bytes_per_row >= region.width * 4,
            "texture {hash:#x} rows of {} bytes cannot hold {} RGBA8 texels",
            region.bytes_per_row,
            region.width
        );
        ensure!(
            bytes.len() >= region.byte_len(),
            "texture {hash:#x} has {} bytes, region needs {}",
            bytes.len(),
            region.byte_len()
        );

        let evicted = match self.texture_cache.insert(hash, intended.next_signal_value()) {
            TextureInsert::Hit(hit) => return Ok(hit.alloc_idx),
            TextureInsert::Miss { evicted } => evicted,
        };

        if let Some(evicted) = evicted {
            log::trace!(
                "evicting texture {:#x} from slot {} (reusable after {})",
                evicted.hash,
                evicted.slot,
                evicted.last_used_signal_value
            );
            self.texture_slots
                .deferred_free(evicted.slot, evicted.last_used_signal_value);
        }

        let slot = self.allocate_texture_slot(intended);
        self.texture_cache.assign_slot(hash, slot);
        // A flush may have happened while allocating; the upload belongs to
        // the submission that is pending now.
        self.texture_cache.get(hash, intended.next_signal_value());

        self.texture_copies.push(TextureCopy {
            bytes: bytes[..region.byte_len()].to_vec(),
            region,
            layer: slot,
        });
        Ok(slot)
    }

    fn allocate_texture_slot(&mut self, intended: &mut IntendedSubmit) -> u32 {
        if let Some(slot) = self.texture_slots.allocate(self.backend.completed_signal_value()) {
            return slot;
        }

        let Some(wait) = self.texture_slots.earliest_wait() else {
            panic!("texture array exhausted with no slot pending release");
        };
        if wait >= intended.next_signal_value() {
            // The slot is still referenced by unsubmitted work.
            self.flush_and_submit(intended, FlushReason::TextureSlots);
            self.reset_geometry_counters();
            self.reset_main_object_counters();
        }
        self.backend.wait_for_signal_value(wait);

        match self.texture_slots.allocate(self.backend.completed_signal_value()) {
            Some(slot) => slot,
            None => panic!("texture slot still busy after waiting for signal {wait}"),
        }
    }

    fn finalize_texture_copies(&mut self) {
        if self.texture_copies.is_empty() {
            return;
        }
        let layers: Vec<u32> = self.texture_copies.iter().map(|c| c.layer).collect();

        self.backend
            .transition_texture_layers(&layers, LayerTransition::ToTransferDst);
        for copy in &self.texture_copies {
            log::trace!("uploading texture into layer {}", copy.layer);
            self.backend.upload_texture_region(copy);
        }
        self.backend
            .transition_texture_layers(&layers, LayerTransition::ToShaderRead);

        self.texture_copies.clear();
    }

    // ── flush / submit ────────────────────────────────────────────────────

    /// Uploads every pending delta, then queued textures.
    pub fn finalize_all_copies_to_gpu(&mut self) {
        if let Some((offset, bytes)) = self.main_objects.pending_upload() {
            log::trace!("upload main objects [{offset}, +{})", bytes.len());
            self.backend
                .upload_range(DrawBufferKind::MainObjects, offset, bytes);
        }
        self.main_objects.mark_flushed();

        if let Some((offset, bytes)) = self.batch.draw_objects.pending_upload() {
            log::trace!("upload draw objects [{offset}, +{})", bytes.len());
            self.backend
                .upload_range(DrawBufferKind::DrawObjects, offset, bytes);
        }
        self.batch.draw_objects.mark_flushed();

        if let Some((offset, bytes)) = self.batch.geometry.pending_upload() {
            log::trace!("upload geometry [{offset}, +{})", bytes.len());
            self.backend.upload_range(DrawBufferKind::Geometry, offset, bytes);
        }
        self.batch.geometry.mark_flushed();

        if let Some((offset, bytes)) = self.line_styles.pending_upload() {
            log::trace!("upload line styles [{offset}, +{})", bytes.len());
            self.backend
                .upload_range(DrawBufferKind::LineStyles, offset, bytes);
        }
        self.line_styles.mark_flushed();

        self.finalize_texture_copies();
    }

    fn flush_and_submit(&mut self, intended: &mut IntendedSubmit, reason: FlushReason) {
        self.finalize_all_copies_to_gpu();

        let batch = DrawBatch {
            draw_object_count: self.batch.draw_objects.len(),
            main_object_count: self.main_objects.len(),
            line_style_count: self.line_styles.len(),
            geometry_bytes: self.batch.geometry.state().current,
            signal_value: intended.next_signal_value(),
        };
        log::debug!(
            "submitting draw batch #{} ({reason}): {} cages, {} main objects, {} styles, {} B geometry",
            batch.signal_value,
            batch.draw_object_count,
            batch.main_object_count,
            batch.line_style_count,
            batch.geometry_bytes,
        );

        match self.submit_draws.as_mut() {
            Some(submit) => submit(&mut self.backend, intended, batch),
            None => log::warn!("no submit function installed; batch #{} dropped", batch.signal_value),
        }
        self.submissions += 1;
        intended.advance();
    }

    /// Flushes, submits, and resets the cage batch so `main_obj_idx` can keep
    /// streaming. Main objects and styles stay resident; if the clip projection
    /// lands at a new address, that main object is patched and re-uploaded.
    pub fn submit_current_objects_and_reset(
        &mut self,
        intended: &mut IntendedSubmit,
        main_obj_idx: u32,
    ) {
        self.flush_and_submit(intended, FlushReason::MidShape);
        self.reset_geometry_counters();

        let Some(address) = self.acquire_current_clip_projection_address(intended) else {
            return;
        };
        let Some(main_object) = self.main_objects.get_mut(main_obj_idx) else {
            return;
        };
        if main_object.clip_projection_address != address {
            main_object.clip_projection_address = address;
            self.main_objects.rewind_in_memory(main_obj_idx);
        }
    }

    /// End-of-frame submission: flush, submit and reset every region.
    pub fn submit_frame(&mut self, intended: &mut IntendedSubmit) {
        self.flush_and_submit(intended, FlushReason::EndOfFrame);
        self.reset_geometry_counters();
        self.reset_main_object_counters();
        self.reset_line_style_counters();
    }

    /// Resets draw objects and the geometry heap, invalidating cached clip
    /// projection addresses.
    pub fn reset_geometry_counters(&mut self) {
        self.batch.reset();
        self.clip_projections.invalidate_addresses();
    }

    pub fn reset_main_object_counters(&mut self) {
        self.main_objects.reset();
    }

    pub fn reset_line_style_counters(&mut self) {
        self.line_styles.reset();
    }
}
