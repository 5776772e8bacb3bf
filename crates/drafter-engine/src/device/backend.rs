use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{ensure, Result};
use wgpu::util::DeviceExt;

use crate::render::draw_resources::{
    DrawBackend, DrawBufferKind, LayerTransition, TextureArrayDesc, TextureCopy,
};

use super::HeadlessGpu;

const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

fn buffer_slot(kind: DrawBufferKind) -> usize {
    match kind {
        DrawBufferKind::MainObjects => 0,
        DrawBufferKind::DrawObjects => 1,
        DrawBufferKind::Geometry => 2,
        DrawBufferKind::LineStyles => 3,
    }
}

/// [`DrawBackend`] over wgpu storage buffers and a 2D texture array.
///
/// wgpu exposes no buffer device addresses, so every base address is 0 and
/// geometry addresses are byte offsets into the bound storage buffer.
///
/// Completion is tracked per [`submit`](Self::submit): the signal value passed
/// there is published once the queue reports the work done.
pub struct WgpuDrawBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    buffers: [Option<wgpu::Buffer>; 4],
    index_buffer: Option<wgpu::Buffer>,
    texture: Option<wgpu::Texture>,
    texture_view: Option<wgpu::TextureView>,
    completed: Arc<AtomicU64>,
    last_submitted: u64,
}

impl WgpuDrawBackend {
    pub fn new(gpu: &HeadlessGpu) -> Self {
        Self {
            device: gpu.device().clone(),
            queue: gpu.queue().clone(),
            buffers: Default::default(),
            index_buffer: None,
            texture: None,
            texture_view: None,
            completed: Arc::new(AtomicU64::new(0)),
            last_submitted: 0,
        }
    }

    pub fn buffer(&self, kind: DrawBufferKind) -> Option<&wgpu::Buffer> {
        self.buffers[buffer_slot(kind)].as_ref()
    }

    pub fn index_buffer(&self) -> Option<&wgpu::Buffer> {
        self.index_buffer.as_ref()
    }

    /// `D2Array` view over every texture-array layer.
    pub fn texture_view(&self) -> Option<&wgpu::TextureView> {
        self.texture_view.as_ref()
    }

    /// Submits `commands` (plus every pending buffer/texture write) and arms
    /// completion tracking for `signal_value`.
    pub fn submit(&mut self, signal_value: u64, commands: Option<wgpu::CommandBuffer>) {
        let commands = commands.unwrap_or_else(|| {
            self.device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("drafter upload flush"),
                })
                .finish()
        });
        self.queue.submit(Some(commands));

        let completed = Arc::clone(&self.completed);
        self.queue.on_submitted_work_done(move || {
            completed.fetch_max(signal_value, Ordering::AcqRel);
        });
        self.last_submitted = self.last_submitted.max(signal_value);
        log::trace!("submitted work for signal {signal_value}");
    }

    /// Non-blocking: processes finished submissions.
    pub fn poll(&self) {
        if let Err(err) = self.device.poll(wgpu::PollType::Poll) {
            log::warn!("device poll failed: {err}");
        }
    }

    fn create_storage_buffer(&self, kind: DrawBufferKind, size: u64) -> wgpu::Buffer {
        self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(kind.label()),
            size: size.next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }
}

impl DrawBackend for WgpuDrawBackend {
    fn create_buffer(&mut self, kind: DrawBufferKind, size: u64) -> Result<u64> {
        ensure!(size > 0, "{} buffer must not be empty", kind.label());
        let max = self.device.limits().max_storage_buffer_binding_size as u64;
        ensure!(
            size <= max,
            "{} buffer of {size} bytes exceeds the storage binding limit {max}",
            kind.label()
        );

        let buffer = self.create_storage_buffer(kind, size);
        self.buffers[buffer_slot(kind)] = Some(buffer);
        Ok(0)
    }

    fn create_index_buffer(&mut self, indices: &[u32]) -> Result<()> {
        ensure!(!indices.is_empty(), "index buffer must not be empty");
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("cage indices"),
                contents: bytemuck::cast_slice(indices),
                usage: wgpu::BufferUsages::INDEX,
            });
        self.index_buffer = Some(buffer);
        Ok(())
    }

    fn create_texture_array(&mut self, desc: TextureArrayDesc) -> Result<()> {
        let limits = self.device.limits();
        ensure!(
            desc.layers <= limits.max_texture_array_layers,
            "{} texture layers exceed the device limit {}",
            desc.layers,
            limits.max_texture_array_layers
        );
        ensure!(
            desc.extent <= limits.max_texture_dimension_2d,
            "texture extent {} exceeds the device limit {}",
            desc.extent,
            limits.max_texture_dimension_2d
        );

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("hatch textures"),
            size: wgpu::Extent3d {
                width: desc.extent,
                height: desc.extent,
                depth_or_array_layers: desc.layers,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TEXTURE_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("hatch textures view"),
            dimension: Some(wgpu::TextureViewDimension::D2Array),
            ..Default::default()
        });

        self.texture = Some(texture);
        self.texture_view = Some(view);
        Ok(())
    }

    fn upload_range(&mut self, kind: DrawBufferKind, byte_offset: u64, bytes: &[u8]) {
        let Some(buffer) = self.buffers[buffer_slot(kind)].as_ref() else {
            log::error!("upload to {} before its buffer exists", kind.label());
            return;
        };
        self.queue.write_buffer(buffer, byte_offset, bytes);
    }

    // wgpu tracks texture usage itself; the batch boundaries are kept for logs.
    fn transition_texture_layers(&mut self, layers: &[u32], transition: LayerTransition) {
        log::trace!("{} texture layers -> {transition:?}", layers.len());
    }

    fn upload_texture_region(&mut self, copy: &TextureCopy) {
        let Some(texture) = self.texture.as_ref() else {
            log::error!("texture upload before the texture array exists");
            return;
        };
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d { x: 0, y: 0, z: copy.layer },
                aspect: wgpu::TextureAspect::All,
            },
            &copy.bytes,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(copy.region.bytes_per_row),
                rows_per_image: Some(copy.region.height),
            },
            wgpu::Extent3d {
                width: copy.region.width,
                height: copy.region.height,
                depth_or_array_layers: 1,
            },
        );
    }

    fn completed_signal_value(&self) -> u64 {
        self.completed.load(Ordering::Acquire)
    }

    fn wait_for_signal_value(&mut self, value: u64) {
        if self.completed_signal_value() >= value {
            return;
        }
        if value > self.last_submitted {
            log::error!(
                "waiting for signal {value} that was never submitted (last {})",
                self.last_submitted
            );
            return;
        }
        if let Err(err) = self.device.poll(wgpu::PollType::wait_indefinitely()) {
            log::error!("device poll failed while waiting for signal {value}: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::GpuInit;
    use crate::geometry::Polyline;
    use crate::render::draw_resources::{
        DrawBatch, DrawResourcesConfig, DrawResourcesFiller, IntendedSubmit, TextureRegion,
    };
    use crate::style::LineStyleInfo;

    #[test]
    #[ignore = "requires a GPU adapter"]
    fn streams_a_frame_through_wgpu() {
        let gpu = HeadlessGpu::new_blocking(GpuInit {
            force_fallback_adapter: true,
            ..Default::default()
        })
        .expect("gpu");

        let mut config = DrawResourcesConfig::default();
        config
            .set_max_draw_objects(8)
            .set_geometry_buffer_size(64 * 1024)
            .set_max_textures(2);
        let mut filler = DrawResourcesFiller::new(WgpuDrawBackend::new(&gpu), config).expect("filler");
        filler.set_submit_draws_function(Box::new(
            |backend: &mut WgpuDrawBackend, _: &IntendedSubmit, batch: DrawBatch| {
                backend.submit(batch.signal_value, None);
            },
        ));

        let mut intended = IntendedSubmit::default();
        let region = TextureRegion::rgba8(4, 4);
        filler
            .add_texture(&vec![255u8; region.byte_len()], region, 1, &mut intended)
            .expect("texture");

        let pts: Vec<[f64; 2]> = (0..20).map(|i| [i as f64, 0.0]).collect();
        let mut line = Polyline::new();
        line.add_line_strip(&pts);
        filler.draw_polyline(&line, &LineStyleInfo::solid([1.0; 4], 1.0), &mut intended);
        filler.submit_frame(&mut intended);

        let last = intended.next_signal_value() - 1;
        filler.backend_mut().wait_for_signal_value(last);
        assert!(filler.backend().completed_signal_value() >= last);
        assert!(filler.backend().texture_view().is_some());
    }
}
