use anyhow::{Context, Result};

use super::GpuInit;

/// Owns wgpu core objects for offscreen work.
///
/// There is no surface; presentation is out of scope for this layer. Device
/// and queue are cheap handles and can be cloned into backends.
pub struct HeadlessGpu {
    /// wgpu instance used to create the adapter.
    instance: wgpu::Instance,

    /// Selected adapter.
    adapter: wgpu::Adapter,

    /// Logical device.
    device: wgpu::Device,

    /// Command queue.
    queue: wgpu::Queue,
}

impl HeadlessGpu {
    /// Creates a GPU context without a window.
    ///
    /// Adapter/device acquisition is asynchronous under wgpu.
    pub async fn new(init: GpuInit) -> Result<Self> {
        let GpuInit {
            backends,
            power_preference,
            force_fallback_adapter,
            required_features,
            required_limits,
        } = init;

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference,
                compatible_surface: None,
                force_fallback_adapter,
            })
            .await
            .context("failed to find a suitable GPU adapter")?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("drafter-engine device"),
                required_features,
                required_limits,
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to create wgpu device/queue")?;

        let info = adapter.get_info();
        log::info!("using adapter {:?} ({:?})", info.name, info.backend);

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
        })
    }

    /// Blocking variant of [`HeadlessGpu::new`].
    pub fn new_blocking(init: GpuInit) -> Result<Self> {
        pollster::block_on(Self::new(init))
    }

    pub fn instance(&self) -> &wgpu::Instance {
        &self.instance
    }

    pub fn adapter(&self) -> &wgpu::Adapter {
        &self.adapter
    }

    /// Returns a reference to the logical device.
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Returns a reference to the command queue.
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }
}
