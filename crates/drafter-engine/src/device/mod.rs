//! GPU device management.
//!
//! This module is responsible for:
//! - creating the wgpu Instance/Adapter/Device/Queue without a surface
//! - implementing [`DrawBackend`](crate::render::draw_resources::DrawBackend)
//!   over wgpu buffers and a texture array

mod backend;
mod gpu;
mod init;

pub use backend::WgpuDrawBackend;
pub use gpu::HeadlessGpu;
pub use init::GpuInit;
