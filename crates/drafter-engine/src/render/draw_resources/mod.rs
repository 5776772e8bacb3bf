//! Streaming draw-resource batching.
//!
//! [`DrawResourcesFiller`] packs polylines, hatches and their styles into
//! fixed-capacity GPU buffers, flushing and invoking the submit callback
//! whenever a region would overflow. Device work goes through [`DrawBackend`].

mod backend;
mod clip;
mod config;
mod decompose;
mod filler;
mod region;
mod staging;
mod texture_cache;

pub use backend::{
    DrawBackend, DrawBatch, DrawBufferKind, IntendedSubmit, LayerTransition, SubmitDrawsFn,
    TextureArrayDesc, TextureCopy, TextureRegion,
};
pub use config::{cage_indices, DrawResourcesConfig, INDICES_PER_CAGE, MAX_INDEXABLE_MAIN_OBJECTS};
pub use filler::DrawResourcesFiller;
pub use region::{RegionState, RegionStates};
pub use texture_cache::{
    EvictionRequest, TextureHash, TextureInsert, TextureLruCache, TextureReference,
};
