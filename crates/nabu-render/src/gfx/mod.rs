//! Graphics collaborators of the instance system.
//!
//! This module is responsible for:
//! - typed handles for device-owned objects
//! - hashable pipeline/bindings descriptors and mega-state helpers
//! - the device and render pass contracts (`GfxDevice`, `RenderPass`)
//! - the dynamic uniform buffer contract and a CPU-side arena
//! - the pipeline/bindings cache
//! - a headless recording device

mod cache;
mod descriptors;
mod device;
mod handles;
pub mod headless;
mod megastate;
mod uniform;

pub use cache::RenderCache;
pub use descriptors::{
    BindingLayout, BindingsDescriptor, RenderPipelineDescriptor, SamplerBinding, TextureMapping,
    UniformBufferBinding,
};
pub use device::{GfxDevice, RenderPass};
pub use handles::{
    BufferHandle, InputLayoutHandle, InputStateHandle, ProgramHandle, SamplerHandle,
    TextureHandle,
};
pub use megastate::{
    additive_blend, make_mega_state, premultiplied_alpha_blend, set_mega_state_flags,
    MegaStateDescriptor, MegaStatePatch,
};
pub use uniform::{DynamicUniformBuffer, UniformArena, DEFAULT_ALIGNMENT_WORDS};
