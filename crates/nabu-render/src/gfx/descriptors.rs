//! Hashable descriptors handed to the device through the render cache.

use super::handles::{
    BufferHandle, InputLayoutHandle, ProgramHandle, SamplerHandle, TextureHandle,
};
use super::megastate::MegaStateDescriptor;

/// Slot counts of the single binding set a pipeline consumes.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct BindingLayout {
    pub num_uniform_buffers: usize,
    pub num_samplers: usize,
}

impl BindingLayout {
    #[inline]
    pub const fn new(num_uniform_buffers: usize, num_samplers: usize) -> Self {
        Self {
            num_uniform_buffers,
            num_samplers,
        }
    }
}

/// One uniform buffer slot.
///
/// The word offset is not part of the binding: it is passed as a dynamic
/// offset at draw time, so instances that differ only by offset share one
/// device bindings object.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct UniformBufferBinding {
    /// Set from the dynamic uniform buffer when the instance is submitted.
    pub buffer: Option<BufferHandle>,
    pub word_count: u32,
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct SamplerBinding {
    pub sampler: Option<SamplerHandle>,
    pub texture: Option<TextureHandle>,
}

/// Texture + sampler pair as produced by material/texture loading code.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct TextureMapping {
    pub texture: Option<TextureHandle>,
    pub sampler: Option<SamplerHandle>,
}

impl From<&TextureMapping> for SamplerBinding {
    #[inline]
    fn from(m: &TextureMapping) -> Self {
        Self {
            sampler: m.sampler,
            texture: m.texture,
        }
    }
}

/// Contents of one binding set.
#[derive(Debug, Clone, Default, Eq, PartialEq, Hash)]
pub struct BindingsDescriptor {
    pub layout: BindingLayout,
    pub uniform_buffers: Vec<UniformBufferBinding>,
    pub samplers: Vec<SamplerBinding>,
}

/// Everything needed to create or look up a render pipeline.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct RenderPipelineDescriptor {
    pub program: Option<ProgramHandle>,
    pub input_layout: Option<InputLayoutHandle>,
    pub topology: wgpu::PrimitiveTopology,
    pub mega_state: MegaStateDescriptor,
    pub binding_layout: BindingLayout,
}

impl Default for RenderPipelineDescriptor {
    fn default() -> Self {
        Self {
            program: None,
            input_layout: None,
            topology: wgpu::PrimitiveTopology::TriangleList,
            mega_state: MegaStateDescriptor::default(),
            binding_layout: BindingLayout::default(),
        }
    }
}
