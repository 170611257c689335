use anyhow::Result;

use super::descriptors::{BindingsDescriptor, RenderPipelineDescriptor};
use super::handles::{InputLayoutHandle, InputStateHandle};

/// The slice of a graphics device the instance system needs.
///
/// Object creation may be asynchronous on the backend side (shader
/// compilation in flight); callers poll [`query_pipeline_ready`] instead of
/// waiting.
///
/// [`query_pipeline_ready`]: GfxDevice::query_pipeline_ready
pub trait GfxDevice {
    /// Device-side pipeline object. Cloning must be cheap (a handle or `Arc`).
    type RenderPipeline: Clone;
    /// Device-side binding set object. Cloning must be cheap.
    type Bindings: Clone;

    fn create_render_pipeline(
        &mut self,
        descriptor: &RenderPipelineDescriptor,
    ) -> Result<Self::RenderPipeline>;

    /// `false` while the pipeline cannot be used yet.
    fn query_pipeline_ready(&self, pipeline: &Self::RenderPipeline) -> bool;

    fn create_bindings(&mut self, descriptor: &BindingsDescriptor) -> Result<Self::Bindings>;

    /// Input layout an input state was created against.
    fn input_layout_for_state(&self, state: InputStateHandle) -> Option<InputLayoutHandle>;

    fn destroy_render_pipeline(&mut self, pipeline: Self::RenderPipeline);

    fn destroy_bindings(&mut self, bindings: Self::Bindings);
}

/// An open render pass on device `D`.
pub trait RenderPass<D: GfxDevice + ?Sized> {
    fn set_pipeline(&mut self, pipeline: &D::RenderPipeline);

    fn set_input_state(&mut self, state: Option<InputStateHandle>);

    /// `dynamic_byte_offsets` holds one offset per uniform buffer slot.
    fn set_bindings(&mut self, slot: u32, bindings: &D::Bindings, dynamic_byte_offsets: &[u32]);

    fn draw(&mut self, count: u32, start: u32);

    fn draw_indexed(&mut self, count: u32, start: u32);
}
