use crate::gfx::{
    set_mega_state_flags, BindingLayout, BindingsDescriptor, DynamicUniformBuffer, GfxDevice,
    InputLayoutHandle, InputStateHandle, MegaStateDescriptor, MegaStatePatch, ProgramHandle,
    RenderCache, RenderPass, RenderPipelineDescriptor, SamplerBinding, TextureMapping,
    UniformBufferBinding,
};

use super::InstanceFlags;

/// Upper bound on uniform buffer slots per instance.
///
/// A binding layout must declare strictly fewer uniform buffers than this.
pub const MAX_UNIFORM_BUFFERS: usize = 4;

/// Result of [`RenderInstance::submit`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SubmitOutcome {
    Drawn,
    /// Pipeline exists but is not usable yet; the draw is dropped this frame.
    PipelineNotReady,
    /// The device refused to create the pipeline or bindings.
    CreationFailed,
}

/// Complete state for one draw call.
///
/// Instances live in an [`InstancePool`](super::InstancePool) and are reused
/// across frames. Everything is held by value; GPU objects are referenced by
/// handle only and are never released by the instance.
#[derive(Debug, Clone, Default)]
pub struct RenderInstance {
    pub(crate) sort_key: u32,
    pub(crate) flags: InstanceFlags,
    pub(crate) parent_template: Option<usize>,

    pipeline: RenderPipelineDescriptor,
    input_state: Option<InputStateHandle>,
    bindings: BindingsDescriptor,
    dynamic_uniform_offsets: [u32; MAX_UNIFORM_BUFFERS],

    draw_start: u32,
    draw_count: u32,

    /// Declared prefix of `bindings`, rebuilt on every submit.
    submitted_bindings: BindingsDescriptor,
}

impl RenderInstance {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every field to its blank value. Binding storage is kept.
    pub fn reset(&mut self) {
        self.sort_key = 0;
        self.flags = InstanceFlags::empty();
        self.parent_template = None;
        self.pipeline = RenderPipelineDescriptor::default();
        self.input_state = None;
        self.bindings.layout = BindingLayout::default();
        self.bindings.uniform_buffers.clear();
        self.bindings.samplers.clear();
        self.dynamic_uniform_offsets = [0; MAX_UNIFORM_BUFFERS];
        self.draw_start = 0;
        self.draw_count = 0;
    }

    /// Inherits pipeline state, input state, binding layout, sampler bindings
    /// and uniform word counts from `template`.
    ///
    /// Uniform word offsets are not inherited: allocate fresh ones with
    /// [`allocate_uniform_buffer`](Self::allocate_uniform_buffer) or share the
    /// template's with [`copy_uniform_buffer_binding`](Self::copy_uniform_buffer_binding).
    pub fn copy_from(&mut self, template: &RenderInstance) {
        self.pipeline = template.pipeline;
        self.input_state = template.input_state;
        self.sort_key = template.sort_key;
        self.draw_start = template.draw_start;
        self.draw_count = template.draw_count;
        self.flags.set(
            InstanceFlags::DRAW_INDEXED,
            template.flags.contains(InstanceFlags::DRAW_INDEXED),
        );

        let layout = template.bindings.layout;
        self.set_binding_layout(layout);

        self.bindings.samplers[..layout.num_samplers]
            .copy_from_slice(&template.bindings.samplers[..layout.num_samplers]);

        for (dst, src) in self.bindings.uniform_buffers[..layout.num_uniform_buffers]
            .iter_mut()
            .zip(&template.bindings.uniform_buffers)
        {
            dst.word_count = src.word_count;
        }
    }

    // ── identity / ordering ───────────────────────────────────────────────

    #[inline]
    pub fn sort_key(&self) -> u32 {
        self.sort_key
    }

    #[inline]
    pub fn set_sort_key(&mut self, sort_key: u32) {
        self.sort_key = sort_key;
    }

    #[inline]
    pub fn flags(&self) -> InstanceFlags {
        self.flags
    }

    /// `true` when the pool may hand this slot out again.
    #[inline]
    pub fn is_free(&self) -> bool {
        self.flags.is_empty()
    }

    #[inline]
    pub fn is_visible(&self) -> bool {
        self.flags.contains(InstanceFlags::VISIBLE)
    }

    /// Hidden instances stay allocated but are not submitted.
    #[inline]
    pub fn set_visible(&mut self, visible: bool) {
        debug_assert!(!self.is_free(), "set_visible on a free instance");
        self.flags.set(InstanceFlags::VISIBLE, visible);
    }

    /// Pool index of the template this instance was derived from.
    #[inline]
    pub fn parent_template(&self) -> Option<usize> {
        self.parent_template
    }

    // ── pipeline state ────────────────────────────────────────────────────

    #[inline]
    pub fn pipeline_descriptor(&self) -> &RenderPipelineDescriptor {
        &self.pipeline
    }

    #[inline]
    pub fn set_program(&mut self, program: ProgramHandle) {
        self.pipeline.program = Some(program);
    }

    pub fn set_input_layout_and_state(
        &mut self,
        layout: Option<InputLayoutHandle>,
        state: Option<InputStateHandle>,
    ) {
        self.pipeline.input_layout = layout;
        self.input_state = state;
    }

    /// Binds `state` and takes the input layout it was created against.
    pub fn set_input_state<D: GfxDevice>(&mut self, device: &D, state: InputStateHandle) {
        let layout = device.input_layout_for_state(state);
        if layout.is_none() {
            log::warn!("input state {} has no known input layout", state.id());
        }
        self.set_input_layout_and_state(layout, Some(state));
    }

    #[inline]
    pub fn input_state(&self) -> Option<InputStateHandle> {
        self.input_state
    }

    #[inline]
    pub fn set_primitive_topology(&mut self, topology: wgpu::PrimitiveTopology) {
        self.pipeline.topology = topology;
    }

    #[inline]
    pub fn mega_state(&self) -> &MegaStateDescriptor {
        &self.pipeline.mega_state
    }

    #[inline]
    pub fn mega_state_mut(&mut self) -> &mut MegaStateDescriptor {
        &mut self.pipeline.mega_state
    }

    pub fn set_mega_state_flags(&mut self, patch: &MegaStatePatch) {
        set_mega_state_flags(&mut self.pipeline.mega_state, patch);
    }

    // ── bindings ──────────────────────────────────────────────────────────

    #[inline]
    pub fn bindings(&self) -> &BindingsDescriptor {
        &self.bindings
    }

    #[inline]
    pub fn binding_layout(&self) -> BindingLayout {
        self.bindings.layout
    }

    /// Declares the slot counts of this instance's binding set.
    ///
    /// Binding storage grows to fit and never shrinks; new slots start blank.
    ///
    /// # Panics
    /// If `layout.num_uniform_buffers >= MAX_UNIFORM_BUFFERS`.
    pub fn set_binding_layout(&mut self, layout: BindingLayout) {
        assert!(
            layout.num_uniform_buffers < MAX_UNIFORM_BUFFERS,
            "binding layout declares {} uniform buffers; limit is below {}",
            layout.num_uniform_buffers,
            MAX_UNIFORM_BUFFERS
        );

        self.pipeline.binding_layout = layout;
        self.bindings.layout = layout;

        if self.bindings.uniform_buffers.len() < layout.num_uniform_buffers {
            self.bindings
                .uniform_buffers
                .resize(layout.num_uniform_buffers, UniformBufferBinding::default());
        }
        if self.bindings.samplers.len() < layout.num_samplers {
            self.bindings
                .samplers
                .resize(layout.num_samplers, SamplerBinding::default());
        }
    }

    /// Reserves `word_count` words for uniform slot `slot` and returns the
    /// word offset, ready for [`map_uniform_buffer_f32`](Self::map_uniform_buffer_f32).
    ///
    /// # Panics
    /// If `slot` is outside the declared binding layout.
    pub fn allocate_uniform_buffer<U: DynamicUniformBuffer + ?Sized>(
        &mut self,
        uniforms: &mut U,
        slot: usize,
        word_count: u32,
    ) -> u32 {
        assert!(
            slot < self.bindings.layout.num_uniform_buffers,
            "uniform slot {slot} outside binding layout ({} uniform buffers)",
            self.bindings.layout.num_uniform_buffers
        );

        let word_offset = uniforms.allocate_chunk(word_count);
        self.dynamic_uniform_offsets[slot] = word_offset;
        self.bindings.uniform_buffers[slot].word_count = word_count;
        word_offset
    }

    /// Writable view over the words allocated for `slot`.
    pub fn map_uniform_buffer_f32<'u, U: DynamicUniformBuffer + ?Sized>(
        &self,
        uniforms: &'u mut U,
        slot: usize,
    ) -> &'u mut [f32] {
        let word_count = self.bindings.uniform_buffers[slot].word_count;
        uniforms.map_buffer_f32(self.dynamic_uniform_offsets[slot], word_count)
    }

    /// Word offset currently used for uniform slot `slot`.
    #[inline]
    pub fn uniform_word_offset(&self, slot: usize) -> u32 {
        self.dynamic_uniform_offsets[slot]
    }

    /// Points `slot` at the region `source` allocated for the same slot.
    /// Only the offset changes; word count and other bindings stay as they are.
    pub fn copy_uniform_buffer_binding(&mut self, slot: usize, source: &RenderInstance) {
        self.dynamic_uniform_offsets[slot] = source.dynamic_uniform_offsets[slot];
    }

    /// Overwrites sampler slots `0..samplers.len()`.
    pub fn set_sampler_bindings(&mut self, samplers: &[SamplerBinding]) {
        self.check_sampler_count(samplers.len());
        self.bindings.samplers[..samplers.len()].copy_from_slice(samplers);
    }

    /// Overwrites sampler slots `0..mappings.len()`.
    pub fn set_sampler_bindings_from_texture_mappings(&mut self, mappings: &[TextureMapping]) {
        self.check_sampler_count(mappings.len());
        for (dst, m) in self.bindings.samplers.iter_mut().zip(mappings) {
            *dst = SamplerBinding::from(m);
        }
    }

    fn check_sampler_count(&self, n: usize) {
        assert!(
            n <= self.bindings.layout.num_samplers,
            "{n} sampler bindings for a layout with {} samplers",
            self.bindings.layout.num_samplers
        );
    }

    // ── draw ──────────────────────────────────────────────────────────────

    /// Records the draw range. `start`/`count` are indices when `indexed`,
    /// vertices otherwise.
    pub fn set_draw(&mut self, indexed: bool, count: u32, start: u32) {
        self.flags.set(InstanceFlags::DRAW_INDEXED, indexed);
        self.draw_count = count;
        self.draw_start = start;
    }

    #[inline]
    pub fn is_indexed(&self) -> bool {
        self.flags.contains(InstanceFlags::DRAW_INDEXED)
    }

    /// `(start, count)`.
    #[inline]
    pub fn draw_range(&self) -> (u32, u32) {
        (self.draw_start, self.draw_count)
    }

    // ── submission ────────────────────────────────────────────────────────

    /// Binds this instance's state on `pass` and issues its draw.
    ///
    /// A pipeline that is not ready yet drops the draw silently; it is
    /// expected to become ready in a later frame.
    pub fn submit<D, P, U>(
        &mut self,
        device: &mut D,
        cache: &mut RenderCache<D>,
        uniforms: &U,
        pass: &mut P,
    ) -> SubmitOutcome
    where
        D: GfxDevice,
        P: RenderPass<D> + ?Sized,
        U: DynamicUniformBuffer + ?Sized,
    {
        let Some(pipeline) = cache.create_render_pipeline(device, &self.pipeline) else {
            return SubmitOutcome::CreationFailed;
        };
        if !device.query_pipeline_ready(&pipeline) {
            return SubmitOutcome::PipelineNotReady;
        }

        let layout = self.bindings.layout;
        let num_uniforms = layout.num_uniform_buffers;

        // Storage past the layout is left over from wider layouts and must not
        // reach the device or the cache key.
        let buffer = Some(uniforms.buffer());
        let submitted = &mut self.submitted_bindings;
        submitted.layout = layout;
        submitted.uniform_buffers.clear();
        submitted.uniform_buffers.extend(
            self.bindings.uniform_buffers[..num_uniforms]
                .iter()
                .map(|b| UniformBufferBinding { buffer, ..*b }),
        );
        submitted.samplers.clear();
        submitted
            .samplers
            .extend_from_slice(&self.bindings.samplers[..layout.num_samplers]);

        let Some(bindings) = cache.create_bindings(device, &self.submitted_bindings) else {
            return SubmitOutcome::CreationFailed;
        };

        let mut byte_offsets = [0u32; MAX_UNIFORM_BUFFERS];
        for (dst, words) in byte_offsets.iter_mut().zip(&self.dynamic_uniform_offsets) {
            *dst = words * 4;
        }

        pass.set_pipeline(&pipeline);
        pass.set_input_state(self.input_state);
        pass.set_bindings(0, &bindings, &byte_offsets[..num_uniforms]);

        if self.is_indexed() {
            pass.draw_indexed(self.draw_count, self.draw_start);
        } else {
            pass.draw(self.draw_count, self.draw_start);
        }

        SubmitOutcome::Drawn
    }
}
