use core::cmp::Ordering;

use crate::gfx::{DynamicUniformBuffer, GfxDevice, RenderCache, RenderPass};

use super::{InstanceFlags, InstancePool, RenderInstance, SubmitOutcome};

/// Index of an instance pushed this frame.
///
/// Valid until the next [`InstanceManager::execute_and_reset`]; the slot is
/// recycled after that.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct InstanceId(usize);

impl InstanceId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct InstanceManagerConfig {
    /// Instances constructed up front. The pool still grows past this.
    pub initial_capacity: usize,
}

impl Default for InstanceManagerConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 64,
        }
    }
}

/// What one `execute_and_reset` did.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct FrameStats {
    /// Allocated instances (templates and hidden ones included).
    pub live: usize,
    pub submitted: usize,
    pub skipped_not_ready: usize,
    pub skipped_failed: usize,
}

/// Submission order: visible before hidden, then ascending sort key.
///
/// Hidden and free instances compare equal to each other; their relative
/// order is unspecified.
pub fn submission_order(a: &RenderInstance, b: &RenderInstance) -> Ordering {
    match (a.is_visible(), b.is_visible()) {
        (true, true) => a.sort_key().cmp(&b.sort_key()),
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => Ordering::Equal,
    }
}

/// Per-frame draw recorder.
///
/// Usage per frame:
/// - `push_template` / `pop_template` (balanced) to set up shared state
/// - `push_instance` once per draw, then fill in key, range and bindings
/// - `execute_and_reset` to sort, submit and recycle everything
///
/// Instances pushed while a template is active start as a copy of it.
/// Templates form a stack: each remembers the template that was active when
/// it was pushed, and popping restores that one.
///
/// ```ignore
/// let t = mgr.push_template();
/// mgr.instance_mut(t).set_mega_state_flags(&MegaStatePatch::default().blend(Some(blend)));
/// for mesh in &meshes {
///     let id = mgr.push_instance();
///     let inst = mgr.instance_mut(id);
///     inst.set_sort_key(mesh.depth_key);
///     inst.set_draw(true, mesh.index_count, 0);
/// }
/// mgr.pop_template();
/// mgr.execute_and_reset(&mut device, &uniforms, &mut pass);
/// ```
pub struct InstanceManager<D: GfxDevice> {
    pool: InstancePool,
    cache: RenderCache<D>,
    active_template: Option<usize>,
}

impl<D: GfxDevice> Default for InstanceManager<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: GfxDevice> InstanceManager<D> {
    pub fn new() -> Self {
        Self::with_config(InstanceManagerConfig::default())
    }

    pub fn with_config(config: InstanceManagerConfig) -> Self {
        Self {
            pool: InstancePool::with_capacity(config.initial_capacity),
            cache: RenderCache::new(),
            active_template: None,
        }
    }

    /// Allocates a blank instance, or a copy of the active template.
    fn new_instance(&mut self) -> usize {
        let index = self.pool.alloc_index();
        match self.active_template {
            Some(template) => {
                let (inst, tmpl) = self.pool.get_pair_mut(index, template);
                inst.reset();
                inst.copy_from(tmpl);
                inst.parent_template = Some(template);
            }
            None => self.pool.get_mut(index).reset(),
        }
        index
    }

    /// Pushes a new template, derived from the current one if any, and makes
    /// it current. Must be balanced by [`pop_template`](Self::pop_template).
    pub fn push_template(&mut self) -> InstanceId {
        let index = self.new_instance();
        self.pool.get_mut(index).flags |= InstanceFlags::ALLOCATED | InstanceFlags::TEMPLATE;
        self.active_template = Some(index);
        InstanceId(index)
    }

    /// Releases the current template and restores its parent.
    pub fn pop_template(&mut self) {
        debug_assert!(
            self.active_template.is_some(),
            "pop_template called without matching push_template"
        );
        let Some(index) = self.active_template else { return };
        self.active_template = self.pool.get(index).parent_template;
        self.pool.release(index);
    }

    /// Starts a visible draw, derived from the current template if any.
    pub fn push_instance(&mut self) -> InstanceId {
        let index = self.new_instance();
        self.pool.get_mut(index).flags |= InstanceFlags::ALLOCATED | InstanceFlags::VISIBLE;
        InstanceId(index)
    }

    /// Gives back an instance that should not be drawn after all.
    pub fn return_instance(&mut self, id: InstanceId) {
        debug_assert!(
            !self.pool.get(id.0).flags().contains(InstanceFlags::TEMPLATE),
            "return_instance on template {}; use pop_template",
            id.0
        );
        self.pool.release(id.0);
    }

    #[inline]
    pub fn instance(&self, id: InstanceId) -> &RenderInstance {
        let inst = self.pool.get(id.0);
        debug_assert!(!inst.is_free(), "stale instance id {}", id.0);
        inst
    }

    #[inline]
    pub fn instance_mut(&mut self, id: InstanceId) -> &mut RenderInstance {
        let inst = self.pool.get_mut(id.0);
        debug_assert!(!inst.is_free(), "stale instance id {}", id.0);
        inst
    }

    #[inline]
    pub fn current_template(&self) -> Option<InstanceId> {
        self.active_template.map(InstanceId)
    }

    /// Makes `dst` read uniform slot `slot` from the region `src` allocated.
    pub fn copy_uniform_buffer_binding(&mut self, dst: InstanceId, slot: usize, src: InstanceId) {
        let (dst, src) = self.pool.get_pair_mut(dst.0, src.0);
        dst.copy_uniform_buffer_binding(slot, src);
    }

    #[inline]
    pub fn pool(&self) -> &InstancePool {
        &self.pool
    }

    #[inline]
    pub fn cache(&self) -> &RenderCache<D> {
        &self.cache
    }

    /// Sorts this frame's instances, submits the visible ones to `pass` in
    /// key order and recycles the whole pool.
    ///
    /// Draws whose pipeline is not ready, or whose device objects could not
    /// be created, are dropped for this frame. All templates must have been
    /// popped.
    pub fn execute_and_reset<P, U>(&mut self, device: &mut D, uniforms: &U, pass: &mut P) -> FrameStats
    where
        P: RenderPass<D> + ?Sized,
        U: DynamicUniformBuffer + ?Sized,
    {
        debug_assert!(
            self.active_template.is_none(),
            "execute_and_reset with a template still pushed"
        );

        let mut stats = FrameStats::default();
        if self.pool.alloc_count() == 0 {
            return stats;
        }
        stats.live = self.pool.alloc_count() - self.pool.free_count();

        self.pool.sort_live_by(submission_order);

        for inst in self.pool.live_mut() {
            // Sorted: everything after the first hidden instance is hidden.
            if !inst.is_visible() {
                break;
            }
            match inst.submit(device, &mut self.cache, uniforms, pass) {
                SubmitOutcome::Drawn => stats.submitted += 1,
                SubmitOutcome::PipelineNotReady => stats.skipped_not_ready += 1,
                SubmitOutcome::CreationFailed => stats.skipped_failed += 1,
            }
        }

        self.pool.reset();
        self.active_template = None;

        log::trace!("instance manager frame: {stats:?}");
        stats
    }

    /// Drops the pool and hands every cached device object back to `device`.
    pub fn destroy(&mut self, device: &mut D) {
        self.pool.destroy();
        self.cache.destroy(device);
        self.active_template = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::headless::{HeadlessDevice, RecordingPass};
    use crate::gfx::{
        premultiplied_alpha_blend, BindingLayout, DynamicUniformBuffer, MegaStatePatch,
        UniformArena,
    };

    struct Frame {
        device: HeadlessDevice,
        uniforms: UniformArena,
        pass: RecordingPass,
        mgr: InstanceManager<HeadlessDevice>,
    }

    impl Frame {
        fn new() -> Self {
            let mut device = HeadlessDevice::new();
            let uniforms = UniformArena::new(device.create_buffer());
            Self {
                device,
                uniforms,
                pass: RecordingPass::new(),
                mgr: InstanceManager::new(),
            }
        }

        fn execute(&mut self) -> FrameStats {
            self.mgr
                .execute_and_reset(&mut self.device, &self.uniforms, &mut self.pass)
        }

        fn draw_starts(&self) -> Vec<u32> {
            self.pass.draws().iter().map(|d| d.start).collect()
        }
    }

    // ── scenarios ─────────────────────────────────────────────────────────

    #[test]
    fn template_state_reaches_sorted_draws() {
        let mut f = Frame::new();
        let program = f.device.create_program();

        let t = f.mgr.push_template();
        let tmpl = f.mgr.instance_mut(t);
        tmpl.set_program(program);
        tmpl.set_mega_state_flags(&MegaStatePatch::default().blend(Some(premultiplied_alpha_blend())));

        let a = f.mgr.push_instance();
        f.mgr.instance_mut(a).set_sort_key(10);
        f.mgr.instance_mut(a).set_draw(false, 3, 100);
        let b = f.mgr.push_instance();
        f.mgr.instance_mut(b).set_sort_key(5);
        f.mgr.instance_mut(b).set_draw(false, 3, 200);
        f.mgr.pop_template();

        let stats = f.execute();

        assert_eq!(stats.submitted, 2);
        assert_eq!(f.draw_starts(), vec![200, 100]);
        for d in f.pass.draws() {
            let pipeline = d.pipeline.unwrap();
            assert_eq!(pipeline.descriptor.mega_state.blend, Some(premultiplied_alpha_blend()));
            assert_eq!(pipeline.descriptor.program, Some(program));
        }
    }

    #[test]
    fn inherited_instance_matches_template() {
        let mut f = Frame::new();
        let layout = f.device.create_input_layout();
        let state = f.device.create_input_state(layout);
        let sampler = f.device.create_sampler();
        let program = f.device.create_program();

        let t = f.mgr.push_template();
        {
            let tmpl = f.mgr.instance_mut(t);
            tmpl.set_program(program);
            tmpl.set_input_state(&f.device, state);
            tmpl.set_primitive_topology(wgpu::PrimitiveTopology::LineList);
            tmpl.set_binding_layout(BindingLayout::new(1, 2));
            tmpl.set_sampler_bindings(&[crate::gfx::SamplerBinding {
                sampler: Some(sampler),
                texture: None,
            }]);
            tmpl.set_draw(true, 12, 0);
        }
        let i = f.mgr.push_instance();

        let tmpl = f.mgr.instance(t);
        let inst = f.mgr.instance(i);
        assert_eq!(inst.pipeline_descriptor(), tmpl.pipeline_descriptor());
        assert_eq!(inst.bindings(), tmpl.bindings());
        assert_eq!(inst.input_state(), tmpl.input_state());
        assert_eq!(inst.draw_range(), tmpl.draw_range());
        assert!(inst.is_indexed());
        assert_eq!(inst.parent_template(), Some(t.index()));
        assert!(inst.is_visible());
        assert!(!tmpl.is_visible());

        f.mgr.pop_template();
    }

    #[test]
    fn nested_templates_unwind_in_order() {
        let mut f = Frame::new();

        let outer = f.mgr.push_template();
        f.mgr
            .instance_mut(outer)
            .set_mega_state_flags(&MegaStatePatch::default().depth(wgpu::CompareFunction::Always, false));

        let inner = f.mgr.push_template();
        assert_eq!(f.mgr.instance(inner).parent_template(), Some(outer.index()));
        f.mgr
            .instance_mut(inner)
            .set_mega_state_flags(&MegaStatePatch::default().cull(Some(wgpu::Face::Back)));

        let deep = f.mgr.push_instance();
        assert_eq!(f.mgr.instance(deep).mega_state().cull_mode, Some(wgpu::Face::Back));
        assert!(!f.mgr.instance(deep).mega_state().depth_write);

        f.mgr.pop_template();
        assert_eq!(f.mgr.current_template(), Some(outer));

        let shallow = f.mgr.push_instance();
        assert_eq!(f.mgr.instance(shallow).mega_state().cull_mode, None);
        assert!(!f.mgr.instance(shallow).mega_state().depth_write);

        f.mgr.pop_template();
        assert_eq!(f.mgr.current_template(), None);

        let blank = f.mgr.push_instance();
        assert!(f.mgr.instance(blank).mega_state().depth_write);
        assert_eq!(f.mgr.instance(blank).parent_template(), None);
    }

    #[test]
    fn popped_template_slot_is_recycled() {
        let mut f = Frame::new();
        let t = f.mgr.push_template();
        f.mgr.push_instance();
        f.mgr.pop_template();
        assert_eq!(f.mgr.pool().free_count(), 1);

        let next = f.mgr.push_instance();
        assert_eq!(next, t);
        assert_eq!(f.mgr.pool().alloc_count(), 2);
    }

    #[test]
    fn shared_uniform_region_via_copy_binding() {
        let mut f = Frame::new();
        f.uniforms.allocate_chunk(4);

        let t = f.mgr.push_template();
        f.mgr.instance_mut(t).set_binding_layout(BindingLayout::new(1, 0));
        let offset = f.mgr.instance_mut(t).allocate_uniform_buffer(&mut f.uniforms, 0, 16);
        f.mgr
            .instance(t)
            .map_uniform_buffer_f32(&mut f.uniforms, 0)
            .copy_from_slice(&[0.5; 16]);

        let a = f.mgr.push_instance();
        f.mgr.copy_uniform_buffer_binding(a, 0, t);
        let b = f.mgr.push_instance();
        f.mgr.copy_uniform_buffer_binding(b, 0, t);
        f.mgr.pop_template();

        f.execute();

        let draws = f.pass.draws();
        assert_eq!(draws.len(), 2);
        assert!(draws.iter().all(|d| d.dynamic_byte_offsets == vec![offset * 4]));
        // Same buffer, same word counts: one device binding set.
        assert_eq!(f.mgr.cache().num_bindings(), 1);
        assert_eq!(f.uniforms.map_buffer_f32(offset, 16)[15], 0.5);
    }

    // ── execute_and_reset ─────────────────────────────────────────────────

    #[test]
    fn empty_frame_is_a_no_op() {
        let mut f = Frame::new();
        assert_eq!(f.execute(), FrameStats::default());
        assert!(f.pass.commands().is_empty());
    }

    #[test]
    fn hidden_and_returned_instances_are_not_drawn() {
        let mut f = Frame::new();
        for start in 0..4 {
            let id = f.mgr.push_instance();
            f.mgr.instance_mut(id).set_draw(false, 3, start);
            f.mgr.instance_mut(id).set_sort_key(start);
        }
        f.mgr.instance_mut(InstanceId(1)).set_visible(false);
        f.mgr.return_instance(InstanceId(2));

        let stats = f.execute();

        assert_eq!(f.draw_starts(), vec![0, 3]);
        assert_eq!(stats.live, 3);
        assert_eq!(stats.submitted, 2);
    }

    #[test]
    fn unready_pipeline_drops_only_its_draws() {
        let mut f = Frame::new();
        let slow = f.device.create_program();
        let fast = f.device.create_program();
        f.device.set_program_compiling(slow, true);

        for (key, program) in [(0, slow), (1, fast), (2, slow), (3, fast)] {
            let id = f.mgr.push_instance();
            let inst = f.mgr.instance_mut(id);
            inst.set_program(program);
            inst.set_sort_key(key);
            inst.set_draw(false, 3, key);
        }

        let stats = f.execute();
        assert_eq!(f.draw_starts(), vec![1, 3]);
        assert_eq!(stats.skipped_not_ready, 2);
        assert_eq!(stats.submitted, 2);
    }

    #[test]
    fn broken_pipeline_counts_as_failed() {
        let mut f = Frame::new();
        let broken = f.device.create_program();
        f.device.set_program_broken(broken, true);

        let id = f.mgr.push_instance();
        f.mgr.instance_mut(id).set_program(broken);

        let stats = f.execute();
        assert_eq!(stats.skipped_failed, 1);
        assert!(f.pass.draws().is_empty());
    }

    #[test]
    fn pool_is_recycled_between_frames() {
        let mut f = Frame::new();
        for _ in 0..100 {
            f.mgr.push_instance();
        }
        f.execute();
        assert_eq!(f.mgr.pool().alloc_count(), 0);
        let cap = f.mgr.pool().capacity();
        assert!(f.mgr.pool().live().is_empty());

        for _ in 0..100 {
            f.mgr.push_instance();
        }
        assert_eq!(f.mgr.pool().capacity(), cap);
        f.pass.clear();
        f.execute();
        assert_eq!(f.pass.draws().len(), 100);
        assert_eq!(f.device.pipelines_created(), 1);
    }

    #[test]
    fn sort_partitions_visible_prefix_by_key() {
        let mut pool = InstancePool::new();
        let mut seed = 0x2545_f491_u32;
        for _ in 0..64 {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            let index = pool.alloc_index();
            let inst = pool.get_mut(index);
            inst.reset();
            inst.flags = InstanceFlags::ALLOCATED;
            inst.set_visible(seed % 3 != 0);
            inst.set_sort_key(seed % 50);
        }
        pool.release(7);
        pool.release(30);

        pool.sort_live_by(submission_order);

        for pair in pool.live().windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            assert!(
                !b.is_visible() || (a.is_visible() && a.sort_key() <= b.sort_key()),
                "visible instances must form a key-sorted prefix"
            );
        }
    }

    #[test]
    fn destroy_releases_cached_objects() {
        let mut f = Frame::new();
        f.mgr.push_instance();
        f.execute();
        assert!(f.device.live_objects() > 0);

        f.mgr.destroy(&mut f.device);
        assert_eq!(f.device.live_objects(), 0);
        assert_eq!(f.mgr.pool().capacity(), 0);
    }

    #[test]
    fn narrowed_layout_shares_bindings_with_declared_layout() {
        let mut f = Frame::new();

        let t = f.mgr.push_template();
        f.mgr.instance_mut(t).set_binding_layout(BindingLayout::new(2, 0));
        let narrowed = f.mgr.push_instance();
        let inst = f.mgr.instance_mut(narrowed);
        inst.set_binding_layout(BindingLayout::new(1, 0));
        inst.allocate_uniform_buffer(&mut f.uniforms, 0, 8);
        f.mgr.pop_template();

        let direct = f.mgr.push_instance();
        let inst = f.mgr.instance_mut(direct);
        inst.set_binding_layout(BindingLayout::new(1, 0));
        inst.allocate_uniform_buffer(&mut f.uniforms, 0, 8);

        let stats = f.execute();

        assert_eq!(stats.submitted, 2);
        assert_eq!(f.device.bindings_created(), 1);
        assert!(f.pass.draws().iter().all(|d| {
            d.bindings.as_ref().unwrap().descriptor.uniform_buffers.len() == 1
        }));
    }

    #[test]
    #[should_panic(expected = "use pop_template")]
    fn returning_an_outer_template_is_fatal() {
        let mut mgr = InstanceManager::<HeadlessDevice>::new();
        let outer = mgr.push_template();
        mgr.push_template();
        mgr.return_instance(outer);
    }

    #[test]
    #[should_panic(expected = "without matching push_template")]
    fn unbalanced_pop_is_fatal() {
        let mut mgr = InstanceManager::<HeadlessDevice>::new();
        mgr.pop_template();
    }
}
