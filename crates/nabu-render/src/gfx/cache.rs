use std::collections::{HashMap, HashSet};

use super::descriptors::{BindingsDescriptor, RenderPipelineDescriptor};
use super::device::GfxDevice;

/// Deduplicating cache of device pipelines and binding sets.
///
/// Lookups allocate only on a miss. Creation failures are remembered so the
/// device is not asked again and the error is logged once; callers treat a
/// `None` as "skip this draw".
///
/// The cache owns every object it created until [`RenderCache::destroy`].
pub struct RenderCache<D: GfxDevice> {
    pipelines: HashMap<RenderPipelineDescriptor, D::RenderPipeline>,
    bindings: HashMap<BindingsDescriptor, D::Bindings>,

    failed_pipelines: HashSet<RenderPipelineDescriptor>,
    failed_bindings: HashSet<BindingsDescriptor>,
}

impl<D: GfxDevice> Default for RenderCache<D> {
    fn default() -> Self {
        Self {
            pipelines: HashMap::new(),
            bindings: HashMap::new(),
            failed_pipelines: HashSet::new(),
            failed_bindings: HashSet::new(),
        }
    }
}

impl<D: GfxDevice> RenderCache<D> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_render_pipeline(
        &mut self,
        device: &mut D,
        descriptor: &RenderPipelineDescriptor,
    ) -> Option<D::RenderPipeline> {
        if let Some(pipeline) = self.pipelines.get(descriptor) {
            return Some(pipeline.clone());
        }
        if self.failed_pipelines.contains(descriptor) {
            return None;
        }

        match device.create_render_pipeline(descriptor) {
            Ok(pipeline) => {
                log::debug!(
                    "render cache: new pipeline #{} (program {:?}, {:?})",
                    self.pipelines.len(),
                    descriptor.program,
                    descriptor.topology
                );
                self.pipelines.insert(*descriptor, pipeline.clone());
                Some(pipeline)
            }
            Err(err) => {
                log::error!(
                    "render cache: pipeline creation failed for program {:?}: {err:#}",
                    descriptor.program
                );
                self.failed_pipelines.insert(*descriptor);
                None
            }
        }
    }

    pub fn create_bindings(
        &mut self,
        device: &mut D,
        descriptor: &BindingsDescriptor,
    ) -> Option<D::Bindings> {
        if let Some(bindings) = self.bindings.get(descriptor) {
            return Some(bindings.clone());
        }
        if self.failed_bindings.contains(descriptor) {
            return None;
        }

        match device.create_bindings(descriptor) {
            Ok(bindings) => {
                log::debug!(
                    "render cache: new bindings #{} ({:?})",
                    self.bindings.len(),
                    descriptor.layout
                );
                self.bindings.insert(descriptor.clone(), bindings.clone());
                Some(bindings)
            }
            Err(err) => {
                log::error!("render cache: bindings creation failed: {err:#}");
                self.failed_bindings.insert(descriptor.clone());
                None
            }
        }
    }

    #[inline]
    pub fn num_pipelines(&self) -> usize {
        self.pipelines.len()
    }

    #[inline]
    pub fn num_bindings(&self) -> usize {
        self.bindings.len()
    }

    /// Returns every cached object to `device` and forgets past failures.
    pub fn destroy(&mut self, device: &mut D) {
        log::debug!(
            "render cache: destroying {} pipelines, {} bindings",
            self.pipelines.len(),
            self.bindings.len()
        );
        for (_, pipeline) in self.pipelines.drain() {
            device.destroy_render_pipeline(pipeline);
        }
        for (_, bindings) in self.bindings.drain() {
            device.destroy_bindings(bindings);
        }
        self.failed_pipelines.clear();
        self.failed_bindings.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::descriptors::BindingLayout;
    use crate::gfx::handles::ProgramHandle;
    use crate::gfx::headless::HeadlessDevice;

    fn pipeline_desc(program: ProgramHandle) -> RenderPipelineDescriptor {
        RenderPipelineDescriptor {
            program: Some(program),
            ..Default::default()
        }
    }

    #[test]
    fn identical_descriptors_share_one_pipeline() {
        let mut device = HeadlessDevice::new();
        let mut cache = RenderCache::new();
        let program = device.create_program();

        let a = cache.create_render_pipeline(&mut device, &pipeline_desc(program)).unwrap();
        let b = cache.create_render_pipeline(&mut device, &pipeline_desc(program)).unwrap();

        assert_eq!(a.id, b.id);
        assert_eq!(cache.num_pipelines(), 1);
        assert_eq!(device.pipelines_created(), 1);
    }

    #[test]
    fn distinct_bindings_are_created_separately() {
        let mut device = HeadlessDevice::new();
        let mut cache = RenderCache::new();

        let one = BindingsDescriptor {
            layout: BindingLayout::new(1, 0),
            uniform_buffers: vec![Default::default()],
            samplers: Vec::new(),
        };
        let mut two = one.clone();
        two.uniform_buffers[0].word_count = 8;

        cache.create_bindings(&mut device, &one).unwrap();
        cache.create_bindings(&mut device, &two).unwrap();
        cache.create_bindings(&mut device, &one).unwrap();

        assert_eq!(cache.num_bindings(), 2);
    }

    #[test]
    fn failed_pipeline_is_not_retried() {
        let mut device = HeadlessDevice::new();
        let mut cache = RenderCache::new();
        let program = device.create_program();
        device.set_program_broken(program, true);

        assert!(cache.create_render_pipeline(&mut device, &pipeline_desc(program)).is_none());
        device.set_program_broken(program, false);
        assert!(cache.create_render_pipeline(&mut device, &pipeline_desc(program)).is_none());
        assert_eq!(device.pipelines_created(), 0);
    }

    #[test]
    fn destroy_returns_objects_to_device() {
        let mut device = HeadlessDevice::new();
        let mut cache = RenderCache::new();
        let program = device.create_program();
        cache.create_render_pipeline(&mut device, &pipeline_desc(program));
        cache.create_bindings(&mut device, &BindingsDescriptor::default());

        cache.destroy(&mut device);

        assert_eq!(cache.num_pipelines(), 0);
        assert_eq!(cache.num_bindings(), 0);
        assert_eq!(device.live_objects(), 0);
    }
}
