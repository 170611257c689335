//! Fixed-function "mega-state": blend, depth, stencil and rasterizer state.
//!
//! Values are plain `Copy` data built from `wgpu` state types, so a full copy
//! is an assignment and the whole descriptor can key the pipeline cache.

/// Merged fixed-function state attached to a render pipeline.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct MegaStateDescriptor {
    /// `None` disables blending (opaque writes).
    pub blend: Option<wgpu::BlendState>,
    pub color_write_mask: wgpu::ColorWrites,

    pub depth_compare: wgpu::CompareFunction,
    pub depth_write: bool,

    pub stencil_front: wgpu::StencilFaceState,
    pub stencil_back: wgpu::StencilFaceState,
    pub stencil_read_mask: u32,
    pub stencil_write_mask: u32,

    /// `None` draws both faces.
    pub cull_mode: Option<wgpu::Face>,
    pub front_face: wgpu::FrontFace,
}

impl Default for MegaStateDescriptor {
    /// Opaque, depth-tested, depth-writing, no culling, stencil ignored.
    fn default() -> Self {
        Self {
            blend: None,
            color_write_mask: wgpu::ColorWrites::ALL,
            depth_compare: wgpu::CompareFunction::LessEqual,
            depth_write: true,
            stencil_front: wgpu::StencilFaceState::IGNORE,
            stencil_back: wgpu::StencilFaceState::IGNORE,
            stencil_read_mask: 0xFF,
            stencil_write_mask: 0,
            cull_mode: None,
            front_face: wgpu::FrontFace::Ccw,
        }
    }
}

impl MegaStateDescriptor {
    #[inline]
    pub fn is_blended(&self) -> bool {
        self.blend.is_some()
    }
}

/// Partial mega-state. Only `Some` fields are applied by
/// [`set_mega_state_flags`].
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct MegaStatePatch {
    /// `Some(None)` turns blending off, `Some(Some(..))` turns it on.
    pub blend: Option<Option<wgpu::BlendState>>,
    pub color_write_mask: Option<wgpu::ColorWrites>,
    pub depth_compare: Option<wgpu::CompareFunction>,
    pub depth_write: Option<bool>,
    pub stencil_front: Option<wgpu::StencilFaceState>,
    pub stencil_back: Option<wgpu::StencilFaceState>,
    pub stencil_read_mask: Option<u32>,
    pub stencil_write_mask: Option<u32>,
    pub cull_mode: Option<Option<wgpu::Face>>,
    pub front_face: Option<wgpu::FrontFace>,
}

impl MegaStatePatch {
    #[inline]
    pub fn blend(mut self, blend: Option<wgpu::BlendState>) -> Self {
        self.blend = Some(blend);
        self
    }

    #[inline]
    pub fn depth(mut self, compare: wgpu::CompareFunction, write: bool) -> Self {
        self.depth_compare = Some(compare);
        self.depth_write = Some(write);
        self
    }

    #[inline]
    pub fn cull(mut self, cull_mode: Option<wgpu::Face>) -> Self {
        self.cull_mode = Some(cull_mode);
        self
    }

    #[inline]
    pub fn color_write_mask(mut self, mask: wgpu::ColorWrites) -> Self {
        self.color_write_mask = Some(mask);
        self
    }
}

/// Overlays the fields present in `patch` onto `dst`, leaving the rest alone.
pub fn set_mega_state_flags(dst: &mut MegaStateDescriptor, patch: &MegaStatePatch) {
    if let Some(v) = patch.blend {
        dst.blend = v;
    }
    if let Some(v) = patch.color_write_mask {
        dst.color_write_mask = v;
    }
    if let Some(v) = patch.depth_compare {
        dst.depth_compare = v;
    }
    if let Some(v) = patch.depth_write {
        dst.depth_write = v;
    }
    if let Some(v) = patch.stencil_front {
        dst.stencil_front = v;
    }
    if let Some(v) = patch.stencil_back {
        dst.stencil_back = v;
    }
    if let Some(v) = patch.stencil_read_mask {
        dst.stencil_read_mask = v;
    }
    if let Some(v) = patch.stencil_write_mask {
        dst.stencil_write_mask = v;
    }
    if let Some(v) = patch.cull_mode {
        dst.cull_mode = v;
    }
    if let Some(v) = patch.front_face {
        dst.front_face = v;
    }
}

/// Default state with `patch` applied.
pub fn make_mega_state(patch: &MegaStatePatch) -> MegaStateDescriptor {
    let mut state = MegaStateDescriptor::default();
    set_mega_state_flags(&mut state, patch);
    state
}

/// `src * 1 + dst * (1 - src.a)` on color and alpha.
pub fn premultiplied_alpha_blend() -> wgpu::BlendState {
    let component = wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
        operation: wgpu::BlendOperation::Add,
    };
    wgpu::BlendState {
        color: component,
        alpha: component,
    }
}

pub fn additive_blend() -> wgpu::BlendState {
    let component = wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    };
    wgpu::BlendState {
        color: component,
        alpha: component,
    }
}
