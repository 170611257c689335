//! Typed ids for device-owned objects.
//!
//! Instances store these by value. The device (or whatever owns the real GPU
//! object) stays the sole owner, so an instance can never release a resource.

macro_rules! gfx_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl $name {
            #[inline]
            pub const fn new(id: u32) -> Self {
                Self(id)
            }

            #[inline]
            pub const fn id(self) -> u32 {
                self.0
            }
        }
    };
}

gfx_handle!(
    /// Linked shader program (vertex + fragment stages).
    ProgramHandle
);
gfx_handle!(
    /// Vertex attribute layout used to build pipelines.
    InputLayoutHandle
);
gfx_handle!(
    /// Concrete vertex/index buffer set bound at draw time.
    InputStateHandle
);
gfx_handle!(BufferHandle);
gfx_handle!(SamplerHandle);
gfx_handle!(TextureHandle);
