//! Nabu render crate.
//!
//! Per-frame draw submission built on pooled render instances. Callers push
//! instances (optionally derived from templates), fill in pipeline state,
//! bindings and draw ranges, and flush the frame in sort-key order through an
//! abstract graphics device.

pub mod gfx;
pub mod logging;
pub mod render_inst;

pub use render_inst::{
    FrameStats, InstanceId, InstanceManager, InstanceManagerConfig, RenderInstance,
};
