//! Render instances: pooled, sortable draw records.
//!
//! Responsibilities:
//! - hold the full pipeline + binding state of one draw (`RenderInstance`)
//! - recycle instances across frames without reallocating (`InstancePool`)
//! - template inheritance, key ordering and submission (`InstanceManager`)

mod flags;
mod instance;
mod manager;
mod pool;

pub use flags::InstanceFlags;
pub use instance::{RenderInstance, SubmitOutcome, MAX_UNIFORM_BUFFERS};
pub use manager::{
    submission_order, FrameStats, InstanceId, InstanceManager, InstanceManagerConfig,
};
pub use pool::InstancePool;
