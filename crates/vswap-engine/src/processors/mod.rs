//! Built-in frame processors.
//!
//! Each processor composes the same primitives: warp a face into a
//! canonical crop, build masks, run its backend on the crop, and paste
//! the result back through the inverse warp.

pub mod face_debugger;
pub mod face_swapper;
pub mod lip_syncer;

pub use face_debugger::{DebugItem, FaceDebugger};
pub use face_swapper::{FaceSwapper, SwapBackend};
pub use lip_syncer::{LipSyncer, SyncBackend};
