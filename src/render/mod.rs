//! Filter preview scheduling
//!
//! - `texture.rs` - source image and the two texture slots
//! - `effect.rs` - persistent and one-shot effect lifetimes
//! - `queue.rs` - FIFO of one-off render jobs
//! - `controller.rs` - the per-frame protocol
//! - `surface.rs` - the render thread and its wake-up signal
//! - `dispatch.rs` - delivering callbacks off the render thread

pub mod controller;
pub mod dispatch;
pub mod effect;
pub mod queue;
pub mod surface;
pub mod texture;

pub use controller::{FilterController, FrameOutcome, SaveCallback, SaveResult};
pub use dispatch::{Dispatcher, ImmediateDispatcher, TokioDispatcher};
pub use queue::{JobCallback, JobResult, RenderJob};
pub use surface::{FilterSurface, RenderWaker};
