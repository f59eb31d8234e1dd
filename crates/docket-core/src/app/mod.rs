//! Application layer: worker pool and pipeline wiring.

pub mod pipeline;
pub mod worker;

pub use self::pipeline::Pipeline;
pub use self::worker::{ShutdownHandle, WorkerContext, WorkerPool};
