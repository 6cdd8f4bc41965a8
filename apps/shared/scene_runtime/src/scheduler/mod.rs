//! Per-frame scheduling primitives
//!
//! [`TickScheduler`] holds continuations that run on the next frame callback,
//! [`TaskPool`] polls the procedures those continuations resume.

mod task_pool;
mod tick_scheduler;

pub use task_pool::{TaskHandle, TaskPool};
pub use tick_scheduler::{FrameTime, NextTick, TickScheduler};
