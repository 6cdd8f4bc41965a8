//! Frame-synchronized async bridge for scene procedures
//!
//! A host calls [`SceneRuntime::on_frame`] once per engine frame. Procedures
//! spawned on the runtime suspend on [`ConditionWaiter`] waits and resume, in
//! FIFO order, when a later frame finds their condition true. The
//! [`NodeResolver`] hands out stable entities for named parts of loaded assets.

pub mod config;
pub mod error;
pub mod resolver;
pub mod runtime;
pub mod scheduler;
pub mod wait;
pub mod world;

pub use config::RuntimeConfig;
pub use error::{Result, RuntimeError, ensure};
pub use resolver::NodeResolver;
pub use runtime::{SceneContext, SceneRuntime, System};
pub use scheduler::{FrameTime, NextTick, TaskHandle, TaskPool, TickScheduler};
pub use wait::{ConditionWaiter, WaitOptions};
pub use world::{
    AnimatorState, AssetInfo, Entity, LoadingState, MemoryWorld, NodeLoadState, SceneWorld,
    Transform, Vec3,
};
