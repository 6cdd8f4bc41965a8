//! Engine-facing side of the runtime
//!
//! [`SceneWorld`] is the narrow set of queries and mutations the waiter and
//! resolver need from a scene engine. [`MemoryWorld`] implements it in memory.

use std::fmt;

pub mod memory;

pub use memory::{AnimatorState, MemoryWorld, Transform, Vec3};

/// Opaque handle to a scene object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Entity(pub u64);

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity#{}", self.0)
    }
}

/// Streaming state of a composite asset container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadingState {
    Pending,
    Loading,
    Finished,
    Failed,
}

/// Materialization state of a node bound inside a container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeLoadState {
    Pending,
    Ready,
    Error,
}

/// Names exposed by a finished container
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetInfo {
    pub node_paths: Vec<String>,
    pub animation_names: Vec<String>,
    pub material_names: Vec<String>,
}

/// Scene engine operations used by the runtime
///
/// Node paths are compared by exact string equality and never parsed.
pub trait SceneWorld {
    /// Loading state of a container, `None` if the entity carries no asset
    fn loading_state(&self, container: Entity) -> Option<LoadingState>;

    /// Node paths of a container; only meaningful once it is `Finished`
    fn node_paths(&self, container: Entity) -> Option<&[String]>;

    fn animation_names(&self, _container: Entity) -> Option<&[String]> {
        None
    }

    fn material_names(&self, _container: Entity) -> Option<&[String]> {
        None
    }

    fn create_entity(&mut self) -> Entity;

    fn set_parent(&mut self, child: Entity, parent: Entity);

    /// Bind `node` to the sub-node at `path` inside `container`
    fn bind_node_path(&mut self, node: Entity, container: Entity, path: &str);

    /// Existing entity bound to (`container`, `path`), whoever created it
    fn find_node(&self, container: Entity, path: &str) -> Option<Entity>;

    /// `None` if `node` is not bound to any container
    fn node_state(&self, node: Entity) -> Option<NodeLoadState>;
}
