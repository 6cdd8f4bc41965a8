//! Lazy mapping from (container, node path) to a stable child entity.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use tracing::{debug, trace};

use crate::error::{Result, RuntimeError};
use crate::wait::{ConditionWaiter, WaitOptions};
use crate::world::{AssetInfo, Entity, LoadingState, NodeLoadState, SceneWorld};

/// Resolves named sub-nodes of loaded composite assets
///
/// The first successful [`NodeResolver::resolve`] of a (container, path) pair
/// creates and binds a child entity; every later call returns that same entity.
/// Cache entries are never invalidated.
///
/// Resolution borrows the world mutably, so it must not be called while a
/// system holds the world.
pub struct NodeResolver<W: SceneWorld> {
    world: Rc<RefCell<W>>,
    waiter: ConditionWaiter,
    cache: Rc<RefCell<HashMap<(Entity, String), Entity>>>,
}

impl<W: SceneWorld> Clone for NodeResolver<W> {
    fn clone(&self) -> Self {
        Self {
            world: self.world.clone(),
            waiter: self.waiter.clone(),
            cache: self.cache.clone(),
        }
    }
}

impl<W: SceneWorld + 'static> NodeResolver<W> {
    pub fn new(world: Rc<RefCell<W>>, waiter: ConditionWaiter) -> Self {
        Self {
            world,
            waiter,
            cache: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    /// Entity for the node at `path` inside `container`
    ///
    /// Returns `None`, without creating anything, when the container has not
    /// finished loading or does not expose `path`.
    pub fn resolve(&self, container: Entity, path: &str) -> Option<Entity> {
        let mut world = self.world.borrow_mut();

        if world.loading_state(container) != Some(LoadingState::Finished) {
            trace!("{} is not loaded, cannot resolve '{}'", container, path);
            return None;
        }
        let known = world
            .node_paths(container)
            .is_some_and(|paths| paths.iter().any(|p| p == path));
        if !known {
            trace!("{} has no node '{}'", container, path);
            return None;
        }

        let key = (container, path.to_string());
        if let Some(&node) = self.cache.borrow().get(&key) {
            return Some(node);
        }

        let node = match world.find_node(container, path) {
            Some(existing) => existing,
            None => {
                let node = world.create_entity();
                world.set_parent(node, container);
                world.bind_node_path(node, container, path);
                debug!("Created {} for '{}' in {}", node, path, container);
                node
            }
        };
        self.cache.borrow_mut().insert(key, node);
        Some(node)
    }

    /// Resolve several paths of one container, keeping their order
    pub fn resolve_all<I, S>(&self, container: Entity, paths: I) -> Vec<Option<Entity>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        paths
            .into_iter()
            .map(|path| self.resolve(container, path.as_ref()))
            .collect()
    }

    /// Node paths of a finished container accepted by `filter`
    pub fn node_paths_matching(&self, container: Entity, filter: impl Fn(&str) -> bool) -> Vec<String> {
        let world = self.world.borrow();
        if world.loading_state(container) != Some(LoadingState::Finished) {
            return Vec::new();
        }
        world
            .node_paths(container)
            .unwrap_or_default()
            .iter()
            .filter(|path| filter(path))
            .cloned()
            .collect()
    }

    /// Node, animation and material names of a finished container
    pub fn loaded_info(&self, container: Entity) -> Option<AssetInfo> {
        let world = self.world.borrow();
        if world.loading_state(container) != Some(LoadingState::Finished) {
            return None;
        }
        let names = |list: Option<&[String]>| list.map(<[String]>::to_vec).unwrap_or_default();
        Some(AssetInfo {
            node_paths: names(world.node_paths(container)),
            animation_names: names(world.animation_names(container)),
            material_names: names(world.material_names(container)),
        })
    }

    /// Number of cached (container, path) pairs
    pub fn cached(&self) -> usize {
        self.cache.borrow().len()
    }

    /// Wait until every node has left the Pending state
    ///
    /// Ready and Error both end the wait; a node without any state counts as
    /// pending.
    pub async fn wait_until_ready(&self, nodes: &[Entity], timeout: Duration) -> Result<()> {
        let world = self.world.clone();
        let options = self.options(timeout);
        self.waiter
            .wait_all_labeled(
                "nodes to materialize",
                nodes.iter().copied(),
                move |node| {
                    matches!(
                        world.borrow().node_state(*node),
                        Some(NodeLoadState::Ready | NodeLoadState::Error)
                    )
                },
                options,
            )
            .await
    }

    /// Wait until every container is Finished
    ///
    /// A Failed container never satisfies the wait and ends in `Timeout`.
    pub async fn wait_until_loaded(&self, containers: &[Entity], timeout: Duration) -> Result<()> {
        let world = self.world.clone();
        let options = self.options(timeout);
        self.waiter
            .wait_all_labeled(
                "assets to load",
                containers.iter().copied(),
                move |container| {
                    world.borrow().loading_state(*container) == Some(LoadingState::Finished)
                },
                options,
            )
            .await
    }

    /// Wait for `container`, resolve `path`, then wait for the node to materialize
    ///
    /// Both waits share `timeout` as their individual limit.
    pub async fn resolve_when_ready(&self, container: Entity, path: &str, timeout: Duration) -> Result<Entity> {
        self.wait_until_loaded(&[container], timeout).await?;
        let node = self.resolve(container, path).ok_or_else(|| {
            RuntimeError::Assertion(format!("'{}' is not a node of {}", path, container))
        })?;
        self.wait_until_ready(&[node], timeout).await?;
        Ok(node)
    }

    fn options(&self, timeout: Duration) -> WaitOptions {
        WaitOptions {
            timeout,
            ..self.waiter.defaults()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{TaskPool, TickScheduler};
    use crate::world::MemoryWorld;
    use scene_schema::{AssetDefinition, SceneManifest};

    const FRAME: Duration = Duration::from_millis(16);

    fn setup() -> (Rc<RefCell<MemoryWorld>>, NodeResolver<MemoryWorld>, TickScheduler, Entity) {
        let manifest = SceneManifest::default().with_asset(
            "models/arissa.glb",
            AssetDefinition::with_nodes(["Armature", "Armature/Hips/RightHand"])
                .with_animations(["Dying"])
                .with_materials(["Skin"])
                .with_load_frames(2),
        );
        let world = Rc::new(RefCell::new(MemoryWorld::new(manifest)));
        let avatar = {
            let mut w = world.borrow_mut();
            let avatar = w.spawn("avatar");
            w.load_asset(avatar, "models/arissa.glb");
            avatar
        };
        let scheduler = TickScheduler::new();
        let resolver = NodeResolver::new(world.clone(), ConditionWaiter::new(scheduler.clone()));
        (world, resolver, scheduler, avatar)
    }

    #[test]
    fn test_resolve_requires_finished_container() {
        let (world, resolver, _, avatar) = setup();
        let before = world.borrow().entity_count();

        assert_eq!(resolver.resolve(avatar, "Armature"), None);
        world.borrow_mut().simulate();
        assert_eq!(world.borrow().loading_state(avatar), Some(LoadingState::Loading));
        assert_eq!(resolver.resolve(avatar, "Armature"), None);

        world.borrow_mut().set_loading_state(avatar, LoadingState::Failed);
        assert_eq!(resolver.resolve(avatar, "Armature"), None);
        assert_eq!(
            resolver.resolve_all(avatar, ["Armature", "Armature/Hips/RightHand"]),
            vec![None, None]
        );
        assert_eq!(world.borrow().find_node(avatar, "Armature"), None);
        assert_eq!(world.borrow().entity_count(), before);
        assert_eq!(resolver.cached(), 0);
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let (world, resolver, _, avatar) = setup();
        world.borrow_mut().set_loading_state(avatar, LoadingState::Finished);
        let before = world.borrow().entity_count();

        let hand = resolver.resolve(avatar, "Armature/Hips/RightHand").unwrap();
        assert_eq!(world.borrow().entity_count(), before + 1);
        assert_eq!(world.borrow().parent(hand), Some(avatar));
        assert_eq!(world.borrow().node_binding(hand), Some((avatar, "Armature/Hips/RightHand")));

        for _ in 0..3 {
            assert_eq!(resolver.resolve(avatar, "Armature/Hips/RightHand"), Some(hand));
        }
        assert_eq!(world.borrow().entity_count(), before + 1);
        assert_eq!(resolver.cached(), 1);
    }

    #[test]
    fn test_unknown_path_creates_nothing() {
        let (world, resolver, _, avatar) = setup();
        world.borrow_mut().set_loading_state(avatar, LoadingState::Finished);
        let before = world.borrow().entity_count();

        assert_eq!(resolver.resolve(avatar, "Armature/Hips/LeftHand"), None);
        assert_eq!(resolver.resolve(avatar, "armature"), None);
        assert_eq!(world.borrow().entity_count(), before);
    }

    #[test]
    fn test_resolve_reuses_engine_bound_node() {
        let (world, resolver, _, avatar) = setup();
        let bound = {
            let mut w = world.borrow_mut();
            w.set_loading_state(avatar, LoadingState::Finished);
            let node = w.create_entity();
            w.bind_node_path(node, avatar, "Armature");
            node
        };
        let before = world.borrow().entity_count();

        assert_eq!(resolver.resolve(avatar, "Armature"), Some(bound));
        assert_eq!(world.borrow().entity_count(), before);
    }

    #[test]
    fn test_resolve_all_and_matching() {
        let (world, resolver, _, avatar) = setup();
        assert!(resolver.node_paths_matching(avatar, |_| true).is_empty());
        world.borrow_mut().set_loading_state(avatar, LoadingState::Finished);

        let nodes = resolver.resolve_all(avatar, ["Armature", "Missing"]);
        assert!(nodes[0].is_some());
        assert_eq!(nodes[1], None);

        let hands = resolver.node_paths_matching(avatar, |path| path.ends_with("Hand"));
        assert_eq!(hands, vec!["Armature/Hips/RightHand".to_string()]);
    }

    #[test]
    fn test_loaded_info() {
        let (world, resolver, _, avatar) = setup();
        assert_eq!(resolver.loaded_info(avatar), None);
        world.borrow_mut().set_loading_state(avatar, LoadingState::Finished);

        let info = resolver.loaded_info(avatar).unwrap();
        assert_eq!(info.node_paths.len(), 2);
        assert_eq!(info.animation_names, vec!["Dying".to_string()]);
        assert_eq!(info.material_names, vec!["Skin".to_string()]);
    }

    #[test]
    fn test_resolve_when_ready() {
        let (world, resolver, scheduler, avatar) = setup();
        let pool = TaskPool::new();

        let r = resolver.clone();
        let handle = pool.spawn(async move {
            r.resolve_when_ready(avatar, "Armature/Hips/RightHand", Duration::from_secs(1))
                .await
        });
        pool.run_until_stalled();

        let mut frames = 0;
        while !handle.is_finished() && frames < 10 {
            world.borrow_mut().simulate();
            scheduler.drain_once(FRAME);
            pool.run_until_stalled();
            frames += 1;
        }

        let hand = handle.try_take().unwrap().unwrap();
        assert_eq!(world.borrow().node_state(hand), Some(NodeLoadState::Ready));
        // loaded on frame 2, node bound on frame 2 and ready on frame 3
        assert_eq!(frames, 3);
    }

    #[test]
    fn test_error_node_ends_ready_wait() {
        let (world, resolver, scheduler, avatar) = setup();
        world.borrow_mut().set_loading_state(avatar, LoadingState::Finished);
        let hand = resolver.resolve(avatar, "Armature/Hips/RightHand").unwrap();
        assert_eq!(world.borrow().node_state(hand), Some(NodeLoadState::Pending));
        let pool = TaskPool::new();

        let r = resolver.clone();
        let handle = pool.spawn(async move {
            r.wait_until_ready(&[hand], Duration::from_secs(1)).await
        });
        pool.run_until_stalled();
        assert!(!handle.is_finished());

        world.borrow_mut().set_node_state(hand, NodeLoadState::Error);
        scheduler.drain_once(FRAME);
        pool.run_until_stalled();
        assert_eq!(handle.try_take(), Some(Ok(())));
    }

    #[test]
    fn test_stateless_node_counts_as_pending() {
        let (world, resolver, scheduler, _) = setup();
        let stray = world.borrow_mut().create_entity();
        assert_eq!(world.borrow().node_state(stray), None);
        let pool = TaskPool::new();

        let r = resolver.clone();
        let handle = pool.spawn(async move {
            r.wait_until_ready(&[stray], Duration::from_millis(50)).await
        });
        pool.run_until_stalled();

        for _ in 0..4 {
            assert!(!handle.is_finished());
            scheduler.drain_once(FRAME);
            pool.run_until_stalled();
        }
        match handle.try_take() {
            Some(Err(RuntimeError::Timeout { what, frames, .. })) => {
                assert_eq!(what, "nodes to materialize");
                assert_eq!(frames, 4);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_wait_until_loaded_times_out_on_failure() {
        let (world, resolver, scheduler, avatar) = setup();
        world.borrow_mut().set_loading_state(avatar, LoadingState::Failed);
        let pool = TaskPool::new();

        let r = resolver.clone();
        let handle = pool.spawn(async move {
            r.wait_until_loaded(&[avatar], Duration::from_millis(40)).await
        });
        pool.run_until_stalled();

        for _ in 0..3 {
            scheduler.drain_once(FRAME);
            pool.run_until_stalled();
        }
        match handle.try_take() {
            Some(Err(RuntimeError::Timeout { what, .. })) => assert_eq!(what, "assets to load"),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
