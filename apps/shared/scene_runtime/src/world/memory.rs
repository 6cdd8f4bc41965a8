use std::collections::{BTreeMap, BTreeSet};
use std::ops::{Add, Mul, Sub};

use scene_schema::SceneManifest;
use tracing::{debug, trace};

use super::{Entity, LoadingState, NodeLoadState, SceneWorld};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3::new(0.0, 0.0, 0.0);
    pub const ONE: Vec3 = Vec3::new(1.0, 1.0, 1.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Component-wise product
    pub fn scaled_by(&self, other: Vec3) -> Vec3 {
        Vec3::new(self.x * other.x, self.y * other.y, self.z * other.z)
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Vec3;

    fn mul(self, rhs: f32) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    pub parent: Option<Entity>,
    pub position: Vec3,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            parent: None,
            position: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnimatorState {
    pub clip: Option<String>,
    pub playing: bool,
    pub looping: bool,
    pub speed: f32,
    /// Seconds into the current clip
    pub time: f32,
}

impl Default for AnimatorState {
    fn default() -> Self {
        Self {
            clip: None,
            playing: false,
            looping: false,
            speed: 1.0,
            time: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
struct ContainerRecord {
    src: String,
    state: LoadingState,
    requested_frame: u64,
}

#[derive(Debug, Clone)]
struct NodeBinding {
    container: Entity,
    path: String,
    state: NodeLoadState,
    bound_frame: u64,
}

/// Headless scene engine backed by ordered maps
///
/// Asset streaming is simulated from a [`SceneManifest`]: each call to
/// [`MemoryWorld::simulate`] advances one engine frame.
pub struct MemoryWorld {
    manifest: SceneManifest,
    frame: u64,
    next_entity: u64,
    names: BTreeMap<Entity, String>,
    transforms: BTreeMap<Entity, Transform>,
    containers: BTreeMap<Entity, ContainerRecord>,
    nodes: BTreeMap<Entity, NodeBinding>,
    visibility: BTreeMap<Entity, bool>,
    animators: BTreeMap<Entity, AnimatorState>,
    colliders: BTreeSet<Entity>,
    materials: BTreeMap<Entity, String>,
    renderables: BTreeSet<Entity>,
    player: Option<Entity>,
}

impl MemoryWorld {
    pub fn new(manifest: SceneManifest) -> Self {
        let mut world = Self {
            manifest,
            frame: 0,
            next_entity: 1,
            names: BTreeMap::new(),
            transforms: BTreeMap::new(),
            containers: BTreeMap::new(),
            nodes: BTreeMap::new(),
            visibility: BTreeMap::new(),
            animators: BTreeMap::new(),
            colliders: BTreeSet::new(),
            materials: BTreeMap::new(),
            renderables: BTreeSet::new(),
            player: None,
        };
        world.spawn_player_if_due();
        world
    }

    pub fn manifest(&self) -> &SceneManifest {
        &self.manifest
    }

    /// Number of simulated engine frames
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Create a named entity with a default transform
    pub fn spawn(&mut self, name: &str) -> Entity {
        let entity = self.create_entity();
        self.names.insert(entity, name.to_string());
        entity
    }

    pub fn name(&self, entity: Entity) -> Option<&str> {
        self.names.get(&entity).map(String::as_str)
    }

    /// Number of entities created so far
    pub fn entity_count(&self) -> usize {
        self.transforms.len()
    }

    /// Attach a composite asset to `entity` and start streaming it
    pub fn load_asset(&mut self, entity: Entity, src: &str) {
        debug!("Loading '{}' into {}", src, entity);
        self.containers.insert(
            entity,
            ContainerRecord {
                src: src.to_string(),
                state: LoadingState::Pending,
                requested_frame: self.frame,
            },
        );
    }

    pub fn asset_src(&self, container: Entity) -> Option<&str> {
        self.containers.get(&container).map(|record| record.src.as_str())
    }

    /// Override the loading state of a container
    pub fn set_loading_state(&mut self, container: Entity, state: LoadingState) {
        if let Some(record) = self.containers.get_mut(&container) {
            record.state = state;
        }
    }

    /// Override the state of a bound node
    pub fn set_node_state(&mut self, node: Entity, state: NodeLoadState) {
        if let Some(binding) = self.nodes.get_mut(&node) {
            binding.state = state;
            if state == NodeLoadState::Ready {
                self.renderables.insert(node);
            }
        }
    }

    /// Container and path a node is bound to
    pub fn node_binding(&self, node: Entity) -> Option<(Entity, &str)> {
        self.nodes
            .get(&node)
            .map(|binding| (binding.container, binding.path.as_str()))
    }

    pub fn transform(&self, entity: Entity) -> Option<&Transform> {
        self.transforms.get(&entity)
    }

    pub fn parent(&self, entity: Entity) -> Option<Entity> {
        self.transforms.get(&entity).and_then(|t| t.parent)
    }

    pub fn children(&self, parent: Entity) -> Vec<Entity> {
        self.transforms
            .iter()
            .filter(|(_, t)| t.parent == Some(parent))
            .map(|(entity, _)| *entity)
            .collect()
    }

    pub fn set_position(&mut self, entity: Entity, position: Vec3) {
        if let Some(transform) = self.transforms.get_mut(&entity) {
            transform.position = position;
        }
    }

    pub fn translate(&mut self, entity: Entity, offset: Vec3) {
        if let Some(transform) = self.transforms.get_mut(&entity) {
            transform.position = transform.position + offset;
        }
    }

    pub fn set_scale(&mut self, entity: Entity, scale: Vec3) {
        if let Some(transform) = self.transforms.get_mut(&entity) {
            transform.scale = scale;
        }
    }

    /// Position of `entity` after applying every ancestor transform
    pub fn world_position(&self, entity: Entity) -> Option<Vec3> {
        let mut transform = self.transforms.get(&entity)?;
        let mut position = transform.position;
        // Bounded walk, a parent cycle must not hang the engine
        for _ in 0..self.transforms.len() {
            let Some(parent) = transform.parent else {
                return Some(position);
            };
            transform = self.transforms.get(&parent)?;
            position = transform.position + position.scaled_by(transform.scale);
        }
        Some(position)
    }

    pub fn set_visible(&mut self, entity: Entity, visible: bool) {
        self.visibility.insert(entity, visible);
    }

    /// Entities are visible unless hidden explicitly
    pub fn is_visible(&self, entity: Entity) -> bool {
        self.visibility.get(&entity).copied().unwrap_or(true)
    }

    /// Start playing `clip` on the animator of `entity`
    pub fn play_animation(&mut self, entity: Entity, clip: &str, looping: bool) {
        let animator = self.animators.entry(entity).or_default();
        animator.clip = Some(clip.to_string());
        animator.playing = true;
        animator.looping = looping;
        animator.time = 0.0;
    }

    pub fn animator(&self, entity: Entity) -> Option<&AnimatorState> {
        self.animators.get(&entity)
    }

    pub fn animator_mut(&mut self, entity: Entity) -> Option<&mut AnimatorState> {
        self.animators.get_mut(&entity)
    }

    /// Mark `entity` as a pointer target
    pub fn add_collider(&mut self, entity: Entity) {
        self.colliders.insert(entity);
    }

    pub fn has_collider(&self, entity: Entity) -> bool {
        self.colliders.contains(&entity)
    }

    /// Use the named material of a loaded asset on `entity`
    pub fn set_material(&mut self, entity: Entity, material: &str) {
        self.materials.insert(entity, material.to_string());
    }

    pub fn material(&self, entity: Entity) -> Option<&str> {
        self.materials.get(&entity).map(String::as_str)
    }

    /// True once a bound node has materialized
    pub fn is_renderable(&self, entity: Entity) -> bool {
        self.renderables.contains(&entity)
    }

    /// Local player entity, available from the manifest's `player_frame`
    pub fn player(&self) -> Option<Entity> {
        self.player
    }

    /// Advance streaming by one engine frame
    ///
    /// Containers move Pending -> Loading, then to Finished (or Failed) once
    /// `load_frames` have passed since the request. Bound nodes become Ready
    /// `node_frames` after binding if their container finished and knows the
    /// path, Error otherwise.
    ///
    /// # Returns
    /// The new frame number
    pub fn simulate(&mut self) -> u64 {
        self.frame += 1;
        let frame = self.frame;
        self.spawn_player_if_due();

        for (entity, record) in self.containers.iter_mut() {
            if record.state == LoadingState::Pending {
                record.state = LoadingState::Loading;
            }
            if record.state != LoadingState::Loading {
                continue;
            }
            match self.manifest.asset(&record.src) {
                None => {
                    debug!("Unknown asset '{}' for {}", record.src, entity);
                    record.state = LoadingState::Failed;
                }
                Some(definition)
                    if frame >= record.requested_frame + u64::from(definition.load_frames) =>
                {
                    record.state = if definition.fail {
                        LoadingState::Failed
                    } else {
                        LoadingState::Finished
                    };
                    trace!("{} '{}' is {:?} on frame {}", entity, record.src, record.state, frame);
                }
                Some(_) => {}
            }
        }

        for (entity, binding) in self.nodes.iter_mut() {
            if binding.state != NodeLoadState::Pending {
                continue;
            }
            let Some(record) = self.containers.get(&binding.container) else {
                binding.state = NodeLoadState::Error;
                continue;
            };
            match record.state {
                LoadingState::Finished => {
                    let definition = self.manifest.asset(&record.src);
                    let node_frames = definition.map(|d| u64::from(d.node_frames)).unwrap_or(0);
                    if frame < binding.bound_frame + node_frames {
                        continue;
                    }
                    let known = definition
                        .is_some_and(|d| d.node_paths.iter().any(|p| *p == binding.path));
                    if known {
                        binding.state = NodeLoadState::Ready;
                        self.renderables.insert(*entity);
                    } else {
                        binding.state = NodeLoadState::Error;
                    }
                }
                LoadingState::Failed => binding.state = NodeLoadState::Error,
                LoadingState::Pending | LoadingState::Loading => {}
            }
        }

        frame
    }

    fn spawn_player_if_due(&mut self) {
        if self.player.is_none() && self.frame >= self.manifest.player_frame {
            let player = self.spawn("player");
            debug!("Player {} spawned on frame {}", player, self.frame);
            self.player = Some(player);
        }
    }

    fn asset_definition(&self, container: Entity) -> Option<&scene_schema::AssetDefinition> {
        self.containers
            .get(&container)
            .and_then(|record| self.manifest.asset(&record.src))
    }
}

impl SceneWorld for MemoryWorld {
    fn loading_state(&self, container: Entity) -> Option<LoadingState> {
        self.containers.get(&container).map(|record| record.state)
    }

    fn node_paths(&self, container: Entity) -> Option<&[String]> {
        self.asset_definition(container)
            .map(|definition| definition.node_paths.as_slice())
    }

    fn animation_names(&self, container: Entity) -> Option<&[String]> {
        self.asset_definition(container)
            .map(|definition| definition.animation_names.as_slice())
    }

    fn material_names(&self, container: Entity) -> Option<&[String]> {
        self.asset_definition(container)
            .map(|definition| definition.material_names.as_slice())
    }

    fn create_entity(&mut self) -> Entity {
        let entity = Entity(self.next_entity);
        self.next_entity += 1;
        self.transforms.insert(entity, Transform::default());
        entity
    }

    fn set_parent(&mut self, child: Entity, parent: Entity) {
        if let Some(transform) = self.transforms.get_mut(&child) {
            transform.parent = Some(parent);
        }
    }

    fn bind_node_path(&mut self, node: Entity, container: Entity, path: &str) {
        self.nodes.insert(
            node,
            NodeBinding {
                container,
                path: path.to_string(),
                state: NodeLoadState::Pending,
                bound_frame: self.frame,
            },
        );
    }

    fn find_node(&self, container: Entity, path: &str) -> Option<Entity> {
        self.nodes
            .iter()
            .find(|(_, binding)| binding.container == container && binding.path == path)
            .map(|(entity, _)| *entity)
    }

    fn node_state(&self, node: Entity) -> Option<NodeLoadState> {
        self.nodes.get(&node).map(|binding| binding.state)
    }
}
