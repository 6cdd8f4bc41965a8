//! Example scenes run by the host
//!
//! Each scene spawns one or more procedures on the runtime. A procedure that
//! fails is logged and counted, the other procedures keep running.

use std::future::Future;
use std::time::Duration;

use clap::ValueEnum;
use scene_runtime::{
    Entity, FrameTime, MemoryWorld, Result, RuntimeError, SceneContext, SceneRuntime, TaskHandle,
};
use scene_schema::{AssetDefinition, SceneManifest};
use tracing::{debug, error, info};

pub mod avatar;
pub mod coaster;
pub mod drag;
pub mod house;
pub mod puffer;

pub type Context = SceneContext<MemoryWorld>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SceneKind {
    House,
    Avatar,
    Coaster,
    Puffer,
    Drag,
}

impl SceneKind {
    pub fn all() -> [SceneKind; 5] {
        [
            SceneKind::House,
            SceneKind::Avatar,
            SceneKind::Coaster,
            SceneKind::Puffer,
            SceneKind::Drag,
        ]
    }

    pub fn id(&self) -> &'static str {
        match self {
            SceneKind::House => "house",
            SceneKind::Avatar => "avatar",
            SceneKind::Coaster => "coaster",
            SceneKind::Puffer => "puffer",
            SceneKind::Drag => "drag",
        }
    }
}

/// A spawned scene procedure; the handle yields true on success
pub struct Procedure {
    pub scene: &'static str,
    pub task: &'static str,
    pub handle: TaskHandle<bool>,
}

/// Spawn every procedure of `kind`
pub fn launch(kind: SceneKind, runtime: &SceneRuntime<MemoryWorld>) -> Vec<Procedure> {
    let ctx = runtime.context();
    match kind {
        SceneKind::House => vec![spawn_procedure(runtime, kind, "init", house::init(ctx))],
        SceneKind::Avatar => vec![
            spawn_procedure(runtime, kind, "dying", avatar::dying(ctx.clone())),
            spawn_procedure(runtime, kind, "sword", avatar::with_sword(ctx)),
        ],
        SceneKind::Coaster => vec![spawn_procedure(runtime, kind, "init", coaster::init(ctx))],
        SceneKind::Puffer => vec![spawn_procedure(runtime, kind, "init", puffer::init(ctx))],
        SceneKind::Drag => {
            let ground = drag::spawn_ground(&ctx);
            drag::PROP_NODES
                .into_iter()
                .map(|path| {
                    let procedure = drag::make_draggable(ctx.clone(), ground, path);
                    spawn_procedure(runtime, kind, path, procedure)
                })
                .collect()
        }
    }
}

fn spawn_procedure<F>(
    runtime: &SceneRuntime<MemoryWorld>,
    kind: SceneKind,
    task: &'static str,
    procedure: F,
) -> Procedure
where
    F: Future<Output = Result<()>> + 'static,
{
    let scene = kind.id();
    let handle = runtime.spawn(async move {
        match procedure.await {
            Ok(()) => {
                info!(scene_id = scene, task = task, "completed");
                true
            }
            Err(RuntimeError::SchedulerClosed) => {
                debug!(scene_id = scene, task = task, "interrupted by shutdown");
                false
            }
            Err(e) => {
                error!(scene_id = scene, task = task, "{}", e);
                false
            }
        }
    });
    Procedure { scene, task, handle }
}

/// Advance the engine then the runtime by one frame
pub fn step(runtime: &mut SceneRuntime<MemoryWorld>, delta: Duration) -> FrameTime {
    runtime.world().borrow_mut().simulate();
    runtime.advance(delta)
}

/// Wait for the local player entity
pub async fn ensure_player(ctx: &Context) -> Result<Entity> {
    let world = ctx.world.clone();
    ctx.waiter
        .wait_for(move || world.borrow().player(), ctx.default_timeout())
        .await
}

/// Spawn a named entity and start streaming `src` into it
pub fn spawn_asset(ctx: &Context, name: &str, src: &str) -> Entity {
    let mut world = ctx.world.borrow_mut();
    let entity = world.spawn(name);
    world.load_asset(entity, src);
    entity
}

/// Manifest describing the assets of the example scenes
pub fn default_manifest() -> SceneManifest {
    SceneManifest {
        player_frame: 5,
        ..Default::default()
    }
    .with_asset(
        house::HOUSE_SRC,
        AssetDefinition::with_nodes([
            "Sketchfab_model/root/Object_5",
            "Sketchfab_model/root/Door_L/Object_21",
            "Sketchfab_model/root/Door_R/Object_22",
            "Sketchfab_model/root/Bedroom/Object_111",
            "Sketchfab_model/root/Bedroom/Object_113",
        ])
        .with_load_frames(30)
        .with_node_frames(2),
    )
    .with_asset(
        avatar::AVATAR_SRC,
        AssetDefinition::with_nodes([
            "Armature",
            "Armature/Hips",
            "Armature/Hips/Spine",
            "Armature/Hips/Spine/LeftArm/LeftHand",
            "Armature/Hips/Spine/RightArm/RightHand",
        ])
        .with_animations(["Dying"])
        .with_materials(["Arissa_MAT"])
        .with_load_frames(20),
    )
    .with_asset(
        avatar::SWORD_SRC,
        AssetDefinition::with_nodes(["Sword_01"]).with_load_frames(5),
    )
    .with_asset(
        coaster::COASTER_SRC,
        AssetDefinition::with_nodes([
            "Sketchfab_model/Root/Track",
            "Sketchfab_model/Root/Cart",
            "Sketchfab_model/Root/Cart/Suzanne/Suzanne_Material_001_0",
        ])
        .with_animations(["Take 001"])
        .with_load_frames(45),
    )
    .with_asset(
        puffer::PUFFER_SRC,
        AssetDefinition::with_nodes(["node-0", "node-0/buffer-0-mesh-0", "mesh_collider/Cube.001"])
            .with_materials(["PufferFish_MAT"])
            .with_load_frames(10),
    )
    .with_asset(
        drag::GROUND_SRC,
        AssetDefinition::with_nodes(drag::PROP_NODES).with_load_frames(12),
    )
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use scene_runtime::RuntimeConfig;

    pub const FRAME: Duration = Duration::from_millis(16);

    /// Run `kind` against the built-in manifest for `frames` frames
    pub fn run_scene(kind: SceneKind, frames: u32) -> (SceneRuntime<MemoryWorld>, Vec<Procedure>) {
        let mut runtime = SceneRuntime::new(MemoryWorld::new(default_manifest()), RuntimeConfig::default());
        let procedures = launch(kind, &runtime);
        for _ in 0..frames {
            step(&mut runtime, FRAME);
        }
        (runtime, procedures)
    }

    pub fn succeeded(procedures: &[Procedure]) -> bool {
        procedures.iter().all(|p| p.handle.try_take() == Some(true))
    }
}
