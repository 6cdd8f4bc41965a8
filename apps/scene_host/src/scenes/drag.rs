//! Draggable props: every node of the ground model is made draggable by its own procedure.

use scene_runtime::{Entity, Result, RuntimeError, Vec3};
use tracing::{debug, info};

use super::{Context, spawn_asset};

pub const GROUND_SRC: &str = "models/Ground.gltf";

pub const PROP_NODES: [&str; 4] = [
    "Ground/Grass",
    "Ground/Rock_01",
    "Ground/Log_01",
    "Ground/Stump_01",
];

/// Frames a locked drag keeps moving its prop
const DRAG_FRAMES: u32 = 30;

const DRAG_STEP: Vec3 = Vec3::new(0.05, 0.0, 0.0);

pub fn spawn_ground(ctx: &Context) -> Entity {
    let ground = spawn_asset(ctx, "ground", GROUND_SRC);
    let mut world = ctx.world.borrow_mut();
    world.set_position(ground, Vec3::new(8.0, 0.0, 8.0));
    world.set_scale(ground, Vec3::new(1.6, 1.6, 1.6));
    ground
}

/// Wait for the prop at `path`, then give it a collider and a drag system
///
/// A node that ends in error has no mesh and is left alone.
pub async fn make_draggable(ctx: Context, ground: Entity, path: &'static str) -> Result<()> {
    let timeout = ctx.default_timeout();
    ctx.resolver.wait_until_loaded(&[ground], timeout).await?;

    let prop = ctx
        .resolver
        .resolve(ground, path)
        .ok_or_else(|| RuntimeError::Assertion(format!("'{}' is not a node of the ground", path)))?;
    ctx.resolver.wait_until_ready(&[prop], timeout).await?;

    if !ctx.world.borrow().is_renderable(prop) {
        debug!("'{}' has no mesh, not draggable", path);
        return Ok(());
    }
    ctx.world.borrow_mut().add_collider(prop);
    info!(scene_id = "drag", task = path, "{} is draggable", prop);

    let mut remaining = DRAG_FRAMES;
    ctx.add_system(move |world, _| {
        if remaining == 0 {
            return;
        }
        remaining -= 1;
        world.translate(prop, DRAG_STEP);
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::testing::{FRAME, succeeded};
    use super::super::{SceneKind, default_manifest, launch, step};
    use super::*;
    use scene_runtime::{MemoryWorld, RuntimeConfig, SceneRuntime, SceneWorld};

    #[test]
    fn test_props_resume_on_the_same_frame() {
        let mut runtime = SceneRuntime::new(MemoryWorld::new(default_manifest()), RuntimeConfig::default());
        let procedures = launch(SceneKind::Drag, &runtime);
        assert_eq!(procedures.len(), PROP_NODES.len());
        // one pending loaded-wait per procedure
        assert_eq!(runtime.scheduler().pending(), PROP_NODES.len());

        // ground finishes on frame 12, nodes bound then and ready on frame 13
        for _ in 0..12 {
            step(&mut runtime, FRAME);
            assert!(procedures.iter().all(|p| !p.handle.is_finished()));
        }
        assert_eq!(runtime.resolver().cached(), PROP_NODES.len());
        step(&mut runtime, FRAME);
        assert!(succeeded(&procedures));

        let world = runtime.world().borrow();
        let ground = Entity(1);
        assert_eq!(world.name(ground), Some("ground"));
        for path in PROP_NODES {
            let prop = world.find_node(ground, path).unwrap();
            assert!(world.has_collider(prop));
        }
    }

    #[test]
    fn test_drag_moves_props_then_stops() {
        let mut runtime = SceneRuntime::new(MemoryWorld::new(default_manifest()), RuntimeConfig::default());
        let procedures = launch(SceneKind::Drag, &runtime);
        for _ in 0..13 + DRAG_FRAMES + 10 {
            step(&mut runtime, FRAME);
        }
        assert!(succeeded(&procedures));

        let world = runtime.world().borrow();
        let rock = world.find_node(Entity(1), "Ground/Rock_01").unwrap();
        let position = world.transform(rock).unwrap().position;
        assert!((position.x - DRAG_STEP.x * DRAG_FRAMES as f32).abs() < 1e-4);
        assert_eq!(position.y, 0.0);
    }
}
