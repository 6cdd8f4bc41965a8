//! Roller coaster with a camera anchor riding on the cart's head node.

use scene_runtime::{Entity, Result, RuntimeError, SceneWorld, Vec3, ensure};
use tracing::{debug, info};

use super::{Context, ensure_player, spawn_asset};

pub const COASTER_SRC: &str = "models/roller_coaster_animation.glb";

/// Node name fragment of the head riding the cart
const HEAD_NODE: &str = "Suzanne_Material_001_0";

/// Frames between camera position reports
const CAMERA_REPORT_FRAMES: u64 = 60;

pub async fn init(ctx: Context) -> Result<()> {
    let coaster = spawn_asset(&ctx, "roller coaster", COASTER_SRC);
    {
        let mut world = ctx.world.borrow_mut();
        world.set_position(coaster, Vec3::new(32.0, 4.0, 32.0));
        world.set_scale(coaster, Vec3::new(0.085, 0.085, 0.085));
    }

    let timeout = ctx.default_timeout();
    ctx.resolver.wait_until_loaded(&[coaster], timeout).await?;
    ensure_player(&ctx).await?;

    let info = ctx
        .resolver
        .loaded_info(coaster)
        .ok_or_else(|| RuntimeError::Assertion("roller coaster is not loaded".to_string()))?;
    ensure(
        info.animation_names.len() == 1,
        format!("expected one animation, found {}", info.animation_names.len()),
    )?;
    {
        let mut world = ctx.world.borrow_mut();
        world.play_animation(coaster, &info.animation_names[0], false);
        if let Some(animator) = world.animator_mut(coaster) {
            animator.playing = false;
            animator.speed = 0.0;
        }
    }

    let head_paths = ctx.resolver.node_paths_matching(coaster, |path| path.contains(HEAD_NODE));
    ensure(!head_paths.is_empty(), "roller coaster has no head node")?;
    let head = ctx
        .resolver
        .resolve(coaster, &head_paths[0])
        .ok_or_else(|| RuntimeError::Assertion(format!("'{}' did not resolve", head_paths[0])))?;
    ctx.resolver.wait_until_ready(&[head], timeout).await?;

    let camera = attach_camera(&ctx, head);
    info!(scene_id = "coaster", task = "init", "Camera {} follows head {}", camera, head);

    ctx.add_system(move |world, time| {
        if time.frame % CAMERA_REPORT_FRAMES != 0 {
            return;
        }
        if let Some(position) = world.world_position(camera) {
            debug!("Camera at ({:.2}, {:.2}, {:.2})", position.x, position.y, position.z);
        }
    });
    Ok(())
}

/// Entity parented to `head`, used as the cinematic camera
fn attach_camera(ctx: &Context, head: Entity) -> Entity {
    let mut world = ctx.world.borrow_mut();
    let camera = world.spawn("camera anchor");
    world.set_parent(camera, head);
    camera
}
