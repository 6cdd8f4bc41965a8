//! Two avatars sharing one asset: one holds a sword in its right hand, the
//! other plays its dying animation and sinks to the ground.

use scene_runtime::{Entity, MemoryWorld, Result, RuntimeError, SceneWorld, Vec3, ensure};
use tracing::{debug, info, warn};

use super::{Context, ensure_player, spawn_asset};

pub const AVATAR_SRC: &str = "models/arissa.glb";
pub const SWORD_SRC: &str = "models/Sword_01.glb";

/// Seconds the dying avatar stands still before sinking
const SINK_DELAY: f32 = 2.0;

pub async fn with_sword(ctx: Context) -> Result<()> {
    let avatar = spawn_asset(&ctx, "arissa with sword", AVATAR_SRC);
    ctx.world.borrow_mut().set_position(avatar, Vec3::new(4.0, 1.0, 8.0));

    ctx.resolver.wait_until_loaded(&[avatar], ctx.default_timeout()).await?;
    ensure_player(&ctx).await?;

    let hand_path = ctx
        .resolver
        .node_paths_matching(avatar, |path| path.to_lowercase().ends_with("righthand"))
        .into_iter()
        .next()
        .ok_or_else(|| RuntimeError::Assertion("avatar has no right hand node".to_string()))?;
    let hand = ctx
        .resolver
        .resolve(avatar, &hand_path)
        .ok_or_else(|| RuntimeError::Assertion(format!("'{}' did not resolve", hand_path)))?;

    let sword = spawn_asset(&ctx, "sword", SWORD_SRC);
    ctx.world.borrow_mut().set_parent(sword, hand);
    info!(scene_id = "avatar", task = "sword", "Sword {} attached to '{}'", sword, hand_path);
    Ok(())
}

pub async fn dying(ctx: Context) -> Result<()> {
    let avatar = spawn_asset(&ctx, "arissa dying", AVATAR_SRC);
    ctx.world.borrow_mut().set_position(avatar, Vec3::new(8.0, 1.0, 8.0));

    let timeout = ctx.default_timeout();
    ctx.resolver.wait_until_loaded(&[avatar], timeout).await?;
    ensure_player(&ctx).await?;

    let info = ctx
        .resolver
        .loaded_info(avatar)
        .ok_or_else(|| RuntimeError::Assertion("avatar is not loaded".to_string()))?;
    info!(scene_id = "avatar", task = "dying", "Animations: {:?}", info.animation_names);

    ensure(!info.animation_names.is_empty(), "avatar has no animation")?;
    {
        let mut world = ctx.world.borrow_mut();
        world.play_animation(avatar, &info.animation_names[0], false);
        if let Some(animator) = world.animator_mut(avatar) {
            animator.speed = 0.0;
        }
    }

    let nodes: Vec<Entity> = ctx
        .resolver
        .resolve_all(avatar, &info.node_paths)
        .into_iter()
        .flatten()
        .collect();
    ctx.resolver.wait_until_ready(&nodes, timeout).await?;
    debug!("{} avatar node(s) ready", nodes.len());

    let mut elapsed = 0.0;
    ctx.add_system(move |world, time| {
        let dt = time.delta_seconds();
        elapsed += dt;
        if elapsed < SINK_DELAY {
            return;
        }
        sink(world, avatar, dt);
        for node in &nodes {
            if !sink(world, *node, dt) {
                warn!("Transform not found for {}", node);
            }
        }
    });
    Ok(())
}

/// Lower `entity` by `amount`, never below the ground
fn sink(world: &mut MemoryWorld, entity: Entity, amount: f32) -> bool {
    let Some(position) = world.transform(entity).map(|t| t.position) else {
        return false;
    };
    world.set_position(entity, Vec3::new(position.x, (position.y - amount).max(0.0), position.z));
    true
}

#[cfg(test)]
mod tests {
    use super::super::SceneKind;
    use super::super::testing::{run_scene, succeeded};
    use super::*;

    fn find(world: &MemoryWorld, name: &str) -> Entity {
        (1..=world.entity_count() as u64)
            .map(Entity)
            .find(|e| world.name(*e) == Some(name))
            .unwrap()
    }

    #[test]
    fn test_sword_follows_right_hand() {
        let (runtime, procedures) = run_scene(SceneKind::Avatar, 30);
        assert!(succeeded(&procedures));

        let world = runtime.world().borrow();
        let avatar = find(&world, "arissa with sword");
        let sword = find(&world, "sword");
        let hand = world.parent(sword).unwrap();

        assert_eq!(
            world.node_binding(hand),
            Some((avatar, "Armature/Hips/Spine/RightArm/RightHand"))
        );
        assert_eq!(world.parent(hand), Some(avatar));
        assert_eq!(world.asset_src(sword), Some(SWORD_SRC));
    }

    #[test]
    fn test_dying_avatar_sinks() {
        // loaded on frame 20, nodes ready on 21, sinking starts 2 s later
        let (runtime, procedures) = run_scene(SceneKind::Avatar, 21 + 200);
        assert!(succeeded(&procedures));

        let world = runtime.world().borrow();
        let avatar = find(&world, "arissa dying");
        let animator = world.animator(avatar).unwrap();
        assert_eq!(animator.clip.as_deref(), Some("Dying"));
        assert_eq!(animator.speed, 0.0);

        let position = world.transform(avatar).unwrap().position;
        assert_eq!(position.y, 0.0);
        assert_eq!(position.x, 8.0);
    }

    #[test]
    fn test_sink_clamps_at_ground() {
        let mut world = MemoryWorld::new(scene_schema::SceneManifest::default());
        let entity = world.spawn("crate");
        world.set_position(entity, Vec3::new(0.0, 0.5, 0.0));

        assert!(sink(&mut world, entity, 0.2));
        assert!(sink(&mut world, entity, 1.0));
        assert_eq!(world.transform(entity).unwrap().position.y, 0.0);
        assert!(!sink(&mut world, Entity(999), 1.0));
    }
}
