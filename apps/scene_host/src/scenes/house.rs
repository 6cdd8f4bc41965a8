//! House whose doors and beds are bound as nodes in bulk
//!
//! Doors flip visibility every few seconds in place of the red button clicks,
//! beds become pointer targets once they render.

use std::time::Duration;

use scene_runtime::{Entity, Result, Vec3};
use tracing::{debug, info};

use super::{Context, ensure_player, spawn_asset};

pub const HOUSE_SRC: &str = "models/vannah/scene.gltf";

const DOOR_TOGGLE_PERIOD: Duration = Duration::from_secs(2);

pub async fn init(ctx: Context) -> Result<()> {
    let house = spawn_asset(&ctx, "house", HOUSE_SRC);
    ctx.world.borrow_mut().set_position(house, Vec3::new(4.0, 0.0, 12.0));

    let timeout = ctx.default_timeout();
    ctx.resolver.wait_until_loaded(&[house], timeout).await?;
    ensure_player(&ctx).await?;

    let doors = bind_nodes(&ctx, house, |path| {
        path.contains("Object_21") || path.contains("Object_22")
    });
    let beds = bind_nodes(&ctx, house, |path| {
        path.contains("Object_111") || path.contains("Object_113")
    });

    let all: Vec<Entity> = doors.iter().chain(beds.iter()).copied().collect();
    ctx.resolver.wait_until_ready(&all, timeout).await?;
    info!(
        scene_id = "house",
        task = "init",
        "{} door(s) and {} bed(s) ready",
        doors.len(),
        beds.len()
    );

    {
        let mut world = ctx.world.borrow_mut();
        let button = world.spawn("red button");
        world.set_position(button, Vec3::new(4.0, 1.0, 4.0));
        world.set_scale(button, Vec3::new(0.5, 0.5, 0.5));
        world.add_collider(button);

        for bed in &beds {
            if !world.is_renderable(*bed) {
                continue;
            }
            world.add_collider(*bed);
            debug!("Bed {} accepts pointer events", bed);
        }
    }

    let mut since_toggle = Duration::ZERO;
    ctx.add_system(move |world, time| {
        since_toggle += time.delta;
        if since_toggle < DOOR_TOGGLE_PERIOD {
            return;
        }
        since_toggle = Duration::ZERO;
        for door in &doors {
            let visible = world.is_visible(*door);
            world.set_visible(*door, !visible);
        }
        debug!("Doors toggled on frame {}", time.frame);
    });

    Ok(())
}

/// Resolve every node path of `house` accepted by `filter`
fn bind_nodes(ctx: &Context, house: Entity, filter: impl Fn(&str) -> bool) -> Vec<Entity> {
    ctx.resolver
        .node_paths_matching(house, filter)
        .iter()
        .filter_map(|path| ctx.resolver.resolve(house, path))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::super::testing::{run_scene, succeeded};
    use super::super::SceneKind;
    use scene_runtime::SceneWorld;

    #[test]
    fn test_house_binds_doors_and_beds() {
        let (runtime, procedures) = run_scene(SceneKind::House, 40);
        assert!(succeeded(&procedures));

        let world = runtime.world().borrow();
        let mut doors = 0;
        let mut beds = 0;
        for id in 1..=world.entity_count() as u64 {
            let entity = scene_runtime::Entity(id);
            let Some((_, path)) = world.node_binding(entity) else {
                continue;
            };
            assert_eq!(world.node_state(entity), Some(scene_runtime::NodeLoadState::Ready));
            if path.contains("Door") {
                doors += 1;
            } else if path.contains("Bedroom") {
                beds += 1;
                assert!(world.has_collider(entity));
            }
        }
        assert_eq!(doors, 2);
        assert_eq!(beds, 2);
    }

    #[test]
    fn test_doors_toggle_visibility() {
        // loaded on frame 30, nodes ready on 32, then 2 s of 16 ms frames
        let (runtime, procedures) = run_scene(SceneKind::House, 32 + 125);
        assert!(succeeded(&procedures));

        let world = runtime.world().borrow();
        let hidden = (1..=world.entity_count() as u64)
            .map(scene_runtime::Entity)
            .filter(|e| world.node_binding(*e).is_some_and(|(_, p)| p.contains("Door")))
            .filter(|e| !world.is_visible(*e))
            .count();
        assert_eq!(hidden, 2);
    }
}
