//! Puffer fish: reuse its material on a plane and make its collider node clickable.

use scene_runtime::{Result, RuntimeError, Vec3, ensure};
use tracing::info;

use super::{Context, ensure_player, spawn_asset};

pub const PUFFER_SRC: &str = "models/puffer.glb";

const MESH_NODE: &str = "node-0/buffer-0-mesh-0";
const COLLIDER_NODE: &str = "mesh_collider/Cube.001";

pub async fn init(ctx: Context) -> Result<()> {
    let puffer = spawn_asset(&ctx, "puffer", PUFFER_SRC);
    {
        let mut world = ctx.world.borrow_mut();
        world.set_position(puffer, Vec3::new(8.0, 1.0, 8.0));
        world.set_scale(puffer, Vec3::new(0.1, 0.1, 0.1));
    }

    let timeout = ctx.default_timeout();
    ctx.resolver.wait_until_loaded(&[puffer], timeout).await?;
    ensure_player(&ctx).await?;

    let info = ctx
        .resolver
        .loaded_info(puffer)
        .ok_or_else(|| RuntimeError::Assertion("puffer is not loaded".to_string()))?;
    ensure(info.material_names.len() == 1, "expected exactly one puffer material")?;
    {
        let mut world = ctx.world.borrow_mut();
        let plane = world.spawn("material plane");
        world.set_material(plane, &info.material_names[0]);
        world.set_position(plane, Vec3::new(4.0, 1.5, 8.0));
        world.set_scale(plane, Vec3::new(2.0, 2.0, 2.0));
    }

    let mesh = ctx.resolver.resolve(puffer, MESH_NODE);
    let collider = ctx.resolver.resolve(puffer, COLLIDER_NODE);
    let (Some(mesh), Some(collider)) = (mesh, collider) else {
        return Err(RuntimeError::Assertion("puffer mesh or collider node missing".to_string()));
    };
    ctx.resolver.wait_until_ready(&[mesh, collider], timeout).await?;

    ctx.world.borrow_mut().add_collider(collider);
    info!(scene_id = "puffer", task = "init", "Collider {} drives mesh {}", collider, mesh);
    Ok(())
}
