use crate::vertex_group::VertexGroup;
use glam::{Quat, Vec3};
use std::{
    error::Error,
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

pub const GROUND_HALF_WIDTH: f32 = 50.0;
pub const GROUND_HALF_DEPTH: f32 = 25.0;
pub const WALL_HEIGHT: f32 = 5.0;

/// Ground slab whose top face is the y = 0 plane.
pub fn make_ground() -> VertexGroup {
    VertexGroup::make_cube(
        Vec3::new(-GROUND_HALF_WIDTH, -1.0, -GROUND_HALF_DEPTH),
        Vec3::new(GROUND_HALF_WIDTH, 0.0, GROUND_HALF_DEPTH),
    )
}

/// Wall running along z, standing on the ground.
pub fn make_wall_x() -> VertexGroup {
    VertexGroup::make_cube(
        Vec3::new(-1.0, 0.0, -GROUND_HALF_DEPTH),
        Vec3::new(1.0, WALL_HEIGHT, GROUND_HALF_DEPTH),
    )
}

/// Wall running along x, standing on the ground.
pub fn make_wall_z() -> VertexGroup {
    VertexGroup::make_cube(
        Vec3::new(-GROUND_HALF_WIDTH, 0.0, -1.0),
        Vec3::new(GROUND_HALF_WIDTH, WALL_HEIGHT, 1.0),
    )
}

pub fn make_cube(half_extents: Vec3) -> VertexGroup {
    VertexGroup::make_cube(-half_extents, half_extents)
}

pub fn load_vertex_group(path: impl AsRef<Path>) -> Result<VertexGroup, Box<dyn Error>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let vertex_group = serde_json::from_reader(reader)?;

    Ok(vertex_group)
}

pub fn save_vertex_group(path: impl AsRef<Path>, vertex_group: &VertexGroup) -> Result<(), Box<dyn Error>> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);

    serde_json::to_writer_pretty(writer, vertex_group)?;

    Ok(())
}

fn diamond_points() -> Vec<Vec3> {
    let quat_half = Quat::from_rotation_y(2.0 * std::f32::consts::PI * 0.125 * 0.5);
    let pts = [
        Vec3::new(0.1, -1.0, 0.0),
        Vec3::new(1.0, 0.0, 0.0),
        Vec3::new(1.0, 0.1, 0.0),
        Vec3::new(0.4, 0.4, 0.0),
        quat_half * Vec3::new(0.8, 0.3, 0.0),
        quat_half * Vec3::new(1.0, 0.0, 0.0),
        quat_half * Vec3::new(1.0, 0.1, 0.0),
    ];

    let quat = Quat::from_rotation_y(2.0 * std::f32::consts::PI * 0.125);
    let mut diamond = Vec::with_capacity(pts.len() * 8);
    let mut quat_acc = Quat::IDENTITY;
    for _ in 0..8 {
        diamond.extend(pts.iter().map(|pt| quat_acc * *pt));
        quat_acc *= quat;
    }
    diamond
}

/// A cut gem, eightfold symmetric about y.
pub fn make_diamond() -> Option<VertexGroup> {
    VertexGroup::from_points(&diamond_points())
}

/// Load the hull at `path`, or build it with `make` and cache it there.
pub fn load_or_make(
    path: impl AsRef<Path>,
    make: impl FnOnce() -> Option<VertexGroup>,
) -> Result<VertexGroup, Box<dyn Error>> {
    let path = path.as_ref();
    match load_vertex_group(path) {
        Ok(vertex_group) => Ok(vertex_group),
        Err(err) => {
            log::debug!("building {} after load failed: {}", path.display(), err);
            let vertex_group = make().ok_or("shape has no volume")?;
            save_vertex_group(path, &vertex_group)?;
            Ok(vertex_group)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_diamond_is_closed_and_convex() {
        let diamond = make_diamond().unwrap();
        assert!(diamond.len() <= diamond_points().len());
        // a closed triangle mesh has V - E + F = 2 with E = 3F / 2
        assert_eq!(diamond.len() as i64 - diamond.tris().len() as i64 / 2, 2);

        let centre = diamond.verts().iter().sum::<Vec3>() / diamond.len() as f32;
        for tri in diamond.tris() {
            let [a, b, c] = tri.map(|idx| diamond.vertex(idx));
            let normal = (b - a).cross(c - a);
            assert!(normal.dot(a - centre) > 0.0);
            for v in diamond.verts() {
                assert!(normal.normalize().dot(*v - a) < 1.0e-4);
            }
        }
    }

    #[test]
    fn test_ground_top_is_at_zero() {
        let ground = make_ground();
        let bounds = ground.bounds(Quat::IDENTITY, Vec3::ZERO);
        assert_eq!(bounds.maxs.y, 0.0);
        assert_eq!(bounds.mins.y, -1.0);
        assert_eq!(make_wall_x().bounds(Quat::IDENTITY, Vec3::ZERO).maxs.y, WALL_HEIGHT);
    }

    #[test]
    fn test_load_or_make_caches() {
        let path = std::env::temp_dir().join(format!("ccd-diamond-{}.json", std::process::id()));
        let _ = std::fs::remove_file(&path);

        let built = load_or_make(&path, make_diamond).unwrap();
        assert!(path.exists());
        let loaded = load_or_make(&path, || None).unwrap();
        assert_eq!(built, loaded);

        std::fs::remove_file(&path).unwrap();
        assert!(load_vertex_group(&path).is_err());
    }
}
