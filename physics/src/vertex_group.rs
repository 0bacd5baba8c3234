use crate::{
    bounds::Bounds,
    hull::build_convex_hull,
    math::exact_collision_time,
    options::EPSILON,
    simplex::SupportIndex,
};
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Slope, relative to the distance from the seed vertex, still counted as in the face plane.
const FACE_ANGLE_TOLERANCE: f32 = 5.0e-3;

/// A plane through `point` facing along `normal`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Plane {
    pub point: Vec3,
    pub normal: Vec3,
}

impl Plane {
    pub fn new(point: Vec3, normal: Vec3) -> Self {
        Self { point, normal }
    }

    pub fn distance_to(&self, pt: Vec3) -> f32 {
        (pt - self.point).dot(self.normal)
    }
}

/// A convex hull in body local coordinates.
///
/// Triangles wind counter clockwise when seen from outside the hull.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VertexGroup {
    verts: Vec<Vec3>,
    tris: Vec<[u32; 3]>,
}

impl VertexGroup {
    pub fn new(verts: Vec<Vec3>, tris: Vec<[u32; 3]>) -> Self {
        debug_assert!(!verts.is_empty());
        debug_assert!(tris
            .iter()
            .flatten()
            .all(|&idx| (idx as usize) < verts.len()));
        Self { verts, tris }
    }

    /// Convex hull of a point cloud, `None` if the points enclose no volume.
    pub fn from_points(points: &[Vec3]) -> Option<Self> {
        build_convex_hull(points).map(|(verts, tris)| Self::new(verts, tris))
    }

    /// Axis aligned box between two corners. Vertex `i` takes the high coordinate on x, y and z
    /// for bits 0, 1 and 2 of `i`.
    pub fn make_cube(lo: Vec3, hi: Vec3) -> Self {
        let verts = (0..8)
            .map(|i| {
                Vec3::new(
                    if i & 1 != 0 { hi.x } else { lo.x },
                    if i & 2 != 0 { hi.y } else { lo.y },
                    if i & 4 != 0 { hi.z } else { lo.z },
                )
            })
            .collect();
        let tris = vec![
            [0, 4, 6],
            [0, 6, 2],
            [1, 3, 7],
            [1, 7, 5],
            [0, 1, 5],
            [0, 5, 4],
            [2, 6, 7],
            [2, 7, 3],
            [0, 2, 3],
            [0, 3, 1],
            [4, 5, 7],
            [4, 7, 6],
        ];
        Self::new(verts, tris)
    }

    /// Zero thickness quad, both sides triangulated.
    pub fn make_plane(bl: Vec3, br: Vec3, tl: Vec3, tr: Vec3) -> Self {
        Self::new(
            vec![bl, br, tl, tr],
            vec![[0, 1, 3], [0, 3, 2], [0, 3, 1], [0, 2, 3]],
        )
    }

    pub fn len(&self) -> usize {
        self.verts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.verts.is_empty()
    }

    pub fn vertex(&self, idx: u32) -> Vec3 {
        self.verts[idx as usize]
    }

    pub fn verts(&self) -> &[Vec3] {
        &self.verts
    }

    pub fn tris(&self) -> &[[u32; 3]] {
        &self.tris
    }

    /// Distance of the furthest vertex from the local origin.
    pub fn radius(&self) -> f32 {
        self.verts
            .iter()
            .map(|v| v.length())
            .fold(0.0, f32::max)
    }

    /// Copy with every vertex shifted by `-offset`, used to move the origin to the centre of mass.
    pub fn recentred(&self, offset: Vec3) -> Self {
        Self {
            verts: self.verts.iter().map(|v| *v - offset).collect(),
            tris: self.tris.clone(),
        }
    }

    pub fn bounds(&self, orientation: Quat, position: Vec3) -> Bounds {
        self.verts
            .iter()
            .fold(Bounds::new(), |acc, v| acc + (orientation * *v + position))
    }

    /// The first vertex furthest along `d`.
    pub fn find_support_vertex(&self, d: Vec3) -> u32 {
        let mut max_idx = 0;
        let mut max_dist = f32::MIN;
        for (i, v) in self.verts.iter().enumerate() {
            let dist = v.dot(d);
            if dist > max_dist {
                max_dist = dist;
                max_idx = i;
            }
        }
        max_idx as u32
    }

    /// Support vertex along `d` for a hull sweeping by `disp`. The vertex is taken at the end of
    /// the sweep when the sweep moves it further along `d`.
    pub fn find_displaced_support_vertex(&self, d: Vec3, disp: Vec3) -> SupportIndex {
        SupportIndex {
            index: self.find_support_vertex(d),
            displaced: d.dot(disp) > 0.0,
        }
    }

    /// Largest distance any vertex moves when rotated by the small rotation vector `w_dt`.
    pub fn max_rotational_displacement(&self, w_dt: Vec3) -> f32 {
        if w_dt.length() < EPSILON {
            return 0.0;
        }

        self.verts
            .iter()
            .map(|v| w_dt.cross(*v).length())
            .fold(0.0, f32::max)
    }

    /// Earliest fraction of the motion at which any vertex reaches `plane`.
    ///
    /// The hull translates from `x0` to `x1` and rotates along the linear blend of `q0` and `q1`.
    /// The result is greater than 1 when no vertex reaches the plane within the motion.
    pub fn find_intersection_time(&self, plane: &Plane, x0: Vec3, x1: Vec3, q0: Quat, q1: Quat) -> f32 {
        let mut frac_t = 1.001;
        for v in &self.verts {
            let t = exact_collision_time(*v, plane.point, plane.normal, x0, x1, q0, q1);
            frac_t = f32::min(frac_t, t);
        }
        log::trace!("intersection time fraction {}", frac_t);
        frac_t
    }

    /// Vertices lying in the supporting plane through vertex `on` with outward `normal`, both in
    /// local coordinates. The result is ordered counter clockwise about `normal`.
    pub fn find_polygon(&self, on: u32, normal: Vec3) -> Vec<u32> {
        let normal = normal.normalize_or_zero();
        let plane = Plane::new(self.vertex(on), normal);
        let tolerance = 5.0 * EPSILON * self.radius().max(1.0);
        let origin = self.vertex(on);

        // a slightly tilted normal still picks the whole face
        let mut polygon: Vec<u32> = (0..self.verts.len() as u32)
            .filter(|&idx| {
                let reach = (self.vertex(idx) - origin).length();
                plane.distance_to(self.vertex(idx)).abs() < tolerance.max(FACE_ANGLE_TOLERANCE * reach)
            })
            .collect();
        if polygon.len() < 3 {
            return polygon;
        }

        let centre = polygon.iter().map(|&idx| self.vertex(idx)).sum::<Vec3>() / polygon.len() as f32;
        let u = normal.any_orthonormal_vector();
        let v = normal.cross(u);
        let angle = |idx: u32| {
            let offset = self.vertex(idx) - centre;
            offset.dot(v).atan2(offset.dot(u))
        };
        polygon.sort_by(|&lhs, &rhs| angle(lhs).total_cmp(&angle(rhs)));
        polygon
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn unit_cube() -> VertexGroup {
        VertexGroup::make_cube(Vec3::splat(-0.5), Vec3::splat(0.5))
    }

    #[test]
    fn test_cube_faces_point_outward() {
        let cube = unit_cube();
        for [a, b, c] in cube.tris().iter().map(|tri| tri.map(|idx| cube.vertex(idx))) {
            let normal = (b - a).cross(c - a);
            let centre = (a + b + c) / 3.0;
            assert!(normal.dot(centre) > 0.0);
        }
    }

    #[test]
    fn test_support_vertex() {
        let cube = unit_cube();
        assert_eq!(cube.find_support_vertex(Vec3::ONE), 7);
        assert_eq!(cube.find_support_vertex(-Vec3::ONE), 0);
        assert_eq!(cube.find_support_vertex(Vec3::new(1.0, -1.0, -1.0)), 1);
        // ties take the first vertex
        assert_eq!(cube.find_support_vertex(Vec3::X), 1);
    }

    #[test]
    fn test_displaced_support_vertex() {
        let cube = unit_cube();
        let moving_along = cube.find_displaced_support_vertex(Vec3::Y, Vec3::new(0.0, 2.0, 0.0));
        assert_eq!(moving_along.index, 2);
        assert!(moving_along.displaced);

        let moving_away = cube.find_displaced_support_vertex(Vec3::Y, Vec3::new(0.0, -2.0, 0.0));
        assert_eq!(moving_away.index, 2);
        assert!(!moving_away.displaced);
    }

    #[test]
    fn test_max_rotational_displacement() {
        let cube = unit_cube();
        assert_eq!(cube.max_rotational_displacement(Vec3::splat(1.0e-7)), 0.0);
        let spin = cube.max_rotational_displacement(Vec3::new(0.0, 0.1, 0.0));
        assert!((spin - 0.1 * 0.5f32.sqrt()).abs() < 1.0e-6);
    }

    #[test]
    fn test_intersection_time_against_plane() {
        let cube = unit_cube();
        let ground = Plane::new(Vec3::ZERO, Vec3::Y);

        // bottom face starts 1 above the ground and drops 2
        let frac = cube.find_intersection_time(
            &ground,
            Vec3::new(0.0, 1.5, 0.0),
            Vec3::new(0.0, -0.5, 0.0),
            Quat::IDENTITY,
            Quat::IDENTITY,
        );
        assert!((frac - 0.5).abs() < 1.0e-5);

        // never reaches the ground
        let frac = cube.find_intersection_time(
            &ground,
            Vec3::new(0.0, 1.5, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Quat::IDENTITY,
            Quat::IDENTITY,
        );
        assert!(frac > 1.0);
    }

    #[test]
    fn test_find_polygon() {
        let cube = unit_cube();
        let top = cube.find_polygon(7, Vec3::Y);
        assert_eq!(top.len(), 4);
        assert!(top.iter().all(|&idx| cube.vertex(idx).y > 0.0));

        // counter clockwise about the normal
        for i in 0..4 {
            let a = cube.vertex(top[i]);
            let b = cube.vertex(top[(i + 1) % 4]);
            let c = cube.vertex(top[(i + 2) % 4]);
            assert!((b - a).cross(c - b).dot(Vec3::Y) > 0.0);
        }

        let corner = cube.find_polygon(7, Vec3::ONE);
        assert_eq!(corner, vec![7]);
    }

    #[test]
    fn test_find_polygon_of_wide_slab() {
        let slab = VertexGroup::make_cube(Vec3::new(-50.0, -1.0, -25.0), Vec3::new(50.0, 0.0, 25.0));
        let tilted = Quat::from_rotation_x(1.0e-3) * Vec3::Y;
        let top = slab.find_polygon(7, tilted);
        assert_eq!(top.len(), 4);
        assert!(top.iter().all(|&idx| slab.vertex(idx).y == 0.0));
    }

    #[test]
    fn test_bounds_and_recentre() {
        let cube = VertexGroup::make_cube(Vec3::ZERO, Vec3::ONE);
        let centred = cube.recentred(Vec3::splat(0.5));
        assert_eq!(centred, unit_cube());
        assert!((centred.radius() - 0.75f32.sqrt()).abs() < 1.0e-6);

        let bounds = centred.bounds(Quat::IDENTITY, Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(bounds.mins, Vec3::new(1.5, -0.5, -0.5));
        assert_eq!(bounds.maxs, Vec3::new(2.5, 0.5, 0.5));
    }

    #[test]
    fn test_json_round_trip() {
        let cube = unit_cube();
        let json = serde_json::to_string(&cube).unwrap();
        let loaded: VertexGroup = serde_json::from_str(&json).unwrap();
        assert_eq!(cube, loaded);
    }
}
