use crate::{
    error::{CollisionError, Result},
    options::EPSILON,
    simplex::{Simplex, SupportIndex, MAX_SIMPLEX_SIZE},
};
use glam::Vec3;

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum GjkOutcome {
    /// The swept hulls overlap.
    Intersecting,
    /// Shortest vector from the origin to the configuration space hull.
    Separated(Vec3),
}

impl GjkOutcome {
    pub fn is_hit(&self) -> bool {
        matches!(self, GjkOutcome::Intersecting)
    }

    pub fn separation(&self) -> Vec3 {
        match self {
            GjkOutcome::Intersecting => Vec3::ZERO,
            GjkOutcome::Separated(dir) => *dir,
        }
    }
}

/// The part of a configuration space simplex nearest the origin.
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) struct ClosestFeature {
    pub size: usize,
    pub verts: [usize; MAX_SIMPLEX_SIZE],
    pub dir: Vec3,
}

impl ClosestFeature {
    fn vertex(i: usize, dir: Vec3) -> Self {
        Self {
            size: 1,
            verts: [i, 0, 0, 0],
            dir,
        }
    }

    fn edge(i: usize, j: usize, dir: Vec3) -> Self {
        Self {
            size: 2,
            verts: [i, j, 0, 0],
            dir,
        }
    }

    fn face(verts: [usize; 3], dir: Vec3) -> Self {
        Self {
            size: 3,
            verts: [verts[0], verts[1], verts[2], 0],
            dir,
        }
    }

    pub fn verts(&self) -> &[usize] {
        &self.verts[..self.size]
    }
}

// vector from the origin to the closest point of the line through c along diff
fn closest_on_line(c: Vec3, diff: Vec3) -> Vec3 {
    let magn_diff = diff.dot(diff);
    if magn_diff > EPSILON {
        c - diff * (c.dot(diff) / magn_diff)
    } else {
        c
    }
}

// Normals must stay unnormalised and the comparisons inclusive for a face that has collapsed to a
// line to still select its edge.
#[allow(clippy::too_many_arguments)]
fn test_edge(
    norm0: Vec3,
    norm1: Vec3,
    dot0: f32,
    dot1: f32,
    diff: Vec3,
    c: Vec3,
    i: usize,
    j: usize,
) -> Option<ClosestFeature> {
    if dot0 >= 0.0
        && dot1 >= 0.0
        && c.dot(diff.cross(norm0)) >= 0.0
        && c.dot(norm1.cross(diff)) >= 0.0
    {
        Some(ClosestFeature::edge(i, j, closest_on_line(c, diff)))
    } else {
        None
    }
}

// Whether the projection of the origin onto the plane of a face lies inside it. `d0` and `d1`
// are two edges leaving the face corner `c`.
fn in_triangle(norm: Vec3, d0: Vec3, d1: Vec3, c: Vec3) -> bool {
    let dir = norm * (norm.dot(c) / norm.dot(norm));
    let w = dir - c;

    let uu = d0.dot(d0);
    let uv = d0.dot(d1);
    let vv = d1.dot(d1);
    let wu = w.dot(d0);
    let wv = w.dot(d1);
    let denom = uv * uv - uu * vv;

    let s = (uv * wv - vv * wu) / denom;
    if s < -EPSILON || s > 1.0 {
        return false;
    }

    let t = (uv * wu - uu * wv) / denom;
    !(t < -EPSILON || (s + t) > 1.0)
}

/// Closest vertex, edge or face of the first `size` points of `c_space` to the origin.
///
/// A size of 4 in the result means the origin is enclosed by the tetrahedron.
pub(crate) fn find_closest_feature_to_origin(
    c_space: &[Vec3; MAX_SIMPLEX_SIZE],
    size: usize,
) -> ClosestFeature {
    debug_assert!((1..=MAX_SIMPLEX_SIZE).contains(&size));
    if size == 1 {
        return ClosestFeature::vertex(0, c_space[0]);
    }

    // diffs[i][j] = c_i - c_j and dots[i][j] = c_i . (c_i - c_j)
    let mut diffs = [[Vec3::ZERO; MAX_SIMPLEX_SIZE]; MAX_SIMPLEX_SIZE];
    let mut dots = [[0.0f32; MAX_SIMPLEX_SIZE]; MAX_SIMPLEX_SIZE];
    for i in 0..size {
        for j in 0..size {
            if i != j {
                diffs[i][j] = c_space[i] - c_space[j];
                dots[i][j] = c_space[i].dot(diffs[i][j]);
            }
        }
    }

    for i in 0..size {
        if (0..size).all(|j| i == j || dots[i][j] <= 0.0) {
            return ClosestFeature::vertex(i, c_space[i]);
        }
    }

    if size == 2 {
        return ClosestFeature::edge(0, 1, closest_on_line(c_space[0], diffs[0][1]));
    }

    // face normals, n0 is the face (0, 1, 2) and n1..n3 the faces opposite it
    let n0 = diffs[1][0].cross(diffs[2][0]);
    let (n1, n2, n3) = if size == 3 {
        (-n0, -n0, -n0)
    } else {
        (
            diffs[3][0].cross(diffs[1][0]),
            diffs[3][2].cross(diffs[0][2]),
            diffs[3][1].cross(diffs[2][1]),
        )
    };

    let mut edges = vec![
        (n2, n0, dots[0][2], dots[2][0], diffs[0][2], 0, 2),
        (n0, n3, dots[1][2], dots[2][1], diffs[1][2], 1, 2),
        (n0, n1, dots[0][1], dots[1][0], diffs[0][1], 0, 1),
    ];
    if size == 4 {
        edges.extend_from_slice(&[
            (n1, n2, dots[0][3], dots[3][0], diffs[0][3], 0, 3),
            (n3, n1, dots[1][3], dots[3][1], diffs[1][3], 1, 3),
            (n2, n3, dots[2][3], dots[3][2], diffs[2][3], 2, 3),
        ]);
    }
    for (norm0, norm1, dot0, dot1, diff, i, j) in edges {
        if let Some(edge) = test_edge(norm0, norm1, dot0, dot1, diff, c_space[i], i, j) {
            return edge;
        }
    }

    if size == 3 {
        let a = n0.dot(c_space[0]);
        let verts = if a < 0.0 { [2, 1, 0] } else { [0, 1, 2] };
        return ClosestFeature::face(verts, n0 * (a / n0.dot(n0)));
    }

    let faces = [
        (n1, diffs[0][1], diffs[3][1], 1, [1, 3, 0]),
        (n2, diffs[3][2], diffs[0][2], 2, [0, 3, 2]),
        (n3, diffs[1][3], diffs[2][3], 3, [2, 3, 1]),
        (n0, diffs[1][0], diffs[2][0], 0, [2, 1, 0]),
    ];
    for (norm, d0, d1, corner, verts) in faces {
        let c = c_space[corner];
        if c.dot(norm) < 0.0 && in_triangle(norm, d0, d1, c) {
            return ClosestFeature::face(verts, norm * (norm.dot(c) / norm.dot(norm)));
        }
    }

    ClosestFeature {
        size: 4,
        verts: [0, 1, 2, 3],
        dir: Vec3::ZERO,
    }
}

/// Distance query between two convex hulls, one of which may be sweeping.
///
/// The simplices carry the hulls and their orientations and are left holding the closest
/// features when the query finishes.
pub struct Gjk<'a> {
    a: &'a mut Simplex,
    b: &'a mut Simplex,
    max_iterations: u32,
}

impl<'a> Gjk<'a> {
    pub fn new(a: &'a mut Simplex, b: &'a mut Simplex, max_iterations: u32) -> Self {
        Self {
            a,
            b,
            max_iterations,
        }
    }

    /// Minimum distance between the hulls. `fixed_disp` is the relative position of a from b and
    /// `float_disp` the relative sweep of a during the interval.
    pub fn find_minimum_distance(&mut self, fixed_disp: Vec3, float_disp: Vec3) -> Result<GjkOutcome> {
        log::trace!(
            "gjk with fixed displacement {} and float displacement {}",
            fixed_disp,
            float_disp
        );

        let a_inv = self.a.orientation().conjugate();
        let b_inv = self.b.orientation().conjugate();
        let a_float = a_inv * float_disp;

        for iteration in 0..self.max_iterations {
            let c_space = self.a.compute_c_space(self.b, fixed_disp, float_disp)?;
            let closest = find_closest_feature_to_origin(&c_space, self.a.size());
            log::trace!(
                "gjk iteration {} closest feature {:?} direction {}",
                iteration,
                closest.verts(),
                closest.dir
            );

            if closest.size == MAX_SIMPLEX_SIZE || closest.dir.length() < EPSILON {
                return Ok(GjkOutcome::Intersecting);
            }

            let a_sup = self
                .a
                .vertex_group()
                .find_displaced_support_vertex(a_inv * -closest.dir, a_float);
            let b_sup = SupportIndex::new(self.b.vertex_group().find_support_vertex(b_inv * closest.dir));

            // stagnation is checked against the full simplex, before it is reduced
            let improve = self.a.is_new_pair(self.b, a_sup, b_sup)?;
            self.a.retain_vertices(closest.verts());
            self.b.retain_vertices(closest.verts());
            if !improve {
                return Ok(GjkOutcome::Separated(closest.dir));
            }

            self.a.add(a_sup)?;
            self.b.add(b_sup)?;
        }

        Err(CollisionError::NoConvergence {
            stage: "gjk",
            iterations: self.max_iterations,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::vertex_group::VertexGroup;
    use glam::Quat;
    use std::sync::Arc;

    fn c_space(points: [[f32; 3]; 4]) -> [Vec3; 4] {
        points.map(Vec3::from)
    }

    fn check(
        points: [[f32; 3]; 4],
        size: usize,
        expected_size: usize,
        expected_verts: &[usize],
        expected_dir: [f32; 3],
    ) {
        let closest = find_closest_feature_to_origin(&c_space(points), size);
        assert_eq!(closest.size, expected_size, "size for {:?}", points);
        if expected_size < 4 {
            assert_eq!(closest.verts(), expected_verts, "verts for {:?}", points);
        }
        assert!(
            closest.dir.abs_diff_eq(Vec3::from(expected_dir), 1.0e-4),
            "dir {} for {:?}",
            closest.dir,
            points
        );
    }

    #[test]
    fn test_closest_vertex() {
        check(
            [[0.0, 0.0, 1.0], [1.0, 0.0, 1.0], [0.0, 1.0, 1.0], [0.0, 0.0, 2.0]],
            1,
            1,
            &[0],
            [0.0, 0.0, 1.0],
        );
        check(
            [[0.1, 0.0, 1.0], [1.0, 0.0, 1.0], [0.0, 1.0, 1.0], [0.0, 0.0, 2.0]],
            2,
            1,
            &[0],
            [0.1, 0.0, 1.0],
        );
        check(
            [[-1.0, 0.0, 1.0], [-0.1, 0.0, 1.0], [0.0, 1.0, 1.0], [0.0, 0.0, 2.0]],
            2,
            1,
            &[1],
            [-0.1, 0.0, 1.0],
        );
    }

    #[test]
    fn test_closest_edge_of_line() {
        check(
            [[-1.0, 0.0, 3.0], [1.0, 0.0, 3.0], [0.0, 1.0, 3.0], [0.0, 0.0, 2.0]],
            2,
            2,
            &[0, 1],
            [0.0, 0.0, 3.0],
        );
        check(
            [[-1.0, 0.0, -1.0], [1.0, 0.0, -1.0], [0.0, 1.0, 3.0], [0.0, 0.0, 2.0]],
            2,
            2,
            &[0, 1],
            [0.0, 0.0, -1.0],
        );
    }

    #[test]
    fn test_closest_feature_of_triangle() {
        check(
            [[-1.0, 1.0, 0.0], [1.0, 1.0, 0.0], [0.0, 2.0, 0.0], [0.0, 0.0, 2.0]],
            3,
            2,
            &[0, 1],
            [0.0, 1.0, 0.0],
        );
        check(
            [[2.0, 0.0, 0.0], [1.0, 1.0, 0.0], [1.0, -1.0, 0.0], [0.0, 0.0, 2.0]],
            3,
            2,
            &[1, 2],
            [1.0, 0.0, 0.0],
        );
        check(
            [[-1.0, -1.0, 1.0], [1.0, -1.0, 1.0], [0.0, 1.0, 1.0], [0.0, 0.0, 2.0]],
            3,
            3,
            &[0, 1, 2],
            [0.0, 0.0, 1.0],
        );
        check(
            [[-1.0, -1.0, -1.0], [1.0, -1.0, -1.0], [0.0, 1.0, -1.0], [0.0, 0.0, 2.0]],
            3,
            3,
            &[2, 1, 0],
            [0.0, 0.0, -1.0],
        );
    }

    #[test]
    fn test_closest_feature_of_tetrahedron() {
        check(
            [[-1.0, 1.0, 0.0], [1.0, 1.0, 0.0], [0.0, 2.0, 0.0], [0.0, 2.0, 2.0]],
            4,
            2,
            &[0, 1],
            [0.0, 1.0, 0.0],
        );
        check(
            [[0.0, 1.0, 1.0], [1.0, -1.0, 1.0], [-1.0, -1.0, 1.0], [0.0, 0.0, 2.0]],
            4,
            3,
            &[2, 1, 0],
            [0.0, 0.0, 1.0],
        );
        check(
            [[-1.0, -1.0, 1.0], [1.0, -1.0, 1.0], [0.0, 0.0, 2.0], [0.0, 1.0, 1.0]],
            4,
            3,
            &[1, 3, 0],
            [0.0, 0.0, 1.0],
        );
        check(
            [[0.0, 0.0, 4.0], [-1.0, -1.0, 3.0], [1.0, -1.0, 3.0], [0.0, 1.0, 3.0]],
            4,
            3,
            &[2, 3, 1],
            [0.0, 0.0, 3.0],
        );
        check(
            [[0.0, 0.0, 1.0], [-1.0, -1.0, -1.0], [1.0, -1.0, -1.0], [0.0, 1.0, -1.0]],
            4,
            4,
            &[],
            [0.0, 0.0, 0.0],
        );
    }

    #[test]
    fn test_closest_face_of_thin_tetrahedron() {
        check(
            [
                [6.95801, -5.15599, 8.5],
                [-14.057, -5.14549, 8.5],
                [6.94301, -5.14549, -12.5],
                [6.94301, -5.14549, 8.5],
            ],
            4,
            3,
            &[2, 3, 1],
            [0.0, -5.14549, 0.0],
        );
    }

    fn plane(y: f32) -> Arc<VertexGroup> {
        Arc::new(VertexGroup::make_plane(
            Vec3::new(-10.0, y, -10.0),
            Vec3::new(10.0, y, -10.0),
            Vec3::new(-10.0, y, 10.0),
            Vec3::new(10.0, y, 10.0),
        ))
    }

    fn cube() -> Arc<VertexGroup> {
        Arc::new(VertexGroup::make_cube(
            Vec3::new(-4.5, -10.25, -0.5),
            Vec3::new(-3.5, -9.25, 0.5),
        ))
    }

    fn run(a: Arc<VertexGroup>, b: Arc<VertexGroup>, orientation: Quat, fixed: Vec3, float: Vec3) -> GjkOutcome {
        let mut sim_a = Simplex::new(a, Quat::IDENTITY, Vec3::ZERO);
        let mut sim_b = Simplex::new(b, orientation, Vec3::ZERO);
        sim_a.add(SupportIndex::new(0)).unwrap();
        sim_b.add(SupportIndex::new(0)).unwrap();
        Gjk::new(&mut sim_a, &mut sim_b, 64)
            .find_minimum_distance(fixed, float)
            .unwrap()
    }

    fn assert_separated(outcome: GjkOutcome, expected: Vec3) {
        match outcome {
            GjkOutcome::Separated(dir) => {
                assert!(dir.abs_diff_eq(expected, 1.0e-4), "{} != {}", dir, expected)
            }
            GjkOutcome::Intersecting => panic!("expected a miss"),
        }
    }

    #[test]
    fn test_basic_hit() {
        let outcome = run(plane(-10.0), cube(), Quat::IDENTITY, Vec3::ZERO, Vec3::ZERO);
        assert!(outcome.is_hit());
        assert_eq!(outcome.separation(), Vec3::ZERO);
    }

    #[test]
    fn test_basic_miss() {
        let outcome = run(plane(-10.5), cube(), Quat::IDENTITY, Vec3::ZERO, Vec3::ZERO);
        assert_separated(outcome, Vec3::new(0.0, -0.25, 0.0));
    }

    #[test]
    fn test_displaced_miss() {
        let outcome = run(plane(-10.0), cube(), Quat::IDENTITY, Vec3::new(0.0, -0.5, 0.0), Vec3::ZERO);
        assert_separated(outcome, Vec3::new(0.0, -0.25, 0.0));

        let outcome = run(plane(-10.0), cube(), Quat::IDENTITY, Vec3::new(0.0, 1.5, 0.0), Vec3::ZERO);
        assert_separated(outcome, Vec3::new(0.0, 0.75, 0.0));

        let outcome = run(plane(-10.0), cube(), Quat::IDENTITY, Vec3::new(0.0, 0.0, 11.0), Vec3::ZERO);
        assert_separated(outcome, Vec3::new(0.0, 0.0, 0.5));
    }

    #[test]
    fn test_displacing_hit() {
        // starts 2.25 above the cube and sweeps through it
        let outcome = run(
            plane(0.0),
            cube(),
            Quat::IDENTITY,
            Vec3::new(0.0, -7.0, 0.0),
            Vec3::new(0.0, -4.0, 0.0),
        );
        assert!(outcome.is_hit());

        // starts touching the top of the cube and sweeps away
        let outcome = run(
            plane(0.0),
            cube(),
            Quat::IDENTITY,
            Vec3::new(0.0, -9.25, 0.0),
            Vec3::new(0.0, 4.0, 0.0),
        );
        assert!(outcome.is_hit());
    }

    #[test]
    fn test_displacing_miss() {
        let outcome = run(
            plane(-10.0),
            cube(),
            Quat::IDENTITY,
            Vec3::new(0.0, -0.5, 0.0),
            Vec3::new(0.0, -5.0, 0.0),
        );
        assert_separated(outcome, Vec3::new(0.0, -0.25, 0.0));
    }

    #[test]
    fn test_rotated_cube() {
        // a unit cube turned 45 degrees about z reaches 1/sqrt(2) below its centre
        let centred = Arc::new(VertexGroup::make_cube(Vec3::splat(-0.5), Vec3::splat(0.5)));
        let rotation = Quat::from_rotation_z(std::f32::consts::FRAC_PI_4);

        // plane at y = 0, cube centre 1 above it: the gap is 1 - 1/sqrt(2)
        let outcome = run(plane(0.0), centred.clone(), rotation, Vec3::new(0.0, -1.0, 0.0), Vec3::ZERO);
        let gap = 1.0 - std::f32::consts::FRAC_1_SQRT_2;
        assert_separated(outcome, Vec3::new(0.0, -gap, 0.0));

        // the same height would intersect once rotated, but not before
        let outcome = run(plane(0.0), centred, rotation, Vec3::new(0.0, -0.6, 0.0), Vec3::ZERO);
        assert!(outcome.is_hit());
    }

    #[test]
    fn test_iteration_cap() {
        let mut sim_a = Simplex::new(plane(-10.5), Quat::IDENTITY, Vec3::ZERO);
        let mut sim_b = Simplex::new(cube(), Quat::IDENTITY, Vec3::ZERO);
        sim_a.add(SupportIndex::new(0)).unwrap();
        sim_b.add(SupportIndex::new(0)).unwrap();
        let err = Gjk::new(&mut sim_a, &mut sim_b, 1)
            .find_minimum_distance(Vec3::ZERO, Vec3::ZERO)
            .unwrap_err();
        assert!(err.is_retryable());
    }
}
