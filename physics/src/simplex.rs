use crate::{
    error::{CollisionError, Result},
    options::EPSILON,
    polygon::{clip_polygon, clip_segment, clip_segments, make_ccw},
    vertex_group::VertexGroup,
};
use arrayvec::ArrayVec;
use glam::{DQuat, DVec3, Quat, Vec2, Vec3};
use std::sync::Arc;

pub const MAX_SIMPLEX_SIZE: usize = 4;

/// A hull vertex used as a simplex corner. A displaced vertex is sampled at the end of the
/// relative sweep instead of the start.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct SupportIndex {
    pub index: u32,
    pub displaced: bool,
}

impl SupportIndex {
    pub fn new(index: u32) -> Self {
        Self {
            index,
            displaced: false,
        }
    }

    pub fn displaced(index: u32) -> Self {
        Self {
            index,
            displaced: true,
        }
    }
}

/// Up to four world space contact points and their centroid.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ContactManifold {
    pub points: ArrayVec<Vec3, 4>,
    pub centre: Vec3,
}

impl ContactManifold {
    fn from_points(points: ArrayVec<Vec3, 4>) -> Self {
        let centre = if points.is_empty() {
            Vec3::ZERO
        } else {
            points.iter().sum::<Vec3>() / points.len() as f32
        };
        Self { points, centre }
    }
}

/// The feature of one body's hull that GJK is currently working with.
///
/// Corners are double buffered so a reduced feature can be copied out of the buffer being read.
/// The simplex remembers the placement it was sampled at so it can express itself in world space.
#[derive(Clone, Debug)]
pub struct Simplex {
    vertex_group: Arc<VertexGroup>,
    orientation: Quat,
    position: Vec3,
    buffers: [[SupportIndex; MAX_SIMPLEX_SIZE]; 2],
    active: usize,
    size: usize,
}

impl Simplex {
    pub fn new(vertex_group: Arc<VertexGroup>, orientation: Quat, position: Vec3) -> Self {
        Self {
            vertex_group,
            orientation,
            position,
            buffers: Default::default(),
            active: 0,
            size: 0,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn vertex_group(&self) -> &VertexGroup {
        &self.vertex_group
    }

    pub fn orientation(&self) -> Quat {
        self.orientation
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn supports(&self) -> &[SupportIndex] {
        &self.buffers[self.active][..self.size]
    }

    pub fn support(&self, i: usize) -> SupportIndex {
        self.supports()[i]
    }

    /// Local position of corner `i`.
    pub fn vertex(&self, i: usize) -> Vec3 {
        self.vertex_group.vertex(self.support(i).index)
    }

    pub fn local_to_world(&self, p: Vec3) -> Vec3 {
        self.orientation * p + self.position
    }

    fn local_to_world_f64(&self, p: Vec3) -> DVec3 {
        let q = self.orientation;
        let orientation = DQuat::from_xyzw(q.x as f64, q.y as f64, q.z as f64, q.w as f64);
        orientation * p.as_dvec3() + self.position.as_dvec3()
    }

    pub fn world_vertex(&self, i: usize) -> Vec3 {
        self.local_to_world(self.vertex(i))
    }

    fn check_same_size(&self, other: &Simplex) -> Result<()> {
        if self.size != other.size {
            return Err(CollisionError::invariant(format!(
                "simplex sizes differ, {} and {}",
                self.size, other.size
            )));
        }
        Ok(())
    }

    /// Corners of the configuration space simplex `self - other`. Entries past the size are zero.
    pub fn compute_c_space(
        &self,
        other: &Simplex,
        fixed_disp: Vec3,
        float_disp: Vec3,
    ) -> Result<[Vec3; MAX_SIMPLEX_SIZE]> {
        self.check_same_size(other)?;

        let mut c_space = [Vec3::ZERO; MAX_SIMPLEX_SIZE];
        for (i, c) in c_space.iter_mut().enumerate().take(self.size) {
            let a = self.support(i);
            let mut pt = self.orientation * self.vertex_group.vertex(a.index);
            if a.displaced {
                pt += float_disp;
            }
            *c = pt + fixed_disp - other.orientation * other.vertex(i);
        }
        Ok(c_space)
    }

    /// Keep only the listed corners, in the given order.
    pub fn retain_vertices(&mut self, subset: &[usize]) {
        debug_assert!(subset.len() <= MAX_SIMPLEX_SIZE);
        debug_assert!(subset.iter().all(|&i| i < self.size));

        let (read, write) = (self.active, self.active ^ 1);
        for (dst, &src) in subset.iter().enumerate() {
            self.buffers[write][dst] = self.buffers[read][src];
        }
        self.active = write;
        self.size = subset.len();
    }

    pub fn add(&mut self, v: SupportIndex) -> Result<()> {
        if self.size == MAX_SIMPLEX_SIZE {
            return Err(CollisionError::invariant("adding to a full simplex"));
        }
        self.buffers[self.active][self.size] = v;
        self.size += 1;
        Ok(())
    }

    /// False if some corner already pairs `a` in this simplex with `b` in `other`.
    pub fn is_new_pair(&self, other: &Simplex, a: SupportIndex, b: SupportIndex) -> Result<bool> {
        self.check_same_size(other)?;
        Ok(!self
            .supports()
            .iter()
            .zip(other.supports())
            .any(|(sa, sb)| *sa == a && *sb == b))
    }

    /// Distinct hull vertices of the feature, ignoring whether they were displaced.
    pub fn unique_points(&self) -> ArrayVec<u32, MAX_SIMPLEX_SIZE> {
        let mut unique = ArrayVec::new();
        for support in self.supports() {
            if !unique.contains(&support.index) {
                unique.push(support.index);
            }
        }
        unique
    }

    /// Unit normal of the contact between the two features, pointing from `other` to `self`.
    pub fn normal_of_impact(&self, other: &Simplex) -> Result<Vec3> {
        self.check_same_size(other)?;

        let a_unique = self.unique_points();
        let b_unique = other.unique_points();
        log::trace!(
            "normal of impact from {} and {} unique points",
            a_unique.len(),
            b_unique.len()
        );
        if a_unique.is_empty() || b_unique.is_empty() {
            return Err(CollisionError::invariant("normal of impact from an empty simplex"));
        }
        if a_unique.len() == MAX_SIMPLEX_SIZE || b_unique.len() == MAX_SIMPLEX_SIZE {
            return Err(CollisionError::invariant(
                "normal of impact of penetrating bodies",
            ));
        }

        // the larger feature decides the normal
        let a_is_large = a_unique.len() >= b_unique.len();
        let (large, large_unique, small, small_unique) = if a_is_large {
            (self, &a_unique, other, &b_unique)
        } else {
            (other, &b_unique, self, &a_unique)
        };
        // world positions in double precision, hull coordinates dwarf the gap at contact
        let l: ArrayVec<DVec3, MAX_SIMPLEX_SIZE> = large_unique
            .iter()
            .map(|&idx| large.local_to_world_f64(large.vertex_group.vertex(idx)))
            .collect();
        let s: ArrayVec<DVec3, MAX_SIMPLEX_SIZE> = small_unique
            .iter()
            .map(|&idx| small.local_to_world_f64(small.vertex_group.vertex(idx)))
            .collect();
        let eps = EPSILON as f64;

        let norm = match l.len() {
            1 => {
                let diff = l[0] - s[0];
                let dist = diff.length();
                if dist < eps {
                    return Err(CollisionError::invariant("distance between bodies is zero"));
                }
                (diff / dist).as_vec3()
            }
            2 => {
                let l_dir = (l[1] - l[0]).normalize_or_zero();
                let parallel = s.len() == 1 || {
                    let s_dir = (s[1] - s[0]).normalize_or_zero();
                    l_dir.dot(s_dir).abs() > 1.0 - eps
                };

                if parallel {
                    // from s0 to the nearest point of the large edge's line
                    let to_line = l[0] - s[0];
                    let perp = to_line - l_dir * l_dir.dot(to_line);
                    let dist = perp.length();
                    if dist < eps {
                        return Err(CollisionError::invariant("distance between bodies is zero"));
                    }
                    (perp / dist).as_vec3()
                } else {
                    let s_dir = (s[1] - s[0]).normalize_or_zero();
                    let norm = l_dir.cross(s_dir).normalize_or_zero();
                    let norm = if norm.dot(l[0] - s[0]) < 0.0 { -norm } else { norm };
                    norm.as_vec3()
                }
            }
            _ => {
                let local = large.vertex_group.vertex(large_unique[0]);
                let edge0 = large.vertex_group.vertex(large_unique[1]) - local;
                let edge1 = large.vertex_group.vertex(large_unique[2]) - local;
                let norm = (large.orientation * edge0.cross(edge1)).normalize_or_zero();
                if norm == Vec3::ZERO {
                    return Err(CollisionError::invariant("degenerate contact face"));
                }
                if norm.as_dvec3().dot(l[0] - s[0]) < 0.0 {
                    -norm
                } else {
                    norm
                }
            }
        };

        // computed toward the large feature, flip to point toward self
        let norm = if a_is_large { norm } else { -norm };
        log::trace!("normal of impact {}", norm);
        Ok(norm)
    }

    // Supporting polygon of this body's hull facing along the world direction `outward`.
    fn contact_polygon(&self, outward: Vec3) -> Vec<Vec3> {
        let local_normal = self.orientation.conjugate() * outward;
        let on = self.support(0).index;
        self.vertex_group
            .find_polygon(on, local_normal)
            .into_iter()
            .map(|idx| self.local_to_world(self.vertex_group.vertex(idx)))
            .collect()
    }

    /// Contact points between the two features, given the normal pointing from `other` to `self`.
    ///
    /// Both touching polygons are projected into the contact plane and clipped against each
    /// other. The result sits on the plane midway between the features.
    pub fn center_of_impact(&self, other: &Simplex, normal: Vec3) -> Result<ContactManifold> {
        self.check_same_size(other)?;
        if self.is_empty() {
            return Err(CollisionError::invariant("center of impact of an empty simplex"));
        }

        let normal = normal.normalize_or_zero();
        if normal == Vec3::ZERO {
            return Err(CollisionError::invariant("center of impact without a normal"));
        }

        let poly_a = self.contact_polygon(-normal);
        let poly_b = other.contact_polygon(normal);
        if poly_a.is_empty() || poly_b.is_empty() {
            return Err(CollisionError::invariant("no vertices in the contact plane"));
        }

        let u = normal.any_orthonormal_vector();
        let v = normal.cross(u);
        let height_a = FeatureHeight::new(&poly_a, u, v, normal);
        let height_b = FeatureHeight::new(&poly_b, u, v, normal);
        let flatten = |poly: &[Vec3]| -> Vec<Vec2> {
            poly.iter().map(|p| Vec2::new(p.dot(u), p.dot(v))).collect()
        };
        let mut flat_a = flatten(&poly_a);
        let mut flat_b = flatten(&poly_b);

        let mut clipped = match (flat_a.len(), flat_b.len()) {
            (1, _) => flat_a.clone(),
            (_, 1) => flat_b.clone(),
            (2, 2) => clip_segments(flat_a[0], flat_a[1], flat_b[0], flat_b[1]),
            (2, _) => {
                make_ccw(&mut flat_b);
                clip_segment(flat_a[0], flat_a[1], &flat_b)
                    .map(|(p0, p1)| vec![p0, p1])
                    .unwrap_or_default()
            }
            (_, 2) => {
                make_ccw(&mut flat_a);
                clip_segment(flat_b[0], flat_b[1], &flat_a)
                    .map(|(p0, p1)| vec![p0, p1])
                    .unwrap_or_default()
            }
            _ => {
                make_ccw(&mut flat_a);
                make_ccw(&mut flat_b);
                clip_polygon(&flat_a, &flat_b)
            }
        };

        if clipped.is_empty() {
            // features only touch at the limit of the tolerance, use the midpoint
            log::debug!("contact features do not overlap in the contact plane");
            let centroid = |flat: &[Vec2]| flat.iter().sum::<Vec2>() / flat.len() as f32;
            clipped.push(0.5 * (centroid(&flat_a) + centroid(&flat_b)));
        }

        // midway between the two feature planes, measured under each point
        let lift = |p: Vec2| {
            let mid = 0.5 * (height_a.at(p) + height_b.at(p));
            u * p.x + v * p.y + normal * mid
        };
        let points: ArrayVec<Vec3, 4> = if clipped.len() <= 4 {
            clipped.iter().map(|p| lift(*p)).collect()
        } else {
            reduce_to_extremes(&clipped).into_iter().map(lift).collect()
        };
        Ok(ContactManifold::from_points(points))
    }
}

// Height along the contact normal of a touching feature, as a function of the position in the
// contact plane. Faces are followed exactly, points and edges use their mean height.
struct FeatureHeight {
    origin: Vec3,
    face_normal: Option<Vec3>,
    mean: f32,
    u: Vec3,
    v: Vec3,
    normal: Vec3,
}

impl FeatureHeight {
    fn new(poly: &[Vec3], u: Vec3, v: Vec3, normal: Vec3) -> Self {
        let mean = poly.iter().map(|p| p.dot(normal)).sum::<f32>() / poly.len() as f32;
        let face_normal = if poly.len() >= 3 {
            let m = (poly[1] - poly[0]).cross(poly[2] - poly[0]).normalize_or_zero();
            (m.dot(normal).abs() > 0.5).then_some(m)
        } else {
            None
        };
        Self {
            origin: poly[0],
            face_normal,
            mean,
            u,
            v,
            normal,
        }
    }

    fn at(&self, p: Vec2) -> f32 {
        match self.face_normal {
            Some(m) => {
                let in_plane = self.u * p.x + self.v * p.y;
                (self.origin - in_plane).dot(m) / self.normal.dot(m)
            }
            None => self.mean,
        }
    }
}

// The points extreme along the two plane axes, without repeats.
fn reduce_to_extremes(points: &[Vec2]) -> ArrayVec<Vec2, 4> {
    fn extremes(points: &[Vec2], key: impl Fn(&Vec2) -> f32) -> [usize; 2] {
        let (mut lo, mut hi) = (0, 0);
        for (i, p) in points.iter().enumerate() {
            if key(p) < key(&points[lo]) {
                lo = i;
            }
            if key(p) > key(&points[hi]) {
                hi = i;
            }
        }
        [lo, hi]
    }

    let [x_lo, x_hi] = extremes(points, |p| p.x);
    let [y_lo, y_hi] = extremes(points, |p| p.y);
    let mut picked: ArrayVec<usize, 4> = ArrayVec::new();
    for idx in [x_lo, x_hi, y_lo, y_hi] {
        if !picked.contains(&idx) {
            picked.push(idx);
        }
    }
    picked.into_iter().map(|idx| points[idx]).collect()
}

#[cfg(test)]
mod test {
    use super::*;

    fn cube_at(position: Vec3) -> Simplex {
        Simplex::new(
            Arc::new(VertexGroup::make_cube(Vec3::splat(-0.5), Vec3::splat(0.5))),
            Quat::IDENTITY,
            position,
        )
    }

    fn with_supports(mut simplex: Simplex, supports: &[u32]) -> Simplex {
        for &idx in supports {
            simplex.add(SupportIndex::new(idx)).unwrap();
        }
        simplex
    }

    #[test]
    fn test_add_and_retain_double_buffer() {
        let mut simplex = with_supports(cube_at(Vec3::ZERO), &[0, 1, 2, 3]);
        assert_eq!(simplex.size(), 4);
        assert!(simplex.add(SupportIndex::new(4)).is_err());

        simplex.retain_vertices(&[3, 1]);
        assert_eq!(simplex.supports(), &[SupportIndex::new(3), SupportIndex::new(1)]);

        simplex.add(SupportIndex::displaced(6)).unwrap();
        simplex.retain_vertices(&[2, 0]);
        assert_eq!(simplex.supports(), &[SupportIndex::displaced(6), SupportIndex::new(3)]);
    }

    #[test]
    fn test_is_new_pair() {
        let a = with_supports(cube_at(Vec3::ZERO), &[0, 1]);
        let b = with_supports(cube_at(Vec3::X), &[5, 6]);
        assert!(!a.is_new_pair(&b, SupportIndex::new(1), SupportIndex::new(6)).unwrap());
        assert!(a.is_new_pair(&b, SupportIndex::new(1), SupportIndex::new(5)).unwrap());
        assert!(a.is_new_pair(&b, SupportIndex::displaced(1), SupportIndex::new(6)).unwrap());

        let c = with_supports(cube_at(Vec3::X), &[5]);
        assert!(matches!(
            a.is_new_pair(&c, SupportIndex::new(0), SupportIndex::new(5)),
            Err(CollisionError::InvariantViolation(_))
        ));
        assert!(a.compute_c_space(&c, Vec3::ZERO, Vec3::ZERO).is_err());
    }

    #[test]
    fn test_c_space_applies_float_to_displaced() {
        let mut a = cube_at(Vec3::ZERO);
        a.add(SupportIndex::new(7)).unwrap();
        a.add(SupportIndex::displaced(7)).unwrap();
        let b = with_supports(cube_at(Vec3::ZERO), &[0, 0]);
        let c = a
            .compute_c_space(&b, Vec3::new(0.0, 3.0, 0.0), Vec3::new(1.0, 0.0, 0.0))
            .unwrap();
        assert_eq!(c[0], Vec3::new(1.0, 4.0, 1.0));
        assert_eq!(c[1], Vec3::new(2.0, 4.0, 1.0));
        assert_eq!(c[2], Vec3::ZERO);
    }

    #[test]
    fn test_unique_points() {
        let mut simplex = cube_at(Vec3::ZERO);
        simplex.add(SupportIndex::new(3)).unwrap();
        simplex.add(SupportIndex::displaced(3)).unwrap();
        simplex.add(SupportIndex::new(5)).unwrap();
        assert_eq!(simplex.unique_points().as_slice(), &[3, 5]);
    }

    #[test]
    fn test_normal_of_impact_face_face() {
        // a resting on top of b, top face of b against bottom face of a
        let a = with_supports(cube_at(Vec3::new(0.0, 1.5, 0.0)), &[0, 1, 4]);
        let b = with_supports(cube_at(Vec3::ZERO), &[2, 3, 6]);
        let n = a.normal_of_impact(&b).unwrap();
        assert!(n.abs_diff_eq(Vec3::Y, 1.0e-6));
        let n = b.normal_of_impact(&a).unwrap();
        assert!(n.abs_diff_eq(-Vec3::Y, 1.0e-6));
    }

    #[test]
    fn test_normal_of_impact_point_face() {
        // corner 0 of a above the top face of b
        let a = with_supports(cube_at(Vec3::new(0.3, 1.5, 0.2)), &[0, 0, 0]);
        let b = with_supports(cube_at(Vec3::ZERO), &[2, 3, 6]);
        assert!(a.normal_of_impact(&b).unwrap().abs_diff_eq(Vec3::Y, 1.0e-6));
        assert!(b.normal_of_impact(&a).unwrap().abs_diff_eq(-Vec3::Y, 1.0e-6));
    }

    #[test]
    fn test_normal_of_impact_edge_edge() {
        // bottom edge of a along z crossing the top edge of b along x
        let a = with_supports(cube_at(Vec3::new(0.5, 1.5, 0.5)), &[0, 4]);
        let b = with_supports(cube_at(Vec3::ZERO), &[6, 7]);
        let n = a.normal_of_impact(&b).unwrap();
        assert!(n.abs_diff_eq(Vec3::Y, 1.0e-6));
    }

    #[test]
    fn test_normal_of_impact_parallel_edges() {
        let a = with_supports(cube_at(Vec3::new(0.0, 1.5, 1.0)), &[0, 1]);
        let b = with_supports(cube_at(Vec3::ZERO), &[6, 7]);
        let n = a.normal_of_impact(&b).unwrap();
        assert!(n.abs_diff_eq(Vec3::Y, 1.0e-6));
    }

    #[test]
    fn test_normal_of_impact_rejects_penetration() {
        let a = with_supports(cube_at(Vec3::ZERO), &[0, 1, 2, 4]);
        let b = with_supports(cube_at(Vec3::ZERO), &[7, 7, 7, 7]);
        assert!(a.normal_of_impact(&b).is_err());

        let a = with_supports(cube_at(Vec3::ZERO), &[7]);
        let b = with_supports(cube_at(Vec3::ONE), &[0]);
        assert!(a.normal_of_impact(&b).is_err());
    }

    #[test]
    fn test_manifold_of_cube_on_plane() {
        let ground = Simplex::new(
            Arc::new(VertexGroup::make_plane(
                Vec3::new(-10.0, 0.0, -10.0),
                Vec3::new(10.0, 0.0, -10.0),
                Vec3::new(-10.0, 0.0, 10.0),
                Vec3::new(10.0, 0.0, 10.0),
            )),
            Quat::IDENTITY,
            Vec3::ZERO,
        );
        let ground = with_supports(ground, &[0, 1, 2]);
        let cube = with_supports(cube_at(Vec3::new(2.0, 0.5005, 3.0)), &[0, 1, 4]);

        let n = cube.normal_of_impact(&ground).unwrap();
        assert!(n.abs_diff_eq(Vec3::Y, 1.0e-6));

        let manifold = cube.center_of_impact(&ground, n).unwrap();
        assert_eq!(manifold.points.len(), 4);
        assert!(manifold.centre.abs_diff_eq(Vec3::new(2.0, 0.00025, 3.0), 1.0e-4));
        for p in &manifold.points {
            assert!((p.x - 2.0).abs() < 0.5 + 1.0e-4);
            assert!((p.z - 3.0).abs() < 0.5 + 1.0e-4);
        }
    }

    fn ground_box() -> Simplex {
        Simplex::new(
            Arc::new(VertexGroup::make_cube(
                Vec3::new(-10.0, -1.0, -10.0),
                Vec3::new(10.0, 0.0, 10.0),
            )),
            Quat::IDENTITY,
            Vec3::ZERO,
        )
    }

    #[test]
    fn test_corner_over_large_face_diagonal() {
        // corner 0 of the cube sits over the diagonal 2-7 of the ground's top face
        let cube = with_supports(cube_at(Vec3::new(0.0, 0.5005, 0.0)), &[0, 0]);
        let ground = with_supports(ground_box(), &[7, 2]);

        let n = cube.normal_of_impact(&ground).unwrap();
        assert!(n.abs_diff_eq(Vec3::Y, 1.0e-6), "{}", n);
        assert!(ground.normal_of_impact(&cube).unwrap().abs_diff_eq(-Vec3::Y, 1.0e-6));

        let manifold = cube.center_of_impact(&ground, n).unwrap();
        assert_eq!(manifold.points.len(), 4);
        for p in &manifold.points {
            assert!(p.y.abs() < 1.0e-3, "{}", p);
            assert!((p.x.abs() - 0.5).abs() < 1.0e-4, "{}", p);
            assert!((p.z.abs() - 0.5).abs() < 1.0e-4, "{}", p);
        }
        assert!(manifold.centre.abs_diff_eq(Vec3::new(0.0, 0.00025, 0.0), 1.0e-4));
    }

    #[test]
    fn test_manifold_with_slightly_tilted_normal() {
        let cube = with_supports(cube_at(Vec3::new(0.0, 0.5005, 0.0)), &[0, 0]);
        let ground = with_supports(ground_box(), &[7, 2]);
        let tilted = Quat::from_rotation_z(2.0e-3) * Vec3::Y;

        let manifold = cube.center_of_impact(&ground, tilted).unwrap();
        assert_eq!(manifold.points.len(), 4);
        for p in &manifold.points {
            assert!(p.y.abs() < 2.0e-3, "{}", p);
        }
    }

    #[test]
    fn test_manifold_of_offset_cubes() {
        // top face overlap is a 0.5 x 1 strip
        let a = with_supports(cube_at(Vec3::new(0.5, 1.0, 0.0)), &[0, 1, 4]);
        let b = with_supports(cube_at(Vec3::ZERO), &[2, 3, 6]);
        let manifold = a.center_of_impact(&b, Vec3::Y).unwrap();
        assert_eq!(manifold.points.len(), 4);
        assert!(manifold.centre.abs_diff_eq(Vec3::new(0.25, 0.5, 0.0), 1.0e-4));
    }
}
