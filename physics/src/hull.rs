use glam::Vec3;

// points closer than this to a hull point are dropped
const WELD_POINT_DISTANCE: f32 = 0.01;

fn find_point_furthest_in_dir(pts: &[Vec3], dir: Vec3) -> usize {
    let mut max_idx = 0;
    let mut max_dist = f32::MIN;
    for (i, pt) in pts.iter().enumerate() {
        let dist = dir.dot(*pt);
        if dist > max_dist {
            max_dist = dist;
            max_idx = i;
        }
    }
    max_idx
}

fn distance_from_line(a: Vec3, ab: Vec3, pt: Vec3) -> f32 {
    let ray = pt - a;
    let projection = ab * ray.dot(ab);
    (ray - projection).length()
}

fn find_point_furthest_from_line(pts: &[Vec3], a: Vec3, b: Vec3) -> Vec3 {
    let ab = (b - a).normalize_or_zero();
    pts.iter()
        .copied()
        .max_by(|lhs, rhs| {
            distance_from_line(a, ab, *lhs).total_cmp(&distance_from_line(a, ab, *rhs))
        })
        .unwrap_or(a)
}

fn triangle_normal(a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
    (b - a).cross(c - a).normalize_or_zero()
}

fn distance_from_triangle(a: Vec3, b: Vec3, c: Vec3, pt: Vec3) -> f32 {
    (pt - a).dot(triangle_normal(a, b, c))
}

fn find_point_furthest_from_triangle(pts: &[Vec3], a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
    let normal = triangle_normal(a, b, c);
    pts.iter()
        .copied()
        .max_by(|lhs, rhs| {
            (*lhs - a)
                .dot(normal)
                .abs()
                .total_cmp(&(*rhs - a).dot(normal).abs())
        })
        .unwrap_or(a)
}

#[derive(Clone, Copy, Debug)]
struct Tri {
    a: u32,
    b: u32,
    c: u32,
}

impl Tri {
    fn edges(&self) -> [Edge; 3] {
        [
            Edge {
                a: self.a,
                b: self.b,
            },
            Edge {
                a: self.b,
                b: self.c,
            },
            Edge {
                a: self.c,
                b: self.a,
            },
        ]
    }

    fn distance_to(&self, hull_points: &[Vec3], pt: Vec3) -> f32 {
        distance_from_triangle(
            hull_points[self.a as usize],
            hull_points[self.b as usize],
            hull_points[self.c as usize],
            pt,
        )
    }
}

#[derive(Copy, Clone, Debug)]
struct Edge {
    a: u32,
    b: u32,
}

impl PartialEq for Edge {
    fn eq(&self, other: &Self) -> bool {
        (self.a == other.a && self.b == other.b) || (self.a == other.b && self.b == other.a)
    }
}

impl Eq for Edge {}

// Returns None when the points are degenerate (coplanar or coincident).
fn build_tetrahedron(verts: &[Vec3]) -> Option<(Vec<Vec3>, Vec<Tri>)> {
    let mut point0 = verts[find_point_furthest_in_dir(verts, Vec3::X)];
    let mut point1 = verts[find_point_furthest_in_dir(verts, -point0)];
    if point0.distance_squared(point1) < f32::EPSILON {
        return None;
    }
    let point2 = find_point_furthest_from_line(verts, point0, point1);
    let point3 = find_point_furthest_from_triangle(verts, point0, point1, point2);

    let height = distance_from_triangle(point0, point1, point2, point3);
    if height.abs() < f32::EPSILON || !height.is_finite() {
        return None;
    }

    // keep every face counter clockwise seen from outside
    if height > 0.0 {
        std::mem::swap(&mut point0, &mut point1);
    }

    let hull_points = vec![point0, point1, point2, point3];
    let hull_tris = vec![
        Tri { a: 0, b: 1, c: 2 },
        Tri { a: 0, b: 2, c: 3 },
        Tri { a: 2, b: 1, c: 3 },
        Tri { a: 1, b: 0, c: 3 },
    ];
    Some((hull_points, hull_tris))
}

fn is_external(hull_points: &[Vec3], hull_tris: &[Tri], pt: Vec3) -> bool {
    hull_tris
        .iter()
        .any(|tri| tri.distance_to(hull_points, pt) > 0.0)
}

fn remove_internal_points(hull_points: &[Vec3], hull_tris: &[Tri], check_pts: &mut Vec<Vec3>) {
    check_pts.retain(|pt| {
        is_external(hull_points, hull_tris, *pt)
            && hull_points
                .iter()
                .all(|hull_pt| hull_pt.distance_squared(*pt) >= WELD_POINT_DISTANCE * WELD_POINT_DISTANCE)
    });
}

fn add_point(hull_points: &mut Vec<Vec3>, hull_tris: &mut Vec<Tri>, pt: Vec3) {
    let facing: Vec<bool> = hull_tris
        .iter()
        .map(|tri| tri.distance_to(hull_points, pt) > 0.0)
        .collect();

    // the horizon is made of the edges used by exactly one facing triangle
    let facing_edges: Vec<Edge> = hull_tris
        .iter()
        .zip(facing.iter())
        .filter(|(_, facing)| **facing)
        .flat_map(|(tri, _)| tri.edges())
        .collect();
    let horizon: Vec<Edge> = facing_edges
        .iter()
        .filter(|edge| facing_edges.iter().filter(|other| other == edge).count() == 1)
        .copied()
        .collect();

    let mut facing_iter = facing.iter();
    hull_tris.retain(|_| !facing_iter.next().copied().unwrap_or(false));

    hull_points.push(pt);
    let new_pt_idx = hull_points.len() as u32 - 1;
    hull_tris.extend(horizon.iter().map(|edge| Tri {
        a: edge.a,
        b: edge.b,
        c: new_pt_idx,
    }));
}

fn remove_unreferenced_verts(hull_points: &mut Vec<Vec3>, hull_tris: &mut [Tri]) {
    let mut remap = vec![u32::MAX; hull_points.len()];
    for tri in hull_tris.iter() {
        for idx in [tri.a, tri.b, tri.c] {
            remap[idx as usize] = 0;
        }
    }

    let mut next = 0;
    let mut kept = Vec::with_capacity(hull_points.len());
    for (idx, pt) in hull_points.iter().enumerate() {
        if remap[idx] == 0 {
            remap[idx] = next;
            next += 1;
            kept.push(*pt);
        }
    }

    for tri in hull_tris.iter_mut() {
        tri.a = remap[tri.a as usize];
        tri.b = remap[tri.b as usize];
        tri.c = remap[tri.c as usize];
    }
    *hull_points = kept;
}

/// Convex hull of a point cloud as vertices and outward facing counter clockwise triangles.
///
/// Returns `None` for fewer than four points or a cloud with no volume.
pub fn build_convex_hull(verts: &[Vec3]) -> Option<(Vec<Vec3>, Vec<[u32; 3]>)> {
    if verts.len() < 4 {
        return None;
    }

    let (mut hull_points, mut hull_tris) = build_tetrahedron(verts)?;

    let mut external_verts = verts.to_vec();
    remove_internal_points(&hull_points, &hull_tris, &mut external_verts);
    while !external_verts.is_empty() {
        let pt_idx = find_point_furthest_in_dir(&external_verts, external_verts[0]);
        let pt = external_verts.swap_remove(pt_idx);
        add_point(&mut hull_points, &mut hull_tris, pt);
        remove_internal_points(&hull_points, &hull_tris, &mut external_verts);
    }

    remove_unreferenced_verts(&mut hull_points, &mut hull_tris);
    log::debug!(
        "built convex hull of {} points with {} vertices and {} triangles",
        verts.len(),
        hull_points.len(),
        hull_tris.len()
    );

    let tris = hull_tris.iter().map(|tri| [tri.a, tri.b, tri.c]).collect();
    Some((hull_points, tris))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_cube_hull() {
        let mut pts = Vec::new();
        for i in 0..8 {
            pts.push(Vec3::new(
                if i & 1 != 0 { 1.0 } else { -1.0 },
                if i & 2 != 0 { 1.0 } else { -1.0 },
                if i & 4 != 0 { 1.0 } else { -1.0 },
            ));
        }
        pts.extend_from_slice(&[
            Vec3::ZERO,
            Vec3::new(0.5, 0.2, -0.3),
            Vec3::new(-0.9, 0.9, 0.9),
            Vec3::new(0.1, -0.7, 0.4),
        ]);

        let (hull_points, hull_tris) = build_convex_hull(&pts).unwrap();
        assert_eq!(hull_points.len(), 8);
        assert_eq!(hull_tris.len(), 12);
        for pt in &hull_points {
            assert_eq!(pt.abs(), Vec3::ONE);
        }

        // every vertex is behind or on every face
        for tri in &hull_tris {
            let [a, b, c] = tri.map(|idx| hull_points[idx as usize]);
            for pt in &hull_points {
                assert!(distance_from_triangle(a, b, c, *pt) < 1.0e-5);
            }
        }
    }

    #[test]
    fn test_degenerate_input() {
        assert!(build_convex_hull(&[Vec3::ZERO, Vec3::X, Vec3::Y]).is_none());
        let flat = [Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::new(1.0, 1.0, 0.0)];
        assert!(build_convex_hull(&flat).is_none());
    }
}
