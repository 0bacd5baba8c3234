use crate::{math::outer, options::EPSILON, vertex_group::VertexGroup};
use glam::{Mat3, Quat, Vec3};

/// Mass properties of a closed convex hull of uniform density.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct InertiaTensor {
    mass: f32,
    inv_mass: f32,
    centre_of_mass: Vec3,
    tensor: Mat3,
    inv_tensor: Mat3,
}

impl InertiaTensor {
    /// Mass, centre of mass and inertia about the centre of mass of `hull`.
    ///
    /// The hull is split into tetrahedra fanned from the local origin and their covariance
    /// matrices summed. A non finite density makes the body static: infinite mass and a zero
    /// inverse tensor.
    pub fn new(hull: &VertexGroup, density: f32) -> Self {
        if !density.is_finite() {
            let centre_of_mass = hull.verts().iter().sum::<Vec3>() / hull.len() as f32;
            log::trace!("static body centred at {}", centre_of_mass);
            return Self::fixed(centre_of_mass);
        }

        // covariance of the tetrahedron (0, e0, e1, e2) is det * A * C * A^T
        let canonical = Mat3::from_cols(
            Vec3::new(2.0, 1.0, 1.0),
            Vec3::new(1.0, 2.0, 1.0),
            Vec3::new(1.0, 1.0, 2.0),
        ) * (1.0 / 120.0);

        let mut covariance = Mat3::ZERO;
        let mut volume = 0.0;
        let mut weighted_centre = Vec3::ZERO;
        for tri in hull.tris() {
            let [a, b, c] = tri.map(|idx| hull.vertex(idx));
            let m = Mat3::from_cols(a, b, c);
            let det = m.determinant();
            covariance += m * canonical * m.transpose() * det;

            let tet_volume = det / 6.0;
            volume += tet_volume;
            weighted_centre += (a + b + c) * (tet_volume / 4.0);
        }

        if volume.abs() < EPSILON {
            log::warn!("massless hull with volume {}", volume);
            return Self::fixed(Vec3::ZERO);
        }

        let centre_of_mass = weighted_centre / volume;

        // move the covariance to the centre of mass, then I = tr(C) * 1 - C
        let covariance = covariance - outer(centre_of_mass, centre_of_mass) * volume;
        let trace = covariance.x_axis.x + covariance.y_axis.y + covariance.z_axis.z;
        let tensor = (Mat3::from_diagonal(Vec3::splat(trace)) - covariance) * density;

        let mass = volume * density;
        let inv_tensor = if tensor.determinant().abs() < EPSILON * EPSILON {
            Mat3::ZERO
        } else {
            tensor.inverse()
        };
        log::trace!(
            "mass {} centre of mass {} inertia {:?}",
            mass,
            centre_of_mass,
            tensor
        );

        Self {
            mass,
            inv_mass: mass.recip(),
            centre_of_mass,
            tensor,
            inv_tensor,
        }
    }

    fn fixed(centre_of_mass: Vec3) -> Self {
        Self {
            mass: f32::INFINITY,
            inv_mass: 0.0,
            centre_of_mass,
            tensor: Mat3::from_diagonal(Vec3::splat(f32::INFINITY)),
            inv_tensor: Mat3::ZERO,
        }
    }

    pub fn mass(&self) -> f32 {
        self.mass
    }

    pub fn inv_mass(&self) -> f32 {
        self.inv_mass
    }

    pub fn is_static(&self) -> bool {
        self.inv_mass == 0.0
    }

    /// Centre of mass in the coordinates of the hull the tensor was built from.
    pub fn centre_of_mass(&self) -> Vec3 {
        self.centre_of_mass
    }

    pub fn tensor(&self) -> Mat3 {
        self.tensor
    }

    pub fn inv_tensor(&self) -> Mat3 {
        self.inv_tensor
    }

    /// Inverse inertia in world space for a body at `orientation`.
    pub fn inv_tensor_world(&self, orientation: Quat) -> Mat3 {
        let rotation = Mat3::from_quat(orientation.normalize());
        rotation * self.inv_tensor * rotation.transpose()
    }
}
