use crate::{forces::AggregateForce, inertia::InertiaTensor};
use glam::{Quat, Vec3};

fn spin(w: Vec3, o: Quat) -> Quat {
    Quat::from_xyzw(w.x, w.y, w.z, 0.0) * o * 0.5
}

/// Classic fourth order Runge-Kutta over a body's linear and angular state.
#[derive(Copy, Clone, Debug, Default)]
pub struct Rk4Integrator;

impl Rk4Integrator {
    /// Displacement of the centre of mass after `dt` and the velocity at the end of it.
    pub fn project_translation(
        &self,
        force: &AggregateForce,
        inertia: &InertiaTensor,
        x0: Vec3,
        v0: Vec3,
        dt: f32,
    ) -> (Vec3, Vec3) {
        debug_assert!(dt >= 0.0, "negative time step {}", dt);
        let half_dt = dt * 0.5;
        let sixth_dt = dt / 6.0;
        let inv_mass = inertia.inv_mass();

        let f_1 = force.force(inertia, x0, v0, 0.0);
        let v_1 = v0 + f_1 * (half_dt * inv_mass);

        let x_2 = x0 + v0 * half_dt;
        let f_2 = force.force(inertia, x_2, v_1, half_dt);
        let v_2 = v0 + f_2 * (half_dt * inv_mass);

        let x_3 = x0 + v_1 * half_dt;
        let f_3 = force.force(inertia, x_3, v_2, half_dt);
        let v_3 = v0 + f_3 * (dt * inv_mass);

        let x_4 = x0 + v_2 * dt;
        let f_4 = force.force(inertia, x_4, v_3, dt);
        let v1 = v0 + (f_1 + (f_2 + f_3) * 2.0 + f_4) * (sixth_dt * inv_mass);

        let displacement = (v0 + (v_1 + v_2) * 2.0 + v_3) * sixth_dt;
        (displacement, v1)
    }

    /// Orientation and angular velocity after `dt`.
    ///
    /// The angular velocity follows the torque through the world inverse inertia at each stage's
    /// orientation, and the orientation follows `q' = (0, w) q / 2`.
    pub fn project_rotation(
        &self,
        force: &AggregateForce,
        inertia: &InertiaTensor,
        x: Vec3,
        o0: Quat,
        w0: Vec3,
        dt: f32,
    ) -> (Quat, Vec3) {
        debug_assert!(dt >= 0.0, "negative time step {}", dt);
        let half_dt = dt * 0.5;
        let sixth_dt = dt / 6.0;

        let q_1 = spin(w0, o0);
        let t_1 = force.torque(inertia, x, w0, 0.0);
        let o_1 = o0 + q_1 * half_dt;
        let w_1 = w0 + inertia.inv_tensor_world(o_1) * (t_1 * half_dt);

        let q_2 = spin(w_1, o_1);
        let t_2 = force.torque(inertia, x, w_1, half_dt);
        let o_2 = o0 + q_2 * half_dt;
        let w_2 = w0 + inertia.inv_tensor_world(o_2) * (t_2 * half_dt);

        let q_3 = spin(w_2, o_2);
        let t_3 = force.torque(inertia, x, w_2, half_dt);
        let o_3 = o0 + q_3 * dt;
        let w_3 = w0 + inertia.inv_tensor_world(o_3) * (t_3 * dt);

        let q_4 = spin(w_3, o_3);
        let t_4 = force.torque(inertia, x, w_3, dt);

        let o1 = (o0 + (q_1 + (q_2 + q_3) * 2.0 + q_4) * sixth_dt).normalize();
        let l = (t_1 + (t_2 + t_3) * 2.0 + t_4) * sixth_dt;
        let w1 = w0 + inertia.inv_tensor_world(o1) * l;
        (o1, w1)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        forces::{ConstForce, LinearForce},
        vertex_group::VertexGroup,
    };

    fn unit_cube_inertia(density: f32) -> InertiaTensor {
        InertiaTensor::new(&VertexGroup::make_cube(Vec3::splat(-0.5), Vec3::splat(0.5)), density)
    }

    #[test]
    fn test_no_force_is_ballistic() {
        let inertia = unit_cube_inertia(1.0);
        let (disp, v) = Rk4Integrator.project_translation(
            &AggregateForce::new(),
            &inertia,
            Vec3::ZERO,
            Vec3::new(1.0, 2.0, 3.0),
            0.5,
        );
        assert!(disp.abs_diff_eq(Vec3::new(0.5, 1.0, 1.5), 1.0e-6));
        assert_eq!(v, Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_constant_force_matches_closed_form() {
        let inertia = unit_cube_inertia(2.0);
        let mut force = AggregateForce::new();
        force.push(Box::new(ConstForce::new(
            Vec3::ZERO,
            Vec3::new(0.0, -20.0, 0.0),
            f32::INFINITY,
        )));

        // a = -10, x = v0 t + a t^2 / 2
        let v0 = Vec3::new(1.0, 5.0, 0.0);
        let (disp, v) = Rk4Integrator.project_translation(&force, &inertia, Vec3::ZERO, v0, 0.5);
        assert!(disp.abs_diff_eq(Vec3::new(0.5, 2.5 - 1.25, 0.0), 1.0e-5));
        assert!(v.abs_diff_eq(Vec3::new(1.0, 0.0, 0.0), 1.0e-5));
    }

    #[test]
    fn test_linear_force_matches_closed_form() {
        let inertia = unit_cube_inertia(1.0);
        let mut force = AggregateForce::new();
        force.push(Box::new(LinearForce::new(Vec3::ZERO, Vec3::X, Vec3::ZERO, 10.0)));

        // a = t, v = t^2 / 2, x = t^3 / 6 which rk4 integrates exactly
        let (disp, v) = Rk4Integrator.project_translation(&force, &inertia, Vec3::ZERO, Vec3::ZERO, 1.0);
        assert!(disp.abs_diff_eq(Vec3::new(1.0 / 6.0, 0.0, 0.0), 1.0e-5));
        assert!(v.abs_diff_eq(Vec3::new(0.5, 0.0, 0.0), 1.0e-5));
    }

    #[test]
    fn test_static_body_ignores_force() {
        let inertia = unit_cube_inertia(f32::INFINITY);
        let mut force = AggregateForce::new();
        force.push(Box::new(ConstForce::new(Vec3::X, Vec3::splat(100.0), f32::INFINITY)));
        let (disp, v) = Rk4Integrator.project_translation(&force, &inertia, Vec3::ZERO, Vec3::ZERO, 1.0);
        assert_eq!(disp, Vec3::ZERO);
        assert_eq!(v, Vec3::ZERO);
        let (o, w) = Rk4Integrator.project_rotation(&force, &inertia, Vec3::ZERO, Quat::IDENTITY, Vec3::ZERO, 1.0);
        assert_eq!(o, Quat::IDENTITY);
        assert_eq!(w, Vec3::ZERO);
    }

    #[test]
    fn test_pure_spin_stays_unit() {
        let inertia = unit_cube_inertia(1.0);
        let force = AggregateForce::new();
        let w0 = Vec3::new(0.0, 0.0, 0.5);
        let mut o = Quat::IDENTITY;
        let mut w = w0;
        for _ in 0..100 {
            let (o1, w1) = Rk4Integrator.project_rotation(&force, &inertia, Vec3::ZERO, o, w, 0.01);
            o = o1;
            w = w1;
            assert!((o.length() - 1.0).abs() < 1.0e-5);
        }

        // 0.5 rad/s for one second about z
        assert_eq!(w, w0);
        let expected = Quat::from_rotation_z(0.5);
        assert!(o.abs_diff_eq(expected, 1.0e-4));
    }

    #[test]
    fn test_torque_spins_up() {
        let inertia = unit_cube_inertia(1.0);
        let mut force = AggregateForce::new();
        // pushing +y at +x gives a torque about +z
        force.push(Box::new(ConstForce::new(Vec3::X, Vec3::Y, f32::INFINITY)));
        let (_, w) = Rk4Integrator.project_rotation(&force, &inertia, Vec3::ZERO, Quat::IDENTITY, Vec3::ZERO, 0.1);
        // I = 1/6 so alpha = 6
        assert!(w.abs_diff_eq(Vec3::new(0.0, 0.0, 0.6), 1.0e-4));
    }
}
