use crate::options::EPSILON;
use glam::{Mat3, Quat, Vec3};

/// Outer product `a * b^T`.
pub fn outer(a: Vec3, b: Vec3) -> Mat3 {
    Mat3::from_cols(a * b.x, a * b.y, a * b.z)
}

/// The smallest non negative real root of `a s^2 + b s + c = 0`, or infinity when there is none.
///
/// A vanishing constant equation is satisfied immediately and returns 0.
pub fn first_positive_real_root(a: f32, b: f32, c: f32) -> f32 {
    let non_negative = |root: f32| if root >= 0.0 { root } else { f32::INFINITY };

    if a.abs() > 0.0 {
        let disc = b * b - 4.0 * a * c;
        if disc < 0.0 {
            log::trace!("no real roots");
            return f32::INFINITY;
        }

        let sqrt_disc = disc.sqrt();
        let two_a = 2.0 * a;
        let root0 = non_negative((-b - sqrt_disc) / two_a);
        let root1 = non_negative((-b + sqrt_disc) / two_a);
        root0.min(root1)
    } else if b.abs() > 0.0 {
        non_negative(-c / b)
    } else if c.abs() < EPSILON {
        0.0
    } else {
        f32::INFINITY
    }
}

/// Rotate `p` by the linear blend of two quaternions, `q = q0 + s (q1 - q0)`, without
/// renormalising. Linearising the rotation is what makes the collision time polynomial solvable.
pub fn lerp_rotate(p: Vec3, q0: Quat, q1: Quat, s: f32) -> Vec3 {
    let v = q0.xyz() + (q1.xyz() - q0.xyz()) * s;
    let r = q0.w + (q1.w - q0.w) * s;
    let v_x_p = v.cross(p);
    p + 2.0 * v.cross(v_x_p) + 2.0 * r * v_x_p
}

/// Fraction of the motion at which the local point `p` first reaches the plane through
/// `plane_point` with normal `plane_normal`.
///
/// The point is carried by a body translating from `x0` to `x1` while rotating as
/// [`lerp_rotate`] from `q0` to `q1`. Returns infinity if the point never reaches the plane.
pub fn exact_collision_time(
    p: Vec3,
    plane_point: Vec3,
    plane_normal: Vec3,
    x0: Vec3,
    x1: Vec3,
    q0: Quat,
    q1: Quat,
) -> f32 {
    let (v0, r0) = (q0.xyz(), q0.w);
    let dv = q1.xyz() - v0;
    let dr = q1.w - r0;

    let v0_x_p = v0.cross(p);
    let dv_x_p = dv.cross(p);

    // the rotated point is quadratic in s
    let s2 = 2.0 * (dv.cross(dv_x_p) + dr * dv_x_p);
    let s1 = (x1 - x0)
        + 2.0 * (v0.cross(dv_x_p) + dv.cross(v0_x_p) + r0 * dv_x_p + dr * v0_x_p);
    let s0 = p + x0 - plane_point + 2.0 * (v0.cross(v0_x_p) + r0 * v0_x_p);

    let (a, b, c) = (
        s2.dot(plane_normal),
        s1.dot(plane_normal),
        s0.dot(plane_normal),
    );
    log::trace!("collision time polynomial {} s^2 + {} s + {}", a, b, c);
    first_positive_real_root(a, b, c)
}
