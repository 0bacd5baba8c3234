use crate::{
    bounds::Bounds,
    forces::{AggregateForce, ConstForce, Force},
    inertia::InertiaTensor,
    integrator::Rk4Integrator,
    options::{EPSILON, WELD_DISTANCE},
    vertex_group::VertexGroup,
};
use glam::{Mat3, Quat, Vec3};
use std::sync::Arc;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BodyHandle(pub u32);

impl Default for BodyHandle {
    // default to invalid value
    fn default() -> Self {
        Self(u32::MAX)
    }
}

/// Slot storage for bodies. Removed slots stay empty so handles are never reused.
#[derive(Debug, Default)]
pub struct BodyArena {
    bodies: Vec<Option<Body>>,
    count: usize,
}

impl BodyArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, body: Body) -> BodyHandle {
        let handle = BodyHandle(self.bodies.len() as u32);
        self.bodies.push(Some(body));
        self.count += 1;
        handle
    }

    pub fn remove(&mut self, handle: BodyHandle) -> Option<Body> {
        let body = self.bodies.get_mut(handle.0 as usize)?.take();
        if body.is_some() {
            self.count -= 1;
        }
        body
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn contains(&self, handle: BodyHandle) -> bool {
        self.get(handle).is_some()
    }

    pub fn get(&self, handle: BodyHandle) -> Option<&Body> {
        self.bodies.get(handle.0 as usize)?.as_ref()
    }

    pub fn get_mut(&mut self, handle: BodyHandle) -> Option<&mut Body> {
        self.bodies.get_mut(handle.0 as usize)?.as_mut()
    }

    /// Two distinct bodies mutably, `None` if the handles match or either is missing.
    pub fn get_pair_mut(&mut self, a: BodyHandle, b: BodyHandle) -> Option<(&mut Body, &mut Body)> {
        let (index_a, index_b) = (a.0 as usize, b.0 as usize);
        if index_a == index_b || index_a.max(index_b) >= self.bodies.len() {
            return None;
        }

        if index_a < index_b {
            let (lo, hi) = self.bodies.split_at_mut(index_b);
            Some((lo[index_a].as_mut()?, hi[0].as_mut()?))
        } else {
            let (lo, hi) = self.bodies.split_at_mut(index_a);
            Some((hi[0].as_mut()?, lo[index_b].as_mut()?))
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (BodyHandle, &Body)> {
        self.bodies
            .iter()
            .enumerate()
            .filter_map(|(i, body)| body.as_ref().map(|body| (BodyHandle(i as u32), body)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (BodyHandle, &mut Body)> {
        self.bodies
            .iter_mut()
            .enumerate()
            .filter_map(|(i, body)| body.as_mut().map(|body| (BodyHandle(i as u32), body)))
    }

    pub fn handles(&self) -> impl Iterator<Item = BodyHandle> + '_ {
        self.iter().map(|(handle, _)| handle)
    }
}

/// A rigid body tracked by its centre of mass.
///
/// Within a frame the collision queries assume the body follows straight line "frame motion":
/// constant linear and angular velocities derived from the integrator when the frame begins.
/// `cur_t` is the time within the frame up to which movement has been committed.
#[derive(Debug)]
pub struct Body {
    vertex_group: Arc<VertexGroup>,
    inertia: InertiaTensor,
    position: Vec3,
    orientation: Quat,
    linear_velocity: Vec3,
    angular_velocity: Vec3,
    frame_linear_velocity: Vec3,
    frame_angular_velocity: Vec3,
    forces: AggregateForce,
    cur_t: f32,
    frame_end: f32,
}

impl Body {
    /// Place `hull` with its local origin at `position`. The hull is recentred on its centre of
    /// mass. An infinite `density` makes a static body.
    pub fn new(hull: &VertexGroup, position: Vec3, density: f32) -> Self {
        let inertia = InertiaTensor::new(hull, density);
        let centre_of_mass = inertia.centre_of_mass();
        Self {
            vertex_group: Arc::new(hull.recentred(centre_of_mass)),
            inertia,
            position: position + centre_of_mass,
            orientation: Quat::IDENTITY,
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            frame_linear_velocity: Vec3::ZERO,
            frame_angular_velocity: Vec3::ZERO,
            forces: AggregateForce::new(),
            cur_t: 0.0,
            frame_end: 0.0,
        }
    }

    pub fn with_orientation(mut self, orientation: Quat) -> Self {
        self.orientation = orientation.normalize();
        self
    }

    pub fn with_velocity(mut self, velocity: Vec3) -> Self {
        self.set_linear_velocity(velocity);
        self
    }

    pub fn with_angular_velocity(mut self, angular_velocity: Vec3) -> Self {
        self.set_angular_velocity(angular_velocity);
        self
    }

    pub fn vertex_group(&self) -> &Arc<VertexGroup> {
        &self.vertex_group
    }

    pub fn inertia(&self) -> &InertiaTensor {
        &self.inertia
    }

    pub fn is_static(&self) -> bool {
        self.inertia.is_static()
    }

    pub fn mass(&self) -> f32 {
        self.inertia.mass()
    }

    /// World position of the centre of mass at the committed time.
    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn orientation(&self) -> Quat {
        self.orientation
    }

    pub fn linear_velocity(&self) -> Vec3 {
        self.linear_velocity
    }

    pub fn angular_velocity(&self) -> Vec3 {
        self.angular_velocity
    }

    pub fn frame_linear_velocity(&self) -> Vec3 {
        self.frame_linear_velocity
    }

    pub fn frame_angular_velocity(&self) -> Vec3 {
        self.frame_angular_velocity
    }

    pub fn cur_t(&self) -> f32 {
        self.cur_t
    }

    pub fn forces(&self) -> &AggregateForce {
        &self.forces
    }

    /// Sum of the applied forces at the committed state.
    pub fn force(&self) -> Vec3 {
        self.forces
            .force(&self.inertia, self.position, self.linear_velocity, 0.0)
    }

    pub fn torque(&self) -> Vec3 {
        self.forces
            .torque(&self.inertia, self.position, self.angular_velocity, 0.0)
    }

    /// True when neither the body nor its forces will turn it this frame.
    pub fn is_rotating(&self) -> bool {
        self.frame_angular_velocity.length() >= EPSILON
            || self.angular_velocity.length() >= EPSILON
            || self.torque().length() >= EPSILON
    }

    pub fn set_linear_velocity(&mut self, velocity: Vec3) {
        if self.is_static() {
            return;
        }
        self.linear_velocity = velocity;
        self.plan_frame_motion();
    }

    pub fn set_angular_velocity(&mut self, angular_velocity: Vec3) {
        if self.is_static() {
            return;
        }
        self.angular_velocity = angular_velocity;
        self.plan_frame_motion();
    }

    pub fn register_force(&mut self, force: Box<dyn Force>) {
        if self.is_static() {
            return;
        }
        self.forces.push(force);
        self.plan_frame_motion();
    }

    /// Constant `force` acting at `at`, relative to the centre of mass, for `duration`.
    pub fn apply_force(&mut self, at: Vec3, force: Vec3, duration: f32) {
        self.register_force(Box::new(ConstForce::new(at, force, duration)));
    }

    /// Instantaneous change of momentum at the world point `at`.
    pub fn apply_impulse(&mut self, impulse: Vec3, at: Vec3) {
        if self.is_static() {
            return;
        }
        let angular = (at - self.position).cross(impulse);
        self.linear_velocity += impulse * self.inertia.inv_mass();
        self.angular_velocity += self.inv_inertia_tensor_world() * angular;
        self.plan_frame_motion();
    }

    pub fn inv_inertia_tensor_world(&self) -> Mat3 {
        self.inertia.inv_tensor_world(self.orientation)
    }

    pub fn velocity_at_point(&self, point: Vec3) -> Vec3 {
        self.linear_velocity + self.angular_velocity.cross(point - self.position)
    }

    /// Velocity of a world point under the frame motion at time `t`.
    pub fn frame_velocity_at_point(&self, point: Vec3, t: f32) -> Vec3 {
        self.frame_linear_velocity + self.frame_angular_velocity.cross(point - self.position_at(t))
    }

    pub fn local_to_world(&self, local_point: Vec3) -> Vec3 {
        self.orientation * local_point + self.position
    }

    pub fn world_to_local(&self, world_point: Vec3) -> Vec3 {
        self.orientation.conjugate() * (world_point - self.position)
    }

    /// Start a frame of length `dt`.
    ///
    /// The frame linear velocity is the integrated displacement over the frame divided by its
    /// length and the frame angular velocity is the mean of the start and end angular velocity.
    pub fn begin_time_step(&mut self, dt: f32) {
        self.cur_t = 0.0;
        self.frame_end = dt;
        self.plan_frame_motion();
    }

    // frame motion over what remains of the frame
    fn plan_frame_motion(&mut self) {
        let dt = self.frame_end - self.cur_t;
        if dt <= 0.0 {
            self.frame_linear_velocity = self.linear_velocity;
            self.frame_angular_velocity = self.angular_velocity;
            return;
        }

        let integrator = Rk4Integrator;
        let (displacement, _) = integrator.project_translation(
            &self.forces,
            &self.inertia,
            self.position,
            self.linear_velocity,
            dt,
        );
        let (_, angular_velocity) = integrator.project_rotation(
            &self.forces,
            &self.inertia,
            self.position,
            self.orientation,
            self.angular_velocity,
            dt,
        );
        self.frame_linear_velocity = displacement / dt;
        self.frame_angular_velocity = (self.angular_velocity + angular_velocity) * 0.5;
    }

    /// Frame displacement of the centre of mass from the committed position at time `t`.
    pub fn displacement_at(&self, t: f32) -> Vec3 {
        self.frame_linear_velocity * (t - self.cur_t)
    }

    pub fn position_at(&self, t: f32) -> Vec3 {
        self.position + self.displacement_at(t)
    }

    /// Orientation at time `t`, rotated to first order along the frame angular velocity.
    pub fn orientation_at(&self, t: f32) -> Quat {
        let w = self.frame_angular_velocity;
        let dt = t - self.cur_t;
        (self.orientation + Quat::from_xyzw(w.x, w.y, w.z, 0.0) * self.orientation * (dt * 0.5))
            .normalize()
    }

    /// Orientation and centre of mass at time `t`.
    pub fn configuration_at_time(&self, t: f32) -> (Quat, Vec3) {
        (self.orientation_at(t), self.position_at(t))
    }

    /// Largest distance any vertex moves by rotating between the committed time and `t`.
    pub fn project_maximum_rotation(&self, t: f32) -> f32 {
        self.vertex_group
            .max_rotational_displacement(self.frame_angular_velocity * (t - self.cur_t))
    }

    /// Upper bound on how far `other` and `self` approach along `n` by time `t`, where `n`
    /// points from `other` toward `self`.
    pub fn project_maximum_movement_onto(&self, other: &Body, n: Vec3, t: f32) -> f32 {
        let translation = (other.displacement_at(t) - self.displacement_at(t)).dot(n);
        let rotation = other.project_maximum_rotation(t) + self.project_maximum_rotation(t);
        translation + rotation
    }

    /// Move the body along the frame motion to time `t` and integrate its velocities.
    pub fn commit_movement(&mut self, t: f32) {
        if t <= self.cur_t {
            return;
        }
        let dt = t - self.cur_t;

        let integrator = Rk4Integrator;
        let (_, angular_velocity) = integrator.project_rotation(
            &self.forces,
            &self.inertia,
            self.position,
            self.orientation,
            self.angular_velocity,
            dt,
        );
        let (_, linear_velocity) = integrator.project_translation(
            &self.forces,
            &self.inertia,
            self.position,
            self.linear_velocity,
            dt,
        );

        let (orientation, position) = self.configuration_at_time(t);
        self.orientation = orientation;
        self.position = position;
        self.angular_velocity = angular_velocity;
        self.linear_velocity = linear_velocity;
        self.cur_t = t;

        // keep the direction of the frame motion for the rest of the frame
        if self.frame_linear_velocity.length_squared() > EPSILON {
            self.frame_linear_velocity =
                self.frame_linear_velocity.normalize() * self.linear_velocity.length();
        }
        if self.frame_angular_velocity.length_squared() > EPSILON {
            self.frame_angular_velocity =
                self.frame_angular_velocity.normalize() * self.angular_velocity.length();
        }

        self.forces.commit(dt);
    }

    pub fn bounds(&self) -> Bounds {
        self.vertex_group.bounds(self.orientation, self.position)
    }

    /// Everything the hull may touch between the committed time and `t_end`.
    pub fn swept_bounds(&self, t_end: f32) -> Bounds {
        let (orientation, position) = self.configuration_at_time(t_end);
        let mut bounds = self.bounds();
        bounds.expand_by_bounds(&self.vertex_group.bounds(orientation, position));
        bounds.expand_by_margin(self.project_maximum_rotation(t_end) + WELD_DISTANCE);
        bounds
    }
}
