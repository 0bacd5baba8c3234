use crate::inertia::InertiaTensor;
use glam::Vec3;
use std::fmt::Debug;

/// A force applied to a body for a limited time.
///
/// `dt` is the offset from the start of the current evaluation, so a force that varies in time
/// can be sampled at the intermediate steps of the integrator.
pub trait Force: Debug + Send + Sync {
    /// Where the force acts, relative to the centre of mass.
    fn at(&self) -> Vec3;

    fn force(&self, inertia: &InertiaTensor, x: Vec3, v: Vec3, dt: f32) -> Vec3;

    fn torque(&self, inertia: &InertiaTensor, x: Vec3, w: Vec3, dt: f32) -> Vec3 {
        self.at().cross(self.force(inertia, x, w, dt))
    }

    /// Consume `dt` of the force's lifetime, returns true once it is spent.
    fn commit(&mut self, dt: f32) -> bool;
}

#[derive(Copy, Clone, Debug, PartialEq)]
struct Lifetime {
    total: f32,
    remaining: f32,
}

impl Lifetime {
    fn new(total: f32) -> Self {
        Self {
            total,
            remaining: total,
        }
    }

    fn elapsed(&self) -> f32 {
        self.total - self.remaining
    }

    fn commit(&mut self, dt: f32) -> bool {
        self.remaining -= dt;
        self.remaining <= 0.0
    }
}

/// Constant force, use an infinite duration for gravity.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ConstForce {
    at: Vec3,
    force: Vec3,
    lifetime: Lifetime,
}

impl ConstForce {
    pub fn new(at: Vec3, force: Vec3, duration: f32) -> Self {
        Self {
            at,
            force,
            lifetime: Lifetime::new(duration),
        }
    }
}

impl Force for ConstForce {
    fn at(&self) -> Vec3 {
        self.at
    }

    fn force(&self, _inertia: &InertiaTensor, _x: Vec3, _v: Vec3, _dt: f32) -> Vec3 {
        self.force
    }

    fn commit(&mut self, dt: f32) -> bool {
        self.lifetime.commit(dt)
    }
}

/// Force growing linearly over its lifetime, `slope * t + intercept`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LinearForce {
    at: Vec3,
    slope: Vec3,
    intercept: Vec3,
    lifetime: Lifetime,
}

impl LinearForce {
    pub fn new(at: Vec3, slope: Vec3, intercept: Vec3, duration: f32) -> Self {
        Self {
            at,
            slope,
            intercept,
            lifetime: Lifetime::new(duration),
        }
    }
}

impl Force for LinearForce {
    fn at(&self) -> Vec3 {
        self.at
    }

    fn force(&self, _inertia: &InertiaTensor, _x: Vec3, _v: Vec3, dt: f32) -> Vec3 {
        self.slope * (self.lifetime.elapsed() + dt) + self.intercept
    }

    fn commit(&mut self, dt: f32) -> bool {
        self.lifetime.commit(dt)
    }
}

/// Every force currently registered on a body.
#[derive(Debug, Default)]
pub struct AggregateForce {
    forces: Vec<Box<dyn Force>>,
}

impl AggregateForce {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, force: Box<dyn Force>) {
        self.forces.push(force);
    }

    pub fn len(&self) -> usize {
        self.forces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forces.is_empty()
    }

    pub fn force(&self, inertia: &InertiaTensor, x: Vec3, v: Vec3, dt: f32) -> Vec3 {
        self.forces
            .iter()
            .map(|f| f.force(inertia, x, v, dt))
            .sum()
    }

    pub fn torque(&self, inertia: &InertiaTensor, x: Vec3, w: Vec3, dt: f32) -> Vec3 {
        self.forces
            .iter()
            .map(|f| f.torque(inertia, x, w, dt))
            .sum()
    }

    /// Age every force by `dt` and drop the spent ones.
    pub fn commit(&mut self, dt: f32) {
        let before = self.forces.len();
        self.forces.retain_mut(|f| !f.commit(dt));
        if self.forces.len() != before {
            log::trace!("{} forces spent", before - self.forces.len());
        }
    }
}
