use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign};

/// Axis aligned box. An empty box has inverted extents so that adding any point makes it valid.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub mins: Vec3,
    pub maxs: Vec3,
}

impl Bounds {
    pub fn new() -> Bounds {
        Bounds {
            mins: Vec3::splat(f32::MAX),
            maxs: Vec3::splat(-f32::MAX),
        }
    }

    pub fn from_min_max(mins: Vec3, maxs: Vec3) -> Self {
        Bounds {
            mins: mins.min(maxs),
            maxs: mins.max(maxs),
        }
    }

    pub fn from_points(pts: &[Vec3]) -> Self {
        pts.iter().fold(Bounds::new(), |acc, pt| acc + *pt)
    }

    pub fn is_empty(&self) -> bool {
        self.maxs.cmplt(self.mins).any()
    }

    /// Inclusive overlap test, touching boxes intersect.
    pub fn does_intersect(&self, rhs: &Self) -> bool {
        !(self.maxs.cmplt(rhs.mins).any() || rhs.maxs.cmplt(self.mins).any())
    }

    pub fn expand_by_point(&mut self, pt: Vec3) {
        self.add_assign(pt);
    }

    pub fn expand_by_bounds(&mut self, rhs: &Self) {
        self.expand_by_point(rhs.mins);
        self.expand_by_point(rhs.maxs);
    }

    pub fn expand_by_margin(&mut self, margin: f32) {
        self.mins -= Vec3::splat(margin);
        self.maxs += Vec3::splat(margin);
    }

    pub fn width(&self) -> Vec3 {
        self.maxs - self.mins
    }

    pub fn axis(&self, axis: usize) -> (f32, f32) {
        (self.mins[axis], self.maxs[axis])
    }
}

impl Default for Bounds {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Add<Vec3> for Bounds {
    type Output = Self;
    fn add(self, pt: Vec3) -> Self::Output {
        Bounds {
            mins: Vec3::select(pt.cmplt(self.mins), pt, self.mins),
            maxs: Vec3::select(pt.cmpgt(self.maxs), pt, self.maxs),
        }
    }
}

impl AddAssign<Vec3> for Bounds {
    fn add_assign(&mut self, pt: Vec3) {
        self.mins = Vec3::select(pt.cmplt(self.mins), pt, self.mins);
        self.maxs = Vec3::select(pt.cmpgt(self.maxs), pt, self.maxs);
    }
}
