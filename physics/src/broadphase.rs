use crate::{
    bounds::Bounds,
    pair_set::PairSet,
};
use std::{cmp::Ordering, collections::HashMap, fmt::Debug, hash::Hash};

const NUM_AXES: usize = 3;
const LOWER: usize = 0;
const UPPER: usize = 1;

/// One end of an object's extent along one axis. Sentinels carry no object.
#[derive(Copy, Clone, Debug)]
struct Bound<T> {
    object: Option<T>,
    value: f32,
    is_min: bool,
}

impl<T> Bound<T> {
    fn min_sentinel() -> Self {
        Self {
            object: None,
            value: -f32::MAX,
            is_min: true,
        }
    }

    fn max_sentinel() -> Self {
        Self {
            object: None,
            value: f32::MAX,
            is_min: false,
        }
    }
}

// minimums sort ahead of maximums at the same position so touching extents overlap
fn compare_bounds<T>(a: &Bound<T>, b: &Bound<T>) -> Ordering {
    a.value
        .total_cmp(&b.value)
        .then_with(|| b.is_min.cmp(&a.is_min))
}

/// Sort and sweep broad phase over the three world axes.
///
/// Each axis keeps its bounds sorted between two sentinels, and a pair set of the objects whose
/// extents overlap on that axis. A pair that overlaps on all three axes is a possible collision.
/// Moving objects are re-sorted by swapping neighbouring bounds, and each swap of a minimum past a
/// maximum of a different object adds or removes exactly one axis pair.
#[derive(Clone, Debug)]
pub struct BroadPhase<T> {
    bounds: [Vec<Bound<T>>; NUM_AXES],
    // per object, per axis, the positions of the lower and upper bound
    index: HashMap<T, [[usize; 2]; NUM_AXES]>,
    axis_possibles: [PairSet<T>; NUM_AXES],
    possibles: PairSet<T>,
}

impl<T: Copy + Ord + Hash + Debug> Default for BroadPhase<T> {
    fn default() -> Self {
        Self::new(std::iter::empty())
    }
}

impl<T: Copy + Ord + Hash + Debug> BroadPhase<T> {
    pub fn new(objects: impl IntoIterator<Item = (T, Bounds)>) -> Self {
        let mut bounds: [Vec<Bound<T>>; NUM_AXES] = Default::default();
        for axis_bounds in bounds.iter_mut() {
            axis_bounds.push(Bound::min_sentinel());
        }

        let mut index = HashMap::new();
        for (object, aabb) in objects {
            if index.insert(object, [[0; 2]; NUM_AXES]).is_some() {
                log::warn!("ignoring duplicate broad phase object {:?}", object);
                continue;
            }
            for (axis, axis_bounds) in bounds.iter_mut().enumerate() {
                let (lo, hi) = aabb.axis(axis);
                axis_bounds.push(Bound {
                    object: Some(object),
                    value: lo,
                    is_min: true,
                });
                axis_bounds.push(Bound {
                    object: Some(object),
                    value: hi.max(lo),
                    is_min: false,
                });
            }
        }

        for axis_bounds in bounds.iter_mut() {
            axis_bounds.push(Bound::max_sentinel());
            axis_bounds.sort_by(compare_bounds);
        }

        let mut broadphase = Self {
            bounds,
            index,
            axis_possibles: Default::default(),
            possibles: PairSet::new(),
        };
        broadphase.reindex();
        broadphase.collision_detect();
        broadphase
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, object: T) -> bool {
        self.index.contains_key(&object)
    }

    /// Pairs whose boxes overlap on all three axes.
    pub fn possible_collisions(&self) -> &PairSet<T> {
        &self.possibles
    }

    pub fn number_of_possible_collisions(&self) -> usize {
        self.possibles.len()
    }

    fn reindex(&mut self) {
        for (axis, axis_bounds) in self.bounds.iter().enumerate() {
            for (position, bound) in axis_bounds.iter().enumerate() {
                if let Some(entry) = bound.object.and_then(|object| self.index.get_mut(&object)) {
                    entry[axis][if bound.is_min { LOWER } else { UPPER }] = position;
                }
            }
        }
    }

    fn collision_detect(&mut self) {
        self.possibles.clear();
        for axis in 0..NUM_AXES {
            self.axis_possibles[axis].clear();
            self.collision_detect_axis(axis);
        }

        let smallest = (0..NUM_AXES)
            .min_by_key(|&axis| self.axis_possibles[axis].len())
            .unwrap_or(0);
        let others = [(smallest + 1) % NUM_AXES, (smallest + 2) % NUM_AXES];
        for pair in self.axis_possibles[smallest].iter() {
            if others
                .iter()
                .all(|&axis| self.axis_possibles[axis].contains(pair.a, pair.b))
            {
                self.possibles.insert(pair.a, pair.b);
            }
        }

        log::debug!(
            "broad phase built with {} objects and {} possible collisions",
            self.index.len(),
            self.possibles.len()
        );
    }

    fn collision_detect_axis(&mut self, axis: usize) {
        let axis_bounds = &self.bounds[axis];
        let axis_possibles = &mut self.axis_possibles[axis];
        for (i, bound) in axis_bounds.iter().enumerate() {
            let object = match bound.object {
                Some(object) if bound.is_min => object,
                _ => continue,
            };

            // everything seen before our own maximum overlaps us
            for other in axis_bounds[i + 1..].iter() {
                match other.object {
                    Some(other) if other == object => break,
                    Some(other) => {
                        axis_possibles.insert(object, other);
                    }
                    None => break,
                }
            }
        }
    }

    /// Insert a new object, sweeping its bounds down from the top of each axis.
    pub fn add_object(&mut self, object: T, aabb: &Bounds) {
        if self.index.contains_key(&object) {
            log::warn!("broad phase object {:?} added twice, ignoring", object);
            return;
        }

        let mut positions = [[0; 2]; NUM_AXES];
        for (axis, axis_bounds) in self.bounds.iter_mut().enumerate() {
            let (lo, hi) = aabb.axis(axis);
            let top = axis_bounds.len() - 1;
            axis_bounds.insert(
                top,
                Bound {
                    object: Some(object),
                    value: hi.max(lo),
                    is_min: false,
                },
            );
            axis_bounds.insert(
                top,
                Bound {
                    object: Some(object),
                    value: lo,
                    is_min: true,
                },
            );
            positions[axis] = [top, top + 1];
        }
        self.index.insert(object, positions);

        let before = self.possibles.len();
        for axis in 0..NUM_AXES {
            self.update_axis(object, axis);
        }

        log::debug!(
            "broad phase added {:?} with {} possible collisions",
            object,
            self.possibles.len().saturating_sub(before)
        );
    }

    /// Remove an object, sweeping its bounds up to the top of each axis and dropping them there.
    pub fn remove_object(&mut self, object: T) {
        if !self.index.contains_key(&object) {
            log::warn!("removing unknown broad phase object {:?}", object);
            return;
        }

        for axis in 0..NUM_AXES {
            let [lo_at, hi_at] = self.index[&object][axis];
            self.bounds[axis][lo_at].value = f32::MAX;
            self.bounds[axis][hi_at].value = f32::MAX;
            self.update_axis(object, axis);

            let axis_bounds = &mut self.bounds[axis];
            let top = axis_bounds.len() - 1;
            debug_assert_eq!(axis_bounds[top - 2].object, Some(object));
            debug_assert_eq!(axis_bounds[top - 1].object, Some(object));
            axis_bounds.drain(top - 2..top);
        }
        self.index.remove(&object);
    }

    /// Move an object's bounds to `aabb`, bubbling each bound to its new sorted position.
    pub fn update_object(&mut self, object: T, aabb: &Bounds) {
        if !self.index.contains_key(&object) {
            log::warn!("updating unknown broad phase object {:?}", object);
            return;
        }

        for axis in 0..NUM_AXES {
            let (lo, hi) = aabb.axis(axis);
            let [lo_at, hi_at] = self.index[&object][axis];
            self.bounds[axis][lo_at].value = lo;
            self.bounds[axis][hi_at].value = hi.max(lo);
            self.update_axis(object, axis);
        }
    }

    fn position_of(&self, object: T, axis: usize, which: usize) -> usize {
        self.index[&object][axis][which]
    }

    fn update_axis(&mut self, object: T, axis: usize) {
        let last = self.bounds[axis].len() - 1;

        // lower bound down, upper bound down, upper bound up, lower bound up
        for (which, downward) in [(LOWER, true), (UPPER, true), (UPPER, false), (LOWER, false)] {
            loop {
                let at = self.position_of(object, axis, which);
                let (lo, hi) = if downward {
                    if at <= 1 {
                        break;
                    }
                    (at - 1, at)
                } else {
                    if at + 1 >= last {
                        break;
                    }
                    (at, at + 1)
                };

                let axis_bounds = &self.bounds[axis];
                if compare_bounds(&axis_bounds[hi], &axis_bounds[lo]) != Ordering::Less {
                    break;
                }
                self.swap_bounds(axis, lo, hi);
            }
        }
    }

    fn swap_bounds(&mut self, axis: usize, lo: usize, hi: usize) {
        self.bounds[axis].swap(lo, hi);
        for at in [lo, hi] {
            let bound = self.bounds[axis][at];
            if let Some(entry) = bound.object.and_then(|object| self.index.get_mut(&object)) {
                entry[axis][if bound.is_min { LOWER } else { UPPER }] = at;
            }
        }

        let moving_lo = self.bounds[axis][lo];
        let moving_hi = self.bounds[axis][hi];
        if let (Some(a), Some(b)) = (moving_lo.object, moving_hi.object) {
            if a != b {
                self.update_possibles(axis, a, moving_lo.is_min, b, moving_hi.is_min);
            }
        }
    }

    fn update_possibles(&mut self, axis: usize, lo: T, lo_is_min: bool, hi: T, hi_is_min: bool) {
        if lo_is_min && !hi_is_min {
            // a minimum moved below another object's maximum, the extents now overlap
            self.axis_possibles[axis].insert(lo, hi);
            let on_all_axes = (0..NUM_AXES)
                .filter(|&other| other != axis)
                .all(|other| self.axis_possibles[other].contains(lo, hi));
            if on_all_axes {
                log::trace!("broad phase pair {:?} {:?} now overlaps", lo, hi);
                self.possibles.insert(lo, hi);
            }
        } else if !lo_is_min && hi_is_min {
            self.axis_possibles[axis].erase(lo, hi);
            if self.possibles.erase(lo, hi).is_some() {
                log::trace!("broad phase pair {:?} {:?} separated", lo, hi);
            }
        }
    }
}
