use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
};

const NIL: u32 = u32::MAX;
const INITIAL_BUCKETS: usize = 16;
// average chain length allowed before the bucket table doubles
const LOAD_FACTOR: usize = 2;

/// An unordered pair of object ids, always stored with `a <= b`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Pair<T> {
    pub a: T,
    pub b: T,
}

impl<T: Copy + Ord> Pair<T> {
    pub fn new(a: T, b: T) -> Self {
        if b < a {
            Self { a: b, b: a }
        } else {
            Self { a, b }
        }
    }

    pub fn contains(&self, id: T) -> bool {
        self.a == id || self.b == id
    }

    /// The other member of the pair, if `id` is one of them.
    pub fn other(&self, id: T) -> Option<T> {
        if self.a == id {
            Some(self.b)
        } else if self.b == id {
            Some(self.a)
        } else {
            None
        }
    }
}

/// Index of a stored pair. Handles stay valid until the pair is erased or until another erase
/// reports it as moved.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PairHandle(pub u32);

/// Result of an erase. When the erased slot was not the last one, the last pair was swapped into
/// its place and any handle to it must be remapped from `moved.0` to `moved.1`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Erased {
    pub moved: Option<(PairHandle, PairHandle)>,
}

#[derive(Copy, Clone, Debug)]
struct Slot<T> {
    pair: Pair<T>,
    next: u32,
}

/// Set of unordered pairs with O(1) average insert, find and erase.
///
/// Pairs live densely in a slot array and are chained per bucket through the `next` links of the
/// slots, so iteration is a linear walk and erase is a swap remove.
#[derive(Clone, Debug)]
pub struct PairSet<T> {
    buckets: Vec<u32>,
    slots: Vec<Slot<T>>,
}

impl<T: Copy + Ord + Hash> Default for PairSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy + Ord + Hash> PairSet<T> {
    pub fn new() -> Self {
        Self::with_buckets(INITIAL_BUCKETS)
    }

    fn with_buckets(num_buckets: usize) -> Self {
        debug_assert!(num_buckets.is_power_of_two());
        Self {
            buckets: vec![NIL; num_buckets],
            slots: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.buckets.iter_mut().for_each(|head| *head = NIL);
    }

    fn bucket_of(&self, pair: &Pair<T>) -> usize {
        let mut hasher = DefaultHasher::new();
        pair.hash(&mut hasher);
        (hasher.finish() as usize) & (self.buckets.len() - 1)
    }

    fn find_slot(&self, pair: &Pair<T>) -> Option<u32> {
        let mut idx = self.buckets[self.bucket_of(pair)];
        while idx != NIL {
            let slot = &self.slots[idx as usize];
            if slot.pair == *pair {
                return Some(idx);
            }
            idx = slot.next;
        }
        None
    }

    /// Insert the pair, returning its handle and whether it was newly added.
    pub fn insert(&mut self, a: T, b: T) -> (PairHandle, bool) {
        let pair = Pair::new(a, b);
        if let Some(idx) = self.find_slot(&pair) {
            return (PairHandle(idx), false);
        }

        if self.slots.len() >= self.buckets.len() * LOAD_FACTOR {
            self.rehash(self.buckets.len() * 2);
        }

        let bucket = self.bucket_of(&pair);
        let idx = self.slots.len() as u32;
        self.slots.push(Slot {
            pair,
            next: self.buckets[bucket],
        });
        self.buckets[bucket] = idx;
        (PairHandle(idx), true)
    }

    pub fn find(&self, a: T, b: T) -> Option<PairHandle> {
        self.find_slot(&Pair::new(a, b)).map(PairHandle)
    }

    pub fn contains(&self, a: T, b: T) -> bool {
        self.find(a, b).is_some()
    }

    pub fn get(&self, handle: PairHandle) -> Option<Pair<T>> {
        self.slots.get(handle.0 as usize).map(|slot| slot.pair)
    }

    pub fn erase(&mut self, a: T, b: T) -> Option<Erased> {
        let idx = self.find_slot(&Pair::new(a, b))?;
        Some(self.erase_slot(idx))
    }

    pub fn erase_handle(&mut self, handle: PairHandle) -> Option<Erased> {
        if (handle.0 as usize) < self.slots.len() {
            Some(self.erase_slot(handle.0))
        } else {
            None
        }
    }

    fn unlink(&mut self, idx: u32) {
        let bucket = self.bucket_of(&self.slots[idx as usize].pair);
        let next = self.slots[idx as usize].next;
        if self.buckets[bucket] == idx {
            self.buckets[bucket] = next;
            return;
        }

        let mut prev = self.buckets[bucket];
        while prev != NIL {
            let prev_next = self.slots[prev as usize].next;
            if prev_next == idx {
                self.slots[prev as usize].next = next;
                return;
            }
            prev = prev_next;
        }
        debug_assert!(false, "pair slot {} missing from its chain", idx);
    }

    // point whatever references slot `from` at slot `to` instead
    fn relink(&mut self, from: u32, to: u32) {
        let bucket = self.bucket_of(&self.slots[from as usize].pair);
        if self.buckets[bucket] == from {
            self.buckets[bucket] = to;
            return;
        }

        let mut prev = self.buckets[bucket];
        while prev != NIL {
            let prev_next = self.slots[prev as usize].next;
            if prev_next == from {
                self.slots[prev as usize].next = to;
                return;
            }
            prev = prev_next;
        }
        debug_assert!(false, "pair slot {} missing from its chain", from);
    }

    fn erase_slot(&mut self, idx: u32) -> Erased {
        self.unlink(idx);

        let last = self.slots.len() as u32 - 1;
        if idx == last {
            self.slots.pop();
            return Erased { moved: None };
        }

        self.relink(last, idx);
        self.slots.swap_remove(idx as usize);
        Erased {
            moved: Some((PairHandle(last), PairHandle(idx))),
        }
    }

    fn rehash(&mut self, num_buckets: usize) {
        log::trace!(
            "rehashing pair set of {} pairs into {} buckets",
            self.slots.len(),
            num_buckets
        );
        self.buckets.clear();
        self.buckets.resize(num_buckets, NIL);
        for idx in 0..self.slots.len() {
            let bucket = self.bucket_of(&self.slots[idx].pair);
            self.slots[idx].next = self.buckets[bucket];
            self.buckets[bucket] = idx as u32;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Pair<T>> + '_ {
        self.slots.iter().map(|slot| slot.pair)
    }
}
