use crate::{body::BodyHandle, intersect::CollisionOutcome};
use glam::Vec3;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Contact {
    pub handle_a: BodyHandle,
    pub handle_b: BodyHandle,
    /// Points from b to a.
    pub normal: Vec3,
    /// Centre of the contact manifold in world space.
    pub point: Vec3,
    pub time_of_impact: f32,
    pub kind: CollisionOutcome,
}

#[derive(Debug, Default)]
pub struct ContactArena {
    contacts: Vec<Contact>,
}

impl ContactArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.contacts.clear();
    }

    pub fn push(&mut self, contact: Contact) {
        self.contacts.push(contact);
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    /// Order by time of impact, ties broken by the body handles.
    pub fn sort(&mut self) {
        self.contacts.sort_unstable_by(|a, b| {
            a.time_of_impact
                .total_cmp(&b.time_of_impact)
                .then_with(|| (a.handle_a, a.handle_b).cmp(&(b.handle_a, b.handle_b)))
        });
    }

    pub fn iter(&self) -> core::slice::Iter<Contact> {
        self.contacts.iter()
    }

    pub fn as_slice(&self) -> &[Contact] {
        &self.contacts
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn contact(a: u32, b: u32, time_of_impact: f32) -> Contact {
        Contact {
            handle_a: BodyHandle(a),
            handle_b: BodyHandle(b),
            normal: Vec3::Y,
            point: Vec3::ZERO,
            time_of_impact,
            kind: CollisionOutcome::Collision,
        }
    }

    #[test]
    fn test_sort_by_time_of_impact() {
        let mut contacts = ContactArena::new();
        contacts.push(contact(3, 4, 0.5));
        contacts.push(contact(1, 2, 0.25));
        contacts.push(contact(0, 2, 0.5));
        contacts.sort();
        let order: Vec<_> = contacts.iter().map(|c| (c.handle_a.0, c.time_of_impact)).collect();
        assert_eq!(order, vec![(1, 0.25), (0, 0.5), (3, 0.5)]);

        contacts.clear();
        assert!(contacts.is_empty());
    }
}
