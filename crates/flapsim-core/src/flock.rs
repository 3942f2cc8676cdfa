//! Dense member storage with generational handles.

use serde::{Deserialize, Serialize};
use slotmap::{SlotMap, new_key_type};
use crate::agent::Bird;

new_key_type! {
    /// Stable handle for birds backed by a generational slot map.
    pub struct AgentId;
}

/// Index of a controller in the slice handed to the evaluator.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
pub struct ControllerId(pub usize);

/// A live bird together with the controller driving it and the fitness it has earned.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Member {
    pub bird: Bird,
    pub controller: ControllerId,
    pub fitness: f64,
    pub ticks_alive: u64,
}

impl Member {
    #[must_use]
    pub const fn new(bird: Bird, controller: ControllerId) -> Self {
        Self {
            bird,
            controller,
            fitness: 0.0,
            ticks_alive: 0,
        }
    }
}

/// Arena of members iterated in spawn order.
#[derive(Debug)]
pub struct Flock {
    slots: SlotMap<AgentId, usize>,
    handles: Vec<AgentId>,
    members: Vec<Member>,
}

impl Default for Flock {
    fn default() -> Self {
        Self::new()
    }
}

impl Flock {
    /// Create an empty flock.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: SlotMap::with_key(),
            handles: Vec::new(),
            members: Vec::new(),
        }
    }

    /// Create a flock with reserved capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: SlotMap::with_capacity_and_key(capacity),
            handles: Vec::with_capacity(capacity),
            members: Vec::with_capacity(capacity),
        }
    }

    /// Number of live members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Insert a member and return its handle.
    pub fn insert(&mut self, member: Member) -> AgentId {
        let index = self.members.len();
        self.members.push(member);
        let id = self.slots.insert(index);
        self.handles.push(id);
        id
    }

    #[must_use]
    pub fn contains(&self, id: AgentId) -> bool {
        self.slots.contains_key(id)
    }

    /// Returns the dense index for `id`, if present.
    #[must_use]
    pub fn index_of(&self, id: AgentId) -> Option<usize> {
        self.slots.get(id).copied()
    }

    #[must_use]
    pub fn get(&self, id: AgentId) -> Option<&Member> {
        self.index_of(id).map(|index| &self.members[index])
    }

    pub fn get_mut(&mut self, id: AgentId) -> Option<&mut Member> {
        let index = self.index_of(id)?;
        self.members.get_mut(index)
    }

    /// Members in dense order.
    #[must_use]
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn members_mut(&mut self) -> &mut [Member] {
        &mut self.members
    }

    /// Handles in dense order, aligned with [`Flock::members`].
    pub fn iter_handles(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.handles.iter().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (AgentId, &Member)> + '_ {
        self.handles.iter().copied().zip(self.members.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (AgentId, &mut Member)> + '_ {
        self.handles.iter().copied().zip(self.members.iter_mut())
    }

    /// Remove every member for which `is_dead` holds, preserving the order of the survivors.
    /// Returns the removed members in their former order.
    pub fn remove_many(&mut self, is_dead: impl Fn(AgentId) -> bool) -> Vec<(AgentId, Member)> {
        let mut removed = Vec::new();
        let mut write = 0;
        for read in 0..self.handles.len() {
            let id = self.handles[read];
            if is_dead(id) {
                self.slots.remove(id);
                removed.push((id, self.members[read]));
                continue;
            }
            if write != read {
                self.handles[write] = id;
                self.members[write] = self.members[read];
            }
            if let Some(slot) = self.slots.get_mut(id) {
                *slot = write;
            }
            write += 1;
        }
        self.handles.truncate(write);
        self.members.truncate(write);
        debug_assert_eq!(self.handles.len(), self.slots.len());
        removed
    }

    /// Remove every member.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.handles.clear();
        self.members.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn member(index: usize) -> Member {
        Member::new(Bird::new(184, index as f64 * 10.0), ControllerId(index))
    }

    #[test]
    fn insert_allocates_unique_handles() {
        let mut flock = Flock::new();
        let a = flock.insert(member(0));
        let b = flock.insert(member(1));
        assert_ne!(a, b);
        assert_eq!(flock.len(), 2);
        assert!(flock.contains(a));
        assert_eq!(flock.get(b).map(|m| m.controller), Some(ControllerId(1)));
    }

    #[test]
    fn remove_many_keeps_order_and_alignment() {
        let mut flock = Flock::with_capacity(5);
        let ids: Vec<_> = (0..5).map(|i| flock.insert(member(i))).collect();
        let dead: HashSet<_> = [ids[1], ids[3], ids[4]].into_iter().collect();

        let removed = flock.remove_many(|id| dead.contains(&id));
        let removed_controllers: Vec<_> = removed.iter().map(|(_, m)| m.controller.0).collect();
        assert_eq!(removed_controllers, vec![1, 3, 4]);

        let survivors: Vec<_> = flock.iter_handles().collect();
        assert_eq!(survivors, vec![ids[0], ids[2]]);
        for (id, member) in flock.iter() {
            let index = flock.index_of(id).expect("index");
            assert_eq!(flock.members()[index].controller, member.controller);
        }
        assert_eq!(flock.get(ids[2]).expect("member").bird.y(), 20.0);
        assert!(flock.get(ids[3]).is_none());

        assert!(flock.remove_many(|_| false).is_empty());
        assert!(flock.remove_many(|id| id == ids[1]).is_empty());
        assert_eq!(flock.len(), 2);
    }

    #[test]
    fn handles_are_not_reused_after_removal() {
        let mut flock = Flock::new();
        let a = flock.insert(member(0));
        flock.remove_many(|id| id == a);
        let b = flock.insert(member(1));
        assert_ne!(a, b);
        assert!(!flock.contains(a));
        flock.clear();
        assert!(flock.is_empty());
    }
}
