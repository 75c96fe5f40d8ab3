//! Entity base capability: identity plus a queue of pending domain events.

use std::collections::VecDeque;

use common::EntityId;

use crate::identity::events::Event;

/// Ordered queue of domain events an entity has produced but nobody has
/// harvested yet.
///
/// Mutators append with [`EventQueue::push`]; the infrastructure layer takes
/// them out with [`EventQueue::drain`]. Cloning yields an empty queue: pending
/// events belong to the one tracked instance that produced them.
#[derive(Debug, Default)]
pub struct EventQueue {
    pending: VecDeque<Event>,
}

impl EventQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event to the tail of the queue.
    pub fn push(&mut self, event: Event) {
        self.pending.push_back(event);
    }

    /// Removes and returns every pending event in FIFO order.
    pub fn drain(&mut self) -> Vec<Event> {
        self.pending.drain(..).collect()
    }

    /// Returns the pending events without removing them.
    pub fn pending(&self) -> impl Iterator<Item = &Event> {
        self.pending.iter()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Clone for EventQueue {
    fn clone(&self) -> Self {
        Self::default()
    }
}

/// Trait for persisted domain objects that can change state.
///
/// Domain code only ever enqueues; [`Entity::drain_events`] is reserved for the
/// unit of work collecting events after a commit.
pub trait Entity: Send + Sync {
    /// Human-readable entity kind, used in logs and errors.
    fn kind() -> &'static str
    where
        Self: Sized;

    /// Returns the entity's unique identifier.
    fn id(&self) -> EntityId;

    fn events(&self) -> &EventQueue;

    fn events_mut(&mut self) -> &mut EventQueue;

    /// Appends an event to this entity's pending queue.
    fn enqueue_event(&mut self, event: Event) {
        self.events_mut().push(event);
    }

    /// Pops every pending event. A second call returns nothing until the
    /// entity produces new events.
    fn drain_events(&mut self) -> Vec<Event> {
        self.events_mut().drain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::events::{PermissionCreated, PermissionDeleted};

    fn created(name: &str) -> Event {
        Event::PermissionCreated(PermissionCreated {
            permission: name.to_string(),
        })
    }

    #[test]
    fn drain_returns_events_in_fifo_order() {
        let mut queue = EventQueue::new();
        queue.push(created("read"));
        queue.push(Event::PermissionDeleted(PermissionDeleted {
            permission: "read".to_string(),
        }));

        let drained = queue.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0], created("read"));
        assert!(matches!(drained[1], Event::PermissionDeleted(_)));
    }

    #[test]
    fn second_drain_is_empty() {
        let mut queue = EventQueue::new();
        queue.push(created("read"));

        assert_eq!(queue.drain().len(), 1);
        assert!(queue.drain().is_empty());
        assert!(queue.is_empty());
    }

    #[test]
    fn clone_does_not_copy_pending_events() {
        let mut queue = EventQueue::new();
        queue.push(created("read"));

        let copy = queue.clone();
        assert!(copy.is_empty());
        assert_eq!(queue.len(), 1);
    }
}
