use std::collections::VecDeque;
use std::ops::Index;

use orbis_ecs::EntityHandle;

/// Events a storage keeps before the oldest are dropped.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// One mutating storage call that changed membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChanged {
    pub added: Vec<EntityHandle>,
    pub removed: Vec<EntityHandle>,
}

impl StateChanged {
    pub fn added(added: Vec<EntityHandle>) -> Self {
        Self {
            added,
            removed: Vec::new(),
        }
    }

    pub fn removed(removed: Vec<EntityHandle>) -> Self {
        Self {
            added: Vec::new(),
            removed,
        }
    }
}

/// Bounded log of [`StateChanged`] events, oldest first.
///
/// Recording past capacity drops the oldest event, so a storage nobody drains
/// holds at most `capacity` events.
#[derive(Debug, Clone)]
pub struct EventLog {
    events: VecDeque<StateChanged>,
    capacity: usize,
    dropped: u64,
}

impl EventLog {
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::new(),
            capacity,
            dropped: 0,
        }
    }

    pub fn record(&mut self, event: StateChanged) {
        self.events.push_back(event);
        while self.events.len() > self.capacity {
            self.events.pop_front();
            self.dropped += 1;
        }
        if self.dropped > 0 && self.dropped % self.capacity as u64 == 0 {
            tracing::trace!(dropped = self.dropped, "undrained storage events dropped");
        }
    }

    /// Take every retained event, oldest first.
    pub fn drain(&mut self) -> Vec<StateChanged> {
        self.events.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Events dropped for lack of room since the log was created.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn latest(&self) -> Option<&StateChanged> {
        self.events.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StateChanged> {
        self.events.iter()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl Index<usize> for EventLog {
    type Output = StateChanged;

    fn index(&self, index: usize) -> &StateChanged {
        &self.events[index]
    }
}
