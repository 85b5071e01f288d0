use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::BuffError;

/// Kinds of buff a comment or chest can hand out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuffKind {
    #[default]
    None,
    Chromatic,
    Hasty,
}

impl BuffKind {
    pub fn description(&self) -> &'static str {
        match self {
            Self::None => "",
            Self::Chromatic => "Your next comment will change its color continuously.",
            Self::Hasty => "You move faster for a while.",
        }
    }
}

/// Serializable description of a buff, before it is turned into a running buff.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuffData {
    pub kind: BuffKind,
}

impl BuffData {
    pub const NONE: BuffData = BuffData {
        kind: BuffKind::None,
    };

    pub fn new(kind: BuffKind) -> Self {
        Self { kind }
    }

    pub fn is_none(&self) -> bool {
        self.kind == BuffKind::None
    }
}

/// Bounded FIFO of granted buffs. Adding past capacity evicts the oldest entry.
#[derive(Debug, Clone)]
pub struct BuffDataContainer {
    queue: VecDeque<BuffData>,
    max_size: usize,
}

impl BuffDataContainer {
    pub fn new(max_size: usize) -> Result<Self, BuffError> {
        if max_size == 0 {
            return Err(BuffError::InvalidCapacity(max_size));
        }
        Ok(Self {
            queue: VecDeque::with_capacity(max_size),
            max_size,
        })
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn has_buff(&self) -> bool {
        !self.queue.is_empty()
    }

    /// Append at the back, evicting from the front while over capacity.
    pub fn add(&mut self, data: BuffData) {
        self.queue.push_back(data);
        while self.queue.len() > self.max_size {
            if let Some(evicted) = self.queue.pop_front() {
                tracing::trace!(kind = ?evicted.kind, "buff evicted");
            }
        }
    }

    pub fn pop(&mut self) -> Result<BuffData, BuffError> {
        self.queue.pop_front().ok_or(BuffError::EmptyContainer)
    }

    /// Oldest entry without removing it, or `default` when empty.
    pub fn peek(&self, default: Option<BuffData>) -> Result<BuffData, BuffError> {
        self.queue
            .front()
            .copied()
            .or(default)
            .ok_or(BuffError::EmptyContainer)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BuffData> {
        self.queue.iter()
    }
}
