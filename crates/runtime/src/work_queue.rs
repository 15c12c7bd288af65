//! Deterministic work queue for cooperative per-tick processing.
//!
//! Key properties:
//! - Total ordering on `(priority, id)`.
//! - Equal priorities are processed in insertion order.
//! - Cancellation and `retain` do not perturb the order of remaining items.
//! - Optional backpressure via a deterministic maximum pending length.
//! - Frame budgeting via abstract work units.
//!
//! Vec-backed: queues hold at most a few hundred object parts.

use crate::budget::FrameBudget;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorkId(pub u64);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct WorkQueueFull {
    pub max_len: usize,
}

impl std::fmt::Display for WorkQueueFull {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "work queue full (max {})", self.max_len)
    }
}

impl std::error::Error for WorkQueueFull {}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Key {
    // Smaller values run earlier; field order gives (priority, id) ordering.
    priority: i32,
    id: WorkId,
}

#[derive(Debug)]
struct Item<T> {
    key: Key,
    payload: T,
    cost_units: u32,
}

#[derive(Debug)]
pub struct WorkQueue<T> {
    next_id: u64,
    items: Vec<Item<T>>,
    max_len: Option<usize>,
}

impl<T> Default for WorkQueue<T> {
    fn default() -> Self {
        Self {
            next_id: 0,
            items: Vec::new(),
            max_len: None,
        }
    }
}

impl<T> WorkQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            max_len: Some(max_len),
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn push(&mut self, priority: i32, payload: T) -> WorkId {
        self.push_with_cost(priority, 1, payload)
    }

    pub fn push_with_cost(&mut self, priority: i32, cost_units: u32, payload: T) -> WorkId {
        let id = WorkId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.items.push(Item {
            key: Key { priority, id },
            payload,
            cost_units,
        });
        id
    }

    pub fn try_push(&mut self, priority: i32, payload: T) -> Result<WorkId, WorkQueueFull> {
        self.try_push_with_cost(priority, 1, payload)
    }

    pub fn try_push_with_cost(
        &mut self,
        priority: i32,
        cost_units: u32,
        payload: T,
    ) -> Result<WorkId, WorkQueueFull> {
        if let Some(max_len) = self.max_len
            && self.items.len() >= max_len
        {
            return Err(WorkQueueFull { max_len });
        }

        Ok(self.push_with_cost(priority, cost_units, payload))
    }

    pub fn cancel(&mut self, id: WorkId) -> bool {
        let before = self.items.len();
        self.items.retain(|i| i.key.id != id);
        self.items.len() != before
    }

    /// Drops every queued payload for which `keep` returns `false`.
    ///
    /// Returns the number of dropped items.
    pub fn retain(&mut self, mut keep: impl FnMut(&T) -> bool) -> usize {
        let before = self.items.len();
        self.items.retain(|i| keep(&i.payload));
        before - self.items.len()
    }

    fn next_index(&self) -> Option<usize> {
        self.items
            .iter()
            .enumerate()
            .min_by_key(|(_, item)| item.key)
            .map(|(idx, _)| idx)
    }

    /// Pops the next (highest priority, then oldest) item.
    pub fn pop_next(&mut self) -> Option<(WorkId, T)> {
        let idx = self.next_index()?;
        let item = self.items.swap_remove(idx);
        Some((item.key.id, item.payload))
    }

    /// Pops the next item, but only if the budget can cover its cost.
    ///
    /// If the next item is too expensive this returns `None` without searching
    /// for cheaper items, keeping execution aligned with priority order.
    pub fn pop_next_with_budget(&mut self, budget: &mut FrameBudget) -> Option<(WorkId, T)> {
        let idx = self.next_index()?;
        if !budget.try_consume(self.items[idx].cost_units) {
            return None;
        }
        let item = self.items.swap_remove(idx);
        Some((item.key.id, item.payload))
    }
}
