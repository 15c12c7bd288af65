use runtime::budget::FrameBudget;
use runtime::work_queue::{WorkId, WorkQueue, WorkQueueFull};

use crate::fetch::{FetchRequest, FetchToken};

/// A fetched, still-encoded part waiting for its decode slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeJob {
    pub token: FetchToken,
    pub payload: String,
}

/// Pending decodes, drained a few per tick under a `FrameBudget`.
///
/// Thin wrapper over `runtime::WorkQueue`: layer 0 first, then arrival order.
#[derive(Debug)]
pub struct DecodeQueue {
    inner: WorkQueue<DecodeJob>,
}

impl DecodeQueue {
    pub fn new(max_pending: usize) -> Self {
        Self {
            inner: WorkQueue::with_max_len(max_pending),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Each decode costs one budget unit.
    pub fn try_submit(
        &mut self,
        request: &FetchRequest,
        payload: String,
    ) -> Result<WorkId, WorkQueueFull> {
        self.inner.try_push_with_cost(
            request.priority(),
            1,
            DecodeJob {
                token: request.token.clone(),
                payload,
            },
        )
    }

    pub fn pop_next_with_budget(&mut self, budget: &mut FrameBudget) -> Option<DecodeJob> {
        let (_id, job) = self.inner.pop_next_with_budget(budget)?;
        Some(job)
    }

    /// Drops queued jobs whose token is no longer current; returns how many.
    pub fn discard_stale(&mut self, mut is_current: impl FnMut(&FetchToken) -> bool) -> usize {
        self.inner.retain(|job| is_current(&job.token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formats::ObjectKey;

    fn request(id: &str, layer: usize, generation: u64) -> FetchRequest {
        FetchRequest {
            token: FetchToken {
                key: ObjectKey::new(id, "m"),
                part: 0,
                generation,
            },
            layer,
        }
    }

    #[test]
    fn enforces_backpressure() {
        let mut q = DecodeQueue::new(1);
        assert!(q.try_submit(&request("a", 0, 1), String::new()).is_ok());
        assert!(q.try_submit(&request("b", 0, 2), String::new()).is_err());
    }

    #[test]
    fn budget_limits_decodes_per_tick() {
        let mut q = DecodeQueue::new(10);
        for g in 0..3 {
            q.try_submit(&request("a", 0, g), String::new()).unwrap();
        }
        let mut budget = FrameBudget::new(2);
        assert!(q.pop_next_with_budget(&mut budget).is_some());
        assert!(q.pop_next_with_budget(&mut budget).is_some());
        assert!(q.pop_next_with_budget(&mut budget).is_none());
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn world_layer_decodes_first() {
        let mut q = DecodeQueue::new(10);
        q.try_submit(&request("inset", 1, 1), String::new()).unwrap();
        q.try_submit(&request("world", 0, 2), String::new()).unwrap();
        let mut budget = FrameBudget::unlimited();
        let first = q.pop_next_with_budget(&mut budget).expect("job");
        assert_eq!(first.token.key.id, "world");
    }

    #[test]
    fn discard_stale_drops_only_outdated_jobs() {
        let mut q = DecodeQueue::new(10);
        q.try_submit(&request("a", 0, 1), String::new()).unwrap();
        q.try_submit(&request("b", 0, 2), String::new()).unwrap();
        assert_eq!(q.discard_stale(|t| t.generation == 2), 1);
        assert_eq!(q.len(), 1);
    }
}
