use std::collections::HashSet;

/// Normalises a requested ceiling: non-finite values become 1, everything else
/// is floored and clamped to at least 1.
fn normalize_ceiling(n: f64) -> usize {
    if !n.is_finite() {
        return 1;
    }
    let floored = n.floor();
    if floored < 1.0 {
        1
    } else if floored >= usize::MAX as f64 {
        usize::MAX
    } else {
        floored as usize
    }
}

/// Tracks active task ids against a concurrency ceiling.
#[derive(Debug, Clone)]
pub struct CapacityScheduler {
    max_parallel: usize,
    active: HashSet<String>,
}

impl CapacityScheduler {
    pub fn new(max_parallel: usize) -> Self {
        Self {
            max_parallel: max_parallel.max(1),
            active: HashSet::new(),
        }
    }

    /// Reserves a slot. Returns false, with no effect, when the id is already
    /// active or the ceiling has been reached.
    pub fn start_task(&mut self, id: &str) -> bool {
        if self.active.contains(id) || self.active.len() >= self.max_parallel {
            return false;
        }
        self.active.insert(id.to_string());
        true
    }

    pub fn finish_task(&mut self, id: &str) {
        self.active.remove(id);
    }

    pub fn available_slots(&self) -> usize {
        self.max_parallel.saturating_sub(self.active.len())
    }

    /// Applies immediately; tasks already over a lowered ceiling keep running.
    pub fn set_max_parallel_tasks(&mut self, n: f64) {
        self.max_parallel = normalize_ceiling(n);
    }

    pub fn max_parallel_tasks(&self) -> usize {
        self.max_parallel
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.active.contains(id)
    }
}
