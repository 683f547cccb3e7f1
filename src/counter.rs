use std::sync::atomic::{AtomicIsize, Ordering};

/// Striped count of live entries.
///
/// Writers of different segments usually land on different cells, so maintaining the count
/// does not reintroduce the contention that segment locking removes. Individual cells can go
/// negative (an entry inserted through one segment's cell may be removed after a resize moved
/// it to another segment); only the sum is meaningful.
#[derive(Debug)]
pub(crate) struct ConcurrentCounter {
    cells: Box<[AtomicIsize]>,
}

impl ConcurrentCounter {
    pub(crate) fn new() -> Self {
        Self {
            cells: (0..crate::map::num_cpus().next_power_of_two())
                .map(|_| AtomicIsize::new(0))
                .collect(),
        }
    }

    pub(crate) fn add(&self, stripe: usize, value: isize) {
        let c = &self.cells[stripe & (self.cells.len() - 1)];
        c.fetch_add(value, Ordering::Relaxed);
    }

    pub(crate) fn sum(&self) -> usize {
        let sum: isize = self.cells.iter().map(|c| c.load(Ordering::Relaxed)).sum();
        // a reader can observe a removal before the matching insert on another cell
        sum.max(0) as usize
    }
}
