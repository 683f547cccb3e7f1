use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::atomic::{AtomicUsize, Ordering};

/// A lock domain over a contiguous band of buckets.
///
/// The number of segments is fixed when the map is built; a resize only changes how many
/// buckets fall into each band. The lock itself guards no data: holding it exclusively is
/// what entitles a thread to replace the chains of the segment's buckets.
#[derive(Debug, Default)]
pub(crate) struct Segment {
    lock: RwLock<()>,

    /// Bumped after every chain replacement. Lock-free readers compare it before and after a
    /// lookup to notice that they raced with a writer.
    timestamp: AtomicUsize,
}

impl Segment {
    pub(crate) fn exclusive(&self) -> RwLockWriteGuard<'_, ()> {
        self.lock.write()
    }

    pub(crate) fn shared(&self) -> RwLockReadGuard<'_, ()> {
        self.lock.read()
    }

    #[inline]
    pub(crate) fn timestamp(&self) -> usize {
        self.timestamp.load(Ordering::Acquire)
    }

    /// Must be called while holding [`exclusive`](Self::exclusive).
    #[inline]
    pub(crate) fn touch(&self) {
        self.timestamp.fetch_add(1, Ordering::Release);
    }
}

/// Allocates `n` segments, `n` rounded up to a power of two.
pub(crate) fn segments(n: usize) -> Box<[Segment]> {
    (0..n.next_power_of_two())
        .map(|_| Segment::default())
        .collect()
}

/// Shared locks on a run of consecutive segments, taken in ascending order and released
/// together.
pub(crate) struct SpanGuard<'a> {
    _held: Vec<RwLockReadGuard<'a, ()>>,
}

impl<'a> SpanGuard<'a> {
    pub(crate) fn lock(span: &'a [Segment]) -> Self {
        Self {
            _held: span.iter().map(Segment::shared).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_to_power_of_two() {
        assert_eq!(segments(1).len(), 1);
        assert_eq!(segments(3).len(), 4);
        assert_eq!(segments(16).len(), 16);
    }

    #[test]
    fn span_blocks_writers() {
        let segs = segments(4);
        let span = SpanGuard::lock(&segs[1..3]);
        assert!(segs[0].lock.try_write().is_some());
        assert!(segs[1].lock.try_write().is_none());
        assert!(segs[2].lock.try_write().is_none());
        assert!(segs[1].lock.try_read().is_some());
        drop(span);
        assert!(segs[2].lock.try_write().is_some());
    }

    #[test]
    fn touch_advances() {
        let seg = Segment::default();
        let before = seg.timestamp();
        {
            let _w = seg.exclusive();
            seg.touch();
        }
        assert_ne!(seg.timestamp(), before);
    }
}
