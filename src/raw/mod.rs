use crate::error::Error;
use crate::node::Chain;
use crate::reclaim::{Atomic, Collector, Guard, RetireShared, Shared};
use std::ops::RangeInclusive;
use std::sync::atomic::Ordering;

/// One generation of the bucket array.
///
/// A directory is never resized in place. Growing builds a new directory with one more
/// index bit, and the old one is retired once the new one is published. Within a
/// directory, each bin points to an immutable [`Chain`] (or is null while the bucket has
/// never been written); a writer holding the bucket's segment lock swaps in a modified copy.
#[derive(Debug)]
pub(crate) struct Directory<K, V> {
    bins: Box<[Atomic<Chain<K, V>>]>,

    /// `log2(bins.len())`: the number of top hash bits that select a bucket.
    i_bits: u32,

    /// Width of the hashes this directory is indexed by.
    hash_bits: u32,

    /// `log2` of the (fixed) number of segments.
    segment_bits: u32,
}

impl<K, V> Directory<K, V> {
    pub(crate) fn new(i_bits: u32, hash_bits: u32, segment_bits: u32) -> Result<Self, Error> {
        debug_assert!(i_bits <= hash_bits);
        let n = 1usize << i_bits;
        let mut bins = Vec::new();
        bins.try_reserve_exact(n)?;
        bins.extend((0..n).map(|_| Atomic::null()));
        Ok(Self {
            bins: bins.into_boxed_slice(),
            i_bits,
            hash_bits,
            segment_bits,
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.bins.len()
    }

    pub(crate) fn i_bits(&self) -> u32 {
        self.i_bits
    }

    /// Selects the bucket for `hash` from its top `i_bits` bits.
    ///
    /// Because this is a shift rather than a modulo, hash order is bucket order, and adding
    /// an index bit splits each bucket `b` into exactly `2b` and `2b + 1`. Hashes wider than
    /// `hash_bits` saturate into the last bucket, which keeps the mapping monotonic.
    #[inline]
    pub(crate) fn bucket_index(&self, hash: u64) -> usize {
        if self.i_bits == 0 {
            return 0;
        }
        let hash = if self.hash_bits < u64::BITS {
            hash.min((1u64 << self.hash_bits) - 1)
        } else {
            hash
        };
        (hash >> (self.hash_bits - self.i_bits)) as usize
    }

    /// The segment whose band contains `bucket`.
    ///
    /// With fewer buckets than segments, every bucket gets a segment of its own and the
    /// remaining segments go unused.
    #[inline]
    pub(crate) fn segment_of(&self, bucket: usize) -> usize {
        if self.i_bits >= self.segment_bits {
            bucket >> (self.i_bits - self.segment_bits)
        } else {
            bucket << (self.segment_bits - self.i_bits)
        }
    }

    /// The segments covering buckets `first..=last`, in ascending order.
    pub(crate) fn segment_span(&self, first: usize, last: usize) -> RangeInclusive<usize> {
        self.segment_of(first)..=self.segment_of(last)
    }

    /// The chain of bucket `i`, if it was ever written.
    #[inline]
    pub(crate) fn chain<'g>(
        &'g self,
        i: usize,
        guard: &'g Guard<'_>,
    ) -> Option<&'g Chain<K, V>> {
        let chain = self.bins[i].load(Ordering::Acquire, guard);
        // safety: a chain is retired only after it has been unlinked from its bin, and it is
        // not reclaimed while `guard`, which we loaded it under, is alive. the same holds for
        // the directory itself, which is where `'g` comes from.
        unsafe { chain.as_ref() }.map(|linked| &**linked)
    }

    /// Publishes `chain` as the new contents of bucket `i` and retires the previous one.
    ///
    /// The caller must hold the exclusive lock of the bucket's segment.
    pub(crate) fn replace(
        &self,
        i: usize,
        chain: Chain<K, V>,
        collector: &Collector,
        guard: &Guard<'_>,
    ) {
        let old = self.bins[i].swap(Shared::boxed(chain, collector), Ordering::AcqRel, guard);
        if !old.is_null() {
            // safety: `old` is no longer reachable from the directory, and no other writer can
            // have observed it since we hold the segment lock. readers that loaded it hold
            // guards that keep it alive.
            unsafe { guard.retire_shared(old) };
        }
    }
}

impl<K, V> Directory<K, V>
where
    K: Ord + Clone,
    V: Clone,
{
    /// Builds the directory with twice as many buckets, holding a copy of every live entry.
    ///
    /// Tombstones are dropped, and chain length limits are not enforced. The caller must
    /// have drained all writers.
    pub(crate) fn grow(&self, collector: &Collector, guard: &Guard<'_>) -> Result<Self, Error> {
        let next = Self::new(self.i_bits + 1, self.hash_bits, self.segment_bits)?;

        let mut staged: Vec<Chain<K, V>> = Vec::new();
        staged.try_reserve_exact(next.len())?;
        staged.resize_with(next.len(), Chain::default);

        // buckets and chains are both walked in key order, so entries arrive sorted
        for i in 0..self.len() {
            if let Some(chain) = self.chain(i, guard) {
                for entry in chain.live() {
                    staged[next.bucket_index(entry.hash)].push_sorted(entry.clone());
                }
            }
        }

        for (bin, chain) in next.bins.iter().zip(staged) {
            if !chain.is_empty() {
                // published to readers by the directory pointer swap
                bin.store(Shared::boxed(chain, collector), Ordering::Relaxed);
            }
        }
        Ok(next)
    }
}

impl<K, V> Drop for Directory<K, V> {
    fn drop(&mut self) {
        for bin in self.bins.iter_mut() {
            // safety: we have &mut self, and a directory is only dropped once no guard can
            // still reach it, so neither can anyone reach its chains. retired chains were
            // unlinked first and are not visited here.
            unsafe { bin.drop_in_place() };
        }
    }
}
