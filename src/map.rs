use crate::builder::Builder;
use crate::counter::ConcurrentCounter;
use crate::error::Error;
use crate::hasher::{Identity, OrderedHasher, OrderedKey};
use crate::node::{Entry, Upsert};
use crate::raw::Directory;
use crate::reclaim::{Atomic, Collector, Guard, RetireShared, Shared};
use crate::resize::ResizeGate;
use crate::segment::{self, Segment, SpanGuard};
use log::{debug, trace, warn};
use std::fmt::{self, Debug, Formatter};
use std::marker::PhantomData;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Once,
};

/// The largest possible number of buckets.
pub const MAXIMUM_CAPACITY: usize = 1 << 30;

/// The default initial number of buckets. Must be a power of 2 and at most
/// `MAXIMUM_CAPACITY`.
pub(crate) const DEFAULT_BUCKETS: usize = 16;

static NCPU_INITIALIZER: Once = Once::new();
static NCPU: AtomicUsize = AtomicUsize::new(0);

pub(crate) fn num_cpus() -> usize {
    NCPU_INITIALIZER.call_once(|| NCPU.store(num_cpus::get_physical(), Ordering::Relaxed));
    NCPU.load(Ordering::Relaxed)
}

/// How a successful [`OrdHashMap::insert`] changed the map.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Inserted {
    /// The key was absent and now occupies a new slot.
    New,
    /// The key had been removed; its old slot was reused.
    Revived,
    /// The key was already present. Its value was replaced.
    Updated,
}

impl Inserted {
    /// Whether the insert added a key to the map, i.e. whether the number of live entries
    /// went up by one.
    pub fn grew(self) -> bool {
        !matches!(self, Inserted::Updated)
    }
}

/// A concurrent hash map whose buckets are laid out in key order.
///
/// Buckets are indexed by the top bits of an order-preserving hash (see
/// [`hasher`](crate::hasher)), so the keys in bucket `i` all sort before the keys in bucket
/// `i + 1`. That makes [`range_query`](Self::range_query) a scan over a contiguous run of
/// buckets rather than over the whole map.
///
/// Writers lock one segment, a fixed band of buckets, and publish a modified copy of the
/// bucket's chain. Lookups take no lock at all: they validate against the segment's
/// timestamp and retry if a writer got in the way. When an insert finds its bucket full, the
/// whole directory is doubled by a single thread while every other operation waits at the
/// resize gate.
///
/// Every operation takes a [`Guard`] from [`OrdHashMap::guard`],
/// and references handed out live as long as that guard. [`OrdHashMap::pin`] bundles a guard
/// with the map for convenience.
pub struct OrdHashMap<K, V, H = Identity> {
    /// The current directory. Never null; replaced wholesale on resize.
    directory: Atomic<Directory<K, V>>,

    segments: Box<[Segment]>,

    gate: ResizeGate,

    /// The number of live entries, striped by segment.
    count: ConcurrentCounter,

    chain_length_max: usize,

    max_resize_attempts: usize,

    hash_bits: u32,

    /// Collector that all `Guard` references used for operations on this map must be tied to.
    /// Retired directories and chains are reclaimed through it.
    collector: Collector,

    hasher: H,

    _kv: PhantomData<(K, V)>,
}

impl<K, V> OrdHashMap<K, V, Identity>
where
    K: OrderedKey,
{
    /// Creates an empty map with the default configuration.
    pub fn new() -> Self {
        Self::with_hasher(Identity::new())
    }
}

impl<K, V> OrdHashMap<K, V, Identity> {
    /// Returns a [`Builder`] to configure a new map.
    ///
    /// The builder starts out with the [`Identity`] hasher; keys that do not implement
    /// [`OrderedKey`] need another one set through [`Builder::hasher`].
    pub fn builder() -> Builder<K, V, Identity> {
        Builder::new()
    }
}

impl<K, V> Default for OrdHashMap<K, V, Identity>
where
    K: OrderedKey,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, H> OrdHashMap<K, V, H>
where
    H: OrderedHasher<K>,
{
    /// Creates an empty map which will use `hasher` to place keys.
    ///
    /// # Panics
    ///
    /// If `hasher` reports a width outside `1..=64` bits.
    pub fn with_hasher(hasher: H) -> Self {
        match Builder::new().hasher(hasher).build() {
            Ok(map) => map,
            Err(e) => panic!("invalid hasher: {}", e),
        }
    }
}

impl<K, V, H> OrdHashMap<K, V, H> {
    pub(crate) fn from_parts(
        i_bits: u32,
        hash_bits: u32,
        chain_length_max: usize,
        concurrency_level: usize,
        max_resize_attempts: usize,
        hasher: H,
    ) -> Result<Self, Error> {
        let segments = segment::segments(concurrency_level);
        let segment_bits = segments.len().trailing_zeros();
        let collector = Collector::new();
        let directory = Directory::new(i_bits, hash_bits, segment_bits)?;
        let directory = Atomic::from(Shared::boxed(directory, &collector));

        Ok(Self {
            directory,
            segments,
            gate: ResizeGate::default(),
            count: ConcurrentCounter::new(),
            chain_length_max,
            max_resize_attempts,
            hash_bits,
            collector,
            hasher,
            _kv: PhantomData,
        })
    }

    /// Pin a `Guard` for use with this map.
    ///
    /// Keep in mind that for as long as you hold onto this `Guard`, you are preventing the
    /// collection of garbage generated by the map.
    pub fn guard(&self) -> Guard<'_> {
        self.collector.enter()
    }

    #[inline]
    fn check_guard(&self, guard: &Guard<'_>) {
        // guard.collector() may be `None` if it is unprotected
        if let Some(c) = guard.collector() {
            assert!(Collector::ptr_eq(c, &self.collector));
        }
    }

    fn load_directory<'g>(&'g self, guard: &'g Guard<'_>) -> &'g Directory<K, V> {
        let directory = self.directory.load(Ordering::SeqCst, guard);
        // safety: the directory pointer is set at construction and only ever swapped for
        // another valid directory. an old directory is retired after the swap, and we loaded
        // it under `guard`, so it stays valid for `'g`.
        unsafe { &**directory.deref() }
    }

    /// Returns the number of live entries in the map.
    ///
    /// This reads a striped counter and is only exact while no writes are in flight. Use
    /// [`size`](Self::size) for a count taken under the segment locks.
    pub fn len(&self) -> usize {
        self.count.sum()
    }

    /// Returns `true` if the map contains no live entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The current number of buckets.
    pub fn bucket_count(&self) -> usize {
        let guard = self.guard();
        self.load_directory(&guard).len()
    }

    /// The number of top hash bits currently used to select a bucket.
    pub fn i_bits(&self) -> u32 {
        let guard = self.guard();
        self.load_directory(&guard).i_bits()
    }

    /// The width of the hashes produced by this map's hasher.
    pub fn hash_bits(&self) -> u32 {
        self.hash_bits
    }

    /// The number of lock segments. Fixed for the lifetime of the map.
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// The maximum number of slots per bucket.
    pub fn chain_length_max(&self) -> usize {
        self.chain_length_max
    }

    /// The number of times the directory has been doubled.
    pub fn resize_count(&self) -> usize {
        self.gate.completed()
    }

    /// Returns a reference to the map's hasher.
    pub fn hasher(&self) -> &H {
        &self.hasher
    }
}

impl<K, V, H> OrdHashMap<K, V, H>
where
    K: Ord,
    H: OrderedHasher<K>,
{
    /// The bucket `key` currently maps to.
    pub fn bucket_of(&self, key: &K) -> usize {
        let guard = self.guard();
        self.load_directory(&guard).bucket_index(self.hasher.hash(key))
    }

    /// Returns `true` if the map contains a live entry for `key`.
    ///
    /// This never blocks on a segment lock. It may wait for an in-progress resize.
    ///
    /// # Examples
    ///
    /// ```
    /// use ordhash::OrdHashMap;
    ///
    /// let map = OrdHashMap::new();
    /// let guard = map.guard();
    /// map.insert(1u32, "a", &guard).unwrap();
    /// assert!(map.contains(&1, &guard));
    /// assert!(!map.contains(&2, &guard));
    /// ```
    pub fn contains(&self, key: &K, guard: &Guard<'_>) -> bool {
        self.check_guard(guard);
        self.find(key, guard).is_some()
    }

    /// Returns a reference to the value of `key`, if it is live.
    ///
    /// The reference stays valid for as long as `guard` is held, even if the key is
    /// concurrently removed or its value replaced.
    pub fn get<'g>(&'g self, key: &K, guard: &'g Guard<'_>) -> Option<&'g V> {
        self.check_guard(guard);
        self.find(key, guard).map(|e| &e.value)
    }

    fn find<'g>(&'g self, key: &K, guard: &'g Guard<'_>) -> Option<&'g Entry<K, V>> {
        let hash = self.hasher.hash(key);
        loop {
            self.gate.wait();
            let directory = self.load_directory(guard);
            let bucket = directory.bucket_index(hash);
            let segment = &self.segments[directory.segment_of(bucket)];

            let stamp = segment.timestamp();
            let found = directory
                .chain(bucket, guard)
                .and_then(|chain| chain.find_live(key));

            // a writer of this segment or a resize may have raced with us
            if segment.timestamp() == stamp
                && !self.gate.is_resizing()
                && std::ptr::eq(directory, self.load_directory(guard))
            {
                return found;
            }
            trace!("lookup raced with a writer; retrying");
        }
    }

    /// Returns the values of all live keys in `start..=end`, in ascending key order.
    ///
    /// The buckets spanning the range are locked for reading while they are scanned, so
    /// the result is a consistent view of that part of the map. If `start > end`, the
    /// result is empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use ordhash::{hasher::Identity, OrdHashMap};
    ///
    /// // keys stay below 2^8, so only the low 8 bits carry order
    /// let map = OrdHashMap::builder()
    ///     .hasher(Identity::with_bits(8))
    ///     .build()
    ///     .unwrap();
    /// let guard = map.guard();
    /// for k in 0u32..100 {
    ///     map.insert(k, k * 10, &guard).unwrap();
    /// }
    /// assert_eq!(map.range_query(&10, &13, &guard), vec![&100, &110, &120, &130]);
    /// ```
    pub fn range_query<'g>(&'g self, start: &K, end: &K, guard: &'g Guard<'_>) -> Vec<&'g V> {
        self.range_entries(start, end, guard)
            .into_iter()
            .map(|(_, v)| v)
            .collect()
    }

    /// Like [`range_query`](Self::range_query), but yields keys along with their values.
    pub fn range_entries<'g>(
        &'g self,
        start: &K,
        end: &K,
        guard: &'g Guard<'_>,
    ) -> Vec<(&'g K, &'g V)> {
        self.check_guard(guard);
        let mut found = Vec::new();
        if start > end {
            return found;
        }
        let (from, to) = (self.hasher.hash(start), self.hasher.hash(end));

        let _pass = self.gate.enter();
        let directory = self.load_directory(guard);
        let first = directory.bucket_index(from);
        let last = directory.bucket_index(to);
        if first > last {
            // only possible if the hasher does not preserve order
            warn!("hasher mapped range bounds to buckets {} > {}", first, last);
            return found;
        }
        let _locks = SpanGuard::lock(&self.segments[directory.segment_span(first, last)]);

        if first == last {
            if let Some(chain) = directory.chain(first, guard) {
                found.extend(chain.scan_between(start, end).map(Entry::pair));
            }
            return found;
        }
        if let Some(chain) = directory.chain(first, guard) {
            found.extend(chain.scan_from(start).map(Entry::pair));
        }
        for bucket in first + 1..last {
            if let Some(chain) = directory.chain(bucket, guard) {
                found.extend(chain.live().map(Entry::pair));
            }
        }
        if let Some(chain) = directory.chain(last, guard) {
            found.extend(chain.scan_until(end).map(Entry::pair));
        }
        found
    }

    /// Counts the live entries by scanning every bucket with all segments locked for reading.
    ///
    /// Unlike [`len`](Self::len), the result is exact with respect to a single point in time.
    pub fn size(&self, guard: &Guard<'_>) -> usize {
        self.check_guard(guard);
        let _pass = self.gate.enter();
        let directory = self.load_directory(guard);
        let _locks = SpanGuard::lock(&self.segments);
        (0..directory.len())
            .filter_map(|bucket| directory.chain(bucket, guard))
            .map(|chain| chain.live().count())
            .sum()
    }
}

impl<K, V, H> OrdHashMap<K, V, H>
where
    K: Ord + Clone + Send + Sync,
    V: Clone + Send + Sync,
    H: OrderedHasher<K>,
{
    /// Inserts `value` under `key`, replacing the value of a live key.
    ///
    /// If the key's bucket is full, the map is grown and the insert retried. An insert that
    /// has itself grown the map `max_resize_attempts` times without finding room fails with
    /// [`Error::ResizeLimit`]; the map itself is still consistent in that case, just without
    /// the new key.
    ///
    /// # Examples
    ///
    /// ```
    /// use ordhash::{Inserted, OrdHashMap};
    ///
    /// let map = OrdHashMap::new();
    /// let guard = map.guard();
    /// assert_eq!(map.insert(37u32, "a", &guard).unwrap(), Inserted::New);
    /// assert_eq!(map.insert(37, "b", &guard).unwrap(), Inserted::Updated);
    /// assert_eq!(map.get(&37, &guard), Some(&"b"));
    /// ```
    pub fn insert(&self, key: K, value: V, guard: &Guard<'_>) -> Result<Inserted, Error> {
        self.check_guard(guard);
        let hash = self.hasher.hash(&key);
        let (mut key, mut value) = (key, value);
        let mut attempts = 0;
        loop {
            let observed = match self.try_insert(hash, key, value, guard) {
                Ok(inserted) => return Ok(inserted),
                Err((k, v, observed)) => {
                    key = k;
                    value = v;
                    observed
                }
            };
            if attempts == self.max_resize_attempts {
                let buckets = 1 << observed;
                warn!(
                    "giving up insert after {} resizes ({} buckets)",
                    attempts, buckets
                );
                return Err(Error::ResizeLimit { attempts, buckets });
            }
            // resizes done by other threads are free: they are bounded by the hash width
            if self.grow(observed, guard)? {
                attempts += 1;
            }
        }
    }

    /// One locked attempt at inserting. If the bucket is full, hands the pair back along
    /// with the index width it was working against.
    fn try_insert(
        &self,
        hash: u64,
        key: K,
        value: V,
        guard: &Guard<'_>,
    ) -> Result<Inserted, (K, V, u32)> {
        let _pass = self.gate.enter();
        let directory = self.load_directory(guard);
        let bucket = directory.bucket_index(hash);
        let stripe = directory.segment_of(bucket);
        let segment = &self.segments[stripe];
        let _lock = segment.exclusive();

        let mut chain = directory.chain(bucket, guard).cloned().unwrap_or_default();
        let inserted = match chain.insert_or_update(hash, key, value, self.chain_length_max) {
            Upsert::Inserted => Inserted::New,
            Upsert::Revived => Inserted::Revived,
            Upsert::Updated => Inserted::Updated,
            Upsert::NeedsResize(key, value) => {
                trace!("bucket {} is full", bucket);
                return Err((key, value, directory.i_bits()));
            }
        };
        directory.replace(bucket, chain, &self.collector, guard);
        segment.touch();
        if inserted.grew() {
            self.count.add(stripe, 1);
        }
        Ok(inserted)
    }

    /// Removes `key`. Returns `true` if it was live.
    ///
    /// The key's slot is kept as a tombstone until it is reinserted or the map is grown.
    pub fn remove(&self, key: &K, guard: &Guard<'_>) -> bool {
        self.check_guard(guard);
        let hash = self.hasher.hash(key);

        let _pass = self.gate.enter();
        let directory = self.load_directory(guard);
        let bucket = directory.bucket_index(hash);
        let stripe = directory.segment_of(bucket);
        let segment = &self.segments[stripe];
        let _lock = segment.exclusive();

        let Some(current) = directory.chain(bucket, guard) else {
            return false;
        };
        if current.find_live(key).is_none() {
            return false;
        }
        let mut chain = current.clone();
        chain.remove(key);
        directory.replace(bucket, chain, &self.collector, guard);
        segment.touch();
        self.count.add(stripe, -1);
        true
    }

    /// Doubles the directory, unless another thread has already done so since the caller
    /// observed `from_bits` index bits. Returns whether this call did the doubling.
    fn grow(&self, from_bits: u32, guard: &Guard<'_>) -> Result<bool, Error> {
        let Some(mut token) = self.gate.try_begin() else {
            trace!("another thread is resizing; waiting");
            self.gate.wait();
            return Ok(false);
        };

        let current = self.directory.load(Ordering::SeqCst, guard);
        // safety: see `load_directory`. we hold the resize token, so nobody else swaps it.
        let directory = unsafe { &**current.deref() };
        if directory.i_bits() != from_bits {
            trace!("directory already grown past {} bits", from_bits);
            return Ok(false);
        }
        if directory.i_bits() >= self.hash_bits {
            warn!("cannot grow past {} buckets", directory.len());
            return Err(Error::HashBitsExhausted {
                bits: self.hash_bits,
            });
        }
        if directory.len() >= MAXIMUM_CAPACITY {
            warn!("cannot grow past {} buckets", directory.len());
            return Err(Error::CapacityOverflow {
                buckets: directory.len() * 2,
            });
        }

        let buckets = directory.len() * 2;
        debug!(
            "growing directory from {} to {} buckets",
            directory.len(),
            buckets
        );
        let next = directory.grow(&self.collector, guard)?;
        let next = Shared::boxed(next, &self.collector);
        let old = self.directory.swap(next, Ordering::SeqCst, guard);
        // safety: the old directory is no longer reachable. readers that loaded it hold
        // guards that keep it alive, and the resize gate kept every writer out of it while
        // we copied.
        unsafe { guard.retire_shared(old) };
        token.grown();
        debug!("directory now has {} buckets", buckets);
        Ok(true)
    }

    /// Inserts `n` new keys, drawing keys and values from the given generators.
    ///
    /// A generated key that is already present does not count towards `n`; its value is
    /// overwritten and another key is drawn. The generators must therefore eventually
    /// produce enough distinct keys.
    pub fn populate<FK, FV>(
        &self,
        n: usize,
        mut next_key: FK,
        mut next_value: FV,
        guard: &Guard<'_>,
    ) -> Result<(), Error>
    where
        FK: FnMut() -> K,
        FV: FnMut() -> V,
    {
        for _ in 0..n {
            while !self.insert(next_key(), next_value(), guard)?.grew() {}
        }
        debug!("populated map with {} entries", n);
        Ok(())
    }
}

impl<K, V, H> Debug for OrdHashMap<K, V, H>
where
    K: Debug,
    V: Debug,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let guard = self.collector.enter();
        let directory = self.load_directory(&guard);
        let entries = (0..directory.len())
            .filter_map(|bucket| directory.chain(bucket, &guard))
            .flat_map(|chain| chain.live())
            .map(Entry::pair);
        f.debug_map().entries(entries).finish()
    }
}

impl<K, V, H> Drop for OrdHashMap<K, V, H> {
    fn drop(&mut self) {
        // safety: we have &mut self _and_ all references we have returned are bound to the
        // lifetime of their borrow of self, so there cannot be any outstanding references to
        // anything in the map. retired directories and chains are freed with the collector.
        unsafe { self.directory.drop_in_place() };
    }
}
