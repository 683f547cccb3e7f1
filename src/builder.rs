use crate::error::Error;
use crate::hasher::{Identity, OrderedHasher};
use crate::map::{OrdHashMap, DEFAULT_BUCKETS, MAXIMUM_CAPACITY};
use std::fmt;
use std::marker::PhantomData;

/// Default bound on the number of entries (live or tombstoned) per bucket.
pub(crate) const DEFAULT_CHAIN_LENGTH: usize = 16;

/// Default number of resizes a single operation may trigger before giving up.
pub(crate) const DEFAULT_RESIZE_ATTEMPTS: usize = 16;

/// Upper bound on the number of segments, whatever the requested concurrency level.
const MAXIMUM_SEGMENTS: usize = 1 << 16;

/// Builds an [`OrdHashMap`] with various configuration knobs.
///
/// Every parameter is fixed for the lifetime of the map; resizing only changes the number of
/// buckets.
///
/// # Examples
///
/// ```
/// use ordhash::{hasher::Identity, OrdHashMap};
///
/// let map = OrdHashMap::<u32, &str>::builder()
///     .initial_buckets(64)
///     .chain_length_max(4)
///     .concurrency_level(8)
///     // keys are known to stay below 2^20
///     .hasher(Identity::with_bits(20))
///     .build()
///     .unwrap();
///
/// let map = map.pin();
/// map.insert(7, "seven").unwrap();
/// assert_eq!(map.get(&7), Some(&"seven"));
/// ```
pub struct Builder<K, V, H = Identity> {
    initial_buckets: Option<usize>,
    chain_length_max: usize,
    concurrency_level: usize,
    max_resize_attempts: usize,
    hasher: H,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V> Default for Builder<K, V, Identity> {
    fn default() -> Self {
        Self {
            initial_buckets: None,
            chain_length_max: DEFAULT_CHAIN_LENGTH,
            concurrency_level: crate::map::num_cpus(),
            max_resize_attempts: DEFAULT_RESIZE_ATTEMPTS,
            hasher: Identity::new(),
            _marker: PhantomData,
        }
    }
}

impl<K, V> Builder<K, V, Identity> {
    /// Creates a builder with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<K, V, H> Builder<K, V, H> {
    /// Sets the number of buckets the map starts with. Must be a power of two.
    ///
    /// Defaults to 16, or to `2^bits` if the hasher is narrower than that.
    pub fn initial_buckets(self, buckets: usize) -> Self {
        Self {
            initial_buckets: Some(buckets),
            ..self
        }
    }

    /// Sets how many entries, tombstones included, a bucket may hold before an insert of a
    /// new key forces the map to grow. Defaults to 16.
    pub fn chain_length_max(self, len: usize) -> Self {
        Self {
            chain_length_max: len,
            ..self
        }
    }

    /// Sets the number of lock segments, rounded up to a power of two.
    ///
    /// Defaults to the number of physical CPUs.
    pub fn concurrency_level(self, level: usize) -> Self {
        Self {
            concurrency_level: level,
            ..self
        }
    }

    /// Sets how many resizes a single operation may trigger before it fails with
    /// [`Error::ResizeLimit`]. Defaults to 16.
    pub fn max_resize_attempts(self, attempts: usize) -> Self {
        Self {
            max_resize_attempts: attempts,
            ..self
        }
    }

    /// Sets the hasher. It must preserve key order for range queries to be complete; see
    /// [`hasher`](crate::hasher).
    pub fn hasher<H2>(self, hasher: H2) -> Builder<K, V, H2> {
        Builder {
            initial_buckets: self.initial_buckets,
            chain_length_max: self.chain_length_max,
            concurrency_level: self.concurrency_level,
            max_resize_attempts: self.max_resize_attempts,
            hasher,
            _marker: PhantomData,
        }
    }

    /// Validates the configuration and allocates the map.
    pub fn build(self) -> Result<OrdHashMap<K, V, H>, Error>
    where
        H: OrderedHasher<K>,
    {
        let hash_bits = self.hasher.bits();
        if !(1..=u64::BITS).contains(&hash_bits) {
            return Err(Error::InvalidHashBits(hash_bits));
        }

        let buckets = self.initial_buckets.unwrap_or(if hash_bits < usize::BITS {
            DEFAULT_BUCKETS.min(1 << hash_bits)
        } else {
            DEFAULT_BUCKETS
        });
        if !buckets.is_power_of_two() {
            return Err(Error::NotPowerOfTwo(buckets));
        }
        if buckets > MAXIMUM_CAPACITY {
            return Err(Error::CapacityOverflow { buckets });
        }
        let i_bits = buckets.trailing_zeros();
        if i_bits > hash_bits {
            return Err(Error::CapacityExceedsHash {
                buckets,
                needed: i_bits,
                bits: hash_bits,
            });
        }

        if self.chain_length_max == 0 {
            return Err(Error::ZeroChainLength);
        }
        if self.concurrency_level == 0 {
            return Err(Error::ZeroConcurrency);
        }
        if self.max_resize_attempts == 0 {
            return Err(Error::ZeroResizeAttempts);
        }

        OrdHashMap::from_parts(
            i_bits,
            hash_bits,
            self.chain_length_max,
            self.concurrency_level.min(MAXIMUM_SEGMENTS),
            self.max_resize_attempts,
            self.hasher,
        )
    }
}

impl<K, V, H: fmt::Debug> fmt::Debug for Builder<K, V, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builder")
            .field("initial_buckets", &self.initial_buckets)
            .field("chain_length_max", &self.chain_length_max)
            .field("concurrency_level", &self.concurrency_level)
            .field("max_resize_attempts", &self.max_resize_attempts)
            .field("hasher", &self.hasher)
            .finish()
    }
}
