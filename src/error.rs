use std::collections::TryReserveError;

/// Errors surfaced by [`OrdHashMap`](crate::OrdHashMap).
///
/// Everything else the map can run into (duplicate keys, inverted ranges, contention with a
/// concurrent resize) is absorbed into the ordinary return values of its operations.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The requested initial bucket count is not a power of two.
    #[error("initial bucket count must be a power of two, got {0}")]
    NotPowerOfTwo(usize),

    /// `chain_length_max` was zero.
    #[error("maximum chain length must be at least 1")]
    ZeroChainLength,

    /// `concurrency_level` was zero.
    #[error("concurrency level must be at least 1")]
    ZeroConcurrency,

    /// `max_resize_attempts` was zero.
    #[error("maximum resize attempts per operation must be at least 1")]
    ZeroResizeAttempts,

    /// The hasher reports an output width outside `1..=64`.
    #[error("hash width must be between 1 and 64 bits, got {0}")]
    InvalidHashBits(u32),

    /// The initial directory would consume more hash bits than the hasher produces.
    #[error("{buckets} initial buckets need {needed} hash bits but the hasher only produces {bits}")]
    CapacityExceedsHash {
        /// The requested initial bucket count.
        buckets: usize,
        /// Index bits that bucket count requires.
        needed: u32,
        /// Width of the hasher's output.
        bits: u32,
    },

    /// Growing would exceed [`MAXIMUM_CAPACITY`](crate::MAXIMUM_CAPACITY) buckets.
    #[error("{buckets} buckets exceeds the maximum capacity")]
    CapacityOverflow {
        /// The bucket count the resize would have produced.
        buckets: usize,
    },

    /// A chain overflowed while every hash bit is already used to select a bucket, so no
    /// amount of growth can split it.
    #[error("all {bits} hash bits are in use and a chain still exceeds its maximum length")]
    HashBitsExhausted {
        /// Width of the hasher's output.
        bits: u32,
    },

    /// A single operation performed more resizes than allowed without its chain fitting.
    #[error("gave up after {attempts} resizes ({buckets} buckets); the hasher likely clusters keys")]
    ResizeLimit {
        /// Resizes this operation carried out itself.
        attempts: usize,
        /// Bucket count when the operation gave up.
        buckets: usize,
    },

    /// The directory for the next resize could not be allocated.
    #[error("failed to allocate bucket directory")]
    Alloc(#[from] TryReserveError),
}
