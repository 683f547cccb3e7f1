//! A concurrent hash map that can answer ordered range queries.
//!
//! `OrdHashMap` hashes keys with an *order-preserving* hash and selects a bucket from the top
//! bits of that hash. Neighbouring keys therefore land in neighbouring buckets, and a range
//! query only visits the run of buckets between its two endpoints, while point operations keep
//! the cost profile of a hash table.
//!
//! # Concurrency
//!
//! The bucket array is partitioned into a fixed number of *segments*, each a contiguous band
//! of buckets guarded by a reader-writer lock:
//!
//!  - `insert` and `remove` lock the single segment covering their bucket.
//!  - `range_query` and `size` take shared locks on every segment they span, always in
//!    ascending order, and so observe a consistent snapshot of those buckets.
//!  - `contains` and `get` take no lock. They read a per-segment timestamp before and after the
//!    lookup and retry if a writer or a resize intervened.
//!
//! Buckets hold sorted chains of at most `chain_length_max` slots. When an insert finds its
//! chain full, one thread doubles the whole directory (adding one index bit), while every other
//! operation waits for it to finish and then retries against the new directory. The map never
//! shrinks.
//!
//! # Memory reclamation
//!
//! Chains and directories are never modified once published; writers swap in modified copies.
//! Replaced copies are reclaimed with [`seize`]: every operation takes a
//! [`Guard`], and references returned by the map stay valid for as long as the guard lives.
//! [`OrdHashMap::pin`] returns an [`OrdHashMapRef`] that carries its own guard.
//!
//! # Hashing
//!
//! Range queries are only complete if the hasher is monotonic in key order. [`Identity`]
//! provides this for integer and `char` keys; see [`hasher`] for the full contract and for
//! custom hashers. Pick the hash width to match the key domain: with a 32-bit hash and keys
//! that never exceed a few thousand, every key shares the same top bits.
//!
//! ```
//! use ordhash::{hasher::Identity, OrdHashMap};
//!
//! let map = OrdHashMap::builder()
//!     .hasher(Identity::with_bits(16))
//!     .build()
//!     .unwrap();
//!
//! let map = map.pin();
//! for k in 0u32..1000 {
//!     map.insert(k, k.to_string()).unwrap();
//! }
//! map.remove(&501);
//!
//! let values: Vec<_> = map.range_query(&499, &502).into_iter().cloned().collect();
//! assert_eq!(values, ["499", "500", "502"]);
//! ```
#![deny(
    missing_debug_implementations,
    unreachable_pub,
    rust_2018_idioms,
    unsafe_op_in_unsafe_fn
)]
#![warn(rustdoc::broken_intra_doc_links)]

mod builder;
mod counter;
mod error;
mod map;
mod map_ref;
mod node;
mod raw;
mod reclaim;
mod resize;
mod segment;

pub mod hasher;

#[cfg(feature = "rayon")]
mod rayon_impls;

pub use builder::Builder;
pub use error::Error;
pub use hasher::Identity;
pub use map::{Inserted, OrdHashMap, MAXIMUM_CAPACITY};
pub use map_ref::OrdHashMapRef;
pub use seize::Guard;
