//! Order-preserving hash strategies.
//!
//! The map selects a bucket from the *top* `i_bits` bits of a `bits`-wide hash, so a hasher
//! that is monotonic in key order (`k1 < k2` implies `hash(k1) <= hash(k2)`) keeps every key
//! range inside a contiguous span of buckets, across any number of resizes. This is a
//! precondition the map cannot check: a scrambling hasher still gives correct point
//! operations, but range queries will silently miss entries.

/// Maps keys to fixed-width unsigned hashes.
pub trait OrderedHasher<K: ?Sized> {
    /// The number of significant bits in values returned by [`hash`](Self::hash), in `1..=64`.
    ///
    /// Larger hashes are treated as `2^bits - 1`, so keys past the width share the last bucket.
    fn bits(&self) -> u32;

    /// Hashes `key`.
    fn hash(&self, key: &K) -> u64;
}

/// Keys with a natural order-preserving bit representation.
pub trait OrderedKey: Ord {
    /// Width of [`ordered_bits`](Self::ordered_bits).
    const BITS: u32;

    /// Returns bits that sort exactly like `self`.
    fn ordered_bits(&self) -> u64;
}

macro_rules! unsigned_key {
    ($($t:ty),*) => {
        $(
            impl OrderedKey for $t {
                const BITS: u32 = <$t>::BITS;

                #[inline]
                fn ordered_bits(&self) -> u64 {
                    *self as u64
                }
            }
        )*
    };
}

// flipping the sign bit moves negatives below positives
macro_rules! signed_key {
    ($($t:ty => $u:ty),*) => {
        $(
            impl OrderedKey for $t {
                const BITS: u32 = <$t>::BITS;

                #[inline]
                fn ordered_bits(&self) -> u64 {
                    ((*self as $u) ^ (1 << (<$t>::BITS - 1))) as u64
                }
            }
        )*
    };
}

unsigned_key!(u8, u16, u32, u64, usize);
signed_key!(i8 => u8, i16 => u16, i32 => u32, i64 => u64, isize => usize);

impl OrderedKey for char {
    const BITS: u32 = 32;

    #[inline]
    fn ordered_bits(&self) -> u64 {
        *self as u64
    }
}

/// The identity hash over [`OrderedKey`]s.
///
/// By default the hash is as wide as the key type. Use [`Identity::with_bits`] when keys are
/// known to come from a narrower domain: with a full-width hash, small keys all share the same
/// top bits and the directory has to grow very large before they land in different buckets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Identity {
    bits: Option<u32>,
}

impl Identity {
    /// Hash width equal to the key type's width.
    pub const fn new() -> Self {
        Self { bits: None }
    }

    /// Hash width of `bits`.
    ///
    /// Keys at or above `2^bits` (after sign adjustment) are still ordered correctly, but they
    /// all fall into the last bucket and cannot be split apart by growing.
    pub const fn with_bits(bits: u32) -> Self {
        Self { bits: Some(bits) }
    }
}

impl<K: OrderedKey> OrderedHasher<K> for Identity {
    fn bits(&self) -> u32 {
        self.bits.unwrap_or(K::BITS)
    }

    #[inline]
    fn hash(&self, key: &K) -> u64 {
        key.ordered_bits()
    }
}

/// An [`OrderedHasher`] backed by a closure, see [`from_fn`].
#[derive(Clone, Copy)]
pub struct FnHasher<F> {
    bits: u32,
    f: F,
}

impl<F> std::fmt::Debug for FnHasher<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnHasher").field("bits", &self.bits).finish()
    }
}

/// Wraps `f` as a `bits`-wide hasher.
///
/// ```
/// use ordhash::hasher::{from_fn, OrderedHasher};
///
/// // bucket timestamps by the second
/// let h = from_fn(32, |millis: &u64| millis / 1000);
/// assert_eq!(h.hash(&12_345u64), 12);
/// ```
pub fn from_fn<K, F>(bits: u32, f: F) -> FnHasher<F>
where
    K: ?Sized,
    F: Fn(&K) -> u64,
{
    FnHasher { bits, f }
}

impl<K, F> OrderedHasher<K> for FnHasher<F>
where
    K: ?Sized,
    F: Fn(&K) -> u64,
{
    fn bits(&self) -> u32 {
        self.bits
    }

    #[inline]
    fn hash(&self, key: &K) -> u64 {
        (self.f)(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_keys_keep_order() {
        let keys = [i32::MIN, -5, -1, 0, 1, 7, i32::MAX];
        let bits: Vec<_> = keys.iter().map(OrderedKey::ordered_bits).collect();
        assert!(bits.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(bits[0], 0);
        assert_eq!(bits[6], u32::MAX as u64);
    }

    #[test]
    fn identity_width() {
        assert_eq!(OrderedHasher::<u32>::bits(&Identity::new()), 32);
        assert_eq!(OrderedHasher::<i64>::bits(&Identity::new()), 64);
        assert_eq!(OrderedHasher::<u64>::bits(&Identity::with_bits(12)), 12);
        assert_eq!(Identity::new().hash(&42u16), 42);
    }

    #[test]
    fn closure_hasher() {
        let h = from_fn(8, |k: &u32| u64::from(*k) >> 4);
        assert_eq!(OrderedHasher::<u32>::bits(&h), 8);
        assert_eq!(h.hash(&0xffu32), 0xf);
    }
}
