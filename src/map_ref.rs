use crate::error::Error;
use crate::hasher::OrderedHasher;
use crate::map::{Inserted, OrdHashMap};
use crate::reclaim::Guard;
use std::fmt::{self, Debug, Formatter};
use std::ops::{Deref, Index};

/// A reference to an [`OrdHashMap`], constructed with [`OrdHashMap::pin`] or
/// [`OrdHashMap::with_guard`].
///
/// The current thread will be pinned for the duration of this reference. Keep in mind that
/// this prevents the collection of garbage generated by the map.
pub struct OrdHashMapRef<'map, K, V, H> {
    map: &'map OrdHashMap<K, V, H>,
    guard: GuardRef<'map>,
}

enum GuardRef<'g> {
    Owned(Guard<'g>),
    Ref(&'g Guard<'g>),
}

impl<'g> Deref for GuardRef<'g> {
    type Target = Guard<'g>;

    #[inline]
    fn deref(&self) -> &Guard<'g> {
        match *self {
            GuardRef::Owned(ref guard) | GuardRef::Ref(&ref guard) => guard,
        }
    }
}

impl<K, V, H> OrdHashMap<K, V, H> {
    /// Get a reference to this map with the current thread pinned.
    ///
    /// # Examples
    ///
    /// ```
    /// use ordhash::OrdHashMap;
    ///
    /// let map = OrdHashMap::new();
    /// let map = map.pin();
    /// map.insert(1u8, 'a').unwrap();
    /// assert_eq!(map[&1], 'a');
    /// ```
    pub fn pin(&self) -> OrdHashMapRef<'_, K, V, H> {
        OrdHashMapRef {
            guard: GuardRef::Owned(self.guard()),
            map: self,
        }
    }

    /// Get a reference to this map with the given guard.
    pub fn with_guard<'g>(&'g self, guard: &'g Guard<'_>) -> OrdHashMapRef<'g, K, V, H> {
        OrdHashMapRef {
            map: self,
            guard: GuardRef::Ref(guard),
        }
    }
}

impl<K, V, H> OrdHashMapRef<'_, K, V, H> {
    /// Returns the number of live entries in the map, see [`OrdHashMap::len`].
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` if the map contains no live entries.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl<K, V, H> OrdHashMapRef<'_, K, V, H>
where
    K: Ord,
    H: OrderedHasher<K>,
{
    /// Returns `true` if the map contains a live entry for `key`.
    pub fn contains(&self, key: &K) -> bool {
        self.map.contains(key, &self.guard)
    }

    /// Returns the value of `key`, if it is live.
    pub fn get<'g>(&'g self, key: &K) -> Option<&'g V> {
        self.map.get(key, &self.guard)
    }

    /// Returns the values of all live keys in `start..=end`, in ascending key order.
    pub fn range_query<'g>(&'g self, start: &K, end: &K) -> Vec<&'g V> {
        self.map.range_query(start, end, &self.guard)
    }

    /// Returns the live entries with keys in `start..=end`, in ascending key order.
    pub fn range_entries<'g>(&'g self, start: &K, end: &K) -> Vec<(&'g K, &'g V)> {
        self.map.range_entries(start, end, &self.guard)
    }

    /// Counts the live entries under the segment locks, see [`OrdHashMap::size`].
    pub fn size(&self) -> usize {
        self.map.size(&self.guard)
    }
}

impl<K, V, H> OrdHashMapRef<'_, K, V, H>
where
    K: Ord + Clone + Send + Sync,
    V: Clone + Send + Sync,
    H: OrderedHasher<K>,
{
    /// Inserts `value` under `key`, see [`OrdHashMap::insert`].
    pub fn insert(&self, key: K, value: V) -> Result<Inserted, Error> {
        self.map.insert(key, value, &self.guard)
    }

    /// Removes `key`. Returns `true` if it was live.
    pub fn remove(&self, key: &K) -> bool {
        self.map.remove(key, &self.guard)
    }

    /// Inserts `n` new keys drawn from the generators, see [`OrdHashMap::populate`].
    pub fn populate<FK, FV>(&self, n: usize, next_key: FK, next_value: FV) -> Result<(), Error>
    where
        FK: FnMut() -> K,
        FV: FnMut() -> V,
    {
        self.map.populate(n, next_key, next_value, &self.guard)
    }
}

impl<K, V, H> Clone for OrdHashMapRef<'_, K, V, H> {
    fn clone(&self) -> Self {
        self.map.pin()
    }
}

impl<K, V, H> Debug for OrdHashMapRef<'_, K, V, H>
where
    K: Debug,
    V: Debug,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(self.map, f)
    }
}

impl<K, V, H> Index<&'_ K> for OrdHashMapRef<'_, K, V, H>
where
    K: Ord,
    H: OrderedHasher<K>,
{
    type Output = V;

    fn index(&self, key: &K) -> &V {
        self.get(key).expect("no entry found for key")
    }
}
