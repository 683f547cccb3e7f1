use crate::error::Error;
use crate::hasher::{Identity, OrderedHasher, OrderedKey};
use crate::OrdHashMap;
use rayon::iter::{FromParallelIterator, IntoParallelIterator, ParallelExtend, ParallelIterator};

impl<K, V, H> ParallelExtend<(K, V)> for OrdHashMap<K, V, H>
where
    K: Ord + Clone + Send + Sync,
    V: Clone + Send + Sync,
    H: OrderedHasher<K> + Sync,
{
    /// # Panics
    ///
    /// If an insert fails, see [`OrdHashMap::try_par_extend`].
    // This is of limited use due to the `&mut self` parameter. See `try_par_extend`
    fn par_extend<I>(&mut self, par_iter: I)
    where
        I: IntoParallelIterator<Item = (K, V)>,
    {
        if let Err(e) = self.try_par_extend(par_iter) {
            panic!("parallel extend failed: {}", e);
        }
    }
}

impl<K, V, H> OrdHashMap<K, V, H>
where
    K: Ord + Clone + Send + Sync,
    V: Clone + Send + Sync,
    H: OrderedHasher<K> + Sync,
{
    /// Inserts every pair of `par_iter` using rayon's thread pool.
    ///
    /// Stops at the first failing insert and returns its error. Pairs inserted by then stay
    /// in the map.
    pub fn try_par_extend<I>(&self, par_iter: I) -> Result<(), Error>
    where
        I: IntoParallelIterator<Item = (K, V)>,
    {
        par_iter.into_par_iter().try_for_each(|(k, v)| {
            // one guard per insert so that no worker holds back reclamation for long
            let guard = self.guard();
            self.insert(k, v, &guard).map(|_| ())
        })
    }
}

impl<K, V> FromParallelIterator<(K, V)> for OrdHashMap<K, V, Identity>
where
    K: OrderedKey + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    fn from_par_iter<I>(par_iter: I) -> Self
    where
        I: IntoParallelIterator<Item = (K, V)>,
    {
        let mut created_map = OrdHashMap::new();
        created_map.par_extend(par_iter);
        created_map
    }
}

#[cfg(test)]
mod test {
    use crate::hasher::Identity;
    use crate::{Error, OrdHashMap};
    use rayon::iter::{FromParallelIterator, IntoParallelIterator, ParallelExtend};

    #[test]
    fn parallel_extend_by_nothing() {
        let to_extend_with = Vec::new();

        let mut map = OrdHashMap::<u8, u8>::new();
        let guard = map.guard();
        map.insert(1, 2, &guard).unwrap();
        map.insert(3, 4, &guard).unwrap();
        drop(guard);

        map.par_extend(to_extend_with.into_par_iter());

        let guard = map.guard();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&1, &guard), Some(&2));
        assert_eq!(map.get(&3, &guard), Some(&4));
    }

    #[test]
    fn parallel_extend_by_a_bunch() {
        let map = OrdHashMap::<u32, u32>::builder()
            .hasher(Identity::with_bits(12))
            .build()
            .unwrap();
        map.try_par_extend((0..1000u32).into_par_iter().map(|k| (k, k * 2)))
            .unwrap();

        let guard = map.guard();
        assert_eq!(map.len(), 1000);
        assert_eq!(map.size(&guard), 1000);
        assert_eq!(map.get(&999, &guard), Some(&1998));
        let range = map.range_query(&100, &104, &guard);
        assert_eq!(range, vec![&200, &202, &204, &206, &208]);
    }

    #[test]
    fn parallel_extend_reports_failure() {
        let map = OrdHashMap::<u32, u32>::builder()
            .initial_buckets(2)
            .chain_length_max(1)
            .max_resize_attempts(1)
            .hasher(Identity::with_bits(20))
            .build()
            .unwrap();
        let res = map.try_par_extend((0..8u32).into_par_iter().map(|k| (k, k)));
        assert!(matches!(res, Err(Error::ResizeLimit { .. })));
    }

    #[test]
    fn from_empty_parallel_iter() {
        let to_create_from: Vec<(u16, u16)> = Vec::new();
        let map = OrdHashMap::from_par_iter(to_create_from.into_par_iter());
        assert_eq!(map.len(), 0);
    }

    #[test]
    fn from_large_parallel_iter() {
        let to_create_from: Vec<(u8, u8)> = (0..=255).map(|k| (k, !k)).collect();
        let map = OrdHashMap::from_par_iter(to_create_from.into_par_iter());

        let guard = map.guard();
        assert_eq!(map.len(), 256);
        assert_eq!(map.get(&0, &guard), Some(&255));
        assert_eq!(map.range_query(&254, &255, &guard), vec![&1, &0]);
    }
}
