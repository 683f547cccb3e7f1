use ordhash::hasher::Identity;
use ordhash::OrdHashMap;

fn tiny() -> OrdHashMap<u32, u32> {
    OrdHashMap::builder()
        .initial_buckets(2)
        .chain_length_max(2)
        .concurrency_level(4)
        .hasher(Identity::with_bits(16))
        .build()
        .unwrap()
}

#[test]
fn bucket_order_follows_key_order() {
    let map = tiny();
    let guard = map.guard();
    let keys: Vec<u32> = (0..2000).map(|k| k * 31).collect();

    let mut last_bits = map.i_bits();
    for &k in &keys {
        map.insert(k, k, &guard).unwrap();
        if map.i_bits() != last_bits {
            last_bits = map.i_bits();
            // at every width the map passes through, buckets stay sorted by key
            let buckets: Vec<usize> = keys.iter().map(|k| map.bucket_of(k)).collect();
            assert!(buckets.windows(2).all(|w| w[0] <= w[1]));
        }
    }
    assert!(map.resize_count() >= 3);
    assert_eq!(map.bucket_count(), 1 << map.i_bits());
}

#[test]
fn resize_is_transparent() {
    let map = tiny();
    let guard = map.guard();

    // fill without crossing a resize
    let mut inserted = Vec::new();
    let mut k = 0u32;
    loop {
        let before = map.resize_count();
        map.insert(k, k + 1, &guard).unwrap();
        if map.resize_count() != before {
            // k itself was inserted after the resize
            break;
        }
        inserted.push(k);
        k += 1000;
    }
    let contains: Vec<bool> = inserted.iter().map(|k| map.contains(k, &guard)).collect();
    assert!(contains.iter().all(|&c| c));

    let snapshot = |map: &OrdHashMap<u32, u32>| -> Vec<(u32, u32)> {
        let guard = map.guard();
        map.range_entries(&0, &(k - 1), &guard)
            .into_iter()
            .map(|(k, v)| (*k, *v))
            .collect()
    };
    let before = snapshot(&map);
    assert_eq!(before.len(), inserted.len());

    // force several more resizes with keys outside the snapshot range
    let resizes = map.resize_count();
    let mut extra = k + 1;
    while map.resize_count() < resizes + 3 {
        map.insert(extra, 0, &guard).unwrap();
        extra += 1;
    }

    assert_eq!(snapshot(&map), before);
    for key in &inserted {
        assert!(map.contains(key, &guard));
        assert_eq!(map.get(key, &guard), Some(&(key + 1)));
    }
}

#[test]
fn tombstones_are_dropped_on_resize() {
    let map = tiny();
    let guard = map.guard();
    for k in [0u32, 1] {
        map.insert(k, k, &guard).unwrap();
    }
    assert!(map.remove(&1, &guard));
    // bucket 0 is full of slots, one of them dead; a third key forces growth
    map.insert(2, 2, &guard).unwrap();
    assert_eq!(map.resize_count(), 1);
    assert!(!map.contains(&1, &guard));
    assert_eq!(map.range_query(&0, &2, &guard), vec![&0, &2]);
    // the tombstone did not survive, so this is a fresh insert
    assert_eq!(map.insert(1, 10, &guard).unwrap(), ordhash::Inserted::New);
}

#[test]
fn range_across_many_buckets() {
    let map = tiny();
    let guard = map.guard();
    for k in (0..4096u32).step_by(3) {
        map.insert(k, k, &guard).unwrap();
    }
    for k in (0..4096u32).step_by(6) {
        map.remove(&k, &guard);
    }

    let got: Vec<u32> = map
        .range_query(&100, &3000, &guard)
        .into_iter()
        .copied()
        .collect();
    let want: Vec<u32> = (100..=3000).filter(|k| k % 3 == 0 && k % 6 != 0).collect();
    assert_eq!(got, want);

    // bounds that are not themselves keys
    let got: Vec<u32> = map.range_query(&4, &8, &guard).into_iter().copied().collect();
    assert_eq!(got, vec![]);
    let got: Vec<u32> = map.range_query(&2, &9, &guard).into_iter().copied().collect();
    assert_eq!(got, vec![3, 9]);
}

#[test]
fn range_bounds_past_hash_width() {
    let map = OrdHashMap::<u32, u32>::builder()
        .hasher(Identity::with_bits(8))
        .build()
        .unwrap();
    let guard = map.guard();
    for k in 0..=255u32 {
        map.insert(k, k, &guard).unwrap();
    }
    assert_eq!(map.bucket_count(), 16);

    let got: Vec<u32> = map.range_query(&200, &300, &guard).into_iter().copied().collect();
    assert_eq!(got, (200..=255).collect::<Vec<_>>());
    assert_eq!(map.range_query(&10, &300, &guard).len(), 246);
    assert!(map.range_query(&256, &300, &guard).is_empty());

    // a key past the width sorts into the last bucket, after every narrower key
    map.insert(1000, 1000, &guard).unwrap();
    assert_eq!(map.bucket_of(&1000), map.bucket_count() - 1);
    let got: Vec<u32> = map.range_query(&250, &2000, &guard).into_iter().copied().collect();
    assert_eq!(got, vec![250, 251, 252, 253, 254, 255, 1000]);
    assert!(map.contains(&1000, &guard));
}
