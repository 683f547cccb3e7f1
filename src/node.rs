use std::cmp::Ordering;

/// Key-value entry.
///
/// Removing a key only sets `tombstone`; the slot stays in its chain until the key is
/// inserted again or the directory is rebuilt.
#[derive(Clone, Debug)]
pub(crate) struct Entry<K, V> {
    pub(crate) hash: u64,
    pub(crate) key: K,
    pub(crate) value: V,
    pub(crate) tombstone: bool,
}

impl<K, V> Entry<K, V> {
    #[inline]
    pub(crate) fn is_live(&self) -> bool {
        !self.tombstone
    }

    pub(crate) fn pair(&self) -> (&K, &V) {
        (&self.key, &self.value)
    }
}

/// What [`Chain::insert_or_update`] did.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Upsert<K, V> {
    /// A new slot was added.
    Inserted,
    /// A tombstoned slot for the key was brought back.
    Revived,
    /// The key was live; only its value changed.
    Updated,
    /// Adding a slot would exceed the chain length limit. Nothing was changed and the pair
    /// is handed back.
    NeedsResize(K, V),
}

/// The entries of one bucket, sorted ascending by key.
///
/// Chains are never mutated once published; writers modify a private copy and swap it in.
#[derive(Clone, Debug)]
pub(crate) struct Chain<K, V> {
    entries: Vec<Entry<K, V>>,
}

impl<K, V> Default for Chain<K, V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<K, V> Chain<K, V> {
    pub(crate) fn live(&self) -> impl Iterator<Item = &Entry<K, V>> {
        self.entries.iter().filter(|e| e.is_live())
    }
}

impl<K, V> Chain<K, V>
where
    K: Ord,
{
    /// Number of slots, live and tombstoned.
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, key: &K) -> Result<usize, usize> {
        self.entries.binary_search_by(|e| e.key.cmp(key))
    }

    /// Finds the slot for `key`, whether live or not.
    pub(crate) fn find(&self, key: &K) -> Option<&Entry<K, V>> {
        self.position(key).ok().map(|i| &self.entries[i])
    }

    /// Finds `key` if it is live.
    pub(crate) fn find_live(&self, key: &K) -> Option<&Entry<K, V>> {
        self.find(key).filter(|e| e.is_live())
    }

    pub(crate) fn insert_or_update(
        &mut self,
        hash: u64,
        key: K,
        value: V,
        max_len: usize,
    ) -> Upsert<K, V> {
        match self.position(&key) {
            Ok(i) => {
                let entry = &mut self.entries[i];
                entry.value = value;
                if std::mem::replace(&mut entry.tombstone, false) {
                    Upsert::Revived
                } else {
                    Upsert::Updated
                }
            }
            Err(_) if self.len() >= max_len => Upsert::NeedsResize(key, value),
            Err(i) => {
                self.entries.insert(
                    i,
                    Entry {
                        hash,
                        key,
                        value,
                        tombstone: false,
                    },
                );
                Upsert::Inserted
            }
        }
    }

    /// Tombstones `key`. Returns whether a live entry was found.
    pub(crate) fn remove(&mut self, key: &K) -> bool {
        match self.position(key) {
            Ok(i) if self.entries[i].is_live() => {
                self.entries[i].tombstone = true;
                true
            }
            _ => false,
        }
    }

    /// Places a live entry in sorted position without any length check. Used while rehashing.
    pub(crate) fn push_sorted(&mut self, entry: Entry<K, V>) {
        // rehashing feeds entries in ascending order, so this is almost always an append
        match self.entries.last() {
            Some(last) if last.key.cmp(&entry.key) != Ordering::Less => {
                let i = self.position(&entry.key).unwrap_or_else(|i| i);
                self.entries.insert(i, entry);
            }
            _ => self.entries.push(entry),
        }
    }

    /// Live entries with `start <= key`.
    pub(crate) fn scan_from(&self, start: &K) -> impl Iterator<Item = &Entry<K, V>> {
        let first = self.entries.partition_point(|e| e.key < *start);
        self.entries[first..].iter().filter(|e| e.is_live())
    }

    /// Live entries with `key <= end`.
    pub(crate) fn scan_until(&self, end: &K) -> impl Iterator<Item = &Entry<K, V>> {
        let last = self.entries.partition_point(|e| e.key <= *end);
        self.entries[..last].iter().filter(|e| e.is_live())
    }

    /// Live entries with `start <= key <= end`.
    pub(crate) fn scan_between(&self, start: &K, end: &K) -> impl Iterator<Item = &Entry<K, V>> {
        let first = self.entries.partition_point(|e| e.key < *start);
        let last = self.entries.partition_point(|e| e.key <= *end).max(first);
        self.entries[first..last].iter().filter(|e| e.is_live())
    }
}
