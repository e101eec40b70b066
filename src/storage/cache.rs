use parking_lot::Mutex;
use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

/// Bounded, thread-safe LRU cache.
///
/// Entries live in an arena of slots linked by integer handles instead of a
/// pointer-linked list; the index maps each key to its slot handle. The whole
/// structure sits behind one mutex — even reads reorder the recency list, so
/// a reader/writer split would buy nothing here.
pub struct LruCache<K, V> {
    inner: Mutex<LruInner<K, V>>,
    capacity: usize,
}

struct Slot<K, V> {
    key: K,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

struct LruInner<K, V> {
    slots: Vec<Slot<K, V>>,
    free: Vec<usize>,
    index: HashMap<K, usize>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl<K, V> LruInner<K, V> {
    fn unlink(&mut self, handle: usize) {
        let (prev, next) = {
            let slot = &self.slots[handle];
            (slot.prev, slot.next)
        };
        match prev {
            Some(p) => self.slots[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.slots[n].prev = prev,
            None => self.tail = prev,
        }
    }

    fn push_front(&mut self, handle: usize) {
        self.slots[handle].prev = None;
        self.slots[handle].next = self.head;
        if let Some(old_head) = self.head {
            self.slots[old_head].prev = Some(handle);
        }
        self.head = Some(handle);
        if self.tail.is_none() {
            self.tail = Some(handle);
        }
    }
}

impl<K: Eq + Hash + Clone, V> LruCache<K, V> {
    /// Creates a cache holding at most `capacity` entries. Zero capacity is
    /// not supported and is bumped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(LruInner {
                slots: Vec::with_capacity(capacity),
                free: Vec::new(),
                index: HashMap::with_capacity(capacity),
                head: None,
                tail: None,
            }),
            capacity,
        }
    }

    /// Looks up `key` and promotes it to most recently used.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
        V: Clone,
    {
        let mut inner = self.inner.lock();
        let handle = *inner.index.get(key)?;
        inner.unlink(handle);
        inner.push_front(handle);
        Some(inner.slots[handle].value.clone())
    }

    /// Inserts or overwrites `key`, promoting it to most recently used and
    /// evicting the least recently used entry if the cache is full.
    pub fn put(&self, key: K, value: V) {
        let mut inner = self.inner.lock();

        if let Some(&handle) = inner.index.get(&key) {
            inner.slots[handle].value = value;
            inner.unlink(handle);
            inner.push_front(handle);
            return;
        }

        if inner.index.len() >= self.capacity
            && let Some(tail) = inner.tail
        {
            inner.unlink(tail);
            let evicted = inner.slots[tail].key.clone();
            inner.index.remove(&evicted);
            // A freed slot keeps its payload until the handle is reused.
            inner.free.push(tail);
        }

        let slot = Slot {
            key: key.clone(),
            value,
            prev: None,
            next: None,
        };
        let handle = match inner.free.pop() {
            Some(handle) => {
                inner.slots[handle] = slot;
                handle
            }
            None => {
                inner.slots.push(slot);
                inner.slots.len() - 1
            }
        };
        inner.index.insert(key, handle);
        inner.push_front(handle);
    }

    /// Drops `key` from the cache, returning whether it was present.
    pub fn remove<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let mut inner = self.inner.lock();
        let Some(handle) = inner.index.remove(key) else {
            return false;
        };
        inner.unlink(handle);
        inner.free.push(handle);
        true
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.inner.lock().index.len()
    }

    /// True when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().index.is_empty()
    }
}
