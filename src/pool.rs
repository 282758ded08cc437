//! Bounded, size-classed reusable buffer pool (C2).
//!
//! Grounded on the locking idiom of `protocol::rpc::transaction_tracker::TransactionTracker`
//! (a `Mutex`-protected map, pruned/managed from ordinary method calls rather
//! than a background task): here a `Mutex<Vec<Vec<u8>>>` per size class plays
//! the same role as a free list.
//!
//! Size classes double starting at `MIN_CLASS_SIZE`. `acquire(len)` returns a
//! buffer from the smallest class `>= len`, allocating fresh if the class's
//! free list is empty and the class is under its retained-buffer cap;
//! `release` returns a buffer to its class's free list, dropping it instead
//! once the cap is reached. Buffers larger than the largest configured class
//! are allocated directly and are never pool-tracked, matching §4.2's
//! "packets allocated outside the pool ... must never be released" rule -
//! callers express this in the type system by only getting a [`PoolHandle`]
//! back from `acquire`, whose `Drop` impl is the only way a buffer re-enters
//! the pool.

use std::sync::Mutex;

const MIN_CLASS_SIZE: usize = 4096;
const NUM_CLASSES: usize = 6; // 4K, 8K, 16K, 32K, 64K, 128K

fn class_size(class: usize) -> usize {
    MIN_CLASS_SIZE << class
}

fn class_for(len: usize) -> Option<usize> {
    (0..NUM_CLASSES).find(|&c| class_size(c) >= len)
}

struct SizeClass {
    free: Mutex<Vec<Vec<u8>>>,
    cap: usize,
}

/// A pool of reusable byte buffers, one free list per size class.
pub struct PacketPool {
    classes: Vec<SizeClass>,
}

impl PacketPool {
    /// `per_class_cap` bounds how many idle buffers each size class retains;
    /// it corresponds to `ServerConfig::packet_pool_size`.
    pub fn new(per_class_cap: usize) -> Self {
        let classes =
            (0..NUM_CLASSES).map(|_| SizeClass { free: Mutex::new(Vec::new()), cap: per_class_cap }).collect();
        PacketPool { classes }
    }

    /// Acquires a zero-length, `len`-capacity buffer. Buffers above the
    /// largest class are allocated fresh and are not pool-backed (`pooled()`
    /// on the returned handle will be `false`).
    pub fn acquire(self: &std::sync::Arc<Self>, len: usize) -> PoolHandle {
        match class_for(len) {
            Some(class) => {
                let mut free = self.classes[class].free.lock().unwrap();
                let mut buf = free.pop().unwrap_or_else(|| Vec::with_capacity(class_size(class)));
                buf.clear();
                PoolHandle { buf: Some(buf), pool: Some(self.clone()), class: Some(class) }
            }
            None => PoolHandle { buf: Some(Vec::with_capacity(len)), pool: None, class: None },
        }
    }

    fn release(&self, class: usize, mut buf: Vec<u8>) {
        let mut free = self.classes[class].free.lock().unwrap();
        if free.len() < self.classes[class].cap {
            buf.clear();
            free.push(buf);
        }
    }
}

/// A buffer on loan from a [`PacketPool`]. Returns to its size class's free
/// list on drop; buffers allocated outside the pool (oversize requests) are
/// simply freed.
pub struct PoolHandle {
    buf: Option<Vec<u8>>,
    pool: Option<std::sync::Arc<PacketPool>>,
    class: Option<usize>,
}

impl PoolHandle {
    pub fn pooled(&self) -> bool {
        self.pool.is_some()
    }
}

impl std::ops::Deref for PoolHandle {
    type Target = Vec<u8>;
    fn deref(&self) -> &Vec<u8> {
        self.buf.as_ref().unwrap()
    }
}

impl std::ops::DerefMut for PoolHandle {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        self.buf.as_mut().unwrap()
    }
}

impl Drop for PoolHandle {
    fn drop(&mut self) {
        if let (Some(pool), Some(class), Some(buf)) =
            (self.pool.take(), self.class.take(), self.buf.take())
        {
            pool.release(class, buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn acquires_smallest_sufficient_class_and_recycles() {
        let pool = Arc::new(PacketPool::new(2));
        {
            let mut h = pool.acquire(100);
            assert!(h.pooled());
            h.extend_from_slice(b"hello");
        }
        // second acquisition of the same class should reuse the freed buffer
        let h2 = pool.acquire(100);
        assert!(h2.pooled());
        assert!(h2.is_empty());
    }

    #[test]
    fn oversize_requests_are_not_pooled() {
        let pool = Arc::new(PacketPool::new(2));
        let h = pool.acquire(10_000_000);
        assert!(!h.pooled());
    }
}
