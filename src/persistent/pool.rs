//! A bounded free list of traversal stacks.
//!
//! Owning enumerators keep their ancestor stack in a `Vec`. Rather than
//! allocating a fresh buffer for every enumeration, they borrow one from a
//! [`NodeStackPool`] shared by every version of a collection and hand it back
//! when dropped.
//!
//! The pool never blocks. If the free list is contended or empty, a fresh
//! stack is allocated; if it is contended or full on release, the stack is
//! simply dropped. Pooling is purely an allocation optimization: enumeration
//! behaves identically with or without it.

use log::trace;
use parking_lot::Mutex;

/// Initial capacity of a freshly allocated stack. An AVL tree of height 32
/// already holds millions of payloads.
pub(crate) const POOL_STACK_CAPACITY: usize = 32;

/// Number of idle stacks a pool keeps by default.
pub(crate) const DEFAULT_POOL_SIZE: usize = 16;

/// Thread-safe, bounded free list of reusable stacks.
pub(crate) struct NodeStackPool<H> {
    free: Mutex<Vec<Vec<H>>>,
    max_idle: usize,
}

impl<H> NodeStackPool<H> {
    /// Creates a pool keeping at most [`DEFAULT_POOL_SIZE`] idle stacks.
    pub(crate) fn new() -> Self {
        Self::with_capacity(DEFAULT_POOL_SIZE)
    }

    /// Creates a pool keeping at most `max_idle` idle stacks.
    pub(crate) fn with_capacity(max_idle: usize) -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            max_idle,
        }
    }

    /// Takes an empty stack from the pool, allocating one if none is
    /// available right now.
    pub(crate) fn acquire(&self) -> Vec<H> {
        let pooled = self.free.try_lock().and_then(|mut free| free.pop());
        pooled.unwrap_or_else(|| {
            trace!("node stack pool miss, allocating a stack of {POOL_STACK_CAPACITY}");
            Vec::with_capacity(POOL_STACK_CAPACITY)
        })
    }

    /// Returns a stack to the pool. Its contents are dropped first.
    pub(crate) fn release(&self, mut stack: Vec<H>) {
        stack.clear();
        if stack.capacity() == 0 {
            return;
        }
        match self.free.try_lock() {
            Some(mut free) if free.len() < self.max_idle => free.push(stack),
            _ => trace!("node stack pool full or busy, dropping a released stack"),
        }
    }

    /// Number of idle stacks currently held.
    pub(crate) fn available(&self) -> usize {
        self.free.lock().len()
    }
}

impl<H> Default for NodeStackPool<H> {
    fn default() -> Self {
        Self::new()
    }
}
