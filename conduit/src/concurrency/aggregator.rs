//! Mutex-guarded result collection and counter shared across workers.
//!
//! Every operation takes the lock, so readers always observe a point-in-time view and no
//! concurrent write is lost. Ordering across writers is whatever order they acquired the lock.
//!
//! Under heavy fan-out a worker can buffer its results locally and merge them with a single
//! [`SharedAggregator::extend`] call, trading a little latency for one lock acquisition per
//! worker instead of one per item.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Recovers the guard of a poisoned lock.
///
/// Each critical section in this module is a single push, extend or read, so a panic in another
/// holder cannot leave the guarded value half-written.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Collection that many workers append to concurrently.
///
/// Clones share the same collection.
#[derive(Debug)]
pub struct SharedAggregator<T> {
    items: Arc<Mutex<Vec<T>>>,
}

impl<T> SharedAggregator<T> {
    /// Creates an empty aggregator.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an empty aggregator with room for `capacity` results.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Arc::new(Mutex::new(Vec::with_capacity(capacity))),
        }
    }

    /// Appends one result.
    pub fn append(&self, item: T) {
        lock(&self.items).push(item);
    }

    /// Appends a locally collected batch under one lock acquisition.
    pub fn extend<I>(&self, items: I)
    where
        I: IntoIterator<Item = T>,
    {
        lock(&self.items).extend(items);
    }

    /// Returns the number of results appended so far.
    pub fn count(&self) -> usize {
        lock(&self.items).len()
    }

    /// Takes the collection out if this is the last handle to it.
    ///
    /// Returns `self` back when other handles are still alive, for example while workers are
    /// still running.
    pub fn into_inner(self) -> Result<Vec<T>, Self> {
        match Arc::try_unwrap(self.items) {
            Ok(mutex) => Ok(mutex.into_inner().unwrap_or_else(PoisonError::into_inner)),
            Err(items) => Err(Self { items }),
        }
    }
}

impl<T: Clone> SharedAggregator<T> {
    /// Returns a copy of every result appended so far.
    pub fn snapshot(&self) -> Vec<T> {
        lock(&self.items).clone()
    }
}

impl<T> Clone for SharedAggregator<T> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
        }
    }
}

impl<T> Default for SharedAggregator<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Non-negative counter behind a mutex.
#[derive(Debug, Clone, Default)]
pub struct SharedCounter {
    value: Arc<Mutex<u64>>,
}

impl SharedCounter {
    /// Creates a counter starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one and returns the new value.
    pub fn increment(&self) -> u64 {
        self.add(1)
    }

    /// Adds `n` and returns the new value.
    pub fn add(&self, n: u64) -> u64 {
        let mut value = lock(&self.value);
        *value += n;
        *value
    }

    /// Returns the current value.
    pub fn get(&self) -> u64 {
        *lock(&self.value)
    }
}
