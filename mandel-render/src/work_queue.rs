//! Bounded blocking FIFO for handing work to a fixed set of threads.
//!
//! Like a sync channel with many receivers, except that the producer
//! closes it explicitly rather than by dropping a handle, and consumers
//! can report progress through the completed count.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Condvar, Mutex, MutexGuard,
    },
};

/// A FIFO with a maximum length.
///
/// `push` blocks while the queue is full; `pop` blocks while it is empty
/// and not yet finished. Once finished, the queue still hands out whatever
/// it holds, then reports `None`.
pub struct WorkQueue<T> {
    state: Mutex<State<T>>,
    /// Signalled when an item is pushed or the queue is finished.
    not_empty: Condvar,
    /// Signalled when an item is popped or the queue is finished.
    not_full: Condvar,
    capacity: usize,
    completed: AtomicUsize,
}

struct State<T> {
    items: VecDeque<T>,
    finished: bool,
}

impl<T> WorkQueue<T> {
    /// Creates a queue that holds at most `capacity` items (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        WorkQueue {
            state: Mutex::new(State {
                items: VecDeque::with_capacity(capacity),
                finished: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
            completed: AtomicUsize::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends an item, blocking while the queue is full.
    ///
    /// Gives the item back if the queue has been finished.
    pub fn push(&self, item: T) -> Result<(), T> {
        let mut g = match self.lock() {
            Some(g) => g,
            None => return Err(item),
        };
        loop {
            if g.finished {
                return Err(item);
            }
            if g.items.len() < self.capacity {
                break;
            }
            g = match self.not_full.wait(g) {
                Ok(g) => g,
                Err(_) => return Err(item),
            };
        }
        g.items.push_back(item);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Removes the oldest item, blocking while the queue is empty.
    ///
    /// Returns `None` once the queue is finished and drained.
    pub fn pop(&self) -> Option<T> {
        let mut g = self.lock()?;
        loop {
            if let Some(item) = g.items.pop_front() {
                self.not_full.notify_one();
                return Some(item);
            }
            if g.finished {
                return None;
            }
            g = self.not_empty.wait(g).ok()?;
        }
    }

    /// Closes the queue to new items and wakes every blocked thread.
    /// Calling this more than once has no further effect.
    pub fn mark_finished(&self) {
        if let Some(mut g) = self.lock() {
            g.finished = true;
        }
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    pub fn is_finished(&self) -> bool {
        self.lock().map(|g| g.finished).unwrap_or(true)
    }

    /// Number of items currently waiting.
    pub fn len(&self) -> usize {
        self.lock().map(|g| g.items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records that a consumer finished processing an item.
    pub fn complete_one(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of items consumers have reported complete.
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }

    /// Locks the state. A poisoned lock means some holder panicked;
    /// the queue is treated as closed from then on.
    fn lock(&self) -> Option<MutexGuard<'_, State<T>>> {
        match self.state.lock() {
            Err(_) => None,
            Ok(g) => Some(g),
        }
    }
}
