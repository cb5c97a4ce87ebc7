// src/queue.rs

//! FIFO sequencing of asynchronous closures.
//!
//! A [`Queue`] runs enqueued units strictly one at a time, in the order they
//! were enqueued. Each unit receives a [`Completion`] handle and must invoke
//! it exactly once; the next unit starts only after the previous unit's
//! handle has fired.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

type Unit = Box<dyn FnOnce(Completion) + Send + 'static>;

/// Bookkeeping shared between the queue and outstanding completion handles.
struct Inner {
    /// True while a unit has been started and its completion has not fired.
    running: bool,
    /// Units waiting to be serviced, head first.
    pending: VecDeque<Unit>,
}

/// Executes asynchronous closures sequentially, in enqueue order.
///
/// Cloning yields another handle to the same queue. There is no cancellation
/// and no error channel: a unit that never invokes its [`Completion`] stalls
/// the queue permanently. That is a caller contract, not a detected failure.
///
/// ```
/// use taskgroup::Queue;
///
/// let queue = Queue::new();
/// queue.run(|done| {
///     // first
///     done.complete();
/// });
/// queue.run(|done| {
///     // second, never interleaved with the first
///     done.complete();
/// });
/// ```
#[derive(Clone)]
pub struct Queue {
    inner: Arc<Mutex<Inner>>,
}

impl Queue {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                running: false,
                pending: VecDeque::new(),
            })),
        }
    }

    /// Enqueue a unit. If the queue is idle it is serviced immediately,
    /// possibly invoking `unit` before this call returns.
    ///
    /// Units enqueued while another unit is executing are appended and run
    /// after all currently-pending units.
    pub fn run<F>(&self, unit: F)
    where
        F: FnOnce(Completion) + Send + 'static,
    {
        let next = {
            let mut q = self.lock();
            q.pending.push_back(Box::new(unit));
            debug!(pending = q.pending.len(), running = q.running, "unit enqueued");
            if q.running {
                None
            } else {
                q.running = true;
                q.pending.pop_front()
            }
        };

        if let Some(unit) = next {
            self.invoke(unit);
        }
    }

    /// Service the next pending unit, or go idle if there is none.
    ///
    /// Called from [`Completion::complete`]; a unit completing synchronously
    /// drives this recursively, with the lock released around each invocation.
    fn advance(&self) {
        let next = {
            let mut q = self.lock();
            match q.pending.pop_front() {
                Some(unit) => Some(unit),
                None => {
                    q.running = false;
                    None
                }
            }
        };

        match next {
            Some(unit) => self.invoke(unit),
            None => debug!("queue drained; going idle"),
        }
    }

    fn invoke(&self, unit: Unit) {
        unit(Completion {
            queue: self.clone(),
        });
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Queue {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle passed to each unit; consuming it reports that the unit finished.
///
/// The handle is `Send`, so a unit may move it into a spawned task and
/// complete later. Dropping it without calling [`complete`](Self::complete)
/// stalls the queue.
pub struct Completion {
    queue: Queue,
}

impl Completion {
    /// Report the running unit as finished and service the next unit.
    pub fn complete(self) {
        self.queue.advance();
    }
}
