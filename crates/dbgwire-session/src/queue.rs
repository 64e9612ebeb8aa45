use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;

/// Lock a mutex, recovering the data if a callback panicked while holding it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Ordered queue of framed messages waiting for the output pump.
///
/// Once [`terminate`](Self::terminate) is called the queue is emptied and
/// refuses new messages until [`reset`](Self::reset).
#[derive(Debug, Default)]
pub struct OutgoingQueue {
    state: Mutex<QueueState>,
    ready: Condvar,
}

#[derive(Debug, Default)]
struct QueueState {
    messages: VecDeque<Bytes>,
    terminating: bool,
}

impl OutgoingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept messages again; used when a new client attaches.
    pub fn reset(&self) {
        let mut state = lock(&self.state);
        state.terminating = false;
        state.messages.clear();
    }

    /// Append a framed message and wake the pump.
    ///
    /// Returns `false` (dropping the message) if the queue is terminating.
    pub fn push(&self, frame: Bytes) -> bool {
        let mut state = lock(&self.state);
        if state.terminating {
            return false;
        }
        state.messages.push_back(frame);
        self.ready.notify_all();
        true
    }

    /// Drop pending messages and wake every waiter for shutdown.
    pub fn terminate(&self) {
        let mut state = lock(&self.state);
        state.terminating = true;
        state.messages.clear();
        self.ready.notify_all();
    }

    /// Block until messages are queued or the queue terminates.
    ///
    /// Returns every queued message at once, in enqueue order, or `None`
    /// once terminating. Termination wins over pending messages.
    pub fn next_batch(&self) -> Option<VecDeque<Bytes>> {
        let mut state = lock(&self.state);
        while !state.terminating && state.messages.is_empty() {
            state = self
                .ready
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        if state.terminating {
            return None;
        }
        Some(std::mem::take(&mut state.messages))
    }

    /// Number of messages waiting.
    pub fn len(&self) -> usize {
        lock(&self.state).messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_terminating(&self) -> bool {
        lock(&self.state).terminating
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[test]
    fn batch_preserves_order() {
        let queue = OutgoingQueue::new();
        for n in 0..5 {
            assert!(queue.push(Bytes::from(format!("{n}"))));
        }

        let batch = queue.next_batch().unwrap();
        let order: Vec<_> = batch.iter().map(|b| b.as_ref().to_vec()).collect();
        assert_eq!(order, vec![b"0", b"1", b"2", b"3", b"4"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn terminate_clears_and_refuses() {
        let queue = OutgoingQueue::new();
        queue.push(Bytes::from_static(b"pending"));
        queue.terminate();

        assert!(queue.is_empty());
        assert!(!queue.push(Bytes::from_static(b"late")));
        assert!(queue.is_empty());
        assert!(queue.next_batch().is_none());
    }

    #[test]
    fn reset_accepts_again() {
        let queue = OutgoingQueue::new();
        queue.terminate();
        queue.reset();

        assert!(!queue.is_terminating());
        assert!(queue.push(Bytes::from_static(b"again")));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn push_wakes_waiter() {
        let queue = Arc::new(OutgoingQueue::new());
        let waiter = {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || queue.next_batch())
        };

        std::thread::sleep(Duration::from_millis(20));
        queue.push(Bytes::from_static(b"wake"));

        let batch = waiter.join().unwrap().unwrap();
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn terminate_wakes_waiter() {
        let queue = Arc::new(OutgoingQueue::new());
        let waiter = {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || queue.next_batch())
        };

        std::thread::sleep(Duration::from_millis(20));
        queue.terminate();

        assert!(waiter.join().unwrap().is_none());
    }
}
