//! Condition variable
//!
//! Monitor-style waiting on top of [`Lock`]. Every waiter brings its own
//! single-shot semaphore, allocated on its stack for exactly the duration
//! of the wait, so signalling can wake one chosen thread.
//!
//! Waiters are kept in priority order, but the order is re-derived at
//! signal time: a donation may have raised a waiter's effective priority
//! while it slept, and the wakeup must honor the priority it has now, not
//! the one it arrived with.

use alloc::collections::VecDeque;
use spin::Mutex;

use crate::interrupts;
use crate::thread::{self, ThreadRef};

use super::lock::Lock;
use super::semaphore::Semaphore;

/// One waiting thread: its wakeup semaphore and its identity, for priority
/// comparisons while it sleeps
struct Waiter {
    semaphore: Semaphore,
    thread: ThreadRef,
}

/// Handle to a waiter record living on the waiting thread's stack. Valid
/// until that thread's `wait` returns, which cannot happen before the
/// record is popped and its semaphore raised.
#[derive(Clone, Copy)]
struct WaiterRef(*const Waiter);

unsafe impl Send for WaiterRef {}

impl WaiterRef {
    fn effective_priority(&self) -> i32 {
        unsafe { (*self.0).thread.get().effective_priority() }
    }
}

/// Condition variable, always used together with a lock
pub struct Condition {
    waiters: Mutex<VecDeque<WaiterRef>>,
}

impl Condition {
    /// Create a condition with no waiters
    pub const fn new() -> Self {
        Self {
            waiters: Mutex::new(VecDeque::new()),
        }
    }

    /// Atomically release `lock` and wait to be signalled, then re-acquire
    /// `lock` before returning.
    ///
    /// The caller must hold `lock`. May sleep, so not callable from an
    /// interrupt handler.
    pub fn wait(&self, lock: &Lock) {
        assert!(!interrupts::in_interrupt_context());
        assert!(lock.held_by_current_thread());

        let waiter = Waiter {
            semaphore: Semaphore::new(0),
            thread: thread::current_ref(),
        };

        {
            let mut waiters = self.waiters.lock();
            let priority = waiter.thread.get().effective_priority();
            let position = waiters
                .iter()
                .position(|w| w.effective_priority() < priority)
                .unwrap_or(waiters.len());
            waiters.insert(position, WaiterRef(&waiter));
        }

        lock.release();
        waiter.semaphore.down();
        lock.acquire();
    }

    /// Wake the waiter with the highest effective priority, if any.
    ///
    /// The caller must hold `lock`. The queue is re-sorted first because
    /// donations may have reordered the waiters since they arrived.
    pub fn signal(&self, lock: &Lock) {
        assert!(lock.held_by_current_thread());

        let front = {
            let mut waiters = self.waiters.lock();
            sort_by_current_priority(&mut waiters);
            waiters.pop_front()
        };

        if let Some(waiter) = front {
            unsafe {
                (*waiter.0).semaphore.up();
            }
        }

        if !interrupts::in_interrupt_context() {
            thread::yield_now();
        }
    }

    /// Wake every waiter, strongest first
    pub fn broadcast(&self, lock: &Lock) {
        assert!(lock.held_by_current_thread());

        while !self.waiters.lock().is_empty() {
            self.signal(lock);
        }
    }
}

/// Order waiters by the effective priority their threads have right now,
/// highest first
fn sort_by_current_priority(waiters: &mut VecDeque<WaiterRef>) {
    waiters
        .make_contiguous()
        .sort_by_key(|w| core::cmp::Reverse(w.effective_priority()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thread::Thread;
    use alloc::boxed::Box;
    use core::ptr;

    fn waiter_for(t: &Thread) -> Waiter {
        Waiter {
            semaphore: Semaphore::new(0),
            thread: ThreadRef(t as *const Thread as *mut Thread),
        }
    }

    #[test]
    fn signal_order_follows_current_priority() {
        let a = Box::new(Thread::new("a", 10, ptr::null_mut()));
        let b = Box::new(Thread::new("b", 20, ptr::null_mut()));
        let c = Box::new(Thread::new("c", 30, ptr::null_mut()));
        let (wa, wb, wc) = (waiter_for(&a), waiter_for(&b), waiter_for(&c));

        let mut waiters = VecDeque::new();
        waiters.push_back(WaiterRef(&wa));
        waiters.push_back(WaiterRef(&wb));
        waiters.push_back(WaiterRef(&wc));

        sort_by_current_priority(&mut waiters);

        let order: alloc::vec::Vec<&str> = waiters
            .iter()
            .map(|w| unsafe { (*w.0).thread.get().name() })
            .collect();
        assert_eq!(order, ["c", "b", "a"]);
    }

    #[test]
    fn a_donation_during_the_wait_moves_the_waiter_forward() {
        let a = Box::new(Thread::new("a", 10, ptr::null_mut()));
        let b = Box::new(Thread::new("b", 20, ptr::null_mut()));
        let c = Box::new(Thread::new("c", 30, ptr::null_mut()));
        let (wa, wb, wc) = (waiter_for(&a), waiter_for(&b), waiter_for(&c));

        let mut waiters = VecDeque::new();
        waiters.push_back(WaiterRef(&wa));
        waiters.push_back(WaiterRef(&wb));
        waiters.push_back(WaiterRef(&wc));

        // The weakest waiter picks up a donation while asleep; the next
        // signal must now go to it.
        a.raise_donated_priority(50);
        sort_by_current_priority(&mut waiters);

        let first = waiters.pop_front().unwrap();
        assert_eq!(unsafe { (*first.0).thread.get().name() }, "a");
    }
}
