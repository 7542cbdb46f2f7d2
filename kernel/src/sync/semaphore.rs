//! Counting semaphore
//!
//! The base blocking primitive: threads that find the value at zero park
//! themselves on the waiter list and block. Wakeups pick the waiter with
//! the highest effective priority at that moment, trading FIFO fairness
//! for strict priority.

use alloc::collections::VecDeque;
use core::sync::atomic::{AtomicU32, Ordering};
use spin::Mutex;

use crate::interrupts;
use crate::thread::{self, ThreadRef, take_max_priority};

/// Counting semaphore with a priority-aware wait queue
pub struct Semaphore {
    /// Non-negative counter
    value: AtomicU32,
    /// Blocked threads, appended in arrival order; extraction scans for
    /// the strongest waiter
    waiters: Mutex<VecDeque<ThreadRef>>,
}

impl Semaphore {
    /// Create a semaphore with the given initial value
    pub const fn new(value: u32) -> Self {
        Self {
            value: AtomicU32::new(value),
            waiters: Mutex::new(VecDeque::new()),
        }
    }

    /// Down (P): wait until the value is positive, then decrement it.
    ///
    /// May sleep; not callable from an interrupt handler. Calling with
    /// interrupts already disabled is fine; if the thread sleeps, the next
    /// scheduled thread re-enables them.
    pub fn down(&self) {
        assert!(!interrupts::in_interrupt_context());

        let old_level = interrupts::disable();

        // A wakeup is only a hint. Whoever reaches the re-check first
        // takes the value; everyone else goes back to sleep.
        while self.value.load(Ordering::Relaxed) == 0 {
            self.waiters.lock().push_back(thread::current_ref());
            thread::block();
        }
        self.value.fetch_sub(1, Ordering::Relaxed);

        interrupts::set_level(old_level);
    }

    /// Down (P) without waiting: returns whether the value was positive
    /// and has been decremented. Callable from an interrupt handler.
    pub fn try_down(&self) -> bool {
        let old_level = interrupts::disable();

        let success = if self.value.load(Ordering::Relaxed) > 0 {
            self.value.fetch_sub(1, Ordering::Relaxed);
            true
        } else {
            false
        };

        interrupts::set_level(old_level);
        success
    }

    /// Up (V): increment the value and wake the strongest waiter, if any.
    ///
    /// Callable from an interrupt handler; outside one, the caller yields
    /// so a woken higher-priority thread preempts right away.
    pub fn up(&self) {
        let old_level = interrupts::disable();

        let strongest = take_max_priority(&mut self.waiters.lock());
        if let Some(waiter) = strongest {
            thread::unblock(waiter);
        }
        self.value.fetch_add(1, Ordering::Relaxed);

        interrupts::set_level(old_level);

        if !interrupts::in_interrupt_context() {
            thread::yield_now();
        }
    }

    /// Current value, for diagnostics
    pub fn value(&self) -> u32 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Semaphore self-test: ping-pongs control between the caller and a helper
/// thread ten times.
pub fn self_test() {
    let pair = (Semaphore::new(0), Semaphore::new(0));

    crate::log!("Testing semaphores...");
    let helper = thread::create(
        "sema-test",
        thread::PRI_DEFAULT,
        self_test_helper,
        &pair as *const (Semaphore, Semaphore) as usize,
    );
    assert!(helper.is_some(), "no page for the self-test helper");

    for _ in 0..10 {
        pair.0.up();
        pair.1.down();
    }

    assert_eq!(pair.0.value(), 0);
    assert_eq!(pair.1.value(), 0);
    crate::log!("Semaphore self-test done");
}

extern "C" fn self_test_helper(pair: usize) {
    let pair = unsafe { &*(pair as *const (Semaphore, Semaphore)) };

    for _ in 0..10 {
        pair.0.down();
        pair.1.up();
    }
}
