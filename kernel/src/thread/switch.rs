//! Low-level context switch
//!
//! `switch_context` saves the callee-saved register state on the outgoing
//! thread's stack and stores the stack pointer into its control block, then
//! restores the incoming thread's stack and registers. The saved stack
//! pointer is the first field of [`Thread`], so both sides address it at
//! offset 0.
//!
//! A brand-new thread's stack is prepared by [`prepare_initial_stack`] so
//! that its first switch-in "returns" into [`thread_entry`], which completes
//! the switch, enables interrupts, and calls the thread function.

use core::arch::naked_asm;

use super::Thread;

/// Thread function signature: called once with its aux argument
pub type ThreadFunc = extern "C" fn(usize);

/// Saved-register slots pushed by `switch_context`, newest first
const SAVED_REGS: usize = 6;

/// Bytes reserved on a fresh stack: saved registers plus the return slot
pub(super) const INITIAL_FRAME: usize = (SAVED_REGS + 1) * 8;

/// Switch from `cur` to `next`, returning the thread that was switched away
/// from (as observed by the resuming context).
///
/// # Safety
/// Both pointers must be valid thread records; interrupts must be disabled;
/// `next`'s saved stack must have been produced by a previous switch-out or
/// by `prepare_initial_stack`.
#[unsafe(naked)]
pub(super) unsafe extern "C" fn switch_context(
    cur: *mut Thread,
    next: *mut Thread,
) -> *mut Thread {
    naked_asm!(
        // RDI = cur, RSI = next. Save callee-saved state on the old stack.
        "push rbp",
        "push rbx",
        "push r12",
        "push r13",
        "push r14",
        "push r15",
        // Stash the old stack pointer, adopt the new one.
        "mov [rdi], rsp",
        "mov rsp, [rsi]",
        // The resuming context receives the outgoing thread in RAX.
        "mov rax, rdi",
        "pop r15",
        "pop r14",
        "pop r13",
        "pop r12",
        "pop rbx",
        "pop rbp",
        "ret",
    );
}

/// First code a new thread runs, entered by `switch_context`'s `ret`.
///
/// RAX carries the thread we switched away from; R12/R13 were seeded with
/// the entry function and its argument by `prepare_initial_stack`.
#[unsafe(naked)]
extern "C" fn thread_entry() {
    naked_asm!(
        // Finish the switch we arrived through.
        "mov rdi, rax",
        "call {tail}",
        // New threads start with interrupts off; turn them on before user
        // code runs so the thread can be preempted.
        "sti",
        "mov rdi, r13",
        "call r12",
        // The thread function returned; tear the thread down.
        "call {exit}",
        "ud2",
        tail = sym super::schedule_tail_entry,
        exit = sym thread_exit_entry,
    );
}

extern "C" fn thread_exit_entry() {
    super::exit();
}

/// Lay out the initial stack of a new thread below `stack_top` so that the
/// first `switch_context` into it lands in [`thread_entry`]. Returns the
/// stack pointer to store in the thread record.
///
/// # Safety
/// `stack_top` must be the exclusive top of a writable region at least
/// `INITIAL_FRAME` bytes deep and 16-byte aligned.
pub(super) unsafe fn prepare_initial_stack(
    stack_top: *mut u8,
    function: ThreadFunc,
    aux: usize,
) -> *mut u8 {
    let top = stack_top as *mut usize;

    // Slot layout, matching switch_context's pops followed by ret:
    //   sp+0  r15        sp+24 r12 = function
    //   sp+8  r14        sp+32 rbx
    //   sp+16 r13 = aux  sp+40 rbp
    //   sp+48 return address = thread_entry
    top.offset(-1).write(thread_entry as usize);
    top.offset(-2).write(0); // rbp
    top.offset(-3).write(0); // rbx
    top.offset(-4).write(function as usize); // r12
    top.offset(-5).write(aux); // r13
    top.offset(-6).write(0); // r14
    top.offset(-7).write(0); // r15

    stack_top.sub(INITIAL_FRAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    extern "C" fn nop_thread(_aux: usize) {}

    #[test]
    fn initial_stack_layout() {
        let mut stack = [0usize; 32];
        let top = unsafe { stack.as_mut_ptr().add(32) } as *mut u8;

        let sp = unsafe { prepare_initial_stack(top, nop_thread, 0xBEEF) };

        assert_eq!(top as usize - sp as usize, INITIAL_FRAME);

        let slots = unsafe { core::slice::from_raw_parts(sp as *const usize, 7) };
        assert_eq!(slots[0], 0); // r15
        assert_eq!(slots[1], 0); // r14
        assert_eq!(slots[2], 0xBEEF); // r13 = aux
        assert_eq!(slots[3], nop_thread as usize); // r12 = function
        assert_eq!(slots[4], 0); // rbx
        assert_eq!(slots[5], 0); // rbp
        assert_eq!(slots[6], thread_entry as usize); // return address

        // The frame unwinds completely on the first switch-in, so a
        // page-aligned stack top leaves thread_entry with RSP 16-byte
        // aligned as the SysV ABI expects.
        assert_eq!(INITIAL_FRAME, 7 * 8);
    }
}
