//! Interrupt Handlers
//!
//! CPU exception handlers plus the timer interrupt that drives preemption.
//! The timer handler runs the scheduler tick and honors a deferred yield
//! request once the handler body is done.

use core::sync::atomic::{AtomicBool, Ordering};
use x86_64::structures::idt::{InterruptStackFrame, PageFaultErrorCode};

use super::pic::{self, PICS};

/// Set while an external interrupt handler body is running
static IN_EXTERNAL_HANDLER: AtomicBool = AtomicBool::new(false);

/// Set by `yield_on_return`; consumed on handler exit
static YIELD_ON_RETURN: AtomicBool = AtomicBool::new(false);

/// True inside an external interrupt handler
pub fn in_external_handler() -> bool {
    IN_EXTERNAL_HANDLER.load(Ordering::Relaxed)
}

/// Request a yield once the running handler returns
pub fn request_yield_on_return() {
    YIELD_ON_RETURN.store(true, Ordering::Relaxed);
}

/// Breakpoint exception handler
pub extern "x86-interrupt" fn breakpoint_handler(stack_frame: InterruptStackFrame) {
    crate::log_warn!("EXCEPTION: BREAKPOINT\n{:#?}", stack_frame);
}

/// Double fault handler (unrecoverable)
pub extern "x86-interrupt" fn double_fault_handler(
    stack_frame: InterruptStackFrame,
    _error_code: u64,
) -> ! {
    panic!("EXCEPTION: DOUBLE FAULT\n{:#?}", stack_frame);
}

/// Page fault handler
pub extern "x86-interrupt" fn page_fault_handler(
    stack_frame: InterruptStackFrame,
    error_code: PageFaultErrorCode,
) {
    use x86_64::registers::control::Cr2;

    panic!(
        "EXCEPTION: PAGE FAULT\n\
        Accessed Address: {:?}\n\
        Error Code: {:?}\n\
        {:#?}",
        Cr2::read(),
        error_code,
        stack_frame
    );
}

/// General protection fault handler
pub extern "x86-interrupt" fn general_protection_fault_handler(
    stack_frame: InterruptStackFrame,
    error_code: u64,
) {
    panic!(
        "EXCEPTION: GENERAL PROTECTION FAULT\n\
        Error Code: {}\n\
        {:#?}",
        error_code, stack_frame
    );
}

/// Invalid opcode handler
pub extern "x86-interrupt" fn invalid_opcode_handler(stack_frame: InterruptStackFrame) {
    panic!("EXCEPTION: INVALID OPCODE\n{:#?}", stack_frame);
}

/// Divide by zero handler
pub extern "x86-interrupt" fn divide_error_handler(stack_frame: InterruptStackFrame) {
    panic!("EXCEPTION: DIVIDE BY ZERO\n{:#?}", stack_frame);
}

/// Timer interrupt handler
///
/// Runs with interrupts disabled on the interrupted thread's kernel stack.
/// If the tick requested preemption, the yield happens here after EOI, once
/// the handler has left interrupt context; the interrupted thread resumes
/// through this frame when it is next scheduled.
pub extern "x86-interrupt" fn timer_interrupt_handler(_stack_frame: InterruptStackFrame) {
    IN_EXTERNAL_HANDLER.store(true, Ordering::Relaxed);

    crate::logger::tick();
    crate::thread::tick();

    unsafe {
        PICS.lock()
            .notify_end_of_interrupt(pic::InterruptIndex::Timer.as_u8());
    }

    IN_EXTERNAL_HANDLER.store(false, Ordering::Relaxed);

    if YIELD_ON_RETURN.swap(false, Ordering::Relaxed) {
        crate::thread::yield_now();
    }
}
