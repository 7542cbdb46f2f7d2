//! Interrupt Handling Subsystem
//!
//! Loads the IDT, programs the PIC, and exposes the interrupt gate the
//! scheduler synchronizes against: interrupt masking is the kernel's only
//! mutual-exclusion primitive below the thread layer.

mod handlers;
mod pic;

use lazy_static::lazy_static;
use x86_64::structures::idt::InterruptDescriptorTable;

lazy_static! {
    /// Interrupt Descriptor Table
    static ref IDT: InterruptDescriptorTable = {
        let mut idt = InterruptDescriptorTable::new();

        // CPU exceptions
        idt.breakpoint.set_handler_fn(handlers::breakpoint_handler);
        unsafe {
            idt.double_fault
                .set_handler_fn(handlers::double_fault_handler)
                .set_stack_index(crate::gdt::DOUBLE_FAULT_IST_INDEX);
        }
        idt.page_fault.set_handler_fn(handlers::page_fault_handler);
        idt.general_protection_fault
            .set_handler_fn(handlers::general_protection_fault_handler);
        idt.invalid_opcode
            .set_handler_fn(handlers::invalid_opcode_handler);
        idt.divide_error
            .set_handler_fn(handlers::divide_error_handler);

        // Hardware interrupts
        idt[pic::InterruptIndex::Timer.as_u8()]
            .set_handler_fn(handlers::timer_interrupt_handler);

        idt
    };
}

/// Interrupt state of the CPU
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Interrupts enabled
    On,
    /// Interrupts disabled
    Off,
}

/// Load the IDT and program the PIC. Interrupts stay masked; the thread
/// subsystem enables them once the idle thread exists.
pub fn init() {
    IDT.load();

    unsafe {
        pic::PICS.lock().initialize();
    }

    crate::log_debug!("IDT loaded, PIC initialized, timer unmasked");
}

/// Current interrupt level
pub fn level() -> Level {
    if x86_64::instructions::interrupts::are_enabled() {
        Level::On
    } else {
        Level::Off
    }
}

/// Disable interrupts, returning the prior level
pub fn disable() -> Level {
    let old = level();
    x86_64::instructions::interrupts::disable();
    old
}

/// Enable interrupts, returning the prior level. Must not be called from an
/// interrupt handler.
pub fn enable() -> Level {
    assert!(!in_interrupt_context());

    let old = level();
    x86_64::instructions::interrupts::enable();
    old
}

/// Set the interrupt level, returning the prior one. Nested guards compose
/// by snapshot-and-restore of the previous level.
pub fn set_level(new_level: Level) -> Level {
    match new_level {
        Level::On => enable(),
        Level::Off => disable(),
    }
}

/// True while an external interrupt handler is running
pub fn in_interrupt_context() -> bool {
    handlers::in_external_handler()
}

/// Ask the dispatcher to yield the interrupted thread once the running
/// handler returns. Only meaningful from interrupt context.
pub fn yield_on_return() {
    assert!(in_interrupt_context());
    handlers::request_yield_on_return();
}

/// Disable interrupts and run a closure, restoring the prior level after
pub fn without_interrupts<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    let old = disable();
    let ret = f();
    set_level(old);
    ret
}
