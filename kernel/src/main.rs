//! Kestrel Kernel
//!
//! A preemptive, strict-priority thread kernel with priority donation.
//! Boots via the Limine bootloader on x86_64.

#![cfg_attr(not(test), no_std)]
#![cfg_attr(not(test), no_main)]
#![feature(abi_x86_interrupt)]
#![feature(alloc_error_handler)]

extern crate alloc;

mod gdt;
mod interrupts;
mod logger;
mod memory;
mod serial;
mod sync;
mod thread;

use core::alloc::Layout;
use core::panic::PanicInfo;

use limine::BaseRevision;
use limine::request::{
    ExecutableFileRequest, HhdmRequest, MemoryMapRequest, RequestsEndMarker,
    RequestsStartMarker,
};

/// Heap size: plenty for thread pages and queues
const HEAP_SIZE: u64 = 16 * 1024 * 1024;

// ============================================================================
// Limine Protocol Requests
// ============================================================================

/// Limine requests start marker
#[used]
#[unsafe(link_section = ".requests_start_marker")]
static _START_MARKER: RequestsStartMarker = RequestsStartMarker::new();

/// Limine base revision - ensures protocol compatibility
#[used]
#[unsafe(link_section = ".requests")]
static BASE_REVISION: BaseRevision = BaseRevision::new();

/// Request memory map from Limine for heap placement
#[used]
#[unsafe(link_section = ".requests")]
static MEMORY_MAP_REQUEST: MemoryMapRequest = MemoryMapRequest::new();

/// Request higher half direct map offset for physical memory access
#[used]
#[unsafe(link_section = ".requests")]
static HHDM_REQUEST: HhdmRequest = HhdmRequest::new();

/// Request our own executable file, for the kernel command line
#[used]
#[unsafe(link_section = ".requests")]
static EXECUTABLE_FILE_REQUEST: ExecutableFileRequest = ExecutableFileRequest::new();

/// Limine requests end marker
#[used]
#[unsafe(link_section = ".requests_end_marker")]
static _END_MARKER: RequestsEndMarker = RequestsEndMarker::new();

// ============================================================================
// Kernel Entry Point
// ============================================================================

/// Kernel entry point - called by Limine with interrupts disabled
#[cfg(not(test))]
#[no_mangle]
pub unsafe extern "C" fn kmain() -> ! {
    serial::init();
    serial_println!("Kestrel kernel v0.1.0");

    if !BASE_REVISION.is_supported() {
        serial_println!("unsupported Limine revision");
        halt_loop();
    }

    gdt::init();
    interrupts::init();

    init_heap();

    if let Some(cmdline) = kernel_cmdline() {
        if mlfqs_requested(cmdline) {
            thread::set_mlfqs(true);
            thread::set_nice(0);
            log!(
                "MLFQS hook armed (nice={} load_avg={} recent_cpu={}); strict priority stays active",
                thread::get_nice(),
                thread::get_load_avg(),
                thread::get_recent_cpu()
            );
        }
    }

    thread::init();
    thread::start();
    log!("Scheduler running, preemption armed");

    sync::semaphore::self_test();
    priority_demo();
    condition_demo();

    interrupts::without_interrupts(|| {
        log!("Live threads:");
        thread::foreach(|t| log!("  {:?}", t));
    });
    log!(
        "{} thread pages live, heap {} KB used / {} KB free",
        memory::thread_page_count(),
        memory::heap::used() / 1024,
        memory::heap::free() / 1024
    );
    thread::print_stats();
    log!("Boot thread idling");
    halt_loop();
}

/// Place the heap in the largest usable region of the Limine memory map,
/// addressed through the higher-half direct map.
#[cfg(not(test))]
fn init_heap() {
    let mmap = MEMORY_MAP_REQUEST
        .get_response()
        .expect("Limine did not provide a memory map");
    let hhdm_offset = HHDM_REQUEST
        .get_response()
        .map(|r| r.offset())
        .unwrap_or(0);

    let mut best_base: u64 = 0;
    let mut best_len: u64 = 0;
    for entry in mmap.entries() {
        if entry.entry_type != limine::memory_map::EntryType::USABLE {
            continue;
        }
        if entry.length > best_len {
            best_base = entry.base;
            best_len = entry.length;
        }
    }
    assert!(best_len >= HEAP_SIZE, "no usable region large enough for the heap");

    // Stay above the legacy low-memory area.
    let heap_phys = best_base.max(0x10_0000);
    unsafe {
        memory::init((hhdm_offset + heap_phys) as usize, HEAP_SIZE as usize);
    }
}

/// Kernel command line as passed by the bootloader
#[cfg(not(test))]
fn kernel_cmdline() -> Option<&'static str> {
    let file = EXECUTABLE_FILE_REQUEST.get_response()?.file();
    core::str::from_utf8(file.cmdline()).ok()
}

/// True when the command line selects the MLFQS hook (`-o mlfqs`)
fn mlfqs_requested(cmdline: &str) -> bool {
    let mut tokens = cmdline.split_whitespace();
    while let Some(token) = tokens.next() {
        if token == "-o" && tokens.next() == Some("mlfqs") {
            return true;
        }
    }
    false
}

// ============================================================================
// Scheduling demonstrations
// ============================================================================

/// Show strict priority off the boot path. The low-priority worker is
/// spawned first but runs only after the high-priority one has exited.
fn priority_demo() {
    log!("Priority demo: spawning workers at priority 20 and 40");
    let lo = thread::create("worker-lo", 20, demo_worker, 3);
    let hi = thread::create("worker-hi", 40, demo_worker, 3);
    assert!(lo.is_some() && hi.is_some(), "no pages for demo workers");

    // Drop below the workers until both have exited.
    thread::set_priority(thread::PRI_MIN);
    thread::set_priority(thread::PRI_DEFAULT);
    log!("Priority demo done");
}

extern "C" fn demo_worker(rounds: usize) {
    for round in 0..rounds {
        log!(
            "{} (tid {}, priority {}) round {}",
            thread::name(),
            thread::tid(),
            thread::get_priority(),
            round
        );
        thread::yield_now();
    }
}

static DEMO_LOCK: sync::Lock = sync::Lock::new();
static DEMO_COND: sync::Condition = sync::Condition::new();

/// Park three waiters of different priorities on a condition, then wake
/// them. Signal and broadcast both drain strongest-first.
fn condition_demo() {
    log!("Condition demo: waiters wake strongest first");
    for (name, priority) in [("cond-lo", 10), ("cond-mid", 20), ("cond-hi", 30)] {
        let created = thread::create(name, priority, condition_waiter, 0);
        assert!(created.is_some(), "no page for a condition waiter");
    }

    // Step below the waiters so all three park on the condition.
    thread::set_priority(thread::PRI_MIN);
    thread::set_priority(thread::PRI_DEFAULT);

    DEMO_LOCK.acquire();
    DEMO_COND.signal(&DEMO_LOCK);
    DEMO_COND.broadcast(&DEMO_LOCK);
    DEMO_LOCK.release();

    // Step down again so the woken waiters drain before we report.
    thread::set_priority(thread::PRI_MIN);
    thread::set_priority(thread::PRI_DEFAULT);
    log!("Condition demo done");
}

extern "C" fn condition_waiter(_aux: usize) {
    DEMO_LOCK.acquire();
    DEMO_COND.wait(&DEMO_LOCK);
    log!("{} woke at priority {}", thread::name(), thread::get_priority());
    DEMO_LOCK.release();
}

// ============================================================================
// Fatal paths
// ============================================================================

fn halt_loop() -> ! {
    loop {
        x86_64::instructions::hlt();
    }
}

/// Panic handler - contract violations halt the kernel here
#[cfg(not(test))]
#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    x86_64::instructions::interrupts::disable();
    serial_println!("\n!!! KERNEL PANIC !!!");
    serial_println!("{}", info);
    halt_loop();
}

#[cfg(not(test))]
#[alloc_error_handler]
fn alloc_error(layout: Layout) -> ! {
    serial_println!("\n!!! ALLOC ERROR !!!");
    serial_println!("layout: size={}, align={}", layout.size(), layout.align());
    halt_loop();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mlfqs_flag_parses_the_pair_of_tokens() {
        assert!(mlfqs_requested("-o mlfqs"));
        assert!(mlfqs_requested("console=ttyS0 -o mlfqs quiet"));
        assert!(!mlfqs_requested(""));
        assert!(!mlfqs_requested("mlfqs"));
        assert!(!mlfqs_requested("-o priority"));
        assert!(!mlfqs_requested("-omlfqs"));
    }
}
