//! Memory Management Subsystem
//!
//! Kernel heap plus the page-granular allocation used for thread records.
//! Each thread owns exactly one 4 KiB page holding its control block and
//! kernel stack.

pub mod heap;

use core::alloc::Layout;
use core::sync::atomic::{AtomicU64, Ordering};

/// Page size (4 KiB)
pub const PAGE_SIZE: usize = 4096;

/// Statistics: thread pages currently live
static THREAD_PAGES: AtomicU64 = AtomicU64::new(0);

/// Initialize the kernel heap over `[heap_start, heap_start + heap_size)`
///
/// # Safety
/// See [`heap::init_at`].
pub unsafe fn init(heap_start: usize, heap_size: usize) {
    heap::init_at(heap_start, heap_size);
    crate::log!(
        "Heap ready: {} KB at {:#x}",
        heap_size / 1024,
        heap_start
    );
}

/// Layout of a thread page: one page, page-aligned
const THREAD_PAGE_LAYOUT: Layout =
    unsafe { Layout::from_size_align_unchecked(PAGE_SIZE, PAGE_SIZE) };

/// Allocate one zeroed, page-aligned page for a thread record and stack.
/// Returns null on exhaustion; the caller reports the failure upward.
pub fn alloc_thread_page() -> *mut u8 {
    let page = unsafe { alloc::alloc::alloc_zeroed(THREAD_PAGE_LAYOUT) };
    if !page.is_null() {
        THREAD_PAGES.fetch_add(1, Ordering::Relaxed);
    }
    page
}

/// Free a page previously returned by [`alloc_thread_page`]
///
/// # Safety
/// `page` must come from `alloc_thread_page` and must not be referenced
/// afterwards.
pub unsafe fn free_thread_page(page: *mut u8) {
    alloc::alloc::dealloc(page, THREAD_PAGE_LAYOUT);
    THREAD_PAGES.fetch_sub(1, Ordering::Relaxed);
}

/// Number of live thread pages
pub fn thread_page_count() -> u64 {
    THREAD_PAGES.load(Ordering::Relaxed)
}
