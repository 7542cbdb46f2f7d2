//! Kernel Heap Allocator
//!
//! Global allocator backed by `linked_list_allocator`, initialized from the
//! Limine memory map once a usable region is known.

use linked_list_allocator::LockedHeap;

/// Global kernel heap allocator
#[cfg(not(test))]
#[global_allocator]
static ALLOCATOR: LockedHeap = LockedHeap::empty();

#[cfg(test)]
static ALLOCATOR: LockedHeap = LockedHeap::empty();

/// Initialize kernel heap at the given address with the given size
///
/// # Safety
/// The region must be unused, writable, and mapped for the kernel's
/// lifetime.
pub unsafe fn init_at(heap_start: usize, heap_size: usize) {
    ALLOCATOR.lock().init(heap_start as *mut u8, heap_size);
}

/// Get used heap space in bytes
pub fn used() -> usize {
    ALLOCATOR.lock().used()
}

/// Get free heap space in bytes
pub fn free() -> usize {
    ALLOCATOR.lock().free()
}
