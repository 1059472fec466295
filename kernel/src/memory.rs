//! Kernel heap.
//!
//! The physical frame allocator is out of scope for this kernel (see the
//! top-level module docs): rather than walk a bootloader-provided memory
//! map, the heap backing store is a fixed static array linked into the
//! kernel's BSS. This is enough for `alloc` to work for the VFS, memfs, and
//! device registries, which is all the core subsystems need.
//!
//! Not wired in as `#[global_allocator]` under `#[cfg(test)]`: the host test
//! build already has `std`'s allocator, and our heap is never
//! `init_heap`-ed there anyway.

use linked_list_allocator::LockedHeap;

const HEAP_SIZE: usize = 1024 * 1024;

static mut HEAP: [u8; HEAP_SIZE] = [0; HEAP_SIZE];

#[cfg_attr(not(test), global_allocator)]
static ALLOCATOR: LockedHeap = LockedHeap::empty();

/// Initializes the global allocator over the static heap array. Must only be
/// called once, before any code that touches `alloc` runs.
#[cfg(not(test))]
pub fn init_heap() {
    unsafe {
        #[allow(static_mut_refs)]
        let start = HEAP.as_mut_ptr();
        ALLOCATOR.lock().init(start, HEAP_SIZE);
    }
}
