//! Nestable "disable interrupts / restore on exit" critical section.
//!
//! This is the kernel's entire concurrency model: every core registry that
//! touches shared state brackets its mutation with [`IrqGuard::acquire`].
//! The guard is reentrant with interrupt dispatch: it always disables
//! interrupts on acquire, but only re-enables them on drop if the nesting
//! depth has returned to zero and the CPU isn't already servicing an
//! interrupt (tracked via [`set_in_handler`], which the IDT trampoline
//! calls around every handler).

use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

static DEPTH: AtomicUsize = AtomicUsize::new(0);
static IN_HANDLER: AtomicBool = AtomicBool::new(false);

/// Called by the interrupt dispatcher immediately before/after running a
/// handler so [`IrqGuard`] knows not to re-enable interrupts out from under
/// it.
pub fn set_in_handler(value: bool) {
    IN_HANDLER.store(value, Ordering::SeqCst);
}

pub fn in_handler() -> bool {
    IN_HANDLER.load(Ordering::SeqCst)
}

#[must_use]
pub struct IrqGuard {
    was_enabled: bool,
}

impl IrqGuard {
    /// Disables interrupts (if not already disabled by an outer guard) and
    /// returns a handle that restores the previous state on drop.
    #[cfg(not(test))]
    pub fn acquire() -> Self {
        let was_enabled = x86_64::instructions::interrupts::are_enabled();

        x86_64::instructions::interrupts::disable();
        DEPTH.fetch_add(1, Ordering::SeqCst);

        Self { was_enabled }
    }

    /// Host unit tests run as an unprivileged process with no real
    /// interrupts to mask; `cli`/`sti` would fault outside ring 0. Track the
    /// nesting depth without touching the CPU flags.
    #[cfg(test)]
    pub fn acquire() -> Self {
        DEPTH.fetch_add(1, Ordering::SeqCst);
        Self { was_enabled: false }
    }
}

impl Drop for IrqGuard {
    #[cfg(not(test))]
    fn drop(&mut self) {
        let depth = DEPTH.fetch_sub(1, Ordering::SeqCst);

        if depth == 1 && self.was_enabled && !in_handler() {
            x86_64::instructions::interrupts::enable();
        }
    }

    #[cfg(test)]
    fn drop(&mut self) {
        DEPTH.fetch_sub(1, Ordering::SeqCst);
    }
}
