//! Process-wide error taxonomy and panic-level policy.
//!
//! Every fallible core operation returns a `Result<T, Errno>`. In addition,
//! the last error produced is latched into [`LAST_ERRNO`] so that a future
//! syscall boundary can read it back the way `original_source`'s
//! `get_errno()` does.

use spin::Mutex;

use crate::{
    util::sync_cell::SynCell,
    vga::{self, Color, println},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Errno {
    #[error("heap exhausted")]
    ENomem,
    #[error("kernel object not found")]
    ENokobj,
    #[error("internal invariant violated")]
    ECorrupt,
    #[error("no device for given devid")]
    ENodev,
    #[error("driver-reported I/O failure")]
    EIo,
    #[error("permission denied or root-creation attempt")]
    EAccess,
    #[error("operation not permitted by open flags")]
    EBadfd,
    #[error("resource locked / still referenced")]
    EBusy,
    #[error("mount of non-root with empty VFS")]
    ENoroot,
    #[error("filesystem type rejected the device")]
    EInvfs,
    #[error("device id already mounted")]
    EMounted,
    #[error("super-block not currently mounted")]
    ENotmounted,
    #[error("path component missing")]
    ENoent,
    #[error("directory not empty on delete")]
    ENoempty,
    #[error("creation collided with existing object")]
    EExist,
    #[error("directory operation on non-directory")]
    ENodir,
    #[error("fixed-capacity structure full")]
    ELimit,
    #[error("no space for extension")]
    ENospace,
    #[error("defined but not yet implemented")]
    ENotimp,
    #[error("argument out of domain")]
    EInval,
}

static LAST_ERRNO: Mutex<Option<Errno>> = Mutex::new(None);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanicLevel {
    /// Halt the instant any error is set, before the caller even sees the
    /// `Result`.
    Hysterical,
    /// Latch quietly; only [`perror`]'s explicit report-and-maybe-halt path
    /// escalates to a halt.
    Perror,
    /// Only latch the error; let the caller decide what to do. Never halts.
    NoPanic,
}

static PANIC_LEVEL: SynCell<PanicLevel> = SynCell::new(PanicLevel::NoPanic);

pub fn set_panic_level(level: PanicLevel) {
    PANIC_LEVEL.set(level);
}

/// Latches `err` as the last process-wide error. Always returns `err` so
/// call sites can write `return Err(set_errno(Errno::ENoent))`. Only the
/// `Hysterical` panic level escalates this to a halt — every ordinary
/// error path (a missing path, a busy device, ...) goes through here and
/// must not halt the machine by default, matching `original_source`'s
/// `set_errno()`, which panics only when `panic_level <= PANIC_HYSTERICAL`.
pub fn set_errno(err: Errno) -> Errno {
    *LAST_ERRNO.lock() = Some(err);

    if PANIC_LEVEL.get() == PanicLevel::Hysterical {
        halt_on_error(err);
    }

    err
}

pub fn get_errno() -> Option<Errno> {
    *LAST_ERRNO.lock()
}

/// Reports the latched error under `prompt` and, at `Hysterical` or
/// `Perror` panic levels, halts — mirroring `original_source`'s `perror()`,
/// a separate explicit reporting call distinct from `set_errno` itself.
/// Unlike `set_errno`, which every fallible operation calls internally,
/// `perror` is for a caller that wants to surface a *terminal* condition.
pub fn perror(prompt: &str) {
    let Some(err) = get_errno() else { return };

    vga::with_color(Color::LightRed, || println!("{prompt}: {err}"));

    if matches!(PANIC_LEVEL.get(), PanicLevel::Hysterical | PanicLevel::Perror) {
        halt_on_error(err);
    }
}

fn halt_on_error(err: Errno) -> ! {
    panic!("panic level escalated error to halt: {err}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_panic_level_never_halts_on_set_errno() {
        set_panic_level(PanicLevel::NoPanic);
        assert_eq!(set_errno(Errno::ENoent), Errno::ENoent);
        assert_eq!(get_errno(), Some(Errno::ENoent));
        // restore the module-level default so other tests in this process
        // (which share the same static) aren't affected.
        set_panic_level(PanicLevel::NoPanic);
    }
}
