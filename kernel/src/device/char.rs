//! Character device registry.

use alloc::sync::Arc;

use spin::Mutex;

use super::devfs_path;
use crate::{
    errno::{Errno, set_errno},
    fs::{DevId, FileOps, FileType, Mode, Perm},
    list::List,
    util::{defer::defer_handle, irq_guard::IrqGuard},
};

struct Descriptor {
    devid: DevId,
    name: &'static str,
    ops: Arc<dyn FileOps>,
}

fn by_devid(item: &Descriptor, key: &DevId) -> bool {
    item.devid == *key
}

lazy_static::lazy_static! {
    static ref REGISTRY: Mutex<List<Descriptor>> = Mutex::new(List::new());
}

/// Registers a character device and publishes it as `/dev/<name>`. Fails
/// with `EBusy` if a driver is already registered for `devid`. `readable`/
/// `writable` determine the permission bits of the published special file,
/// since a trait object can't be inspected for which methods a driver
/// actually overrides.
pub fn register_char(
    devid: DevId,
    name: &'static str,
    ops: Arc<dyn FileOps>,
    readable: bool,
    writable: bool,
) -> Result<(), Errno> {
    let _guard = IrqGuard::acquire();

    {
        let mut registry = REGISTRY.lock();
        if registry.position(&by_devid, &devid).is_some() {
            return Err(set_errno(Errno::EBusy));
        }
        registry.push(Descriptor { devid, name, ops });
    }

    let unwind = defer_handle!({
        REGISTRY.lock().find_remove(&by_devid, &devid);
    });

    let mut perm = Perm::empty();
    if readable {
        perm |= Perm::USR_READ;
    }
    if writable {
        perm |= Perm::USR_WRITE;
    }

    let mode = Mode::new(FileType::CharDevice, perm);
    crate::fs::vfs::get().mknod(&devfs_path(name), mode, devid)?;

    unwind.cancel();
    Ok(())
}

/// Unregisters a character device. Fails with `ENodev` if none is
/// registered for `devid`.
pub fn unregister_char(devid: DevId) -> Result<(), Errno> {
    let _guard = IrqGuard::acquire();
    REGISTRY
        .lock()
        .find_remove(&by_devid, &devid)
        .map(|_| ())
        .ok_or_else(|| set_errno(Errno::ENodev))
}

pub fn lookup_char(devid: DevId) -> Option<Arc<dyn FileOps>> {
    let _guard = IrqGuard::acquire();
    REGISTRY.lock().find(&by_devid, &devid).map(|d| d.ops.clone())
}

/// Called by the VFS when a char-device vnode is opened for the first
/// time: copies the device's operation table onto the open file so
/// subsequent reads/writes/ioctls go to the driver instead of the
/// backing filesystem's (nonexistent) leaf file operations.
pub fn set_char_operations(devid: DevId) -> Result<Arc<dyn FileOps>, Errno> {
    lookup_char(devid).ok_or_else(|| set_errno(Errno::ENodev))
}
