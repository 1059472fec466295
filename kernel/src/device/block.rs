//! Block device registry. Symmetric to [`super::char`], keyed the same
//! way; block devices additionally carry a block size reported to the
//! super-block that mounts a filesystem on top of them.

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
    #[allow(dead_code)]
    name: &'static str,
    block_size: usize,
    total_blocks: usize,
    ops: Arc<dyn FileOps>,
}

fn by_devid(item: &Descriptor, key: &DevId) -> bool {
    item.devid == *key
}

lazy_static::lazy_static! {
    static ref REGISTRY: Mutex<List<Descriptor>> = Mutex::new(List::new());
}

/// Registers a block device and publishes it as `/dev/<name>`.
pub fn register_block(
    devid: DevId,
    name: &'static str,
    ops: Arc<dyn FileOps>,
    block_size: usize,
    total_blocks: usize,
) -> Result<(), Errno> {
    let _guard = IrqGuard::acquire();

    {
        let mut registry = REGISTRY.lock();
        if registry.position(&by_devid, &devid).is_some() {
            return Err(set_errno(Errno::EBusy));
        }
        registry.push(Descriptor {
            devid,
            name,
            block_size,
            total_blocks,
            ops,
        });
    }

    let unwind = defer_handle!({
        REGISTRY.lock().find_remove(&by_devid, &devid);
    });

    let mode = Mode::new(FileType::BlockDevice, Perm::USR_READ | Perm::USR_WRITE);
    crate::fs::vfs::get().mknod(&devfs_path(name), mode, devid)?;

    unwind.cancel();
    Ok(())
}

pub fn unregister_block(devid: DevId) -> Result<(), Errno> {
    let _guard = IrqGuard::acquire();
    REGISTRY
        .lock()
        .find_remove(&by_devid, &devid)
        .map(|_| ())
        .ok_or_else(|| set_errno(Errno::ENodev))
}

pub fn lookup_block(devid: DevId) -> Option<(usize, usize)> {
    let _guard = IrqGuard::acquire();
    REGISTRY
        .lock()
        .find(&by_devid, &devid)
        .map(|d| (d.block_size, d.total_blocks))
}

pub fn set_block_operations(devid: DevId) -> Result<Arc<dyn FileOps>, Errno> {
    lookup_block_ops(devid).ok_or_else(|| set_errno(Errno::ENodev))
}

fn lookup_block_ops(devid: DevId) -> Option<Arc<dyn FileOps>> {
    let _guard = IrqGuard::acquire();
    REGISTRY.lock().find(&by_devid, &devid).map(|d| d.ops.clone())
}
