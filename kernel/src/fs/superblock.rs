//! Super-block registry: one entry per mounted (or about to be mounted)
//! filesystem instance, keyed by device id.

use alloc::{boxed::Box, sync::Arc, vec::Vec};
use core::any::Any;

use spin::Mutex;

use super::{DevId, FileOps, Mode, NodeOps};
use crate::{
    errno::{Errno, set_errno},
    limits::DEFAULT_BLOCK_SIZE,
    util::irq_guard::IrqGuard,
};

/// What a driver's `read_vnode` hands back to populate a freshly
/// preallocated vnode.
pub struct VnodeInit {
    pub mode: Mode,
    pub size: usize,
    pub devid: DevId,
    pub iops: Arc<dyn NodeOps>,
    pub fops: Arc<dyn FileOps>,
    pub private_data: Option<Box<dyn Any + Send + Sync>>,
}

/// Super-block operation contract a filesystem driver fulfils via
/// `get_sb`. All but `read_vnode` default to no-ops, per the spec's
/// resolution that `destroy_vnode`/`write_vnode`/`delete_vnode` are
/// optional.
pub trait SuperBlockOps: Send + Sync {
    fn read_vnode(&self, sb: &SuperBlock, vno: u64) -> Result<VnodeInit, Errno>;

    fn destroy_vnode(&self, _sb: &SuperBlock, _vno: u64) -> Result<(), Errno> {
        Ok(())
    }

    fn write_vnode(&self, _sb: &SuperBlock, _vno: u64) -> Result<(), Errno> {
        Ok(())
    }

    fn delete_vnode(&self, _sb: &SuperBlock, _vno: u64) -> Result<(), Errno> {
        Ok(())
    }

    fn mount(&self, _sb: &SuperBlock) -> Result<(), Errno> {
        Ok(())
    }

    fn unmount(&self, _sb: &SuperBlock) -> Result<(), Errno> {
        Ok(())
    }
}

pub struct SuperBlock {
    pub devid: DevId,
    pub fs_type_name: &'static str,
    pub block_size: usize,
    pub total_blocks: usize,
    pub max_file_size: usize,
    pub dirty: bool,
    pub mounted: bool,
    pub root_vno: u64,
    pub ops: Option<Arc<dyn SuperBlockOps>>,
    pub private_data: Option<Box<dyn Any + Send + Sync>>,
}

impl SuperBlock {
    fn new(devid: DevId, fs_type_name: &'static str) -> Self {
        Self {
            devid,
            fs_type_name,
            block_size: DEFAULT_BLOCK_SIZE,
            total_blocks: 0,
            max_file_size: 0,
            dirty: false,
            mounted: false,
            root_vno: 0,
            ops: None,
            private_data: None,
        }
    }

    pub fn ops(&self) -> Arc<dyn SuperBlockOps> {
        self.ops
            .clone()
            .expect("super-block operations fixed at mount time, before this is reachable")
    }
}

static SB_REGISTRY: Mutex<Vec<Arc<Mutex<SuperBlock>>>> = Mutex::new(Vec::new());

/// Allocates a fresh super-block entry for `devid`. Fails with `E_MOUNTED`
/// if one is already registered for this device id.
pub fn alloc(devid: DevId, fs_type_name: &'static str) -> Result<Arc<Mutex<SuperBlock>>, Errno> {
    let _guard = IrqGuard::acquire();
    let mut registry = SB_REGISTRY.lock();

    if registry.iter().any(|sb| sb.lock().devid == devid) {
        return Err(set_errno(Errno::EMounted));
    }

    let sb = Arc::new(Mutex::new(SuperBlock::new(devid, fs_type_name)));
    registry.push(sb.clone());

    Ok(sb)
}

pub fn lookup(devid: DevId) -> Option<Arc<Mutex<SuperBlock>>> {
    let _guard = IrqGuard::acquire();
    SB_REGISTRY
        .lock()
        .iter()
        .find(|sb| sb.lock().devid == devid)
        .cloned()
}

/// Tears down and removes the super-block for `devid`, invoking its
/// filesystem type's `kill_sb`.
pub fn dealloc(devid: DevId) -> Result<(), Errno> {
    let _guard = IrqGuard::acquire();
    let mut registry = SB_REGISTRY.lock();

    let pos = registry
        .iter()
        .position(|sb| sb.lock().devid == devid)
        .ok_or_else(|| set_errno(Errno::ENokobj))?;

    let sb = registry.remove(pos);
    let fs_type_name = sb.lock().fs_type_name;

    let fs_type = super::registry::find(fs_type_name).ok_or_else(|| set_errno(Errno::ENokobj))?;
    (fs_type.kill_sb)(&sb.lock())
}
