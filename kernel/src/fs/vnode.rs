//! Vnode cache, keyed by `(sb, vno)`. Nodes are refcounted; a vnode is
//! present in the cache iff its reference count is at least one.
//!
//! The source's prealloc/publish split exists so `read_vnode` can fill a
//! half-built object before it enters the cache. Here the driver instead
//! hands back a complete [`VnodeInit`] describing the vnode (see
//! `superblock::SuperBlockOps::read_vnode`), so there is never a
//! half-constructed `FsNode` visible to anything — strictly safer than the
//! source's approach while preserving the same observable lifecycle.

use alloc::{collections::BTreeMap, sync::Arc};
use spin::Mutex;

use super::{DevId, FsNode, superblock::SuperBlock};
use crate::{errno::Errno, util::irq_guard::IrqGuard};

pub struct VnodeCache {
    nodes: Mutex<BTreeMap<(DevId, u64), Arc<FsNode>>>,
}

impl VnodeCache {
    pub const fn new() -> Self {
        Self {
            nodes: Mutex::new(BTreeMap::new()),
        }
    }

    /// Returns the cached vnode for `(devid, vno)`, acquiring a reference
    /// on it. Reads it in via the super-block's `read_vnode` on a cache
    /// miss.
    pub fn get_or_read(&self, sb: &Arc<Mutex<SuperBlock>>, vno: u64) -> Result<Arc<FsNode>, Errno> {
        let _guard = IrqGuard::acquire();
        let devid = sb.lock().devid;

        if let Some(node) = self.nodes.lock().get(&(devid, vno)) {
            node.acquire();
            return Ok(node.clone());
        }

        let ops = sb.lock().ops();
        let init = ops.read_vnode(&sb.lock(), vno)?;

        let node = Arc::new(FsNode::new(
            vno,
            devid,
            init.mode,
            init.size,
            init.devid,
            init.iops,
            init.fops,
            init.private_data,
        ));

        let mut nodes = self.nodes.lock();
        let node = nodes.entry((devid, vno)).or_insert(node).clone();
        node.acquire();

        Ok(node)
    }

    /// Decrements the vnode's reference count; if it drops to zero, asks
    /// the driver to tear it down and evicts it from the cache.
    pub fn release(&self, sb: &Arc<Mutex<SuperBlock>>, node: &Arc<FsNode>) -> Result<(), Errno> {
        let _guard = IrqGuard::acquire();
        if node.release() > 0 {
            return Ok(());
        }

        let ops = sb.lock().ops();
        ops.destroy_vnode(&sb.lock(), node.vno)?;

        self.nodes.lock().remove(&(node.sb, node.vno));
        Ok(())
    }

    /// True iff any live (refcounted) vnode belongs to `devid`. Used to
    /// enforce that a super-block cannot be unmounted while in use.
    pub fn has_live_vnode(&self, devid: DevId) -> bool {
        let _guard = IrqGuard::acquire();
        self.nodes
            .lock()
            .values()
            .any(|n| n.sb == devid && n.ref_count() > 0)
    }
}
