//! In-memory filesystem driver. A single driver backs any number of
//! independent instances (up to [`crate::limits::MEMFS_MAX_INSTANCES`]),
//! distinguished by device id; rootfs and devfs are both memfs instances.

use alloc::{
    collections::BTreeMap,
    sync::Arc,
    vec::Vec,
};
use core::sync::atomic::{AtomicU64, Ordering};

use spin::Mutex;

use super::{
    DevId, FileOps, FileType, FsNode, Mode, NodeOps, Perm,
    superblock::{SuperBlock, SuperBlockOps, VnodeInit},
};
use crate::{
    errno::{Errno, set_errno},
    util::irq_guard::IrqGuard,
};

bitflags::bitflags! {
    /// Which kinds of child a memfs instance's directories may create.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CreateFlags: u8 {
        const DIR     = 0b001;
        const REGULAR = 0b010;
        const DEVNODE = 0b100;
    }
}

struct Node {
    mode: Mode,
    /// Meaningful only for device-node children; `DevId::ZERO` otherwise.
    devid: DevId,
    data: Vec<u8>,
    dentries: Vec<(alloc::string::String, u64)>,
}

impl Node {
    fn directory(mode: Mode) -> Self {
        Self {
            mode,
            devid: DevId::ZERO,
            data: Vec::new(),
            dentries: Vec::new(),
        }
    }

    fn leaf(mode: Mode, devid: DevId) -> Self {
        Self {
            mode,
            devid,
            data: Vec::new(),
            dentries: Vec::new(),
        }
    }
}

struct Instance {
    name: &'static str,
    devid: DevId,
    flags: CreateFlags,
    last_ino: AtomicU64,
    nodes: Mutex<BTreeMap<u64, Node>>,
}

impl Instance {
    fn alloc_ino(&self) -> u64 {
        self.last_ino.fetch_add(1, Ordering::SeqCst)
    }
}

lazy_static::lazy_static! {
    static ref INSTANCES: Mutex<Vec<Option<Arc<Instance>>>> =
        Mutex::new((0..crate::limits::MEMFS_MAX_INSTANCES).map(|_| None).collect());
}

fn find_instance(devid: DevId) -> Option<Arc<Instance>> {
    INSTANCES
        .lock()
        .iter()
        .flatten()
        .find(|i| i.devid == devid)
        .cloned()
}

/// Allocates a memfs instance for `devid` and registers a matching
/// filesystem type named `name`. Fails with `ELimit` if the instance table
/// is full, or `EMounted` if `devid` is already in use.
pub fn create(name: &'static str, devid: DevId, flags: CreateFlags) -> Result<(), Errno> {
    let _guard = IrqGuard::acquire();
    let mut slots = INSTANCES.lock();

    if slots.iter().flatten().any(|i| i.devid == devid) {
        return Err(set_errno(Errno::EMounted));
    }

    let Some(free) = slots.iter().position(Option::is_none) else {
        return Err(set_errno(Errno::ELimit));
    };

    let instance = Arc::new(Instance {
        name,
        devid,
        flags,
        last_ino: AtomicU64::new(2),
        nodes: Mutex::new(BTreeMap::new()),
    });

    let root_mode = Mode::new(
        FileType::Directory,
        Perm::USR_READ | Perm::USR_WRITE | Perm::USR_EXEC | Perm::GRP_READ | Perm::GRP_EXEC | Perm::OTH_READ | Perm::OTH_EXEC,
    );
    instance.nodes.lock().insert(1, Node::directory(root_mode));

    slots[free] = Some(instance);
    drop(slots);

    let result = super::registry::register(name, |builder| {
        builder.get_sb(move |sb| {
            if find_instance(devid).is_none() {
                return Err(Errno::ENokobj);
            }
            sb.root_vno = 1;
            sb.total_blocks = 0;
            sb.max_file_size = crate::limits::MEMFS_MAX_FILE_SIZE;
            sb.ops = Some(Arc::new(MemfsSuperBlockOps) as Arc<dyn SuperBlockOps>);
            Ok(())
        });

        builder.kill_sb(move |sb| {
            let _guard = IrqGuard::acquire();
            let mut slots = INSTANCES.lock();
            if let Some(slot) = slots.iter_mut().find(|s| s.as_ref().is_some_and(|i| i.devid == sb.devid)) {
                *slot = None;
            }
            Ok(())
        });

        Ok(())
    });

    if result.is_err() {
        INSTANCES.lock()[free] = None;
    }

    result
}

/// Convenience wrapper used at boot to bring up the root filesystem.
pub fn rootfs_init() -> Result<(), Errno> {
    create(
        "rootfs",
        DevId::new(0, 1),
        CreateFlags::DIR | CreateFlags::REGULAR | CreateFlags::DEVNODE,
    )
}

/// Convenience wrapper used at boot to bring up `/dev`'s backing store.
pub fn devfs_init() -> Result<(), Errno> {
    create("devfs", DevId::new(0, 2), CreateFlags::DIR | CreateFlags::DEVNODE)
}

struct MemfsSuperBlockOps;

impl SuperBlockOps for MemfsSuperBlockOps {
    fn read_vnode(&self, sb: &SuperBlock, vno: u64) -> Result<VnodeInit, Errno> {
        let instance = find_instance(sb.devid).ok_or_else(|| set_errno(Errno::ENokobj))?;
        let nodes = instance.nodes.lock();
        let node = nodes.get(&vno).ok_or_else(|| set_errno(Errno::ENoent))?;

        let (iops, fops): (Arc<dyn NodeOps>, Arc<dyn FileOps>) = match node.mode.file_type() {
            FileType::Directory => (Arc::new(MemfsNodeOps), Arc::new(MemfsDirFileOps)),
            FileType::Regular => (Arc::new(MemfsNodeOps), Arc::new(MemfsRegularFileOps)),
            _ => (Arc::new(MemfsNodeOps), Arc::new(MemfsLeafFileOps)),
        };

        Ok(VnodeInit {
            mode: node.mode,
            size: node.data.len(),
            devid: node.devid,
            iops,
            fops,
            private_data: None,
        })
    }
}

struct MemfsNodeOps;

impl MemfsNodeOps {
    fn check_create_allowed(instance: &Instance, mode: Mode) -> Result<(), Errno> {
        let allowed = match mode.file_type() {
            FileType::Directory => instance.flags.contains(CreateFlags::DIR),
            FileType::Regular => instance.flags.contains(CreateFlags::REGULAR),
            FileType::CharDevice | FileType::BlockDevice | FileType::Fifo | FileType::Socket => {
                instance.flags.contains(CreateFlags::DEVNODE)
            }
            _ => false,
        };

        if allowed { Ok(()) } else { Err(Errno::ENotimp) }
    }

    fn alloc_and_link(dir: &FsNode, name: &str, mode: Mode, devid: DevId) -> Result<u64, Errno> {
        let instance = find_instance(dir.sb).ok_or(Errno::ENokobj)?;
        Self::check_create_allowed(&instance, mode)?;

        let ino = instance.alloc_ino();
        let node = if mode.is_directory() {
            Node::directory(mode)
        } else {
            Node::leaf(mode, devid)
        };

        let mut nodes = instance.nodes.lock();
        nodes.insert(ino, node);

        let Some(parent) = nodes.get_mut(&dir.vno) else {
            nodes.remove(&ino);
            return Err(Errno::ENokobj);
        };
        parent.dentries.push((name.into(), ino));

        Ok(ino)
    }
}

impl NodeOps for MemfsNodeOps {
    fn lookup(&self, dir: &FsNode, name: &str) -> Result<u64, Errno> {
        let instance = find_instance(dir.sb).ok_or_else(|| set_errno(Errno::ENokobj))?;
        let nodes = instance.nodes.lock();
        let parent = nodes.get(&dir.vno).ok_or_else(|| set_errno(Errno::ENoent))?;

        parent
            .dentries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, ino)| *ino)
            .ok_or_else(|| set_errno(Errno::ENoent))
    }

    fn create(&self, dir: &FsNode, name: &str, mode: Mode) -> Result<u64, Errno> {
        let mode = Mode::new(FileType::Regular, mode.perm());
        Self::alloc_and_link(dir, name, mode, DevId::ZERO).map_err(set_errno)
    }

    fn mkdir(&self, dir: &FsNode, name: &str, mode: Mode) -> Result<u64, Errno> {
        let mode = Mode::new(FileType::Directory, mode.perm());
        Self::alloc_and_link(dir, name, mode, DevId::ZERO).map_err(set_errno)
    }

    fn mknod(&self, dir: &FsNode, name: &str, mode: Mode, devid: DevId) -> Result<u64, Errno> {
        Self::alloc_and_link(dir, name, mode, devid).map_err(set_errno)
    }
}

struct MemfsRegularFileOps;

impl FileOps for MemfsRegularFileOps {
    fn read(&self, file: &super::File, offset: usize, buf: &mut [u8]) -> Result<usize, Errno> {
        let instance = find_instance(file.vnode.sb).ok_or_else(|| set_errno(Errno::ENokobj))?;
        let nodes = instance.nodes.lock();
        let node = nodes.get(&file.vnode.vno).ok_or_else(|| set_errno(Errno::ENoent))?;

        if offset >= node.data.len() {
            return Ok(0);
        }

        let n = buf.len().min(node.data.len() - offset);
        buf[..n].copy_from_slice(&node.data[offset..offset + n]);
        Ok(n)
    }

    fn write(&self, file: &super::File, offset: usize, buf: &[u8]) -> Result<usize, Errno> {
        let instance = find_instance(file.vnode.sb).ok_or_else(|| set_errno(Errno::ENokobj))?;
        let mut nodes = instance.nodes.lock();
        let node = nodes.get_mut(&file.vnode.vno).ok_or_else(|| set_errno(Errno::ENoent))?;

        let needed = offset + buf.len();
        if needed > crate::limits::MEMFS_MAX_FILE_SIZE {
            return Err(set_errno(Errno::ENospace));
        }
        if needed > node.data.len() {
            node.data.resize(needed, 0);
        }
        node.data[offset..needed].copy_from_slice(buf);

        *file.vnode.size.lock() = node.data.len();
        Ok(buf.len())
    }
}

struct MemfsDirFileOps;

impl FileOps for MemfsDirFileOps {
    fn readdir(&self, file: &super::File) -> Result<Option<Arc<str>>, Errno> {
        let instance = find_instance(file.vnode.sb).ok_or_else(|| set_errno(Errno::ENokobj))?;
        let nodes = instance.nodes.lock();
        let node = nodes.get(&file.vnode.vno).ok_or_else(|| set_errno(Errno::ENoent))?;

        let mut pos = file.position.lock();
        let Some((name, _)) = node.dentries.get(*pos) else {
            return Ok(None);
        };

        *pos += 1;
        Ok(Some(Arc::from(name.as_str())))
    }
}

/// File operations for device-node vnodes before the device registry
/// substitutes the driver's own table on open (see
/// [`crate::device::char::set_char_operations`]).
struct MemfsLeafFileOps;

impl FileOps for MemfsLeafFileOps {}

#[cfg(test)]
extern crate std;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_rejects_duplicate_devid() {
        let devid = DevId::new(9, 1);
        create("tfs-a", devid, CreateFlags::DIR).unwrap();
        let err = create("tfs-b", devid, CreateFlags::DIR);
        assert!(err.is_err());

        // cleanup so other tests in this process don't see a stale instance
        INSTANCES.lock().iter_mut().for_each(|s| {
            if s.as_ref().is_some_and(|i| i.devid == devid) {
                *s = None;
            }
        });
    }
}
