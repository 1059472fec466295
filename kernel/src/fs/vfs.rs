//! The top-level VFS: ties the filesystem-type registry
//! ([`super::registry`]), super-block registry ([`super::superblock`]),
//! dentry cache ([`super::dentry`]), and vnode cache ([`super::vnode`])
//! together behind a single public API.

use alloc::{collections::BTreeMap, format, sync::Arc};
use core::str::FromStr;

use conquer_once::spin::OnceCell;
use spin::Mutex;

use super::{
    DevId, File, FileDescriptor, FileType, FsNode, Mode, OpenFlags, Perm, Whence,
    dentry::{DentryCache, DentryId},
    path::Path,
    superblock::{self, SuperBlock},
    vnode::VnodeCache,
};
use crate::errno::{Errno, set_errno};

/// Snapshot of a vnode's attributes, returned by [`VirtualFileSystem::stat`].
pub struct Stat {
    pub mode: Mode,
    pub dev: DevId,
    pub size: usize,
    pub vno: u64,
}

pub struct VirtualFileSystem {
    root_dentry: Mutex<Option<DentryId>>,
    dentries: DentryCache,
    vnodes: VnodeCache,
    files: Mutex<BTreeMap<FileDescriptor, Arc<File>>>,
}

impl VirtualFileSystem {
    fn new() -> Self {
        Self {
            root_dentry: Mutex::new(None),
            dentries: DentryCache::new(),
            vnodes: VnodeCache::new(),
            files: Mutex::new(BTreeMap::new()),
        }
    }

    fn sb_of(&self, dentry: DentryId) -> Result<Arc<Mutex<SuperBlock>>, Errno> {
        let devid = if self.dentries.is_mount_point(dentry) {
            self.dentries.mnt_sb(dentry)
        } else {
            self.dentries.sb(dentry)
        }
        .ok_or_else(|| set_errno(Errno::ECorrupt))?;

        superblock::lookup(devid).ok_or_else(|| set_errno(Errno::ECorrupt))
    }

    /// Loads the vnode a dentry refers to. If `dentry` is a mount point, this
    /// is the mounted filesystem's root vnode rather than the dentry's own.
    fn load_vnode(&self, dentry: DentryId) -> Result<(Arc<Mutex<SuperBlock>>, Arc<FsNode>), Errno> {
        let sb = self.sb_of(dentry)?;

        let vno = if self.dentries.is_mount_point(dentry) {
            sb.lock().root_vno
        } else {
            self.dentries.vno(dentry)
        };

        let node = self.vnodes.get_or_read(&sb, vno)?;
        Ok((sb, node))
    }

    fn release_vnode(&self, sb: &Arc<Mutex<SuperBlock>>, node: &Arc<FsNode>) {
        let _ = self.vnodes.release(sb, node);
    }

    /// Path resolution: walks the dentry cache component by component,
    /// calling into the owning driver's `lookup` on a cache miss.
    fn lookup(&self, path: &str) -> Result<DentryId, Errno> {
        let Some(root) = *self.root_dentry.lock() else {
            return Err(set_errno(Errno::ENoroot));
        };

        let path = Path::from_str(path).map_err(|_| set_errno(Errno::EInval))?;

        let mut current = root;
        for component in path.segments() {
            let child = self.dentries.get(current, component)?;

            if self.dentries.vno(child) == 0 {
                let (sb, parent_node) = self.load_vnode(current)?;

                if !parent_node.is_directory() {
                    self.release_vnode(&sb, &parent_node);
                    return Err(set_errno(Errno::ENodir));
                }

                let result = parent_node.iops.lookup(&parent_node, component);
                self.release_vnode(&sb, &parent_node);

                self.dentries.set_vno(child, result?);
            }

            current = child;
        }

        Ok(current)
    }

    /// Resolves every path component but the last, which must name an
    /// existing directory. Returns that directory's dentry and the leaf
    /// name, unresolved.
    fn resolve_parent(&self, path: &Path) -> Result<(DentryId, &str), Errno> {
        let (parent_path, name) = path.split_leaf().ok_or_else(|| set_errno(Errno::EAccess))?;

        let parent = if parent_path.is_root() {
            self.root_dentry.lock().ok_or_else(|| set_errno(Errno::ENoroot))?
        } else {
            let joined = format!("/{}", parent_path.segments().collect::<alloc::vec::Vec<_>>().join("/"));
            self.lookup(&joined)?
        };

        Ok((parent, name))
    }

    /// Creates a new filesystem object at `path`. See the component design
    /// for directory creation / special-file creation.
    fn create_node(&self, path: &str, mode: Mode, devid: DevId) -> Result<DentryId, Errno> {
        let parsed = Path::from_str(path).map_err(|_| set_errno(Errno::EInval))?;
        if parsed.is_root() {
            return Err(set_errno(Errno::EAccess));
        }

        let (parent, name) = self.resolve_parent(&parsed)?;

        let dentry = self.dentries.get(parent, name)?;
        if self.dentries.vno(dentry) != 0 {
            return Err(set_errno(Errno::EExist));
        }

        let (sb, parent_node) = self.load_vnode(parent)?;
        if !parent_node.is_directory() {
            self.dentries.reset_one(dentry);
            self.release_vnode(&sb, &parent_node);
            return Err(set_errno(Errno::ENodir));
        }

        let result = match mode.file_type() {
            FileType::Directory => parent_node.iops.mkdir(&parent_node, name, mode),
            FileType::Regular => parent_node.iops.create(&parent_node, name, mode),
            FileType::CharDevice | FileType::BlockDevice | FileType::Fifo | FileType::Socket => {
                parent_node.iops.mknod(&parent_node, name, mode, devid)
            }
            FileType::Symlink => Err(Errno::ENotimp),
            FileType::Unknown | FileType::Whiteout => Err(Errno::EInval),
        };

        self.release_vnode(&sb, &parent_node);

        match result {
            Ok(vno) => {
                self.dentries.set_vno(dentry, vno);
                Ok(dentry)
            }
            Err(e) => {
                self.dentries.reset_one(dentry);
                Err(set_errno(e))
            }
        }
    }

    /// Mounts the filesystem type `fs_type_name` backed by `devid` at
    /// `path`. `path` must be `"/"` for the very first mount, which
    /// establishes the VFS root; later mounts must target an existing
    /// directory that is not itself already a mount point.
    pub fn mount(&self, devid: DevId, path: &str, fs_type_name: &'static str) -> Result<(), Errno> {
        let target = {
            let mut root = self.root_dentry.lock();

            if root.is_none() {
                if path != "/" {
                    return Err(set_errno(Errno::ENoroot));
                }

                let id = self.dentries.init_root();
                *root = Some(id);
                id
            } else if path == "/" {
                return Err(set_errno(Errno::ENotimp));
            } else {
                drop(root);

                let id = self.lookup(path)?;
                if self.dentries.is_mount_point(id) {
                    return Err(set_errno(Errno::EAccess));
                }

                let (sb, node) = self.load_vnode(id)?;
                let is_dir = node.is_directory();
                self.release_vnode(&sb, &node);

                if !is_dir {
                    return Err(set_errno(Errno::ENodir));
                }

                id
            }
        };

        let fs_type = super::registry::find(fs_type_name).ok_or_else(|| set_errno(Errno::ENokobj))?;
        let sb = superblock::alloc(devid, fs_type_name)?;
        if let Err(e) = (fs_type.get_sb)(&mut sb.lock()) {
            let _ = superblock::dealloc(devid);
            return Err(set_errno(e));
        }

        let ops = sb.lock().ops();
        if let Err(e) = ops.mount(&sb.lock()) {
            let _ = superblock::dealloc(devid);
            return Err(set_errno(e));
        }
        sb.lock().mounted = true;

        self.dentries.set_mounted(target, devid);

        Ok(())
    }

    /// Unmounts the filesystem instance backed by `devid`. Fails with
    /// `EBusy` while any vnode from it is still referenced, or while a
    /// deeper filesystem is mounted somewhere below it.
    pub fn unmount(&self, devid: DevId) -> Result<(), Errno> {
        if self.vnodes.has_live_vnode(devid) {
            return Err(set_errno(Errno::EBusy));
        }

        self.dentries.unmount_sb(devid)?;

        let sb = superblock::lookup(devid).ok_or_else(|| set_errno(Errno::ENotmounted))?;
        let ops = sb.lock().ops();
        ops.unmount(&sb.lock())?;
        superblock::dealloc(devid)?;

        if let Some(mount_point) = self.dentries.find_mount_point(devid) {
            self.dentries.clear_mounted(mount_point);
        }

        Ok(())
    }

    pub fn stat(&self, path: &str) -> Result<Stat, Errno> {
        let dentry = self.lookup(path)?;
        let (sb, node) = self.load_vnode(dentry)?;

        let stat = Stat {
            mode: node.mode,
            dev: node.devid,
            size: *node.size.lock(),
            vno: node.vno,
        };

        self.release_vnode(&sb, &node);
        Ok(stat)
    }

    pub fn mkdir(&self, path: &str, perm: Perm) -> Result<(), Errno> {
        self.create_node(path, Mode::new(FileType::Directory, perm), DevId::ZERO)?;
        Ok(())
    }

    pub fn mknod(&self, path: &str, mode: Mode, devid: DevId) -> Result<(), Errno> {
        self.create_node(path, mode, devid)?;
        Ok(())
    }

    /// Opens `path`. With `O_CREATE` set, a missing path is created as a
    /// regular file; `O_CREATE | O_EXCL` on an existing path fails with
    /// `EExist`.
    pub fn open(&self, path: &str, flags: OpenFlags) -> Result<FileDescriptor, Errno> {
        let dentry = match self.lookup(path) {
            Ok(id) => {
                if flags.contains(OpenFlags::CREATE | OpenFlags::EXCL) {
                    return Err(set_errno(Errno::EExist));
                }
                id
            }
            Err(Errno::ENoent) if flags.contains(OpenFlags::CREATE) => {
                let mode = Mode::new(FileType::Regular, Perm::USR_READ | Perm::USR_WRITE);
                self.create_node(path, mode, DevId::ZERO)?
            }
            Err(e) => return Err(e),
        };

        let (sb, node) = self.load_vnode(dentry)?;

        if flags.contains(OpenFlags::READ) && !node.mode.perm().contains(Perm::USR_READ) {
            self.release_vnode(&sb, &node);
            return Err(set_errno(Errno::EAccess));
        }
        if flags.contains(OpenFlags::WRITE) && !node.mode.perm().contains(Perm::USR_WRITE) {
            self.release_vnode(&sb, &node);
            return Err(set_errno(Errno::EAccess));
        }

        let fops = match node.mode.file_type() {
            FileType::CharDevice => {
                let ops = crate::device::char::set_char_operations(node.devid);
                match ops {
                    Ok(ops) => ops,
                    Err(e) => {
                        self.release_vnode(&sb, &node);
                        return Err(e);
                    }
                }
            }
            FileType::BlockDevice => {
                let ops = crate::device::block::set_block_operations(node.devid);
                match ops {
                    Ok(ops) => ops,
                    Err(e) => {
                        self.release_vnode(&sb, &node);
                        return Err(e);
                    }
                }
            }
            _ => node.fops.clone(),
        };

        let file = Arc::new(File::new(node.clone(), flags, fops.clone()));

        if let Err(e) = fops.open(&node, &file) {
            self.release_vnode(&sb, &node);
            return Err(set_errno(e));
        }

        let fd = FileDescriptor::new();
        self.files.lock().insert(fd, file);

        Ok(fd)
    }

    fn get_file(&self, fd: FileDescriptor) -> Result<Arc<File>, Errno> {
        self.files
            .lock()
            .get(&fd)
            .cloned()
            .ok_or_else(|| set_errno(Errno::EBadfd))
    }

    /// Reads at the file's current position and advances it by the number
    /// of bytes actually read.
    pub fn read(&self, fd: FileDescriptor, buf: &mut [u8]) -> Result<usize, Errno> {
        let file = self.get_file(fd)?;
        if !file.flags.contains(OpenFlags::READ) {
            return Err(set_errno(Errno::EBadfd));
        }

        let mut pos = file.position.lock();
        let n = file.fops.read(&file, *pos, buf)?;
        *pos += n;
        Ok(n)
    }

    /// Returns the next directory entry name, advancing the file's
    /// position; `Ok(None)` signals end of directory.
    pub fn readdir(&self, fd: FileDescriptor) -> Result<Option<Arc<str>>, Errno> {
        let file = self.get_file(fd)?;
        file.fops.readdir(&file)
    }

    /// Writes at the file's current position and advances it by the number
    /// of bytes actually written.
    pub fn write(&self, fd: FileDescriptor, buf: &[u8]) -> Result<usize, Errno> {
        let file = self.get_file(fd)?;
        if !file.flags.contains(OpenFlags::WRITE) {
            return Err(set_errno(Errno::EBadfd));
        }

        let mut pos = file.position.lock();
        let n = file.fops.write(&file, *pos, buf)?;
        *pos += n;
        Ok(n)
    }

    /// Repositions a file's offset. Drivers that need custom seek semantics
    /// (a character device ignoring `Whence::End`, say) can override this
    /// via `FileOps::lseek`; otherwise the generic arithmetic below applies.
    pub fn lseek(&self, fd: FileDescriptor, offset: isize, whence: Whence) -> Result<usize, Errno> {
        let file = self.get_file(fd)?;

        if let Some(result) = file.fops.lseek(&file, offset, whence) {
            return result.map_err(set_errno);
        }

        let size = *file.vnode.size.lock();
        let mut pos = file.position.lock();

        let base = match whence {
            Whence::Set => 0isize,
            Whence::Cur => *pos as isize,
            Whence::End => size as isize,
        };

        let new_pos = base
            .checked_add(offset)
            .filter(|p| *p >= 0)
            .ok_or_else(|| set_errno(Errno::EInval))?;

        *pos = new_pos as usize;
        Ok(*pos)
    }

    /// Flushes, releases on last close, and removes the descriptor.
    pub fn close(&self, fd: FileDescriptor) -> Result<(), Errno> {
        let file = self
            .files
            .lock()
            .remove(&fd)
            .ok_or_else(|| set_errno(Errno::ENokobj))?;

        file.fops.flush(&file)?;

        let Some(sb) = superblock::lookup(file.vnode.sb) else {
            return Err(set_errno(Errno::ECorrupt));
        };

        if file.vnode.ref_count() <= 1 {
            file.fops.release(&file)?;
        }

        self.release_vnode(&sb, &file.vnode);
        Ok(())
    }
}

static VFS: OnceCell<VirtualFileSystem> = OnceCell::uninit();

/// Brings up the VFS: mounts rootfs at `/`, then devfs at `/dev`.
pub fn init() {
    let vfs = VFS.get_or_init(VirtualFileSystem::new);

    super::memfs::rootfs_init().expect("failed to register rootfs");
    vfs.mount(DevId::new(0, 1), "/", "rootfs")
        .expect("failed to mount rootfs");

    vfs.mkdir("/dev", Perm::USR_READ | Perm::USR_WRITE | Perm::USR_EXEC)
        .expect("failed to create /dev mount point");

    super::memfs::devfs_init().expect("failed to register devfs");
    vfs.mount(DevId::new(0, 2), "/dev", "devfs")
        .expect("failed to mount devfs");
}

pub fn get() -> &'static VirtualFileSystem {
    VFS.get().expect("VFS not yet initialized")
}

#[cfg(test)]
extern crate std;

#[cfg(test)]
mod tests {
    //! One end-to-end test walking the seed scenarios from the spec: boot,
    //! a memfs regular-file write/lseek/read round trip, and the device
    //! special-file invariants (stat, permission-gated open, missing-path
    //! errors). Kept as a single test rather than several independent ones
    //! since every assertion below exercises the same process-wide VFS/
    //! device-registry singletons (see `crate::fs::vfs::VFS`) — splitting
    //! them would just reintroduce the ordering this test is pinning down.
    use super::*;
    use crate::fs::{DevId, FileType};

    #[test]
    fn seed_scenarios_end_to_end() {
        crate::fs::init();
        let vfs = get();

        // 1. boot: rootfs mounted at "/", root vnode is a directory with
        // the sentinel/root ino of 1.
        let root_stat = vfs.stat("/").unwrap();
        assert!(root_stat.mode.is_directory());
        assert_eq!(root_stat.vno, 1);

        // 2. create, write, seek back, and read the bytes written.
        let fd = vfs
            .open("/a.txt", OpenFlags::READ | OpenFlags::WRITE | OpenFlags::CREATE)
            .unwrap();
        assert_eq!(vfs.write(fd, b"hello").unwrap(), 5);
        assert_eq!(vfs.lseek(fd, 0, Whence::Set).unwrap(), 0);
        let mut buf = [0u8; 5];
        assert_eq!(vfs.read(fd, &mut buf).unwrap(), 5);
        assert_eq!(&buf, b"hello");
        vfs.close(fd).unwrap();

        // 3. devfs publishes the built-in rtc driver as a read-only char
        // device at the expected (major, minor) devid.
        let rtc_stat = vfs.stat("/dev/rtc").unwrap();
        assert_eq!(rtc_stat.mode.file_type(), FileType::CharDevice);
        assert_eq!(rtc_stat.dev, DevId::new(13, 17));
        assert!(rtc_stat.mode.perm().contains(Perm::USR_READ));
        assert!(!rtc_stat.mode.perm().contains(Perm::USR_WRITE));

        // 4. opening it for write is rejected: the driver never registered
        // a write op, so devfs's published mode has no USR_WRITE bit.
        let err = vfs.open("/dev/rtc", OpenFlags::WRITE).unwrap_err();
        assert_eq!(err, Errno::EAccess);

        // 5. opening a path that doesn't exist fails lookup.
        let err = vfs.open("/dev/nope", OpenFlags::READ).unwrap_err();
        assert_eq!(err, Errno::ENoent);

        // 6. mounting onto a path that doesn't exist fails the same way,
        // before the filesystem-type lookup is even consulted.
        let err = vfs.mount(DevId::new(9, 9), "/nonexistent", "rootfs").unwrap_err();
        assert_eq!(err, Errno::ENoent);
    }
}
