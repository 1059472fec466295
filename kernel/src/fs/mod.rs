//! Core VFS vocabulary: file mode/type, device ids, the inode- and
//! file-operation traits, and the vnode/open-file types shared by every
//! layer above the concrete filesystem drivers.

use alloc::{boxed::Box, sync::Arc};
use core::{
    any::Any,
    sync::atomic::{AtomicU64, AtomicUsize, Ordering},
};

use spin::Mutex;

use crate::errno::Errno;

pub mod dentry;
pub mod memfs;
pub mod path;
pub mod registry;
pub mod superblock;
pub mod vfs;
pub mod vnode;

/// 16-bit `(major << 8) | minor` device identifier. `ZERO` is the "no
/// device" sentinel used on non-device files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DevId(u16);

impl DevId {
    pub const ZERO: Self = Self(0);

    pub const fn new(major: u8, minor: u8) -> Self {
        Self(((major as u16) << 8) | minor as u16)
    }

    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    pub const fn major(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub const fn minor(self) -> u8 {
        (self.0 & 0x00ff) as u8
    }

    pub const fn as_u16(self) -> u16 {
        self.0
    }
}

/// High nibble of a [`Mode`]: what kind of object this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FileType {
    Unknown = 0,
    Fifo = 1,
    CharDevice = 2,
    Directory = 3,
    BlockDevice = 4,
    Regular = 5,
    Symlink = 6,
    Socket = 7,
    Whiteout = 8,
}

impl FileType {
    const fn from_nibble(nibble: u8) -> Self {
        match nibble {
            1 => Self::Fifo,
            2 => Self::CharDevice,
            3 => Self::Directory,
            4 => Self::BlockDevice,
            5 => Self::Regular,
            6 => Self::Symlink,
            7 => Self::Socket,
            8 => Self::Whiteout,
            _ => Self::Unknown,
        }
    }
}

bitflags::bitflags! {
    /// Low 12 bits of a [`Mode`]: POSIX permission bits plus setuid/setgid/
    /// sticky.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Perm: u16 {
        const USR_READ  = 0o0400;
        const USR_WRITE = 0o0200;
        const USR_EXEC  = 0o0100;
        const GRP_READ  = 0o0040;
        const GRP_WRITE = 0o0020;
        const GRP_EXEC  = 0o0010;
        const OTH_READ  = 0o0004;
        const OTH_WRITE = 0o0002;
        const OTH_EXEC  = 0o0001;
        const SETUID    = 0o4000;
        const SETGID    = 0o2000;
        const STICKY    = 0o1000;
    }
}

/// 16-bit file mode: file-type nibble in the top bits, permission bits in
/// the bottom 12. A mode of all zeroes means "uninitialized".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mode(u16);

impl Mode {
    pub const UNINIT: Self = Self(0);

    pub const fn new(file_type: FileType, perm: Perm) -> Self {
        Self(((file_type as u16) << 12) | (perm.bits() & 0x0fff))
    }

    pub const fn file_type(self) -> FileType {
        FileType::from_nibble((self.0 >> 12) as u8)
    }

    pub const fn perm(self) -> Perm {
        Perm::from_bits_truncate(self.0 & 0x0fff)
    }

    pub const fn as_u16(self) -> u16 {
        self.0
    }

    pub const fn is_directory(self) -> bool {
        matches!(self.file_type(), FileType::Directory)
    }
}

bitflags::bitflags! {
    /// Flags passed to [`vfs::VirtualFileSystem::open`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenFlags: u32 {
        const READ    = 0b00001;
        const WRITE   = 0b00010;
        const CREATE  = 0b00100;
        const EXCL    = 0b01000;
        const TRUNC   = 0b10000;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Set,
    Cur,
    End,
}

/// Inode-operation table. Required for every vnode that can act as a
/// directory; all three creation hooks default to "not implemented" since
/// not every driver supports creating children (and memfs itself only
/// allows the ones its instance flags permit).
pub trait NodeOps: Send + Sync {
    /// Resolves `name` within this directory vnode to a vno.
    fn lookup(&self, dir: &FsNode, name: &str) -> Result<u64, Errno>;

    fn create(&self, _dir: &FsNode, _name: &str, _mode: Mode) -> Result<u64, Errno> {
        Err(Errno::ENotimp)
    }

    fn mkdir(&self, _dir: &FsNode, _name: &str, _mode: Mode) -> Result<u64, Errno> {
        Err(Errno::ENotimp)
    }

    fn mknod(&self, _dir: &FsNode, _name: &str, _mode: Mode, _devid: DevId) -> Result<u64, Errno> {
        Err(Errno::ENotimp)
    }
}

/// File-operation table. `open`/`release`/`flush` default to no-ops;
/// `read`/`write`/`ioctl`/`readdir` default to "not implemented" since
/// they are only required for the corresponding `OpenFlags`; `lseek`
/// returns `None` by default so the VFS performs the generic offset math
/// itself.
pub trait FileOps: Send + Sync {
    fn open(&self, _node: &Arc<FsNode>, _file: &File) -> Result<(), Errno> {
        Ok(())
    }

    fn release(&self, _file: &File) -> Result<(), Errno> {
        Ok(())
    }

    fn flush(&self, _file: &File) -> Result<(), Errno> {
        Ok(())
    }

    fn read(&self, _file: &File, _offset: usize, _buf: &mut [u8]) -> Result<usize, Errno> {
        Err(Errno::ENotimp)
    }

    fn write(&self, _file: &File, _offset: usize, _buf: &[u8]) -> Result<usize, Errno> {
        Err(Errno::ENotimp)
    }

    fn lseek(&self, _file: &File, _offset: isize, _whence: Whence) -> Option<Result<usize, Errno>> {
        None
    }

    fn ioctl(&self, _file: &File, _cmd: u32, _arg: usize) -> Result<usize, Errno> {
        Err(Errno::ENotimp)
    }

    /// Returns the entry at the file's current position and advances it;
    /// `Ok(None)` signals end of directory.
    fn readdir(&self, _file: &File) -> Result<Option<Arc<str>>, Errno> {
        Err(Errno::ENotimp)
    }
}

/// An in-memory view of one filesystem object, identified by the pair
/// `(sb, vno)`. Operation tables are fixed at publication (set once by
/// `read_vnode` when the vnode enters the cache).
pub struct FsNode {
    pub vno: u64,
    pub sb: DevId,
    pub mode: Mode,
    pub size: Mutex<usize>,
    pub devid: DevId,
    pub iops: Arc<dyn NodeOps>,
    pub fops: Arc<dyn FileOps>,
    pub private_data: Option<Box<dyn Any + Send + Sync>>,
    refcount: AtomicUsize,
}

impl FsNode {
    pub fn new(
        vno: u64,
        sb: DevId,
        mode: Mode,
        size: usize,
        devid: DevId,
        iops: Arc<dyn NodeOps>,
        fops: Arc<dyn FileOps>,
        private_data: Option<Box<dyn Any + Send + Sync>>,
    ) -> Self {
        Self {
            vno,
            sb,
            mode,
            size: Mutex::new(size),
            devid,
            iops,
            fops,
            private_data,
            refcount: AtomicUsize::new(0),
        }
    }

    #[track_caller]
    pub fn data_as<T: 'static>(&self) -> &T {
        self.private_data
            .as_ref()
            .expect("FsNode has no private data")
            .downcast_ref::<T>()
            .expect("FsNode private data type mismatch")
    }

    pub fn is_directory(&self) -> bool {
        self.mode.is_directory()
    }

    pub(crate) fn acquire(&self) -> usize {
        self.refcount.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn release(&self) -> usize {
        self.refcount.fetch_sub(1, Ordering::SeqCst) - 1
    }

    pub fn ref_count(&self) -> usize {
        self.refcount.load(Ordering::SeqCst)
    }
}

/// Represents one opening of a vnode.
pub struct File {
    pub vnode: Arc<FsNode>,
    pub flags: OpenFlags,
    pub fops: Arc<dyn FileOps>,
    pub position: Mutex<usize>,
    pub private_data: Mutex<Option<Box<dyn Any + Send + Sync>>>,
    /// Reserved for future file descriptors sharing this open file.
    refcount: AtomicUsize,
}

impl File {
    pub fn new(vnode: Arc<FsNode>, flags: OpenFlags, fops: Arc<dyn FileOps>) -> Self {
        Self {
            vnode,
            flags,
            fops,
            position: Mutex::new(0),
            private_data: Mutex::new(None),
            refcount: AtomicUsize::new(1),
        }
    }
}

/// Uniquely identifies an open file in the open-file registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileDescriptor(u64);

impl FileDescriptor {
    pub const NULL: Self = Self(0);

    pub(crate) fn new() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Initializes the filesystem subsystem: the fs-type registry, rootfs,
/// devfs, and the device drivers that publish themselves under `/dev`.
pub fn init() {
    vfs::init();
    crate::device::init();
}

#[cfg(test)]
extern crate std;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn devid_packs_major_minor() {
        let id = DevId::new(13, 17);
        assert_eq!(id.major(), 13);
        assert_eq!(id.minor(), 17);
        assert_eq!(id.as_u16(), 0x0D11);
    }

    #[test]
    fn mode_splits_type_and_perm() {
        let mode = Mode::new(FileType::CharDevice, Perm::USR_READ);
        assert_eq!(mode.file_type(), FileType::CharDevice);
        assert!(mode.perm().contains(Perm::USR_READ));
        assert!(!mode.perm().contains(Perm::USR_WRITE));
    }

    #[test]
    fn uninitialized_mode_is_all_zero() {
        assert_eq!(Mode::UNINIT.as_u16(), 0);
        assert_eq!(Mode::UNINIT.file_type(), FileType::Unknown);
    }
}
