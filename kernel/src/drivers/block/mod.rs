mod floppy;

use alloc::sync::Arc;

use floppy::FloppyDisk;

use crate::{device::block::register_block, errno::Errno, fs::DevId};

/// Registers the built-in block devices. The floppy driver is a stub
/// (its read/write are unimplemented) kept for parity with the original
/// device inventory; it is harmless to register since nothing mounts a
/// filesystem on it.
pub fn init() -> Result<(), Errno> {
    register_block(DevId::new(2, 0), "fd0", Arc::new(FloppyDisk::new(0)), 512, 2880)?;
    Ok(())
}
