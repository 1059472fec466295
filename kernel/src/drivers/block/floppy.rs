//! Floppy disk driver. The ISA floppy controller protocol itself is out of
//! scope; this stub only exists to exercise block-device registration.

use crate::{
    errno::Errno,
    fs::{File, FileOps},
};

pub struct FloppyDisk {
    #[allow(dead_code)]
    drive_id: u8,
}

impl FloppyDisk {
    pub fn new(drive_id: u8) -> Self {
        Self { drive_id }
    }
}

impl FileOps for FloppyDisk {
    fn read(&self, _file: &File, _offset: usize, _buf: &mut [u8]) -> Result<usize, Errno> {
        Err(Errno::ENotimp)
    }

    fn write(&self, _file: &File, _offset: usize, _buf: &[u8]) -> Result<usize, Errno> {
        Err(Errno::ENotimp)
    }
}
