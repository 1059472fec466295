mod null;
mod rtc;
mod zero;

use alloc::sync::Arc;

use null::NullDevice;
use rtc::RtcDevice;
use zero::ZeroDevice;

use crate::{device::char::register_char, errno::Errno, fs::DevId};

pub fn init() -> Result<(), Errno> {
    register_char(DevId::new(1, 3), "null", Arc::new(NullDevice), true, true)?;
    register_char(DevId::new(1, 5), "zero", Arc::new(ZeroDevice), true, true)?;
    register_char(DevId::new(13, 17), "rtc", Arc::new(RtcDevice), true, false)?;
    Ok(())
}
