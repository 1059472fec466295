#![no_std]
#![no_main]

use buhos_kernel::{shell, task, vga::println};

/// The entrypoint into the kernel. Do NOT call this function directly. It gets
/// invoked automatically by the bootloader after setting up the stack and
/// performing necessary configuration.
#[unsafe(no_mangle)]
pub extern "C" fn _start() -> ! {
    println!("mounting rootfs and devfs...");
    buhos_kernel::init();

    println!("entering shell");
    task::block_on(shell::run());

    loop {
        x86_64::instructions::hlt();
    }
}
