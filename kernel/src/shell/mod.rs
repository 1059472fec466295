use alloc::string::String;

use futures_util::StreamExt;
use keyboard::ScancodeStream;
use parser::Parser;
use pc_keyboard::{DecodedKey, HandleControl, Keyboard, ScancodeSet1, layouts::Us104Key};

use crate::{
    errno::Errno,
    fs::{OpenFlags, Perm, Whence, vfs},
    vga::{self, Color, print, println},
};

pub mod keyboard;
pub mod parser;

type InputBuffer = heapless::String<{ vga::BUFFER_WIDTH - 1 }>;

/// Drives the shell to completion. Returns once the user types `exit`.
pub async fn run() {
    let mut scancodes = ScancodeStream::new();
    let mut keyboard = Keyboard::new(ScancodeSet1::new(), Us104Key, HandleControl::Ignore);

    let mut input_buffer = InputBuffer::new();

    print_prompt();

    while let Some(scancode) = scancodes.next().await {
        let Ok(Some(key_event)) = keyboard.add_byte(scancode) else {
            continue;
        };
        let Some(key) = keyboard.process_keyevent(key_event) else {
            continue;
        };

        match key {
            DecodedKey::Unicode('\n') => {
                println!();

                if execute(&input_buffer) {
                    return;
                }

                input_buffer.clear();
                print_prompt();
            }
            DecodedKey::Unicode('\x08') => {
                if input_buffer.pop().is_some() {
                    print!("\x08 \x08");
                }
            }
            DecodedKey::Unicode(character) if input_buffer.push(character).is_ok() => {
                print!("{character}");
            }
            _ => {}
        }
    }
}

fn get_prompt() -> &'static str {
    "root@buhos> "
}

fn print_prompt() {
    print!("{}", get_prompt());
}

/// Parses and runs one command line. Returns `true` iff the shell should
/// exit.
fn execute(input: &str) -> bool {
    let mut args = Parser::new(input);

    match args.next() {
        Some("help") => {
            println!("commands: help whoami echo pwd ls cat touch mkdir exit");
        }
        Some("whoami") => println!("root"),
        Some("echo" | "print") => {
            let rest: alloc::vec::Vec<&str> = args.collect();
            println!("{}", rest.join(" "));
        }
        Some("pwd") => println!("/"),
        Some("ls") => cmd_ls(args.next().unwrap_or("/")),
        Some("cat") => match args.next() {
            Some(path) => cmd_cat(path),
            None => println!("usage: cat <path>"),
        },
        Some("touch") => match args.next() {
            Some(path) => cmd_touch(path),
            None => println!("usage: touch <path>"),
        },
        Some("mkdir") => match args.next() {
            Some(path) => cmd_mkdir(path),
            None => println!("usage: mkdir <path>"),
        },
        Some("exit") => return true,
        Some(cmd) => println!("command not found: {cmd}"),
        None => {}
    }

    false
}

fn report(path: &str, err: Errno) {
    println!("{path}: {err}");
}

fn cmd_ls(path: &str) {
    let stat = match vfs::get().stat(path) {
        Ok(stat) => stat,
        Err(e) => return report(path, e),
    };

    if !stat.mode.is_directory() {
        println!("{path}");
        return;
    }

    let flags = OpenFlags::READ;
    let fd = match vfs::get().open(path, flags) {
        Ok(fd) => fd,
        Err(e) => return report(path, e),
    };

    loop {
        match vfs::get().readdir(fd) {
            Ok(Some(name)) => println!("{name}"),
            Ok(None) => break,
            Err(e) => {
                report(path, e);
                break;
            }
        }
    }

    let _ = vfs::get().close(fd);
}

fn cmd_cat(path: &str) {
    let fd = match vfs::get().open(path, OpenFlags::READ) {
        Ok(fd) => fd,
        Err(e) => return report(path, e),
    };

    let mut data = [0u8; 512];
    loop {
        match vfs::get().read(fd, &mut data) {
            Ok(0) => break,
            Ok(n) => print!("{}", String::from_utf8_lossy(&data[..n])),
            Err(e) => {
                report(path, e);
                break;
            }
        }
    }
    println!();

    let _ = vfs::get().close(fd);
}

fn cmd_touch(path: &str) {
    let flags = OpenFlags::READ | OpenFlags::WRITE | OpenFlags::CREATE;
    match vfs::get().open(path, flags) {
        Ok(fd) => {
            let _ = vfs::get().lseek(fd, 0, Whence::End);
            let _ = vfs::get().close(fd);
        }
        Err(e) => report(path, e),
    }
}

fn cmd_mkdir(path: &str) {
    let perm = Perm::USR_READ | Perm::USR_WRITE | Perm::USR_EXEC;
    if let Err(e) = vfs::get().mkdir(path, perm) {
        report(path, e);
    }
}
