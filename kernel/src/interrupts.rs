use pic8259::ChainedPics;
use spin::Mutex;
use static_cell::StaticCell;
use x86_64::structures::idt::{InterruptDescriptorTable, InterruptStackFrame, PageFaultErrorCode};

use crate::{gdt, util::irq_guard::set_in_handler, vga::println};

/// Initializes the Interrupt Descriptor Table (IDT). Must only be called once
/// during initialization to prevent a panic.
pub fn init_idt() {
    static IDT: StaticCell<InterruptDescriptorTable> = StaticCell::new();

    let idt = IDT
        .try_init(InterruptDescriptorTable::new())
        .expect("Tried to initialize IDT more than once");

    idt.breakpoint.set_handler_fn(breakpoint_handler);
    idt.page_fault.set_handler_fn(page_fault_handler);

    unsafe {
        idt.double_fault
            .set_handler_fn(double_fault_handler)
            .set_stack_index(gdt::DOUBLE_FAULT_IST_INDEX);
    }

    idt[InterruptIndex::Timer.as_u8()].set_handler_fn(timer_interrupt_handler);
    idt[InterruptIndex::Keyboard.as_u8()].set_handler_fn(keyboard_interrupt_handler);

    idt.load();
}

extern "x86-interrupt" fn breakpoint_handler(stack_frame: InterruptStackFrame) {
    set_in_handler(true);
    println!("EXCEPTION: BREAKPOINT\n{:#?}", stack_frame);
    set_in_handler(false);
}

extern "x86-interrupt" fn page_fault_handler(
    stack_frame: InterruptStackFrame,
    error_code: PageFaultErrorCode,
) {
    use x86_64::registers::control::Cr2;

    set_in_handler(true);
    println!("EXCEPTION: PAGE FAULT");
    println!("Accessed Address: {:?}", Cr2::read());
    println!("Error Code: {:?}", error_code);
    println!("{:#?}", stack_frame);

    loop {
        x86_64::instructions::hlt();
    }
}

extern "x86-interrupt" fn double_fault_handler(
    stack_frame: InterruptStackFrame,
    _error_code: u64,
) -> ! {
    panic!("EXCEPTION: DOUBLE FAULT\n{:#?}", stack_frame);
}

const PIC_1_OFFSET: u8 = 32;
const PIC_2_OFFSET: u8 = PIC_1_OFFSET + 8;

static PICS: Mutex<ChainedPics> =
    Mutex::new(unsafe { ChainedPics::new(PIC_1_OFFSET, PIC_2_OFFSET) });

/// Initializes the hardware Programmable Interrupt Controllers (PICs) to remap
/// the interrupt vector numbers into a valid range. Should only be called once
/// during initialization.
pub fn init_pics() {
    let mut pics = PICS.lock();

    unsafe {
        pics.initialize();
    }
}

unsafe fn acknowledge_interrupt(index: InterruptIndex) {
    unsafe {
        PICS.lock().notify_end_of_interrupt(index.as_u8());
    }
}

#[derive(Debug, Clone, Copy)]
#[repr(u8)]
pub enum InterruptIndex {
    Timer = PIC_1_OFFSET,
    Keyboard,
}

impl InterruptIndex {
    fn as_u8(self) -> u8 {
        self as _
    }
}

extern "x86-interrupt" fn timer_interrupt_handler(_stack_frame: InterruptStackFrame) {
    set_in_handler(true);
    // print!(".");

    unsafe { acknowledge_interrupt(InterruptIndex::Timer) };
    set_in_handler(false);
}

extern "x86-interrupt" fn keyboard_interrupt_handler(_stack_frame: InterruptStackFrame) {
    use x86_64::instructions::port::Port;

    set_in_handler(true);

    let mut port = Port::new(0x60);
    let scancode: u8 = unsafe { port.read() };
    crate::shell::keyboard::add_scancode(scancode);

    unsafe { acknowledge_interrupt(InterruptIndex::Keyboard) };
    set_in_handler(false);
}
