//! Bridges the keyboard IRQ handler to an async [`Stream`] of raw scancodes.
//!
//! The interrupt handler (see [`crate::interrupts`]) cannot block or
//! allocate on the hot path, so it only pushes into a lock-free queue and
//! wakes whoever is polling it; the actual scancode decoding happens back
//! in [`super::run`], outside interrupt context.

use conquer_once::spin::OnceCell;
use core::{
    pin::Pin,
    task::{Context, Poll},
};
use crossbeam_queue::ArrayQueue;
use futures_util::{stream::Stream, task::AtomicWaker};

static SCANCODE_QUEUE: OnceCell<ArrayQueue<u8>> = OnceCell::uninit();
static WAKER: AtomicWaker = AtomicWaker::new();

/// Called from the keyboard interrupt handler. Drops the scancode silently
/// if the queue is full or not yet initialized, since there is no way to
/// signal failure from interrupt context.
pub(crate) fn add_scancode(scancode: u8) {
    if let Ok(queue) = SCANCODE_QUEUE.try_get() {
        if queue.push(scancode).is_err() {
            crate::vga::println!("WARNING: scancode queue full; dropping keypress");
        } else {
            WAKER.wake();
        }
    } else {
        crate::vga::println!("WARNING: scancode queue uninitialized");
    }
}

pub struct ScancodeStream {
    _private: (),
}

impl ScancodeStream {
    /// Must only be called once: a second call would try to re-initialize
    /// the shared queue.
    pub fn new() -> Self {
        SCANCODE_QUEUE
            .try_init_once(|| ArrayQueue::new(100))
            .expect("ScancodeStream::new should only be called once");
        Self { _private: () }
    }
}

impl Stream for ScancodeStream {
    type Item = u8;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context) -> Poll<Option<u8>> {
        let queue = SCANCODE_QUEUE.try_get().expect("scancode queue not initialized");

        if let Some(scancode) = queue.pop() {
            return Poll::Ready(Some(scancode));
        }

        WAKER.register(cx.waker());
        match queue.pop() {
            Some(scancode) => {
                WAKER.take();
                Poll::Ready(Some(scancode))
            }
            None => Poll::Pending,
        }
    }
}
