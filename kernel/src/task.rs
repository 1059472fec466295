//! A single-future "executor": the kernel only ever drives one task (the
//! shell), so there is no scheduler, task queue, or wake-to-requeue
//! bookkeeping here — just poll-to-completion with a genuine halt between
//! polls, matching the "no internal event loop" concurrency model.

use core::{
    future::Future,
    task::{Context, Poll, RawWaker, RawWakerVTable, Waker},
};

/// Polls `future` until it completes, halting the CPU between polls. A real
/// wake-up (keyboard IRQ, timer tick) resumes execution via `hlt`'s normal
/// return-on-interrupt semantics; the waker itself is a no-op since there is
/// only ever one task and nothing to requeue.
pub fn block_on<F: Future>(future: F) -> F::Output {
    let mut future = core::pin::pin!(future);
    let waker = noop_waker();
    let mut cx = Context::from_waker(&waker);

    loop {
        match future.as_mut().poll(&mut cx) {
            Poll::Ready(output) => return output,
            Poll::Pending => x86_64::instructions::hlt(),
        }
    }
}

fn noop_waker() -> Waker {
    fn clone(_: *const ()) -> RawWaker {
        raw()
    }
    fn no_op(_: *const ()) {}

    fn raw() -> RawWaker {
        static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, no_op, no_op, no_op);
        RawWaker::new(core::ptr::null(), &VTABLE)
    }

    // SAFETY: every vtable function either returns a fresh no-op waker or
    // does nothing; the data pointer is never dereferenced.
    unsafe { Waker::from_raw(raw()) }
}
