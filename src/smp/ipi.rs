//! Cross-core messaging: one message ring per core, written only by the
//! other core, drained on wake (`WFE`/timer tick). Completion is tracked
//! with an `AtomicBool` + `Release`/`Acquire` pair, giving a real
//! happens-before edge instead of relying on a bare volatile flag.

use alloc::sync::Arc;
use core::sync::atomic::{AtomicBool, Ordering};

use crate::ringbuf::RingBuffer;
use crate::sched::thread::{ThreadId, MAX_CORES};

const QUEUE_CAPACITY: usize = 32;

#[derive(Clone)]
pub enum IpiMessage {
    CleanDataRange { base: usize, len: usize },
    InvalidateDataRange { base: usize, len: usize },
    CleanAndInvalidateRange { base: usize, len: usize },
    InvalidateInstructionRange { base: usize, len: usize },
    Wakeup,
    ThreadUnblocked(ThreadId),
}

struct Envelope {
    message: IpiMessage,
    complete: Option<Arc<AtomicBool>>,
}

#[derive(Clone, Copy)]
struct EnvelopeSlot(*mut Envelope);
unsafe impl Send for EnvelopeSlot {}

/// One ring per destination core; `rings[c]` is written only by cores
/// other than `c` and drained only by `c` itself - a true SPSC channel.
static RINGS: [RingBuffer<EnvelopeSlot, QUEUE_CAPACITY>; MAX_CORES] =
    [const { RingBuffer::new() }; MAX_CORES];

/// Send a message to `target_core`. If `complete` is given, the caller can
/// poll/wait on it with `Ordering::Acquire` after the target has drained
/// and handled the message.
pub fn send(target_core: usize, message: IpiMessage, complete: Option<Arc<AtomicBool>>) {
    if target_core >= MAX_CORES {
        return;
    }
    let boxed = alloc::boxed::Box::new(Envelope { message, complete });
    let raw = alloc::boxed::Box::into_raw(boxed);
    if !RINGS[target_core].push(EnvelopeSlot(raw)) {
        // Ring full: drop the message rather than block the sender - the
        // only current messages are cache maintenance (re-issuable) and
        // wakeups (a spurious miss just costs one extra idle tick).
        let envelope = unsafe { alloc::boxed::Box::from_raw(raw) };
        crate::warn!("ipi: ring full for core {}, dropping message", target_core);
        drop(envelope);
        return;
    }
    signal_event();
}

pub fn signal_thread_woken(target_core: usize, t: ThreadId) {
    send(target_core, IpiMessage::ThreadUnblocked(t), None);
}

/// Drain and act on every pending message for the calling core. Call from
/// the idle loop after waking and from the timer tick.
pub fn drain_for_current_core() {
    let core = crate::sched::scheduler::current_core();
    while let Some(slot) = RINGS[core].pop() {
        let envelope = unsafe { *alloc::boxed::Box::from_raw(slot.0) };
        handle(envelope.message);
        if let Some(flag) = envelope.complete {
            flag.store(true, Ordering::Release);
        }
    }
}

fn handle(message: IpiMessage) {
    match message {
        IpiMessage::CleanDataRange { base, len } => crate::arch::cache::clean_data_range(base, len),
        IpiMessage::InvalidateDataRange { base, len } => {
            crate::arch::cache::invalidate_data_range(base, len)
        }
        IpiMessage::CleanAndInvalidateRange { base, len } => {
            crate::arch::cache::clean_and_invalidate_range(base, len)
        }
        IpiMessage::InvalidateInstructionRange { base, len } => {
            crate::arch::cache::invalidate_instruction_range(base, len)
        }
        // Both are pure wake nudges: the scheduler state is a single
        // cross-core structure already updated by the sender, so there is
        // nothing left to apply here beyond waking this core out of WFE.
        IpiMessage::Wakeup | IpiMessage::ThreadUnblocked(_) => {}
    }
}

#[cfg(target_arch = "aarch64")]
fn signal_event() {
    unsafe { core::arch::asm!("sev", options(nomem, nostack)) };
}

#[cfg(not(target_arch = "aarch64"))]
fn signal_event() {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_and_drain_wakeup() {
        send(0, IpiMessage::Wakeup, None);
        drain_for_current_core();
        assert!(RINGS[0].is_empty());
    }
}
