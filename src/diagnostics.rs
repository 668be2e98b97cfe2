//! Lock-free diagnostics from the audio thread.
//!
//! The cycle never logs directly. It pushes [`BridgeEvent`]s into an rtrb
//! ring buffer; a non-realtime thread drains the ring and turns each event
//! into a `tracing` record. If the ring is full the event is dropped and
//! counted, so the audio thread never waits.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rtrb::{Consumer, Producer, RingBuffer};

use crate::device::Direction;
use crate::error::XferError;

/// Something worth reporting that happened during one cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BridgeEvent {
    /// Cycle counter at the time of the event.
    pub cycle: u64,
    pub kind: EventKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    /// Playback underran; the stream was recovered and the write retried.
    Underrun,
    /// Capture overran; the stream was re-prepared and this cycle has no input.
    Overrun,
    /// A transfer failed and its data was dropped for this cycle.
    TransferFailed { direction: Direction, error: XferError },
    /// The device moved fewer frames than the cycle length.
    ShortTransfer { direction: Direction, expected: usize, actual: usize },
    /// The graph invoked a cycle with a different frame count than negotiated.
    FrameMismatch { expected: usize, actual: usize },
    /// A cycle arrived before sample rate and buffer size were negotiated.
    NotReady,
}

/// Audio-thread end of the diagnostics ring.
pub struct EventSender {
    producer: Producer<BridgeEvent>,
    dropped: Arc<AtomicU64>,
}

impl EventSender {
    /// Queue an event without blocking. Returns `Err(event)` if the ring is full.
    #[inline]
    pub fn emit(&mut self, event: BridgeEvent) -> Result<(), BridgeEvent> {
        self.producer.push(event).map_err(|rtrb::PushError::Full(ev)| {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            ev
        })
    }
}

/// Logging end of the diagnostics ring.
pub struct EventReceiver {
    consumer: Consumer<BridgeEvent>,
    dropped: Arc<AtomicU64>,
    reported_dropped: u64,
}

impl EventReceiver {
    /// Next pending event, if any.
    pub fn pop(&mut self) -> Option<BridgeEvent> {
        self.consumer.pop().ok()
    }

    /// Drain every pending event.
    pub fn drain(&mut self) -> impl Iterator<Item = BridgeEvent> + '_ {
        core::iter::from_fn(move || self.consumer.pop().ok())
    }

    /// Events lost because the ring was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Drain pending events into `tracing`. Returns how many were logged.
    pub fn log_pending(&mut self) -> usize {
        let mut count = 0;
        while let Ok(event) = self.consumer.pop() {
            log_event(&event);
            count += 1;
        }

        let dropped = self.dropped();
        if dropped > self.reported_dropped {
            let lost = dropped - self.reported_dropped;
            tracing::warn!(lost, "diagnostics ring full, events lost");
            self.reported_dropped = dropped;
        }
        count
    }
}

fn log_event(event: &BridgeEvent) {
    let cycle = event.cycle;
    match event.kind {
        EventKind::Underrun => tracing::warn!(cycle, "playback underrun recovered"),
        EventKind::Overrun => {
            tracing::warn!(cycle, "capture overrun, input dropped for this cycle")
        }
        EventKind::TransferFailed { direction, error } => {
            tracing::error!(cycle, %direction, %error, "transfer failed, cycle dropped")
        }
        EventKind::ShortTransfer { direction, expected, actual } => {
            tracing::warn!(cycle, %direction, expected, actual, "short transfer")
        }
        EventKind::FrameMismatch { expected, actual } => {
            tracing::error!(
                cycle,
                expected,
                actual,
                "cycle length does not match negotiated buffer size, cycle skipped"
            )
        }
        EventKind::NotReady => tracing::debug!(cycle, "cycle before negotiation, skipped"),
    }
}

/// Create a diagnostics ring holding up to `capacity` events.
pub fn channel(capacity: usize) -> (EventSender, EventReceiver) {
    let (producer, consumer) = RingBuffer::new(capacity.max(1));
    let dropped = Arc::new(AtomicU64::new(0));
    (
        EventSender {
            producer,
            dropped: dropped.clone(),
        },
        EventReceiver {
            consumer,
            dropped,
            reported_dropped: 0,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(cycle: u64) -> BridgeEvent {
        BridgeEvent {
            cycle,
            kind: EventKind::Underrun,
        }
    }

    #[test]
    fn events_arrive_in_order() {
        let (mut tx, mut rx) = channel(4);
        tx.emit(ev(1)).unwrap();
        tx.emit(ev(2)).unwrap();
        let cycles: Vec<u64> = rx.drain().map(|e| e.cycle).collect();
        assert_eq!(cycles, vec![1, 2]);
        assert!(rx.pop().is_none());
    }

    #[test]
    fn full_ring_drops_and_counts() {
        let (mut tx, mut rx) = channel(2);
        tx.emit(ev(1)).unwrap();
        tx.emit(ev(2)).unwrap();
        assert_eq!(tx.emit(ev(3)), Err(ev(3)));
        assert_eq!(rx.dropped(), 1);
        assert_eq!(rx.log_pending(), 2);
    }
}
