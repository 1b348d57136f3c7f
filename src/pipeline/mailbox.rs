//! Single-slot frame handoff between the stream reader and the render loop

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam::utils::CachePadded;
use flume::{Receiver, Sender, TrySendError};

use crate::Frame;

#[derive(Default)]
struct Stats {
    frames_written: AtomicUsize,
    frames_read: AtomicUsize,
    frames_skipped: AtomicUsize,
}

/// Snapshot of mailbox counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MailboxStats {
    pub written: usize,
    pub read: usize,
    pub skipped: usize,
}

/// Create a connected producer/consumer pair around a one-frame slot.
pub fn frame_mailbox() -> (MailboxProducer, MailboxConsumer) {
    let (tx, rx) = flume::bounded(1);
    let stats = Arc::new(CachePadded::new(Stats::default()));
    (
        MailboxProducer {
            tx,
            stats: stats.clone(),
        },
        MailboxConsumer { rx, stats },
    )
}

/// Write side. Never blocks and never overwrites a pending frame.
pub struct MailboxProducer {
    tx: Sender<Frame>,
    stats: Arc<CachePadded<Stats>>,
}

impl MailboxProducer {
    /// Whether a frame is still waiting for the render loop
    pub fn is_occupied(&self) -> bool {
        self.tx.is_full()
    }

    /// Record a frame the producer chose not to decode
    pub fn note_skip(&self) {
        self.stats.frames_skipped.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("frames_skipped").increment(1);
    }

    /// Place `frame` in the slot. Returns false, dropping the frame, if the
    /// slot is occupied or the consumer is gone.
    pub fn offer(&self, frame: Frame) -> bool {
        match self.tx.try_send(frame) {
            Ok(()) => {
                self.stats.frames_written.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Full(_)) => {
                self.note_skip();
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Read side, owned by the render loop
pub struct MailboxConsumer {
    rx: Receiver<Frame>,
    stats: Arc<CachePadded<Stats>>,
}

impl MailboxConsumer {
    /// Take the pending frame, freeing the slot for the producer.
    pub fn take(&self) -> Option<Frame> {
        let frame = self.rx.try_recv().ok()?;
        self.stats.frames_read.fetch_add(1, Ordering::Relaxed);
        Some(frame)
    }

    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    pub fn stats(&self) -> MailboxStats {
        MailboxStats {
            written: self.stats.frames_written.load(Ordering::Relaxed),
            read: self.stats.frames_read.load(Ordering::Relaxed),
            skipped: self.stats.frames_skipped.load(Ordering::Relaxed),
        }
    }
}
