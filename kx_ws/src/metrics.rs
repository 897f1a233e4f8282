use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

/// Counters shared between the event loop and the client handle
#[derive(Debug, Default)]
pub struct StreamStats {
    messages_delivered: AtomicU64,
    frames_dropped: AtomicU64,
    connects: AtomicU64,
    connection_failures: AtomicU64,
}

/// Point-in-time copy of [`StreamStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStatsSnapshot {
    pub messages_delivered: u64,
    pub frames_dropped: u64,
    pub connects: u64,
    pub connection_failures: u64,
}

impl StreamStats {
    pub(crate) fn record_message(&self) {
        self.messages_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_connect(&self) {
        self.connects.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.connection_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StreamStatsSnapshot {
        StreamStatsSnapshot {
            messages_delivered: self.messages_delivered.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            connects: self.connects.load(Ordering::Relaxed),
            connection_failures: self.connection_failures.load(Ordering::Relaxed),
        }
    }
}
