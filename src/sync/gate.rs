//! Reader-quiescence gate between the consumer and storage-rewriting writers.
//!
//! Buffer growth swaps the backing store, and overwrite-eviction rewrites the
//! consumer-owned head cursor. Both are only safe once the consumer is
//! provably outside `get`. The gate provides that guarantee with two flags:
//!
//! - the reader raises `active` for the duration of each `get`
//! - a writer raises `pending`, waits for `active` to drop, and holds new
//!   readers out until its rewrite is published
//!
//! The flag pair uses sequentially consistent operations: each side stores
//! its own flag and then loads the other's, and the store-load pairs must
//! not reorder or both sides could proceed at once.

use std::sync::atomic::{AtomicBool, Ordering};

/// Two-flag gate: one reader, one writer at a time.
///
/// The reader side is wait-free except while a writer physically holds the
/// gate. The writer side spins, bounded by at most one in-flight read.
pub(crate) struct QuiesceGate {
    /// Raised by a writer while it rewrites state the reader may touch.
    pending: AtomicBool,
    /// Raised by the reader for the duration of each read.
    active: AtomicBool,
}

impl QuiesceGate {
    pub(crate) const fn new() -> Self {
        Self {
            pending: AtomicBool::new(false),
            active: AtomicBool::new(false),
        }
    }

    /// Reader side: announce entry, backing off while a writer holds the gate.
    ///
    /// The returned token must stay alive for the duration of the read; its
    /// drop re-opens the gate for writers.
    #[must_use]
    pub(crate) fn enter(&self) -> ReaderToken<'_> {
        loop {
            self.active.store(true, Ordering::SeqCst);
            if !self.pending.load(Ordering::SeqCst) {
                return ReaderToken { gate: self };
            }
            // A writer got in first: step back out and wait for it to finish.
            self.active.store(false, Ordering::SeqCst);
            while self.pending.load(Ordering::Relaxed) {
                std::hint::spin_loop();
            }
        }
    }

    /// Writer side: wait until the reader is quiesced, then hold it out.
    ///
    /// At most one writer may hold the gate at a time; callers serialize
    /// writers externally (single producer, or the growth section mutex).
    #[must_use]
    pub(crate) fn exclusive(&self) -> WriterGuard<'_> {
        self.pending.store(true, Ordering::SeqCst);
        while self.active.load(Ordering::SeqCst) {
            std::hint::spin_loop();
        }
        WriterGuard { gate: self }
    }
}

/// Proof that the reader has announced itself and no writer holds the gate.
pub(crate) struct ReaderToken<'a> {
    gate: &'a QuiesceGate,
}

impl Drop for ReaderToken<'_> {
    fn drop(&mut self) {
        // Release pairs with the writer's SeqCst load of `active`, so every
        // cursor/slot update made during the read is visible to the writer.
        self.gate.active.store(false, Ordering::Release);
    }
}

/// Exclusive hold over the gate; readers are parked until this drops.
pub(crate) struct WriterGuard<'a> {
    gate: &'a QuiesceGate,
}

impl Drop for WriterGuard<'_> {
    fn drop(&mut self) {
        // SeqCst pairs with the reader's entry load of `pending`: a reader
        // that sees the gate open also sees the completed rewrite.
        self.gate.pending.store(false, Ordering::SeqCst);
    }
}
