//! Atomic counters for conditions absorbed rather than surfaced to a
//! sink. `FecRx` logs a snapshot of these at `Drop`, the way the
//! teacher's blocks log final counters when torn down.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters tracking per-datagram conditions that a running `FecRx`
/// absorbs instead of returning as an error.
#[derive(Default)]
pub struct Stats {
    /// Datagrams shorter than the header, or with a mismatched size field.
    pub malformed: AtomicU64,
    /// `datagram_index >= N`.
    pub out_of_range: AtomicU64,
    /// `block_index < next_block_index`.
    pub stale_block: AtomicU64,
    /// Duplicate `(block_index, datagram_index)` within a block.
    pub duplicate: AtomicU64,
    /// Blocks retired by the bounded-buffering policy while incomplete.
    pub block_retired: AtomicU64,
    /// Blocks fully decoded via FEC recovery.
    pub fec_recovered: AtomicU64,
    /// Blocks delivered because all K payload datagrams arrived.
    pub complete: AtomicU64,
}

impl Stats {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a malformed (short or size-mismatched) datagram.
    pub fn record_malformed(&self) {
        Self::bump(&self.malformed);
    }

    /// Record an out-of-range datagram index.
    pub fn record_out_of_range(&self) {
        Self::bump(&self.out_of_range);
    }

    /// Record a datagram belonging to an already-retired block.
    pub fn record_stale_block(&self) {
        Self::bump(&self.stale_block);
    }

    /// Record a duplicate datagram index within a block.
    pub fn record_duplicate(&self) {
        Self::bump(&self.duplicate);
    }

    /// Record a block retired without full delivery.
    pub fn record_block_retired(&self) {
        Self::bump(&self.block_retired);
    }

    /// Record a block decoded via FEC recovery.
    pub fn record_fec_recovered(&self) {
        Self::bump(&self.fec_recovered);
    }

    /// Record a block delivered on the complete-payload path.
    pub fn record_complete(&self) {
        Self::bump(&self.complete);
    }

    /// Snapshot all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            malformed: self.malformed.load(Ordering::Relaxed),
            out_of_range: self.out_of_range.load(Ordering::Relaxed),
            stale_block: self.stale_block.load(Ordering::Relaxed),
            duplicate: self.duplicate.load(Ordering::Relaxed),
            block_retired: self.block_retired.load(Ordering::Relaxed),
            fec_recovered: self.fec_recovered.load(Ordering::Relaxed),
            complete: self.complete.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of [`Stats`], cheap to log or compare in tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Datagrams shorter than the header, or with a mismatched size field.
    pub malformed: u64,
    /// `datagram_index >= N`.
    pub out_of_range: u64,
    /// `block_index < next_block_index`.
    pub stale_block: u64,
    /// Duplicate `(block_index, datagram_index)` within a block.
    pub duplicate: u64,
    /// Blocks retired by the bounded-buffering policy while incomplete.
    pub block_retired: u64,
    /// Blocks fully decoded via FEC recovery.
    pub fec_recovered: u64,
    /// Blocks delivered because all K payload datagrams arrived.
    pub complete: u64,
}
