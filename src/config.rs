//! Coding parameters and TX/RX configuration.
//!
//! These are plain [`serde`](https://docs.rs/serde)-derived structs so a
//! caller can load them from `serde_json`, the same way other metadata
//! structs in this family of crates are declared.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upper bound on `N` (and therefore `K`). Matches the reference
/// firmware's `MAX_CODING_N`.
pub const MAX_CODING_N: usize = 32;

/// Number of pending RX blocks tolerated before the oldest is retired
/// without decoding.
pub const MAX_PENDING_BLOCKS: usize = 3;

/// Default depth of the bounded TX/RX ingest FIFOs.
pub const DEFAULT_FIFO_DEPTH: usize = 64;

/// `K` (payload datagrams per block) and `N` (total datagrams per
/// block), plus the per-datagram payload size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodingParams {
    /// Payload datagrams per block.
    pub k: usize,
    /// Total datagrams per block (`k` payload + `n - k` parity).
    pub n: usize,
    /// Payload region size in bytes, per datagram.
    pub mtu: usize,
}

impl CodingParams {
    /// Validate `k`/`n`/`mtu` against the configured ceilings.
    pub fn validate(&self, mtu_ceiling: usize) -> Result<(), Error> {
        if self.k == 0 || self.n < self.k || self.n > MAX_CODING_N {
            return Err(Error::BadCoding {
                k: self.k,
                n: self.n,
            });
        }
        if self.mtu == 0 || self.mtu > mtu_ceiling {
            return Err(Error::BadMtu {
                mtu: self.mtu,
                max: mtu_ceiling,
            });
        }
        Ok(())
    }

    /// Number of parity datagrams per block (`n - k`).
    pub fn parity_count(&self) -> usize {
        self.n - self.k
    }
}

/// Configuration for [`crate::tx::FecTx`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxConfig {
    /// Coding parameters.
    pub coding: CodingParams,
    /// Depth of the bounded producer -> worker FIFO.
    #[serde(default = "default_fifo_depth")]
    pub fifo_depth: usize,
    /// MTU ceiling enforced at construction.
    #[serde(default = "default_mtu_ceiling")]
    pub mtu_ceiling: usize,
}

/// Configuration for [`crate::rx::FecRx`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RxConfig {
    /// Coding parameters.
    pub coding: CodingParams,
    /// Depth of the bounded ingest -> worker FIFO.
    #[serde(default = "default_fifo_depth")]
    pub fifo_depth: usize,
    /// MTU ceiling enforced at construction.
    #[serde(default = "default_mtu_ceiling")]
    pub mtu_ceiling: usize,
    /// Idle duration after which `next_block_index` resets to 0,
    /// treating subsequent traffic as a fresh stream.
    #[serde(default = "default_reset_duration", with = "duration_millis")]
    pub reset_duration: Duration,
}

fn default_fifo_depth() -> usize {
    DEFAULT_FIFO_DEPTH
}

fn default_mtu_ceiling() -> usize {
    4096
}

fn default_reset_duration() -> Duration {
    Duration::from_secs(5)
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
