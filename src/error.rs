//! Error taxonomy for the FEC packer/unpacker.

/// Errors produced by the coding parameter validation, the wire framing,
/// and the erasure codec boundary.
///
/// Per-datagram conditions encountered by a running `FecRx` that don't
/// even reach this type (out-of-range indices, duplicates, stale or
/// retired blocks) are recognized inline in `rx.rs` and absorbed
/// straight into [`crate::stats::Stats`] plus a `log` call; only
/// construction-time failures, the codec boundary, and malformed wire
/// framing are ever constructed as a value of this enum, and only
/// construction-time and codec failures reach a caller as `Result`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// `K`/`N` coding parameters are invalid (`k == 0`, `n < k`, or
    /// either exceeds [`crate::config::MAX_CODING_N`]).
    #[error("bad coding parameters: k={k} n={n}")]
    BadCoding {
        /// Requested K.
        k: usize,
        /// Requested N.
        n: usize,
    },

    /// MTU is zero or exceeds the configured ceiling.
    #[error("bad mtu: {mtu} (max {max})")]
    BadMtu {
        /// Requested MTU.
        mtu: usize,
        /// Configured ceiling.
        max: usize,
    },

    /// Datagram shorter than the wire header.
    #[error("short datagram: {len} bytes, header is {header_size}")]
    ShortDatagram {
        /// Actual length.
        len: usize,
        /// Wire header size.
        header_size: usize,
    },

    /// The header's encoded `size` field disagrees with the buffer
    /// length actually given to the parser.
    #[error("datagram size mismatch: header says {header_says}, got {got}")]
    SizeMismatch {
        /// Size encoded in the header.
        header_says: usize,
        /// Actual buffer length.
        got: usize,
    },

    /// The erasure codec rejected a construction or encode/decode call.
    #[error("erasure codec error: {0}")]
    Codec(String),

    /// The PHY boundary returned an error.
    #[error("phy error: {0}")]
    Phy(String),
}
