//! Erasure coding boundary.
//!
//! [`ErasureCodec`] is the abstract collaborator: given K payload
//! shards, derive N-K parity shards; given any K of the N shards,
//! recover the rest. [`RsCodec`] is the concrete implementation, a
//! thin adapter over [`reed_solomon_erasure::galois_8::ReedSolomon`].

use crate::error::Error;
use reed_solomon_erasure::galois_8::ReedSolomon;

/// Erasure-coding collaborator used by both `FecTx` and `FecRx`.
///
/// Shard index is positional: slot `i` of both `payloads` (encode) and
/// `shards` (decode) always corresponds to the datagram whose wire
/// `datagram_index` is `i`. The reference implementation's separate
/// index-permutation array is never exercised with a non-identity
/// permutation at any real call site, so it is not modeled here; see
/// the crate's design notes.
pub trait ErasureCodec: Send + Sync {
    /// Derive `n - k` parity shards from exactly `k` payload shards,
    /// all of the same length.
    fn encode(&self, payloads: &[&[u8]]) -> Result<Vec<Vec<u8>>, Error>;

    /// Recover missing shards in place. `shards` has length `n`;
    /// `Some` entries are present data, `None` entries are missing.
    /// On success, every slot that can be recovered from the present
    /// `k` is filled in.
    fn decode(&self, shards: &mut [Option<Vec<u8>>]) -> Result<(), Error>;
}

/// Reed-Solomon codec over GF(256), matching the reference firmware's
/// choice of erasure code.
pub struct RsCodec {
    rs: ReedSolomon,
    k: usize,
    n: usize,
}

impl RsCodec {
    /// Construct a codec for `k` payload and `n - k` parity shards.
    pub fn new(k: usize, n: usize) -> Result<Self, Error> {
        let rs = ReedSolomon::new(k, n - k).map_err(|e| Error::Codec(e.to_string()))?;
        Ok(Self { rs, k, n })
    }
}

impl ErasureCodec for RsCodec {
    fn encode(&self, payloads: &[&[u8]]) -> Result<Vec<Vec<u8>>, Error> {
        debug_assert_eq!(payloads.len(), self.k);
        let shard_len = payloads.first().map(|p| p.len()).unwrap_or(0);
        let mut shards: Vec<Vec<u8>> = payloads.iter().map(|p| p.to_vec()).collect();
        shards.extend(std::iter::repeat_with(|| vec![0u8; shard_len]).take(self.n - self.k));
        self.rs
            .encode(&mut shards)
            .map_err(|e| Error::Codec(e.to_string()))?;
        Ok(shards.split_off(self.k))
    }

    fn decode(&self, shards: &mut [Option<Vec<u8>>]) -> Result<(), Error> {
        debug_assert_eq!(shards.len(), self.n);
        self.rs
            .reconstruct(shards)
            .map_err(|e| Error::Codec(e.to_string()))
    }
}
