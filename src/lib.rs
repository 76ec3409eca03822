/*! `radiofec` adds forward error correction to a lossy, unidirectional
broadcast link.

A transmitter ([`tx::FecTx`]) ingests an arbitrary byte stream, slices
it into fixed-size payload datagrams, groups every `K` of them into a
block, derives `N - K` parity datagrams from that block using a
Reed-Solomon erasure code, and emits all `N` sealed datagrams through a
caller-supplied sink. A receiver ([`rx::FecRx`]) accepts datagrams as
they arrive — out of order, with loss, with duplicates — routes them
into their block, and delivers the original bytes back through a sink
as soon as enough of a block is available, whether that's all `K`
payloads, a decodable mix of payload and parity, or (for latency) just
an in-order prefix.

# What this crate does not do

The PHY transport (an SPI-attached radio) and the erasure code
primitive itself are external collaborators, modeled here as the
[`phy::Phy`] and [`fec::ErasureCodec`] traits. This crate ships a
[`phy::LoopbackPhy`] stand-in and a [`fec::RsCodec`] adapter over
[`reed_solomon_erasure`] so the pipeline can be exercised end to end,
but neither is a production radio driver. There is no retransmission
(ARQ), no authentication or encryption of payload bytes, and no
ordering guarantee across a block the PHY has fully lost — a lost
block is simply skipped.

# Example

```
use std::sync::{Arc, Mutex};
use radiofec::config::{CodingParams, RxConfig, TxConfig};
use radiofec::fec::RsCodec;
use radiofec::rx::FecRx;
use radiofec::tx::FecTx;

let coding = CodingParams { k: 2, n: 3, mtu: 4 };
let codec = Arc::new(RsCodec::new(coding.k, coding.n).unwrap());

let received: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
let received_for_sink = received.clone();
let rx = FecRx::new(
    RxConfig {
        coding,
        fifo_depth: 16,
        mtu_ceiling: 4096,
        reset_duration: std::time::Duration::from_secs(5),
    },
    codec.clone(),
    Box::new(move |buf: &[u8]| received_for_sink.lock().unwrap().extend_from_slice(buf)),
)
.unwrap();

let rx = Arc::new(rx);
let rx_sink_handle = rx.clone();
let tx = FecTx::new(
    TxConfig { coding, fifo_depth: 16, mtu_ceiling: 4096 },
    codec,
    Box::new(move |buf: &[u8]| {
        rx_sink_handle.add_rx_packet(buf);
    }),
)
.unwrap();

tx.add_tx_packet(b"ABCDEFGH");
// Dropping `tx` joins its worker, which synchronously feeds `rx`'s
// queue through the sink above. Dropping `rx` in turn joins its own
// worker, so by the time both are gone the sink has seen everything.
drop(tx);
drop(Arc::try_unwrap(rx).unwrap_or_else(|_| panic!("rx still shared")));
assert_eq!(&*received.lock().unwrap(), b"ABCDEFGH");
```

Note `Arc<FecRx>` above requires `FecRx` is `Sync`, which it is: the
sink closure only touches the queue/pool through their own locks.
*/
#![warn(missing_docs)]

pub mod cancel;
pub mod config;
pub mod error;
pub mod fec;
pub mod header;
pub mod phy;
pub mod pool;
pub mod rx;
pub mod stats;
pub mod tx;

pub use error::Error;
