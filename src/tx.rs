//! TX pipeline: byte stream in, N sealed datagrams per block out.

use crate::cancel::CancelToken;
use crate::config::TxConfig;
use crate::error::Error;
use crate::fec::ErasureCodec;
use crate::header::{self, HEADER_SIZE};
use crate::pool::{Handle, Pool};
use log::{debug, info, trace, warn};
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

type Sink = Box<dyn Fn(&[u8]) + Send + Sync>;

struct TxQueue {
    lock: Mutex<VecDeque<Handle<Vec<u8>>>>,
    cv: Condvar,
    capacity: usize,
}

impl TxQueue {
    fn new(capacity: usize) -> Self {
        Self {
            lock: Mutex::new(VecDeque::new()),
            cv: Condvar::new(),
            capacity,
        }
    }

    /// Block until space is available or shutdown is requested.
    /// Returns `false` (dropping `item`) if shutdown won the race.
    fn push(&self, item: Handle<Vec<u8>>, cancel: &CancelToken) -> bool {
        let mut guard = self.lock.lock().unwrap();
        while guard.len() >= self.capacity && !cancel.is_canceled() {
            guard = self.cv.wait(guard).unwrap();
        }
        if cancel.is_canceled() {
            return false;
        }
        guard.push_back(item);
        self.cv.notify_all();
        true
    }

    fn pop(&self, cancel: &CancelToken) -> Option<Handle<Vec<u8>>> {
        let mut guard = self.lock.lock().unwrap();
        loop {
            if let Some(item) = guard.pop_front() {
                self.cv.notify_all();
                return Some(item);
            }
            if cancel.is_canceled() {
                return None;
            }
            guard = self.cv.wait(guard).unwrap();
        }
    }

    fn notify_all(&self) {
        let _guard = self.lock.lock().unwrap();
        self.cv.notify_all();
    }
}

struct TxAccum {
    buf: Handle<Vec<u8>>,
    filled: usize,
}

/// Encodes a byte stream into K payload + (N-K) parity datagrams per
/// block, emitted through a sink callback on a dedicated worker
/// thread.
///
/// Only a single producer thread may call [`FecTx::add_tx_packet`] at
/// a time; concurrent producers are not supported.
pub struct FecTx {
    config: TxConfig,
    pool: Pool<Vec<u8>>,
    queue: Arc<TxQueue>,
    accum: Mutex<Option<TxAccum>>,
    cancel: CancelToken,
    worker: Option<JoinHandle<()>>,
}

impl FecTx {
    /// Construct a new TX packer and spawn its encoder thread.
    pub fn new(
        config: TxConfig,
        codec: Arc<dyn ErasureCodec>,
        sink: Sink,
    ) -> Result<Self, Error> {
        config.coding.validate(config.mtu_ceiling)?;
        let datagram_size = HEADER_SIZE + config.coding.mtu;
        let pool: Pool<Vec<u8>> = Pool::with_hooks(
            Some(Box::new(move |v: &mut Vec<u8>| {
                v.clear();
                v.resize(datagram_size, 0);
            })),
            None,
        );
        let queue = Arc::new(TxQueue::new(config.fifo_depth));
        let cancel = CancelToken::new();

        let worker = {
            let queue = queue.clone();
            let cancel = cancel.clone();
            let worker_pool = pool.clone();
            let k = config.coding.k;
            let n = config.coding.n;
            std::thread::Builder::new()
                .name("fectx-worker".to_string())
                .spawn(move || encoder_loop(queue, cancel, worker_pool, codec, sink, k, n))
                .map_err(|e| Error::Codec(format!("failed to spawn fectx-worker: {e}")))?
        };

        Ok(Self {
            config,
            pool,
            queue,
            accum: Mutex::new(None),
            cancel,
            worker: Some(worker),
        })
    }

    /// Append bytes to the stream. Slices the input across MTU
    /// boundaries; every datagram that fills is handed to the bounded
    /// ingest FIFO, blocking this call if the FIFO is full. A no-op
    /// once shutdown has begun.
    pub fn add_tx_packet(&self, mut bytes: &[u8]) {
        let mtu = self.config.coding.mtu;
        let mut accum = self.accum.lock().unwrap();
        while !bytes.is_empty() {
            if self.cancel.is_canceled() {
                return;
            }
            let slot = accum.get_or_insert_with(|| TxAccum {
                buf: self.pool.acquire(),
                filled: 0,
            });
            let space = mtu - slot.filled;
            let n = space.min(bytes.len());
            let start = HEADER_SIZE + slot.filled;
            slot.buf[start..start + n].copy_from_slice(&bytes[..n]);
            slot.filled += n;
            bytes = &bytes[n..];
            if slot.filled == mtu {
                let TxAccum { buf, .. } = accum.take().unwrap();
                if !self.queue.push(buf, &self.cancel) {
                    trace!("add_tx_packet: dropped datagram, shutting down");
                }
            }
        }
    }
}

impl Drop for FecTx {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.queue.notify_all();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        info!("fectx: shut down");
    }
}

fn encoder_loop(
    queue: Arc<TxQueue>,
    cancel: CancelToken,
    pool: Pool<Vec<u8>>,
    codec: Arc<dyn ErasureCodec>,
    sink: Sink,
    k: usize,
    n: usize,
) {
    debug!("fectx-worker: started, k={k} n={n}");
    let mut block_index: u32 = 1;
    let mut block: Vec<Handle<Vec<u8>>> = Vec::with_capacity(k);
    while let Some(mut dg) = queue.pop(&cancel) {
        header::seal(&mut dg, block_index, block.len() as u8, false);
        sink(&dg);
        block.push(dg);

        if block.len() == k {
            let payload_refs: Vec<&[u8]> = block
                .iter()
                .map(|h| &h[HEADER_SIZE..])
                .collect();
            match codec.encode(&payload_refs) {
                Ok(parity) => {
                    for (i, shard) in parity.into_iter().enumerate() {
                        let mut pdg = pool.acquire();
                        pdg[HEADER_SIZE..].copy_from_slice(&shard);
                        header::seal(&mut pdg, block_index, (k + i) as u8, true);
                        sink(&pdg);
                    }
                }
                Err(e) => {
                    warn!("fectx-worker: encode failed for block {block_index}: {e}");
                }
            }
            trace!("fectx-worker: closed block {block_index}");
            block.clear();
            block_index += 1;
        }
    }
    debug!("fectx-worker: exiting");
}
