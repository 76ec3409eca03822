//! RX pipeline: arbitrarily-ordered, lossy datagrams in, decoded
//! payload bytes out.

use crate::cancel::CancelToken;
use crate::config::{MAX_PENDING_BLOCKS, RxConfig};
use crate::error::Error;
use crate::fec::ErasureCodec;
use crate::header::{self, HEADER_SIZE};
use crate::pool::{Handle, Pool};
use crate::stats::{Stats, StatsSnapshot};
use log::{debug, info, trace, warn};
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

type Sink = Box<dyn Fn(&[u8]) + Send + Sync>;

struct RxIngest {
    block_index: u32,
    datagram_index: u8,
    is_fec: bool,
    payload: Handle<Vec<u8>>,
}

struct RxQueue {
    lock: Mutex<VecDeque<RxIngest>>,
    cv: Condvar,
    capacity: usize,
}

impl RxQueue {
    fn new(capacity: usize) -> Self {
        Self {
            lock: Mutex::new(VecDeque::new()),
            cv: Condvar::new(),
            capacity,
        }
    }

    fn push(&self, item: RxIngest, cancel: &CancelToken) -> bool {
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

    /// Block until at least one item is queued or shutdown is
    /// requested, then drain everything currently queued.
    fn drain_blocking(&self, cancel: &CancelToken) -> Vec<RxIngest> {
        let mut guard = self.lock.lock().unwrap();
        loop {
            if !guard.is_empty() {
                let items = guard.drain(..).collect();
                self.cv.notify_all();
                return items;
            }
            if cancel.is_canceled() {
                return Vec::new();
            }
            guard = self.cv.wait(guard).unwrap();
        }
    }

    fn notify_all(&self) {
        let _guard = self.lock.lock().unwrap();
        self.cv.notify_all();
    }
}

struct RxDatagram {
    datagram_index: u8,
    payload: Handle<Vec<u8>>,
    delivered: bool,
}

#[derive(Default)]
struct RxBlock {
    block_index: u32,
    payload: Vec<RxDatagram>,
    parity: Vec<RxDatagram>,
}

fn insert_sorted(vec: &mut Vec<RxDatagram>, dg: RxDatagram, stats: &Stats) {
    match vec.binary_search_by_key(&dg.datagram_index, |d| d.datagram_index) {
        Ok(_) => stats.record_duplicate(),
        Err(pos) => vec.insert(pos, dg),
    }
}

/// Deliver every not-yet-delivered payload datagram in ascending
/// order. Used by both the complete-block and FEC-recovery paths.
/// Refreshes `last_datagram_tp` on each actual delivery, not on mere
/// arrival, so the idle-reset check keys off inter-delivery gaps.
fn deliver_all(block: &mut RxBlock, sink: &Sink, last_datagram_tp: &mut Instant) {
    for dg in block.payload.iter_mut() {
        if !dg.delivered {
            sink(&dg.payload);
            dg.delivered = true;
            *last_datagram_tp = Instant::now();
        }
    }
}

/// Deliver the in-order prefix of payload datagrams (`datagram_index`
/// 0, 1, 2, ... with no gap) without retiring the block.
fn deliver_progressive_prefix(block: &mut RxBlock, sink: &Sink, last_datagram_tp: &mut Instant) {
    let mut expected: u8 = 0;
    for dg in block.payload.iter_mut() {
        if dg.datagram_index != expected {
            break;
        }
        if !dg.delivered {
            sink(&dg.payload);
            dg.delivered = true;
            *last_datagram_tp = Instant::now();
        }
        expected += 1;
    }
}

/// Decodes lossy, out-of-order datagrams back into an in-order byte
/// stream, delivered through a sink callback on a dedicated worker
/// thread.
pub struct FecRx {
    queue: Arc<RxQueue>,
    pool: Pool<Vec<u8>>,
    n: usize,
    cancel: CancelToken,
    worker: Option<JoinHandle<()>>,
    stats: Arc<Stats>,
}

impl FecRx {
    /// Coding parameter `N` this instance was constructed with.
    pub fn n(&self) -> usize {
        self.n
    }

    /// Construct a new RX unpacker and spawn its decoder thread.
    pub fn new(config: RxConfig, codec: Arc<dyn ErasureCodec>, sink: Sink) -> Result<Self, Error> {
        config.coding.validate(config.mtu_ceiling)?;
        let mtu = config.coding.mtu;
        let pool: Pool<Vec<u8>> = Pool::with_hooks(
            Some(Box::new(move |v: &mut Vec<u8>| {
                v.clear();
                v.resize(mtu, 0);
            })),
            None,
        );
        let block_pool: Pool<RxBlock> = Pool::with_hooks(
            None,
            Some(Box::new(|b: &mut RxBlock| {
                b.payload.clear();
                b.parity.clear();
            })),
        );
        let queue = Arc::new(RxQueue::new(config.fifo_depth));
        let cancel = CancelToken::new();
        let stats = Arc::new(Stats::default());

        let worker = {
            let queue = queue.clone();
            let cancel = cancel.clone();
            let stats = stats.clone();
            let worker_pool = pool.clone();
            let k = config.coding.k;
            let n = config.coding.n;
            let reset_duration = config.reset_duration;
            std::thread::Builder::new()
                .name("fecrx-worker".to_string())
                .spawn(move || {
                    decoder_loop(
                        queue,
                        cancel,
                        block_pool,
                        worker_pool,
                        codec,
                        sink,
                        stats,
                        k,
                        n,
                        reset_duration,
                    )
                })
                .map_err(|e| Error::Codec(format!("failed to spawn fecrx-worker: {e}")))?
        };

        Ok(Self {
            queue,
            pool,
            n: config.coding.n,
            cancel,
            worker: Some(worker),
            stats,
        })
    }

    /// Ingest one received wire datagram. Returns `false` if the
    /// datagram is too short to contain a header, carries an
    /// out-of-range index, or the packer is shutting down; in all of
    /// these cases the datagram is dropped rather than queued.
    /// Otherwise blocks until FIFO space is available and returns
    /// `true`.
    pub fn add_rx_packet(&self, bytes: &[u8]) -> bool {
        if self.cancel.is_canceled() {
            return false;
        }
        let parsed = match header::parse(bytes) {
            Ok(p) => p,
            Err(e) => {
                trace!("add_rx_packet: malformed datagram: {e}");
                self.stats.record_malformed();
                return false;
            }
        };
        if parsed.datagram_index as usize >= self.n {
            warn!(
                "add_rx_packet: index {} out of range for n={}",
                parsed.datagram_index, self.n
            );
            self.stats.record_out_of_range();
            return false;
        }
        let mut payload = self.pool.acquire();
        let payload_len = parsed.size - HEADER_SIZE;
        payload.resize(payload_len, 0);
        payload.copy_from_slice(&bytes[HEADER_SIZE..]);
        self.queue.push(
            RxIngest {
                block_index: parsed.block_index,
                datagram_index: parsed.datagram_index,
                is_fec: parsed.is_fec,
                payload,
            },
            &self.cancel,
        )
    }

    /// Snapshot of dropped/retired/recovered counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

impl Drop for FecRx {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.queue.notify_all();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        info!("fecrx: shut down, stats={:?}", self.stats.snapshot());
    }
}

#[allow(clippy::too_many_arguments)]
fn decoder_loop(
    queue: Arc<RxQueue>,
    cancel: CancelToken,
    block_pool: Pool<RxBlock>,
    payload_pool: Pool<Vec<u8>>,
    codec: Arc<dyn ErasureCodec>,
    sink: Sink,
    stats: Arc<Stats>,
    k: usize,
    n: usize,
    reset_duration: Duration,
) {
    debug!("fecrx-worker: started, k={k} n={n}");
    let mut block_queue: VecDeque<Handle<RxBlock>> = VecDeque::new();
    let mut next_block_index: u32 = 0;
    let mut last_datagram_tp = Instant::now();

    loop {
        let items = queue.drain_blocking(&cancel);
        if items.is_empty() {
            break;
        }
        if last_datagram_tp.elapsed() > reset_duration {
            debug!("fecrx-worker: idle past reset_duration, resetting next_block_index");
            next_block_index = 0;
        }

        for item in items {
            if item.block_index < next_block_index {
                stats.record_stale_block();
                continue;
            }
            let pos = match block_queue.binary_search_by_key(&item.block_index, |b| b.block_index)
            {
                Ok(pos) => pos,
                Err(pos) => {
                    let mut h = block_pool.acquire();
                    h.block_index = item.block_index;
                    block_queue.insert(pos, h);
                    pos
                }
            };
            let block = &mut block_queue[pos];
            let dg = RxDatagram {
                datagram_index: item.datagram_index,
                payload: item.payload,
                delivered: false,
            };
            if item.is_fec {
                insert_sorted(&mut block.parity, dg, &stats);
            } else {
                insert_sorted(&mut block.payload, dg, &stats);
            }
        }

        loop {
            let Some(front) = block_queue.front_mut() else {
                break;
            };

            if front.payload.len() >= k {
                deliver_all(front, &sink, &mut last_datagram_tp);
                let block_index = front.block_index;
                block_queue.pop_front();
                next_block_index = block_index + 1;
                stats.record_complete();
                trace!("fecrx-worker: block {block_index} complete, delivered in full");
                continue;
            }

            deliver_progressive_prefix(front, &sink, &mut last_datagram_tp);

            if front.payload.len() + front.parity.len() >= k {
                let block_index = front.block_index;
                let mut shards: Vec<Option<Vec<u8>>> = vec![None; n];
                for dg in &front.payload {
                    shards[dg.datagram_index as usize] = Some(dg.payload.to_vec());
                }
                for dg in &front.parity {
                    shards[dg.datagram_index as usize] = Some(dg.payload.to_vec());
                }
                match codec.decode(&mut shards) {
                    Ok(()) => {
                        for (i, shard) in shards.into_iter().take(k).enumerate() {
                            let already = front
                                .payload
                                .binary_search_by_key(&(i as u8), |d| d.datagram_index)
                                .is_ok();
                            if already {
                                continue;
                            }
                            if let Some(bytes) = shard {
                                let mut handle = payload_pool.acquire();
                                handle.copy_from_slice(&bytes);
                                let pos = front
                                    .payload
                                    .binary_search_by_key(&(i as u8), |d| d.datagram_index)
                                    .unwrap_err();
                                front.payload.insert(
                                    pos,
                                    RxDatagram {
                                        datagram_index: i as u8,
                                        payload: handle,
                                        delivered: false,
                                    },
                                );
                            }
                        }
                        deliver_all(front, &sink, &mut last_datagram_tp);
                        stats.record_fec_recovered();
                        trace!("fecrx-worker: block {block_index} recovered via fec");
                    }
                    Err(e) => {
                        warn!("fecrx-worker: fec decode failed for block {block_index}: {e}");
                    }
                }
                block_queue.pop_front();
                next_block_index = block_index + 1;
                continue;
            }

            if block_queue.len() > MAX_PENDING_BLOCKS {
                let block_index = front.block_index;
                block_queue.pop_front();
                next_block_index = block_index + 1;
                stats.record_block_retired();
                trace!("fecrx-worker: block {block_index} retired without full delivery");
                continue;
            }

            break;
        }
    }
    debug!("fecrx-worker: exiting");
}
