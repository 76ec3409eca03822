/*! Demo binary: feeds a file (or stdin) through `FecTx`, across a
lossy in-memory `LoopbackPhy`, into `FecRx`, and writes whatever the
decoder recovers to stdout.

```text
$ fec_loopback --k 4 --n 6 --mtu 188 --loss 0.2 < input.bin > output.bin
```

Not a production CLI: there's no real radio underneath, just
[`radiofec::phy::LoopbackPhy`] with a configurable per-datagram drop
probability, there to exercise the packer/unpacker end to end.
*/
use std::io::{Read, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use log::{info, warn};
use rand::Rng;

use radiofec::config::{CodingParams, RxConfig, TxConfig};
use radiofec::fec::RsCodec;
use radiofec::phy::{LoopbackPhy, Phy};
use radiofec::rx::FecRx;
use radiofec::tx::FecTx;

#[derive(clap::Parser, Debug)]
#[command(version, about)]
struct Opt {
    /// Payload datagrams per block.
    #[arg(long, default_value = "4")]
    k: usize,

    /// Total datagrams per block (k payload + n-k parity).
    #[arg(long, default_value = "6")]
    n: usize,

    /// Payload bytes per datagram.
    #[arg(long, default_value = "188")]
    mtu: usize,

    /// Fraction of datagrams dropped on the link, 0.0-1.0.
    #[arg(long, default_value = "0.15")]
    loss: f64,

    /// Verbosity of debug messages.
    #[arg(short, default_value = "0")]
    verbose: usize,
}

fn main() -> Result<()> {
    let opt = Opt::parse();
    stderrlog::new()
        .module(module_path!())
        .module("radiofec")
        .quiet(false)
        .verbosity(opt.verbose)
        .timestamp(stderrlog::Timestamp::Second)
        .init()?;

    let coding = CodingParams {
        k: opt.k,
        n: opt.n,
        mtu: opt.mtu,
    };
    let codec = Arc::new(RsCodec::new(coding.k, coding.n)?);

    let mut input = Vec::new();
    std::io::stdin().read_to_end(&mut input)?;
    // Pad to a whole number of MTU chunks: add_tx_packet only queues a
    // datagram once its payload region is full.
    let pad = (coding.mtu - input.len() % coding.mtu) % coding.mtu;
    input.resize(input.len() + pad, 0);

    let phy = Arc::new(Mutex::new(LoopbackPhy::new()));
    let loss = opt.loss.clamp(0.0, 1.0);
    let dropped = Arc::new(Mutex::new(0u64));

    let rx_out: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
    let rx_sink = rx_out.clone();
    let rx = Arc::new(FecRx::new(
        RxConfig {
            coding,
            fifo_depth: 64,
            mtu_ceiling: 4096,
            reset_duration: Duration::from_secs(5),
        },
        codec.clone(),
        Box::new(move |buf: &[u8]| rx_sink.lock().unwrap().extend_from_slice(buf)),
    )?);

    let tx_phy = phy.clone();
    let tx_dropped = dropped.clone();
    let tx = FecTx::new(
        TxConfig {
            coding,
            fifo_depth: 64,
            mtu_ceiling: 4096,
        },
        codec,
        Box::new(move |buf: &[u8]| {
            if rand::rng().random_bool(loss) {
                *tx_dropped.lock().unwrap() += 1;
                return;
            }
            if let Err(e) = tx_phy.lock().unwrap().send(buf) {
                warn!("fec_loopback: phy send failed: {e}");
            }
        }),
    )?;

    let cancel_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    {
        let cancel_flag = cancel_flag.clone();
        ctrlc::set_handler(move || {
            eprintln!("Received Ctrl+C!");
            cancel_flag.store(true, std::sync::atomic::Ordering::SeqCst);
        })?;
    }

    tx.add_tx_packet(&input);
    drop(tx);

    let mut buf = vec![0u8; coding.mtu + 16];
    loop {
        if cancel_flag.load(std::sync::atomic::Ordering::SeqCst) {
            break;
        }
        let received = phy.lock().unwrap().receive(&mut buf)?;
        match received {
            Some((len, _rssi)) => {
                rx.add_rx_packet(&buf[..len]);
            }
            None => break,
        }
    }

    let rx = Arc::try_unwrap(rx).unwrap_or_else(|rx| {
        // A clone escaped (shouldn't happen in this binary); fall back
        // to waiting instead of forcing a join.
        std::thread::sleep(Duration::from_millis(100));
        match Arc::try_unwrap(rx) {
            Ok(rx) => rx,
            Err(_) => panic!("fec_loopback: FecRx still has outstanding references"),
        }
    });
    let stats = rx.stats();
    drop(rx);

    info!(
        "fec_loopback: sent {} bytes, dropped {} datagrams on the link, rx stats: {:?}",
        input.len(),
        *dropped.lock().unwrap(),
        stats
    );

    std::io::stdout().write_all(&rx_out.lock().unwrap())?;
    Ok(())
}
