//! PHY transport boundary.
//!
//! A real deployment sits this on top of an SPI-attached radio; that
//! driver, its GPIO/clock setup, and its framing are out of scope
//! here. [`LoopbackPhy`] is an in-memory stand-in used by integration
//! tests and the `fec_loopback` demo binary.

use crate::error::Error;
use std::collections::VecDeque;

/// Abstract datagram transport. `send`/`receive` operate on whole
/// datagrams (header + payload); the boundary does no buffering of
/// its own beyond what an implementation chooses.
pub trait Phy: Send {
    /// Transmit one datagram.
    fn send(&mut self, buf: &[u8]) -> Result<(), Error>;

    /// Receive one datagram into `buf`, returning its length and an
    /// RSSI reading, or `None` if nothing is queued.
    fn receive(&mut self, buf: &mut [u8]) -> Result<Option<(usize, i8)>, Error>;
}

/// An in-memory, optionally-lossy `Phy` for tests and the demo
/// binary. Not a real SPI/radio driver.
#[derive(Default)]
pub struct LoopbackPhy {
    queue: VecDeque<Vec<u8>>,
}

impl LoopbackPhy {
    /// Create an empty loopback link.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject a datagram directly, bypassing `send`. Useful to model
    /// loss by simply not injecting a given `send`'s output.
    pub fn inject(&mut self, buf: &[u8]) {
        self.queue.push_back(buf.to_vec());
    }
}

impl Phy for LoopbackPhy {
    fn send(&mut self, buf: &[u8]) -> Result<(), Error> {
        self.queue.push_back(buf.to_vec());
        Ok(())
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<Option<(usize, i8)>, Error> {
        match self.queue.pop_front() {
            None => Ok(None),
            Some(dg) => {
                if dg.len() > buf.len() {
                    return Err(Error::Phy(format!(
                        "datagram of {} bytes does not fit in {}-byte buffer",
                        dg.len(),
                        buf.len()
                    )));
                }
                buf[..dg.len()].copy_from_slice(&dg);
                Ok(Some((dg.len(), 0)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_round_trip() {
        let mut phy = LoopbackPhy::new();
        phy.send(b"hello").unwrap();
        let mut buf = [0u8; 16];
        let (len, _rssi) = phy.receive(&mut buf).unwrap().unwrap();
        assert_eq!(&buf[..len], b"hello");
        assert!(phy.receive(&mut buf).unwrap().is_none());
    }
}
