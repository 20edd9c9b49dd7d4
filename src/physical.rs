//! Physical layer for the half-duplex UPDI wire
//!
//! The UPDI pin carries both directions of traffic, so every byte the host
//! transmits appears in its own receive path. Echo consumption and
//! verification happen here, in one place, so the layers above only ever see
//! reply data.

use log::{debug, trace};

use crate::protocol;
use crate::{Error, UpdiPort};

/// Framing driver for a UPDI transport.
#[allow(missing_debug_implementations)]
pub struct UpdiPhysical<P> {
    port: P,
}

impl<P: UpdiPort> UpdiPhysical<P> {
    /// Take ownership of the transport and perform the open handshake: one
    /// BREAK to reset the target's receiver, then SYNC so it can lock onto
    /// the host baud rate.
    pub fn new(port: P) -> Result<Self, Error> {
        let mut phy = UpdiPhysical { port };
        debug!("opening UPDI physical with break and sync");
        phy.send(&[protocol::BREAK, protocol::SYNC])?;
        Ok(phy)
    }

    /// Transmit `bytes` and consume the loopback echo.
    ///
    /// The echo must match what was sent byte for byte; a mismatch means the
    /// wire is disturbed or a target transmission collided with ours.
    pub fn send(&mut self, bytes: &[u8]) -> Result<(), Error> {
        trace!("send {:02X?}", bytes);
        self.port.send_bytes(bytes)?;

        let mut echo = vec![0u8; bytes.len()];
        self.port.receive_bytes(&mut echo)?;
        if echo != bytes {
            return Err(Error::Protocol(format!(
                "echo mismatch: sent {:02X?}, read back {:02X?}",
                bytes, echo
            )));
        }
        Ok(())
    }

    /// Read exactly `length` reply bytes.
    pub fn receive(&mut self, length: usize) -> Result<Vec<u8>, Error> {
        let mut buffer = vec![0u8; length];
        self.port.receive_bytes(&mut buffer)?;
        trace!("receive {:02X?}", buffer);
        Ok(buffer)
    }

    /// Resynchronise a target whose UPDI state has drifted.
    ///
    /// Two breaks in rapid succession terminate whatever partial frame the
    /// target may be waiting on. Anything pending in the receive path is
    /// stale afterwards and is discarded.
    pub fn send_double_break(&mut self) -> Result<(), Error> {
        debug!("sending double break");
        self.port.send_double_break()?;
        self.port.flush_receiver()
    }
}
