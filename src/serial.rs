//! Host serial adapter transport
//!
//! Backs [`UpdiPort`] with a `serialport` handle configured for the UPDI
//! line discipline: 8 data bits, even parity, 2 stop bits.

use std::io::{Read, Write};
use std::time::Duration;

use log::{debug, info};
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};

use crate::{Error, UpdiPort};

/// A host serial port speaking the UPDI line discipline.
#[allow(missing_debug_implementations)]
pub struct UpdiSerialPort {
    port: Box<dyn SerialPort>,
    baud: u32,
}

impl UpdiSerialPort {
    /// Open `path` at `baud` with the given read timeout.
    ///
    /// The port is configured 8E2. DTR and RTS are deasserted; adapters that
    /// gate the UPDI pin on a handshake line would otherwise hold the target
    /// in an undefined state.
    pub fn open(path: &str, baud: u32, timeout: Duration) -> Result<Self, Error> {
        info!("opening {} at {} baud", path, baud);
        let mut port = serialport::new(path, baud)
            .data_bits(DataBits::Eight)
            .parity(Parity::Even)
            .stop_bits(StopBits::Two)
            .flow_control(FlowControl::None)
            .timeout(timeout)
            .open()?;
        port.write_data_terminal_ready(false)?;
        port.write_request_to_send(false)?;
        Ok(UpdiSerialPort { port, baud })
    }
}

impl UpdiPort for UpdiSerialPort {
    fn send_bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.port.write_all(bytes)?;
        self.port.flush()?;
        Ok(())
    }

    fn receive_bytes(&mut self, buffer: &mut [u8]) -> Result<(), Error> {
        self.port.read_exact(buffer)?;
        Ok(())
    }

    fn send_double_break(&mut self) -> Result<(), Error> {
        debug!("double break at 300 baud");
        // A 0x00 character at 300 baud holds the line low for ~30 ms,
        // above the 24.6 ms a break must last at the slowest UPDI clock.
        self.port.set_baud_rate(300)?;
        self.port.set_stop_bits(StopBits::One)?;
        self.port.write_all(&[0x00, 0x00])?;
        self.port.flush()?;
        // Wait out the loopback of both breaks before switching back
        let mut echo = [0u8; 2];
        let _ = self.port.read_exact(&mut echo);
        self.port.set_baud_rate(self.baud)?;
        self.port.set_stop_bits(StopBits::Two)?;
        Ok(())
    }

    fn flush_receiver(&mut self) -> Result<(), Error> {
        self.port.clear(ClearBuffer::Input)?;
        Ok(())
    }
}
