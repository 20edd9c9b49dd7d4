//! Host-side programmer stack for the UPDI interface on modern AVR
//! microcontrollers
//!
//! UPDI (Unified Program and Debug Interface) is the single-wire programming
//! and debug interface found on the tinyAVR 0/1/2-series, megaAVR 0-series
//! and the AVR DA/DB/DD/DU/EA/EB families. This crate drives the
//! programming-mode subset of the interface over a standard asynchronous
//! serial adapter: reading, erasing and programming the target's
//! non-volatile memories (flash, EEPROM, fuses, lockbits, user row) and the
//! key-based unlock paths for locked parts.
//!
//! The stack is layered the way the protocol is layered:
//!
//! * [`UpdiPhysical`] — framing on the half-duplex wire: break/sync
//!   handshake, echo cancellation, double-break recovery.
//! * [`UpdiDatalink`] — the UPDI instruction set (LDS/STS/LD/ST/LDCS/STCS/
//!   REPEAT/KEY) in 16-bit or 24-bit address mode.
//! * [`UpdiReadWrite`] — vector reads and writes built from REPEAT bursts.
//! * [`UpdiNvm`] — one driver per NVM controller generation (P:0, P:2, P:3,
//!   P:4, P:5), selected from the System Information Block.
//! * [`UpdiApplication`] — session lifecycle, keys, reset control.
//! * [`Programmer`] — chunked memory access over [`MemorySegment`]s.
//!
//! # Transports
//!
//! The stack is generic over the [`UpdiPort`] transport trait. With the
//! default `serialport` feature a host serial adapter can be used directly:
//!
//! ```no_run
//! use serial_updi::{Programmer, UpdiSerialPort};
//! use serial_updi::devices::ATTINY827;
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), serial_updi::Error> {
//! let port = UpdiSerialPort::open("/dev/ttyUSB0", 115200, Duration::from_secs(1))?;
//! let mut prog = Programmer::new(port, ATTINY827)?;
//! prog.start()?;
//! let id = prog.read_device_id()?;
//! println!("device id {:02X}{:02X}{:02X}", id[2], id[1], id[0]);
//! prog.stop()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Wiring
//!
//! The UPDI pin is a single wire: connect the adapter's TX to the pin
//! through a series resistor (typically 470R..1k) and RX directly. Every
//! byte the host transmits is echoed back on RX; the physical layer consumes
//! and verifies the echo.
//!
//! ## License
//!
//! Licensed under either of
//!
//!  * Apache License, Version 2.0
//!    ([LICENSE-APACHE](LICENSE-APACHE) or http://www.apache.org/licenses/LICENSE-2.0)
//!  * MIT license
//!    ([LICENSE-MIT](LICENSE-MIT) or http://opensource.org/licenses/MIT)
//!
//! at your option.
// rustc lints.
#![warn(
    bare_trait_objects,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_qualifications,
    unused_results
)]

pub mod protocol;

mod error;
pub use error::Error;

mod timeout;

mod physical;
pub use physical::UpdiPhysical;

#[cfg(feature = "serialport")]
mod serial;
#[cfg(feature = "serialport")]
pub use serial::UpdiSerialPort;

mod link;
pub use link::{AddressMode, UpdiDatalink};

mod readwrite;
pub use readwrite::UpdiReadWrite;

mod sib;
pub use sib::{NvmVersion, SystemInfoBlock};

mod nvm;
pub use nvm::{NvmP0, NvmP2, NvmP3, NvmP4, NvmP5, UpdiNvm};

mod application;
pub use application::UpdiApplication;

mod memory;
pub use memory::{DeviceDescriptor, MemoryKind, MemorySegment};

mod programmer;
pub use programmer::{LockedDevicePolicy, Programmer};

pub mod devices;

/// A trait for byte transports carrying the UPDI wire. Implement this to add
/// support for a new host adapter. Transports must present the wire as a
/// half-duplex serial line: everything written is also looped back into the
/// receive path, and the receive side applies a read timeout.
pub trait UpdiPort {
    /// Write raw bytes to the wire.
    fn send_bytes(&mut self, bytes: &[u8]) -> Result<(), Error>;

    /// Read exactly `buffer.len()` bytes from the wire.
    ///
    /// If fewer bytes arrive before the transport's read timeout this must
    /// fail; partial reads are never returned.
    fn receive_bytes(&mut self, buffer: &mut [u8]) -> Result<(), Error>;

    /// Hold the line in a break condition twice in rapid succession.
    ///
    /// Each break must keep the line low for at least one character time at
    /// the slowest supported baud rate (the reference discipline is two 0x00
    /// characters at 300 baud, 8E1).
    fn send_double_break(&mut self) -> Result<(), Error>;

    /// Discard anything pending in the receive path.
    fn flush_receiver(&mut self) -> Result<(), Error>;
}
