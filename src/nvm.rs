//! NVM controller drivers
//!
//! Each AVR family generation carries a different NVM controller: different
//! register offsets, command sets, page-buffer arrangements and busy
//! semantics. One driver per generation implements the common [`UpdiNvm`]
//! interface; the right one is installed after the SIB reveals the family.
//!
//! All drivers share the same two primitives: poll the STATUS register
//! until both busy flags clear, and write a command byte to CTRLA.

use std::time::Duration;

use log::{debug, error};

use crate::readwrite::UpdiReadWrite;
use crate::timeout::Deadline;
use crate::{Error, UpdiPort};

mod p0;
mod p2;
mod p3;
mod p4;
mod p5;

pub use p0::NvmP0;
pub use p2::NvmP2;
pub use p3::NvmP3;
pub use p4::NvmP4;
pub use p5::NvmP5;

/// Budget for ordinary write and erase waits.
pub(crate) const READY_TIMEOUT: Duration = Duration::from_millis(100);
/// Budget for a full chip erase.
pub(crate) const CHIP_ERASE_TIMEOUT: Duration = Duration::from_secs(10);

/// Operations every NVM controller generation provides.
///
/// Addresses are absolute (UPDI data-space) addresses; writes are
/// page-granular and the caller is responsible for page alignment and any
/// erase-before-write the memory needs.
pub trait UpdiNvm<P: UpdiPort> {
    /// Erase the whole device using the NVM controller.
    ///
    /// Not possible on a locked part; use the chip-erase key instead.
    fn chip_erase(&mut self, rw: &mut UpdiReadWrite<P>) -> Result<(), Error>;

    /// Erase the flash page containing `address`.
    fn erase_flash_page(&mut self, rw: &mut UpdiReadWrite<P>, address: u32) -> Result<(), Error>;

    /// Erase the EEPROM only.
    fn erase_eeprom(&mut self, rw: &mut UpdiReadWrite<P>) -> Result<(), Error>;

    /// Erase the user row at `address` of `size` bytes.
    fn erase_user_row(
        &mut self,
        rw: &mut UpdiReadWrite<P>,
        address: u32,
        size: usize,
    ) -> Result<(), Error>;

    /// Write one page of flash.
    fn write_flash(&mut self, rw: &mut UpdiReadWrite<P>, address: u32, data: &[u8])
        -> Result<(), Error>;

    /// Write the user row.
    fn write_user_row(
        &mut self,
        rw: &mut UpdiReadWrite<P>,
        address: u32,
        data: &[u8],
    ) -> Result<(), Error>;

    /// Write EEPROM data.
    fn write_eeprom(
        &mut self,
        rw: &mut UpdiReadWrite<P>,
        address: u32,
        data: &[u8],
    ) -> Result<(), Error>;

    /// Write one fuse byte.
    fn write_fuse(&mut self, rw: &mut UpdiReadWrite<P>, address: u32, value: u8)
        -> Result<(), Error>;
}

/// NVM controller register map and STATUS layout for one generation.
///
/// Drivers compose this instead of inheriting shared behaviour; the busy
/// poll and command write are identical across generations once the offsets
/// and bit positions are filled in.
#[derive(Debug)]
pub(crate) struct NvmRegisters {
    /// NVMCTRL base address in the UPDI data space.
    pub base: u32,
    /// CTRLA offset (command register).
    pub ctrla: u32,
    /// STATUS offset.
    pub status: u32,
    /// Flash-busy bit position in STATUS.
    pub flash_busy_bit: u8,
    /// EEPROM-busy bit position in STATUS.
    pub eeprom_busy_bit: u8,
    /// Write-error field mask in STATUS.
    pub error_mask: u8,
    /// Write-error field shift.
    pub error_shift: u8,
}

impl NvmRegisters {
    /// Write a command byte to CTRLA.
    pub fn command<P: UpdiPort>(
        &self,
        rw: &mut UpdiReadWrite<P>,
        command: u8,
    ) -> Result<(), Error> {
        debug!("NVM command 0x{:02X}", command);
        rw.write_byte(self.base + self.ctrla, command)
    }

    /// Poll STATUS until both busy flags clear.
    ///
    /// Returns `Ok(false)` once the budget expires with a flag still set. A
    /// non-zero error field fails immediately with the decoded code.
    pub fn poll_ready<P: UpdiPort>(
        &self,
        rw: &mut UpdiReadWrite<P>,
        budget: Duration,
    ) -> Result<bool, Error> {
        debug!("wait NVM ready");
        let deadline = Deadline::after(budget);
        let busy = (1 << self.flash_busy_bit) | (1 << self.eeprom_busy_bit);
        loop {
            let status = rw.read_byte(self.base + self.status)?;
            if status & self.error_mask != 0 {
                let code = (status & self.error_mask) >> self.error_shift;
                error!("NVM error ({})", code);
                return Err(Error::Nvm { code });
            }
            if status & busy == 0 {
                return Ok(true);
            }
            if deadline.expired() {
                error!("wait NVM ready timed out");
                return Ok(false);
            }
        }
    }

    /// Poll STATUS and fail with `context` if the budget expires.
    pub fn wait_ready<P: UpdiPort>(
        &self,
        rw: &mut UpdiReadWrite<P>,
        budget: Duration,
        context: &'static str,
    ) -> Result<(), Error> {
        if self.poll_ready(rw, budget)? {
            Ok(())
        } else {
            Err(Error::NvmTimeout(context))
        }
    }

    /// Wait out a command and clear the command register with `nocmd`.
    ///
    /// The clear happens on the timeout and error paths too, so the
    /// controller is never left with a stale command armed.
    pub fn finish_command<P: UpdiPort>(
        &self,
        rw: &mut UpdiReadWrite<P>,
        budget: Duration,
        context: &'static str,
        nocmd: u8,
    ) -> Result<(), Error> {
        let ready = self.poll_ready(rw, budget);
        debug!("clear NVM command");
        match ready {
            Ok(true) => self.command(rw, nocmd),
            Ok(false) => {
                self.command(rw, nocmd)?;
                Err(Error::NvmTimeout(context))
            }
            Err(error) => {
                // The controller may be wedged; clearing is best effort
                let _ = self.command(rw, nocmd);
                Err(error)
            }
        }
    }
}
