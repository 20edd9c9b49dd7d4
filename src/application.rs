//! Application layer: session lifecycle and key protocols
//!
//! Owns the whole stack. Builds it in 24-bit mode, reads and decodes the
//! SIB (with the single double-break recovery the protocol allows),
//! installs the right NVM driver, and runs the keyed state machines for
//! programming mode, chip-erase unlock and locked-device user-row writes.

use std::time::Duration;

use log::{debug, error, info, warn};

use crate::link::{AddressMode, UpdiDatalink};
use crate::memory::DeviceDescriptor;
use crate::nvm::{NvmP0, NvmP2, NvmP3, NvmP4, NvmP5, UpdiNvm};
use crate::physical::UpdiPhysical;
use crate::protocol::{self, CsRegister};
use crate::readwrite::UpdiReadWrite;
use crate::sib::{NvmVersion, SystemInfoBlock};
use crate::timeout::Deadline;
use crate::{Error, UpdiPort};

/// Budget for the lock-status poll when entering programming mode.
const PROGMODE_UNLOCK_TIMEOUT: Duration = Duration::from_millis(100);
/// Budget for the lock-status poll after a keyed chip erase.
const KEY_UNLOCK_TIMEOUT: Duration = Duration::from_millis(500);
/// Budget for entering and leaving user-row programming mode.
const UROW_MODE_TIMEOUT: Duration = Duration::from_millis(500);

/// Session driver for one UPDI target.
#[allow(missing_debug_implementations)]
pub struct UpdiApplication<P: UpdiPort> {
    readwrite: UpdiReadWrite<P>,
    nvm: Option<Box<dyn UpdiNvm<P>>>,
    device: DeviceDescriptor,
}

impl<P: UpdiPort> UpdiApplication<P> {
    /// Build the stack over `port` and activate the interface.
    ///
    /// The datalink starts in 24-bit mode; [`read_device_info`] narrows it
    /// to 16-bit if the SIB reveals a P:0 part.
    ///
    /// [`read_device_info`]: UpdiApplication::read_device_info
    pub fn new(port: P, device: DeviceDescriptor) -> Result<Self, Error> {
        let phy = UpdiPhysical::new(port)?;
        let mut link = UpdiDatalink::new(phy, AddressMode::Bits24);
        link.init()?;
        Ok(UpdiApplication {
            readwrite: UpdiReadWrite::new(link),
            nvm: None,
            device,
        })
    }

    /// The target this session was built for.
    pub fn device(&self) -> &DeviceDescriptor {
        &self.device
    }

    /// Read the SIB and install the matching NVM driver.
    ///
    /// A failed read or decode gets exactly one double-break recovery
    /// attempt; a second failure means the device cannot be contacted.
    pub fn read_device_info(&mut self) -> Result<SystemInfoBlock, Error> {
        let sib = match self.try_read_sib() {
            Ok(sib) => sib,
            Err(first) => {
                warn!(
                    "unable to read SIB ({}); attempting double-break recovery",
                    first
                );
                self.readwrite.link.phy.send_double_break()?;
                self.try_read_sib().map_err(|second| {
                    error!("double-break recovery failed; unable to contact device");
                    Error::Session(format!("failed to read device information: {}", second))
                })?
            }
        };

        match sib.nvm_version() {
            Some(NvmVersion::P0) => {
                info!("NVM P:0");
                // Original UPDI generation: narrow the link to 16-bit
                self.readwrite.link.set_address_mode(AddressMode::Bits16);
                self.readwrite.link.init()?;
                self.nvm = Some(Box::new(NvmP0::new(&self.device)));
            }
            Some(NvmVersion::P2) => {
                info!("NVM P:2");
                self.nvm = Some(Box::new(NvmP2::new(&self.device)));
            }
            Some(NvmVersion::P3) => {
                info!("NVM P:3");
                self.nvm = Some(Box::new(NvmP3::new(&self.device)));
            }
            Some(NvmVersion::P4) => {
                info!("NVM P:4");
                self.nvm = Some(Box::new(NvmP4::new(&self.device)));
            }
            Some(NvmVersion::P5) => {
                info!("NVM P:5");
                self.nvm = Some(Box::new(NvmP5::new(&self.device)));
            }
            None => {
                error!("unsupported NVM revision; NVM operations unavailable");
                self.nvm = None;
            }
        }

        let statusa = self.readwrite.read_cs(CsRegister::StatusA)?;
        info!(
            "PDI revision = 0x{:02X}",
            statusa >> protocol::STATUSA_REVID_BIT
        );

        if self.in_prog_mode()? {
            let devid = self.readwrite.read_data(self.device.sigrow_address, 3)?;
            let devrev = self.readwrite.read_byte(self.device.syscfg_address + 1)?;
            info!(
                "device id '{:02X}{:02X}{:02X}' rev '{}'",
                devid[0],
                devid[1],
                devid[2],
                (b'A'.wrapping_add(devrev)) as char
            );
        }
        Ok(sib)
    }

    fn try_read_sib(&mut self) -> Result<SystemInfoBlock, Error> {
        let raw = self.readwrite.read_sib()?;
        SystemInfoBlock::parse(&raw)
    }

    /// Read bytes from the target's data space.
    pub fn read_data(&mut self, address: u32, size: usize) -> Result<Vec<u8>, Error> {
        self.readwrite.read_data(address, size)
    }

    /// Read 16-bit words from the target's data space.
    pub fn read_data_words(&mut self, address: u32, words: usize) -> Result<Vec<u8>, Error> {
        self.readwrite.read_data_words(address, words)
    }

    /// Write bytes to the target's data space.
    pub fn write_data(&mut self, address: u32, data: &[u8]) -> Result<(), Error> {
        self.readwrite.write_data(address, data)
    }

    /// Write 16-bit words to the target's data space.
    pub fn write_data_words(&mut self, address: u32, data: &[u8]) -> Result<(), Error> {
        self.readwrite.write_data_words(address, data)
    }

    /// Whether the NVMPROG flag is up.
    pub fn in_prog_mode(&mut self) -> Result<bool, Error> {
        let status = self.readwrite.read_cs(CsRegister::AsiSysStatus)?;
        Ok(status & (1 << protocol::SYS_STATUS_NVMPROG_BIT) != 0)
    }

    /// Poll LOCKSTATUS until it clears. All devices boot as locked until
    /// proven otherwise.
    fn wait_unlocked(&mut self, budget: Duration) -> Result<bool, Error> {
        let deadline = Deadline::after(budget);
        loop {
            let status = self.readwrite.read_cs(CsRegister::AsiSysStatus)?;
            if status & (1 << protocol::SYS_STATUS_LOCKSTATUS_BIT) == 0 {
                return Ok(true);
            }
            if deadline.expired() {
                info!("timeout waiting for device to unlock");
                return Ok(false);
            }
        }
    }

    /// Poll the UROWPROG flag until it reaches the wanted level.
    fn wait_urow_prog(&mut self, budget: Duration, wait_for_high: bool) -> Result<bool, Error> {
        let deadline = Deadline::after(budget);
        loop {
            let status = self.readwrite.read_cs(CsRegister::AsiSysStatus)?;
            let high = status & (1 << protocol::SYS_STATUS_UROWPROG_BIT) != 0;
            if high == wait_for_high {
                return Ok(true);
            }
            if deadline.expired() {
                error!("timeout waiting for user-row programming mode");
                return Ok(false);
            }
        }
    }

    /// Unlock the device by keyed chip erase.
    pub fn unlock(&mut self) -> Result<(), Error> {
        self.readwrite
            .write_key(protocol::KEY_64, &protocol::KEY_CHIPERASE)?;

        let key_status = self.readwrite.read_cs(CsRegister::AsiKeyStatus)?;
        debug!("key status = 0x{:02X}", key_status);
        if key_status & (1 << protocol::KEY_STATUS_CHIPERASE_BIT) == 0 {
            return Err(Error::Protocol("key not accepted".to_string()));
        }

        self.reset(true)?;
        self.reset(false)?;

        if !self.wait_unlocked(KEY_UNLOCK_TIMEOUT)? {
            return Err(Error::Session("failed to chip erase using key".to_string()));
        }
        Ok(())
    }

    /// Write one page-sized payload to the user row of a locked device.
    ///
    /// The device stays locked afterwards; any failure past key acceptance
    /// winds the target down with a reset cycle before surfacing.
    pub fn write_user_row_locked_device(&mut self, address: u32, data: &[u8]) -> Result<(), Error> {
        self.readwrite
            .write_key(protocol::KEY_64, &protocol::KEY_USERROW)?;

        let key_status = self.readwrite.read_cs(CsRegister::AsiKeyStatus)?;
        debug!("key status = 0x{:02X}", key_status);
        if key_status & (1 << protocol::KEY_STATUS_UROWWRITE_BIT) == 0 {
            return Err(Error::Protocol("key not accepted".to_string()));
        }

        self.reset(true)?;
        self.reset(false)?;

        let result = self.user_row_session(address, data);

        // Wind down with a reset cycle whether or not the write stuck
        self.reset(true)?;
        self.reset(false)?;
        result
    }

    fn user_row_session(&mut self, address: u32, data: &[u8]) -> Result<(), Error> {
        if !self.wait_urow_prog(UROW_MODE_TIMEOUT, true)? {
            return Err(Error::Session(
                "failed to enter user-row write mode using key".to_string(),
            ));
        }

        // One 'page' can be transferred now; the target captures it for the
        // user row
        self.readwrite.write_data(address, data)?;

        self.readwrite.write_cs(
            CsRegister::AsiSysCtrlA,
            (1 << protocol::SYS_CTRLA_UROW_FINAL_BIT) | (1 << protocol::CTRLB_CCDETDIS_BIT),
        )?;

        if !self.wait_urow_prog(UROW_MODE_TIMEOUT, false)? {
            return Err(Error::Session(
                "failed to exit user-row write mode".to_string(),
            ));
        }

        self.readwrite.write_cs(
            CsRegister::AsiKeyStatus,
            (1 << protocol::KEY_STATUS_UROWWRITE_BIT) | (1 << protocol::CTRLB_CCDETDIS_BIT),
        )
    }

    /// Enter NVM programming mode. A no-op when NVMPROG is already up.
    pub fn enter_progmode(&mut self) -> Result<(), Error> {
        if self.in_prog_mode()? {
            debug!("already in NVM programming mode");
            return Ok(());
        }

        info!("entering NVM programming mode");

        // Hold the part in reset while the key goes in
        self.reset(true)?;

        self.readwrite
            .write_key(protocol::KEY_64, &protocol::KEY_NVMPROG)?;

        let key_status = self.readwrite.read_cs(CsRegister::AsiKeyStatus)?;
        debug!("key status = 0x{:02X}", key_status);
        if key_status & (1 << protocol::KEY_STATUS_NVMPROG_BIT) == 0 {
            error!("key status = 0x{:02X}", key_status);
            return Err(Error::Protocol("key not accepted".to_string()));
        }

        self.reset(true)?;
        self.reset(false)?;

        if !self.wait_unlocked(PROGMODE_UNLOCK_TIMEOUT)? {
            return Err(Error::Locked);
        }

        if !self.in_prog_mode()? {
            return Err(Error::Session(
                "failed to enter NVM programming mode".to_string(),
            ));
        }

        debug!("now in NVM programming mode");
        Ok(())
    }

    /// Disable UPDI, releasing any armed keys. Best-effort: the interface
    /// disable is attempted even if the reset cycle fails.
    pub fn leave_progmode(&mut self) -> Result<(), Error> {
        info!("leaving NVM programming mode");
        let reset_result = self.reset(true).and_then(|_| self.reset(false));
        if let Err(error) = &reset_result {
            warn!("reset during programming mode exit failed: {}", error);
        }
        let disable = self.readwrite.write_cs(
            CsRegister::CtrlB,
            (1 << protocol::CTRLB_UPDIDIS_BIT) | (1 << protocol::CTRLB_CCDETDIS_BIT),
        );
        reset_result.and(disable)
    }

    /// Apply or release the UPDI reset condition.
    pub fn reset(&mut self, apply: bool) -> Result<(), Error> {
        if apply {
            info!("apply reset");
            self.readwrite
                .write_cs(CsRegister::AsiResetReq, protocol::RESET_REQ_VALUE)
        } else {
            info!("release reset");
            self.readwrite.write_cs(CsRegister::AsiResetReq, 0x00)
        }
    }

    /// Erase the whole device through the NVM controller.
    pub fn chip_erase(&mut self) -> Result<(), Error> {
        match self.nvm.as_mut() {
            Some(nvm) => nvm.chip_erase(&mut self.readwrite),
            None => Err(Error::NotSupported("chip erase")),
        }
    }

    /// Erase one flash page.
    pub fn erase_flash_page(&mut self, address: u32) -> Result<(), Error> {
        match self.nvm.as_mut() {
            Some(nvm) => nvm.erase_flash_page(&mut self.readwrite, address),
            None => Err(Error::NotSupported("flash page erase")),
        }
    }

    /// Erase the EEPROM.
    pub fn erase_eeprom(&mut self) -> Result<(), Error> {
        match self.nvm.as_mut() {
            Some(nvm) => nvm.erase_eeprom(&mut self.readwrite),
            None => Err(Error::NotSupported("EEPROM erase")),
        }
    }

    /// Erase the user row.
    pub fn erase_user_row(&mut self, address: u32, size: usize) -> Result<(), Error> {
        match self.nvm.as_mut() {
            Some(nvm) => nvm.erase_user_row(&mut self.readwrite, address, size),
            None => Err(Error::NotSupported("user row erase")),
        }
    }

    /// Write one page of flash.
    pub fn write_flash(&mut self, address: u32, data: &[u8]) -> Result<(), Error> {
        match self.nvm.as_mut() {
            Some(nvm) => nvm.write_flash(&mut self.readwrite, address, data),
            None => Err(Error::NotSupported("flash write")),
        }
    }

    /// Write the user row (unlocked device).
    pub fn write_user_row(&mut self, address: u32, data: &[u8]) -> Result<(), Error> {
        match self.nvm.as_mut() {
            Some(nvm) => nvm.write_user_row(&mut self.readwrite, address, data),
            None => Err(Error::NotSupported("user row write")),
        }
    }

    /// Write EEPROM data.
    pub fn write_eeprom(&mut self, address: u32, data: &[u8]) -> Result<(), Error> {
        match self.nvm.as_mut() {
            Some(nvm) => nvm.write_eeprom(&mut self.readwrite, address, data),
            None => Err(Error::NotSupported("EEPROM write")),
        }
    }

    /// Write one fuse byte.
    pub fn write_fuse(&mut self, address: u32, value: u8) -> Result<(), Error> {
        match self.nvm.as_mut() {
            Some(nvm) => nvm.write_fuse(&mut self.readwrite, address, value),
            None => Err(Error::NotSupported("fuse write")),
        }
    }
}
