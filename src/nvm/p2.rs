//! NVM controller driver for P:2 parts
//!
//! Present on the AVR DA, DB and DD families. No page buffer: the flash
//! write command arms the controller and each word is programmed as it
//! arrives on the bus. Fuses and user-row-sized memories are EEPROM-backed.
//! Every command is cleared with NOCMD once the controller goes idle.

use log::debug;

use super::{NvmRegisters, UpdiNvm, CHIP_ERASE_TIMEOUT, READY_TIMEOUT};
use crate::memory::DeviceDescriptor;
use crate::readwrite::UpdiReadWrite;
use crate::{Error, UpdiPort};

// NVMCTRL register offsets
const NVMCTRL_CTRLA: u32 = 0x00;
const NVMCTRL_STATUS: u32 = 0x02;

// STATUS bit layout
const STATUS_WRITE_ERROR_MASK: u8 = 0x70;
const STATUS_WRITE_ERROR_SHIFT: u8 = 4;
const STATUS_EEPROM_BUSY_BIT: u8 = 1;
const STATUS_FLASH_BUSY_BIT: u8 = 0;

/// CTRLA commands.
#[derive(Clone, Copy, Debug, PartialEq)]
#[allow(unused)]
enum Command {
    NoCmd = 0x00,
    NoOp = 0x01,
    FlashWrite = 0x02,
    FlashPageErase = 0x08,
    EepromWrite = 0x12,
    EepromEraseWrite = 0x13,
    EepromByteErase = 0x18,
    ChipErase = 0x20,
    EepromErase = 0x30,
}

/// P:2 NVM controller driver.
#[derive(Debug)]
pub struct NvmP2 {
    regs: NvmRegisters,
}

impl NvmP2 {
    /// Driver for the NVM controller of `device`.
    pub fn new(device: &DeviceDescriptor) -> Self {
        NvmP2 {
            regs: NvmRegisters {
                base: device.nvmctrl_address,
                ctrla: NVMCTRL_CTRLA,
                status: NVMCTRL_STATUS,
                flash_busy_bit: STATUS_FLASH_BUSY_BIT,
                eeprom_busy_bit: STATUS_EEPROM_BUSY_BIT,
                error_mask: STATUS_WRITE_ERROR_MASK,
                error_shift: STATUS_WRITE_ERROR_SHIFT,
            },
        }
    }

    /// Arm the flash write command and stream the data; there is no page
    /// buffer on this generation.
    fn write_nvm<P: UpdiPort>(
        &mut self,
        rw: &mut UpdiReadWrite<P>,
        address: u32,
        data: &[u8],
        word_access: bool,
    ) -> Result<(), Error> {
        self.regs
            .wait_ready(rw, READY_TIMEOUT, "before flash write")?;

        debug!("NVM write command");
        self.regs.command(rw, Command::FlashWrite as u8)?;

        if word_access {
            rw.write_data_words(address, data)?;
        } else {
            rw.write_data(address, data)?;
        }

        self.regs
            .finish_command(rw, READY_TIMEOUT, "after data write", Command::NoCmd as u8)
    }
}

impl<P: UpdiPort> UpdiNvm<P> for NvmP2 {
    fn chip_erase(&mut self, rw: &mut UpdiReadWrite<P>) -> Result<(), Error> {
        debug!("chip erase using NVM CTRL");
        self.regs
            .wait_ready(rw, READY_TIMEOUT, "before chip erase")?;
        self.regs.command(rw, Command::ChipErase as u8)?;
        self.regs.finish_command(
            rw,
            CHIP_ERASE_TIMEOUT,
            "after chip erase",
            Command::NoCmd as u8,
        )
    }

    fn erase_flash_page(&mut self, rw: &mut UpdiReadWrite<P>, address: u32) -> Result<(), Error> {
        debug!("erase flash page at 0x{:06X}", address);
        self.regs
            .wait_ready(rw, READY_TIMEOUT, "before flash page erase")?;

        self.regs.command(rw, Command::FlashPageErase as u8)?;

        // The dummy write supplies the page address to the armed command
        rw.write_data(address, &[0xFF])?;

        self.regs.finish_command(
            rw,
            READY_TIMEOUT,
            "after flash page erase",
            Command::NoCmd as u8,
        )
    }

    fn erase_eeprom(&mut self, rw: &mut UpdiReadWrite<P>) -> Result<(), Error> {
        debug!("erase EEPROM");
        self.regs
            .wait_ready(rw, READY_TIMEOUT, "before EEPROM erase")?;
        self.regs.command(rw, Command::EepromErase as u8)?;
        self.regs.finish_command(
            rw,
            READY_TIMEOUT,
            "after EEPROM erase",
            Command::NoCmd as u8,
        )
    }

    fn erase_user_row(
        &mut self,
        rw: &mut UpdiReadWrite<P>,
        address: u32,
        _size: usize,
    ) -> Result<(), Error> {
        // The user row is flash on this generation
        self.erase_flash_page(rw, address)
    }

    fn write_flash(
        &mut self,
        rw: &mut UpdiReadWrite<P>,
        address: u32,
        data: &[u8],
    ) -> Result<(), Error> {
        self.write_nvm(rw, address, data, true)
    }

    fn write_user_row(
        &mut self,
        rw: &mut UpdiReadWrite<P>,
        address: u32,
        data: &[u8],
    ) -> Result<(), Error> {
        // Flash-backed, but written with byte access
        self.write_nvm(rw, address, data, false)
    }

    fn write_eeprom(
        &mut self,
        rw: &mut UpdiReadWrite<P>,
        address: u32,
        data: &[u8],
    ) -> Result<(), Error> {
        self.regs
            .wait_ready(rw, READY_TIMEOUT, "before EEPROM write")?;

        debug!("NVM EEPROM erase/write command");
        self.regs.command(rw, Command::EepromEraseWrite as u8)?;

        rw.write_data(address, data)?;

        self.regs.finish_command(
            rw,
            READY_TIMEOUT,
            "after EEPROM write",
            Command::NoCmd as u8,
        )
    }

    fn write_fuse(
        &mut self,
        rw: &mut UpdiReadWrite<P>,
        address: u32,
        value: u8,
    ) -> Result<(), Error> {
        // Fuses are EEPROM-backed on this generation
        self.write_eeprom(rw, address, &[value])
    }
}
