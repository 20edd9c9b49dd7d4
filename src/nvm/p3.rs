//! NVM controller driver for P:3 parts
//!
//! Present on the AVR EA family. Page-buffer oriented: writes fill the
//! buffer and a commit command programs the page. One buffer serves both
//! flash and EEPROM. Every command is cleared with NOCMD once the
//! controller goes idle.

use log::debug;

use super::{NvmRegisters, UpdiNvm, CHIP_ERASE_TIMEOUT, READY_TIMEOUT};
use crate::memory::DeviceDescriptor;
use crate::readwrite::UpdiReadWrite;
use crate::{Error, UpdiPort};

// NVMCTRL register offsets
const NVMCTRL_CTRLA: u32 = 0x00;
const NVMCTRL_STATUS: u32 = 0x06;

// STATUS bit layout
const STATUS_WRITE_ERROR_MASK: u8 = 0x70;
const STATUS_WRITE_ERROR_SHIFT: u8 = 4;
const STATUS_EEPROM_BUSY_BIT: u8 = 0;
const STATUS_FLASH_BUSY_BIT: u8 = 1;

/// CTRLA commands.
#[derive(Clone, Copy, Debug, PartialEq)]
#[allow(unused)]
enum Command {
    NoCmd = 0x00,
    NoOp = 0x01,
    FlashPageWrite = 0x04,
    FlashPageEraseWrite = 0x05,
    FlashPageErase = 0x08,
    FlashPageBufferClear = 0x0F,
    EepromPageWrite = 0x14,
    EepromPageEraseWrite = 0x15,
    EepromPageErase = 0x17,
    EepromPageBufferClear = 0x1F,
    ChipErase = 0x20,
    EepromErase = 0x30,
}

/// P:3 NVM controller driver.
#[derive(Debug)]
pub struct NvmP3 {
    regs: NvmRegisters,
}

impl NvmP3 {
    /// Driver for the NVM controller of `device`.
    pub fn new(device: &DeviceDescriptor) -> Self {
        NvmP3 {
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

    /// Write one page through the shared page buffer: clear the buffer,
    /// load it by writing to the target location, commit, then NOCMD.
    fn write_page<P: UpdiPort>(
        &mut self,
        rw: &mut UpdiReadWrite<P>,
        address: u32,
        data: &[u8],
        word_access: bool,
        commit: Command,
    ) -> Result<(), Error> {
        self.regs
            .wait_ready(rw, READY_TIMEOUT, "before page buffer clear")?;

        debug!("clear page buffer");
        self.regs
            .command(rw, Command::FlashPageBufferClear as u8)?;
        self.regs
            .wait_ready(rw, READY_TIMEOUT, "after page buffer clear")?;

        if word_access {
            rw.write_data_words(address, data)?;
        } else {
            rw.write_data(address, data)?;
        }

        debug!("committing data");
        self.regs.command(rw, commit as u8)?;

        self.regs
            .finish_command(rw, READY_TIMEOUT, "after page write", Command::NoCmd as u8)
    }
}

impl<P: UpdiPort> UpdiNvm<P> for NvmP3 {
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

        // The dummy write loads the page address before the erase is armed
        rw.write_data(address, &[0xFF])?;

        self.regs.command(rw, Command::FlashPageErase as u8)?;

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
        debug!("erase user row");
        // The user row is flash on this generation
        self.erase_flash_page(rw, address)
    }

    fn write_flash(
        &mut self,
        rw: &mut UpdiReadWrite<P>,
        address: u32,
        data: &[u8],
    ) -> Result<(), Error> {
        self.write_page(rw, address, data, true, Command::FlashPageWrite)
    }

    fn write_user_row(
        &mut self,
        rw: &mut UpdiReadWrite<P>,
        address: u32,
        data: &[u8],
    ) -> Result<(), Error> {
        // The user row is flash on this generation
        self.write_page(rw, address, data, true, Command::FlashPageWrite)
    }

    fn write_eeprom(
        &mut self,
        rw: &mut UpdiReadWrite<P>,
        address: u32,
        data: &[u8],
    ) -> Result<(), Error> {
        self.write_page(rw, address, data, false, Command::EepromPageEraseWrite)
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
