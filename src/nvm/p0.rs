//! NVM controller driver for P:0 parts
//!
//! Present on the tinyAVR 0/1/2-series and megaAVR 0-series (tiny817
//! through mega4809). A single page buffer serves both flash and EEPROM;
//! fuses have their own write command driven through the controller's ADDR
//! and DATA registers.

use log::debug;

use super::{NvmRegisters, UpdiNvm, CHIP_ERASE_TIMEOUT, READY_TIMEOUT};
use crate::memory::DeviceDescriptor;
use crate::readwrite::UpdiReadWrite;
use crate::{Error, UpdiPort};

// NVMCTRL register offsets
const NVMCTRL_CTRLA: u32 = 0x00;
const NVMCTRL_STATUS: u32 = 0x02;
const NVMCTRL_DATA: u32 = 0x06; // 16-bit
const NVMCTRL_ADDR: u32 = 0x08; // 16-bit

// STATUS bit layout
const STATUS_WRITE_ERROR_BIT: u8 = 2;
const STATUS_EEPROM_BUSY_BIT: u8 = 1;
const STATUS_FLASH_BUSY_BIT: u8 = 0;

/// CTRLA commands.
#[derive(Clone, Copy, Debug, PartialEq)]
#[allow(unused)]
enum Command {
    Nop = 0x00,
    WritePage = 0x01,
    ErasePage = 0x02,
    EraseWritePage = 0x03,
    PageBufferClear = 0x04,
    ChipErase = 0x05,
    EraseEeprom = 0x06,
    WriteFuse = 0x07,
}

/// P:0 NVM controller driver.
#[derive(Debug)]
pub struct NvmP0 {
    regs: NvmRegisters,
}

impl NvmP0 {
    /// Driver for the NVM controller of `device`.
    pub fn new(device: &DeviceDescriptor) -> Self {
        NvmP0 {
            regs: NvmRegisters {
                base: device.nvmctrl_address,
                ctrla: NVMCTRL_CTRLA,
                status: NVMCTRL_STATUS,
                flash_busy_bit: STATUS_FLASH_BUSY_BIT,
                eeprom_busy_bit: STATUS_EEPROM_BUSY_BIT,
                error_mask: 1 << STATUS_WRITE_ERROR_BIT,
                error_shift: STATUS_WRITE_ERROR_BIT,
            },
        }
    }

    /// Write one page through the page buffer: clear the buffer, load it by
    /// writing to the target location, then commit.
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
        self.regs.command(rw, Command::PageBufferClear as u8)?;
        self.regs
            .wait_ready(rw, READY_TIMEOUT, "after page buffer clear")?;

        if word_access {
            rw.write_data_words(address, data)?;
        } else {
            rw.write_data(address, data)?;
        }

        debug!("committing data");
        self.regs.command(rw, commit as u8)?;
        self.regs.wait_ready(rw, READY_TIMEOUT, "after page write")
    }
}

impl<P: UpdiPort> UpdiNvm<P> for NvmP0 {
    fn chip_erase(&mut self, rw: &mut UpdiReadWrite<P>) -> Result<(), Error> {
        debug!("chip erase using NVM CTRL");
        self.regs
            .wait_ready(rw, READY_TIMEOUT, "before chip erase")?;
        self.regs.command(rw, Command::ChipErase as u8)?;
        self.regs
            .wait_ready(rw, CHIP_ERASE_TIMEOUT, "after chip erase")
    }

    fn erase_flash_page(&mut self, rw: &mut UpdiReadWrite<P>, address: u32) -> Result<(), Error> {
        debug!("erase flash page at 0x{:06X}", address);
        self.regs
            .wait_ready(rw, READY_TIMEOUT, "before flash page erase")?;

        // The dummy write loads the controller's address register
        rw.write_data(address, &[0xFF])?;

        self.regs.command(rw, Command::ErasePage as u8)?;
        self.regs
            .wait_ready(rw, READY_TIMEOUT, "after flash page erase")
    }

    fn erase_eeprom(&mut self, rw: &mut UpdiReadWrite<P>) -> Result<(), Error> {
        debug!("erase EEPROM");
        self.regs
            .wait_ready(rw, READY_TIMEOUT, "before EEPROM erase")?;
        self.regs.command(rw, Command::EraseEeprom as u8)?;
        self.regs
            .wait_ready(rw, READY_TIMEOUT, "after EEPROM erase")
    }

    fn erase_user_row(
        &mut self,
        rw: &mut UpdiReadWrite<P>,
        address: u32,
        size: usize,
    ) -> Result<(), Error> {
        debug!("erase user row");
        self.regs
            .wait_ready(rw, READY_TIMEOUT, "before user row erase")?;

        // The user row is EEPROM on this generation: single-page EEPROM
        // erase needs a dummy write for every location to be erased
        for offset in 0..size {
            rw.write_data(address + offset as u32, &[0xFF])?;
        }

        self.regs.command(rw, Command::ErasePage as u8)?;
        self.regs
            .wait_ready(rw, READY_TIMEOUT, "after user row erase")
    }

    fn write_flash(
        &mut self,
        rw: &mut UpdiReadWrite<P>,
        address: u32,
        data: &[u8],
    ) -> Result<(), Error> {
        self.write_page(rw, address, data, true, Command::WritePage)
    }

    fn write_user_row(
        &mut self,
        rw: &mut UpdiReadWrite<P>,
        address: u32,
        data: &[u8],
    ) -> Result<(), Error> {
        // The user row is EEPROM on this generation
        self.write_eeprom(rw, address, data)
    }

    fn write_eeprom(
        &mut self,
        rw: &mut UpdiReadWrite<P>,
        address: u32,
        data: &[u8],
    ) -> Result<(), Error> {
        self.write_page(rw, address, data, false, Command::EraseWritePage)
    }

    fn write_fuse(
        &mut self,
        rw: &mut UpdiReadWrite<P>,
        address: u32,
        value: u8,
    ) -> Result<(), Error> {
        self.regs
            .wait_ready(rw, READY_TIMEOUT, "before fuse write")?;

        debug!("load NVM address");
        rw.write_byte(self.regs.base + NVMCTRL_ADDR, address as u8)?;
        rw.write_byte(self.regs.base + NVMCTRL_ADDR + 1, (address >> 8) as u8)?;

        debug!("load fuse data");
        rw.write_byte(self.regs.base + NVMCTRL_DATA, value)?;

        debug!("execute fuse write");
        self.regs.command(rw, Command::WriteFuse as u8)?;
        self.regs.wait_ready(rw, READY_TIMEOUT, "after fuse write")
    }
}
