//! Read/write access provider
//!
//! Turns the per-instruction datalink into vector memory access. Transfers
//! of one or two units go out as direct loads/stores; anything longer sets
//! the pointer once and lets a REPEAT burst move the rest, split into
//! 256-unit chunks as the repeat counter requires.

use log::debug;

use crate::link::UpdiDatalink;
use crate::protocol::{self, CsRegister};
use crate::{Error, UpdiPort};

/// Vector read/write access on top of a [`UpdiDatalink`].
#[allow(missing_debug_implementations)]
pub struct UpdiReadWrite<P> {
    pub(crate) link: UpdiDatalink<P>,
}

impl<P: UpdiPort> UpdiReadWrite<P> {
    /// Wrap an initialised datalink.
    pub fn new(link: UpdiDatalink<P>) -> Self {
        UpdiReadWrite { link }
    }

    /// Read from control/status space.
    pub fn read_cs(&mut self, register: CsRegister) -> Result<u8, Error> {
        self.link.ldcs(register)
    }

    /// Write to control/status space.
    pub fn write_cs(&mut self, register: CsRegister, value: u8) -> Result<(), Error> {
        self.link.stcs(register, value)
    }

    /// Transfer an activation key.
    pub fn write_key(&mut self, size_code: u8, key: &[u8]) -> Result<(), Error> {
        self.link.key(size_code, key)
    }

    /// Read the System Information Block.
    pub fn read_sib(&mut self) -> Result<[u8; 32], Error> {
        self.link.read_sib()
    }

    /// Read a single byte.
    pub fn read_byte(&mut self, address: u32) -> Result<u8, Error> {
        self.link.ld(address)
    }

    /// Write a single byte.
    pub fn write_byte(&mut self, address: u32, value: u8) -> Result<(), Error> {
        self.link.st(address, value)
    }

    /// Read `size` bytes starting at `address`.
    pub fn read_data(&mut self, mut address: u32, size: usize) -> Result<Vec<u8>, Error> {
        debug!("reading {} bytes from 0x{:06X}", size, address);
        match size {
            0 => Ok(Vec::new()),
            1 => Ok(vec![self.link.ld(address)?]),
            2 => Ok(vec![self.link.ld(address)?, self.link.ld(address + 1)?]),
            _ => {
                let mut data = Vec::with_capacity(size);
                let mut remaining = size;
                while remaining > 0 {
                    let chunk = remaining.min(protocol::MAX_REPEAT_SIZE);
                    self.link.st_ptr(address)?;
                    if chunk > 1 {
                        self.link.repeat(chunk)?;
                    }
                    data.extend_from_slice(&self.link.ld_ptr_inc(chunk)?);
                    address += chunk as u32;
                    remaining -= chunk;
                }
                Ok(data)
            }
        }
    }

    /// Read `words` 16-bit words starting at `address`; returns `2 * words`
    /// bytes in wire (little-endian) order.
    pub fn read_data_words(&mut self, mut address: u32, words: usize) -> Result<Vec<u8>, Error> {
        debug!("reading {} words from 0x{:06X}", words, address);
        match words {
            0 => Ok(Vec::new()),
            1 => Ok(self.link.ld16(address)?.to_vec()),
            _ => {
                let max_words = protocol::MAX_REPEAT_SIZE / 2;
                let mut data = Vec::with_capacity(words * 2);
                let mut remaining = words;
                while remaining > 0 {
                    let chunk = remaining.min(max_words);
                    self.link.st_ptr(address)?;
                    if chunk > 1 {
                        self.link.repeat(chunk)?;
                    }
                    data.extend_from_slice(&self.link.ld_ptr_inc16(chunk)?);
                    address += (chunk * 2) as u32;
                    remaining -= chunk;
                }
                Ok(data)
            }
        }
    }

    /// Write bytes starting at `address`.
    pub fn write_data(&mut self, mut address: u32, data: &[u8]) -> Result<(), Error> {
        debug!("writing {} bytes to 0x{:06X}", data.len(), address);
        match data.len() {
            0 => Ok(()),
            1 => self.link.st(address, data[0]),
            2 => {
                self.link.st(address, data[0])?;
                self.link.st(address + 1, data[1])
            }
            _ => {
                for chunk in data.chunks(protocol::MAX_REPEAT_SIZE) {
                    self.link.st_ptr(address)?;
                    if chunk.len() > 1 {
                        self.link.repeat(chunk.len())?;
                    }
                    self.link.st_ptr_inc(chunk)?;
                    address += chunk.len() as u32;
                }
                Ok(())
            }
        }
    }

    /// Write bytes starting at `address` using 16-bit word stores. The data
    /// length must be even.
    pub fn write_data_words(&mut self, mut address: u32, data: &[u8]) -> Result<(), Error> {
        debug!("writing {} bytes as words to 0x{:06X}", data.len(), address);
        if data.len() % 2 != 0 {
            return Err(Error::Protocol(format!(
                "word write of odd length {}",
                data.len()
            )));
        }
        match data.len() {
            0 => Ok(()),
            2 => self
                .link
                .st16(address, u16::from_le_bytes([data[0], data[1]])),
            _ => {
                let max_words = protocol::MAX_REPEAT_SIZE;
                for chunk in data.chunks(max_words * 2) {
                    self.link.st_ptr(address)?;
                    self.link.repeat(chunk.len() / 2)?;
                    self.link.st_ptr_inc16(chunk)?;
                    address += chunk.len() as u32;
                }
                Ok(())
            }
        }
    }
}
