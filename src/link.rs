//! Data-link layer: the UPDI instruction set
//!
//! Every frame opens with SYNC so the target can stay baud-locked, followed
//! by an opcode and an opcode-specific payload. Stores carry an ACK
//! handshake; loads return a reply of known length.

use log::{debug, warn};

use crate::physical::UpdiPhysical;
use crate::protocol::{self, CsRegister};
use crate::{Error, UpdiPort};

/// Width of absolute addresses and pointers on the wire.
///
/// P:0 parts (tinyAVR, megaAVR 0-series) use 16-bit addressing; all later
/// families use 24-bit. The mode is a tag on one link type so it can be
/// switched after SIB decode without rebuilding the stack.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AddressMode {
    /// 16-bit addresses and pointers.
    Bits16,
    /// 24-bit addresses and pointers.
    Bits24,
}

/// UPDI instruction-set driver.
#[allow(missing_debug_implementations)]
pub struct UpdiDatalink<P> {
    pub(crate) phy: UpdiPhysical<P>,
    mode: AddressMode,
}

impl<P: UpdiPort> UpdiDatalink<P> {
    /// Build a datalink over an opened physical layer.
    pub fn new(phy: UpdiPhysical<P>, mode: AddressMode) -> Self {
        UpdiDatalink { phy, mode }
    }

    /// Address mode currently in use.
    pub fn address_mode(&self) -> AddressMode {
        self.mode
    }

    /// Switch address mode (after the SIB has revealed the family).
    pub fn set_address_mode(&mut self, mode: AddressMode) {
        debug!("datalink address mode {:?}", mode);
        self.mode = mode;
    }

    /// Activate the interface: disable collision detection, enable the
    /// inter-byte guard time, then check the link is alive by reading
    /// STATUSA. A dead link gets one double-break recovery attempt.
    pub fn init(&mut self) -> Result<(), Error> {
        self.init_session()?;
        if self.check()? {
            return Ok(());
        }
        warn!("UPDI not responding, sending double break");
        self.phy.send_double_break()?;
        self.init_session()?;
        if self.check()? {
            return Ok(());
        }
        Err(Error::Protocol("UPDI initialisation failed".to_string()))
    }

    fn init_session(&mut self) -> Result<(), Error> {
        self.stcs(CsRegister::CtrlB, 1 << protocol::CTRLB_CCDETDIS_BIT)?;
        self.stcs(CsRegister::CtrlA, 1 << protocol::CTRLA_IBDLY_BIT)
    }

    /// A live UPDI always reports a non-zero revision in STATUSA.
    fn check(&mut self) -> Result<bool, Error> {
        Ok(self.ldcs(CsRegister::StatusA)? != 0)
    }

    /// LDCS: load a control/status register.
    pub fn ldcs(&mut self, register: CsRegister) -> Result<u8, Error> {
        self.phy
            .send(&[protocol::SYNC, protocol::LDCS | register as u8])?;
        let reply = self.phy.receive(1)?;
        Ok(reply[0])
    }

    /// STCS: store a control/status register. No ACK is defined for STCS.
    pub fn stcs(&mut self, register: CsRegister, value: u8) -> Result<(), Error> {
        self.phy
            .send(&[protocol::SYNC, protocol::STCS | register as u8, value])
    }

    /// LDS: load one byte from an absolute address.
    pub fn ld(&mut self, address: u32) -> Result<u8, Error> {
        debug!("LD from 0x{:06X}", address);
        let frame = self.address_frame(protocol::LDS | protocol::DATA_8, address);
        self.phy.send(&frame)?;
        let reply = self.phy.receive(1)?;
        Ok(reply[0])
    }

    /// LDS: load one little-endian word from an absolute address.
    pub fn ld16(&mut self, address: u32) -> Result<[u8; 2], Error> {
        debug!("LD16 from 0x{:06X}", address);
        let frame = self.address_frame(protocol::LDS | protocol::DATA_16, address);
        self.phy.send(&frame)?;
        let reply = self.phy.receive(2)?;
        Ok([reply[0], reply[1]])
    }

    /// STS: store one byte to an absolute address, with the ACK handshake
    /// between the address and data phases and after the data.
    pub fn st(&mut self, address: u32, value: u8) -> Result<(), Error> {
        debug!("ST 0x{:02X} to 0x{:06X}", value, address);
        let frame = self.address_frame(protocol::STS | protocol::DATA_8, address);
        self.phy.send(&frame)?;
        self.wait_ack()?;
        self.phy.send(&[value])?;
        self.wait_ack()
    }

    /// STS: store one little-endian word to an absolute address.
    pub fn st16(&mut self, address: u32, value: u16) -> Result<(), Error> {
        debug!("ST16 0x{:04X} to 0x{:06X}", value, address);
        let frame = self.address_frame(protocol::STS | protocol::DATA_16, address);
        self.phy.send(&frame)?;
        self.wait_ack()?;
        self.phy.send(&value.to_le_bytes())?;
        self.wait_ack()
    }

    /// ST: write the pointer register. The pointer travels in the data
    /// phase, so its width is encoded in the data-size field.
    pub fn st_ptr(&mut self, address: u32) -> Result<(), Error> {
        debug!("ST to pointer: 0x{:06X}", address);
        let opcode = protocol::ST | protocol::PTR_ADDRESS;
        let frame = match self.mode {
            AddressMode::Bits16 => vec![
                protocol::SYNC,
                opcode | protocol::DATA_16,
                address as u8,
                (address >> 8) as u8,
            ],
            AddressMode::Bits24 => vec![
                protocol::SYNC,
                opcode | protocol::DATA_24,
                address as u8,
                (address >> 8) as u8,
                (address >> 16) as u8,
            ],
        };
        self.phy.send(&frame)?;
        self.wait_ack()
    }

    /// LD: read `count` bytes via the pointer with post-increment. Preceded
    /// by REPEAT when `count > 1`, the single instruction runs `count`
    /// times on the target.
    pub fn ld_ptr_inc(&mut self, count: usize) -> Result<Vec<u8>, Error> {
        debug!("LD8 from ptr++ ({} bytes)", count);
        self.phy.send(&[
            protocol::SYNC,
            protocol::LD | protocol::PTR_INC | protocol::DATA_8,
        ])?;
        self.phy.receive(count)
    }

    /// LD: read `words` little-endian words via the pointer with
    /// post-increment.
    pub fn ld_ptr_inc16(&mut self, words: usize) -> Result<Vec<u8>, Error> {
        debug!("LD16 from ptr++ ({} words)", words);
        self.phy.send(&[
            protocol::SYNC,
            protocol::LD | protocol::PTR_INC | protocol::DATA_16,
        ])?;
        self.phy.receive(words * 2)
    }

    /// ST: write bytes via the pointer with post-increment, each byte
    /// ACK'd individually.
    pub fn st_ptr_inc(&mut self, data: &[u8]) -> Result<(), Error> {
        debug!("ST8 to ptr++ ({} bytes)", data.len());
        self.phy.send(&[
            protocol::SYNC,
            protocol::ST | protocol::PTR_INC | protocol::DATA_8,
            data[0],
        ])?;
        self.wait_ack()?;
        for value in &data[1..] {
            self.phy.send(&[*value])?;
            self.wait_ack()?;
        }
        Ok(())
    }

    /// ST: write words via the pointer with post-increment.
    ///
    /// Response signatures are disabled (RSD) for the duration so the burst
    /// is not throttled by per-word ACKs, then re-enabled.
    pub fn st_ptr_inc16(&mut self, data: &[u8]) -> Result<(), Error> {
        debug!("ST16 to ptr++ ({} bytes)", data.len());
        let ack_on = 1 << protocol::CTRLA_IBDLY_BIT;
        let ack_off = ack_on | (1 << protocol::CTRLA_RSD_BIT);

        self.stcs(CsRegister::CtrlA, ack_off)?;
        self.phy.send(&[
            protocol::SYNC,
            protocol::ST | protocol::PTR_INC | protocol::DATA_16,
        ])?;
        self.phy.send(data)?;
        self.stcs(CsRegister::CtrlA, ack_on)
    }

    /// REPEAT: run the next pointer-increment load/store `count` times.
    pub fn repeat(&mut self, count: usize) -> Result<(), Error> {
        if count == 0 || count > protocol::MAX_REPEAT_SIZE {
            return Err(Error::Protocol(format!(
                "invalid repeat count {}",
                count
            )));
        }
        debug!("repeat {}", count);
        self.phy.send(&[
            protocol::SYNC,
            protocol::REPEAT | protocol::REPEAT_BYTE,
            (count - 1) as u8,
        ])
    }

    /// KEY: read the 32-byte System Information Block.
    pub fn read_sib(&mut self) -> Result<[u8; 32], Error> {
        self.phy.send(&[
            protocol::SYNC,
            protocol::KEY | protocol::KEY_SIB | protocol::SIB_32_BYTES,
        ])?;
        let reply = self.phy.receive(32)?;
        let mut sib = [0u8; 32];
        sib.copy_from_slice(&reply);
        Ok(sib)
    }

    /// KEY: transfer an activation key.
    ///
    /// The wire wants keys low byte first; this is the one place where the
    /// reversal happens.
    pub fn key(&mut self, size_code: u8, key: &[u8]) -> Result<(), Error> {
        if key.len() != (8 << size_code) {
            return Err(Error::Protocol(format!(
                "key length {} does not match size code {}",
                key.len(),
                size_code
            )));
        }
        debug!("writing key");
        self.phy.send(&[
            protocol::SYNC,
            protocol::KEY | protocol::KEY_KEY | size_code,
        ])?;
        let reversed: Vec<u8> = key.iter().rev().cloned().collect();
        self.phy.send(&reversed)
    }

    fn wait_ack(&mut self) -> Result<(), Error> {
        let reply = self.phy.receive(1)?;
        if reply[0] != protocol::ACK {
            return Err(Error::Protocol(format!(
                "expected ACK, received 0x{:02X}",
                reply[0]
            )));
        }
        Ok(())
    }

    fn address_frame(&self, opcode: u8, address: u32) -> Vec<u8> {
        match self.mode {
            AddressMode::Bits16 => vec![
                protocol::SYNC,
                opcode | protocol::ADDRESS_16,
                address as u8,
                (address >> 8) as u8,
            ],
            AddressMode::Bits24 => vec![
                protocol::SYNC,
                opcode | protocol::ADDRESS_24,
                address as u8,
                (address >> 8) as u8,
                (address >> 16) as u8,
            ],
        }
    }
}
