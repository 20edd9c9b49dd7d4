//! Programming facade
//!
//! Chunked, segment-aware memory access on top of the session layer: page
//! chunking for the page-oriented memories, fuse routing, the per-page
//! flash erase loop and the locked-device policies.

use log::{debug, info, warn};

use crate::application::UpdiApplication;
use crate::memory::{align_for_write, pad_to_size, DeviceDescriptor, MemoryKind, MemorySegment};
use crate::{Error, UpdiPort};

/// Reads are issued in bursts of this size.
const READ_CHUNK_SIZE: usize = 0x100;

/// What to do when the target turns out to be locked.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LockedDevicePolicy {
    /// Surface [`Error::Locked`].
    Fail,
    /// Erase the device with the chip-erase key, unlocking it.
    ChipErase,
    /// Stay locked; only keyed user-row writes will be possible.
    UserRowOnly,
}

/// High-level programmer for one UPDI target.
#[allow(missing_debug_implementations)]
pub struct Programmer<P: UpdiPort> {
    app: UpdiApplication<P>,
    policy: LockedDevicePolicy,
}

impl<P: UpdiPort> Programmer<P> {
    /// Bring up the stack on `port` and identify the NVM variant.
    pub fn new(port: P, device: DeviceDescriptor) -> Result<Self, Error> {
        let mut app = UpdiApplication::new(port, device)?;
        let sib = app.read_device_info()?;
        info!("device family: '{}'", sib.family());
        Ok(Programmer {
            app,
            policy: LockedDevicePolicy::Fail,
        })
    }

    /// Choose how a locked target is handled by [`start`](Programmer::start).
    pub fn set_locked_device_policy(&mut self, policy: LockedDevicePolicy) {
        self.policy = policy;
    }

    /// Access the session layer directly.
    pub fn application(&mut self) -> &mut UpdiApplication<P> {
        &mut self.app
    }

    /// Enter programming mode, applying the locked-device policy.
    pub fn start(&mut self) -> Result<(), Error> {
        match self.app.enter_progmode() {
            Ok(()) => Ok(()),
            Err(Error::Locked) => match self.policy {
                LockedDevicePolicy::UserRowOnly => {
                    info!("device is locked; proceeding for user-row write only");
                    Ok(())
                }
                LockedDevicePolicy::ChipErase => {
                    info!("device is locked; erasing to unlock");
                    self.app.unlock()?;
                    self.app.enter_progmode()
                }
                LockedDevicePolicy::Fail => Err(Error::Locked),
            },
            Err(error) => Err(error),
        }
    }

    /// Read and verify the device ID.
    ///
    /// The target sends the three signature bytes big-endian; the raw bytes
    /// are returned little-endian. A mismatch against the descriptor's
    /// expected ID fails the session.
    pub fn read_device_id(&mut self) -> Result<[u8; 3], Error> {
        let sigrow = self.app.device().sigrow_address;
        let expected = self.app.device().expected_device_id;

        let sig = self.app.read_data(sigrow, 3)?;
        let device_id =
            ((sig[0] as u32) << 16) | ((sig[1] as u32) << 8) | sig[2] as u32;
        info!("device id: '{:06X}'", device_id);
        if device_id != expected {
            return Err(Error::Session(format!(
                "device id mismatch: read '{:06X}', expected '{:06X}'",
                device_id, expected
            )));
        }

        let revision = self.app.read_data(self.app.device().syscfg_address + 1, 1)?;
        info!(
            "device revision: '{}.{}'",
            revision[0] >> 4,
            revision[0] & 0x0F
        );

        let serial = self.app.read_data(sigrow + 3, 10)?;
        let serial_hex: String = serial.iter().map(|b| format!("{:02x}", b)).collect();
        info!("device serial number: '{}'", serial_hex);

        Ok([sig[2], sig[1], sig[0]])
    }

    /// Erase the whole device. A locked part rejects the NVM-controller
    /// erase; fall back to the chip-erase key in that case.
    pub fn erase_all(&mut self) -> Result<(), Error> {
        match self.app.chip_erase() {
            Ok(()) => Ok(()),
            Err(Error::NvmTimeout(_)) => {
                warn!("chip erase rejected; device may be locked, using erase key");
                self.app.unlock()
            }
            Err(error) => Err(error),
        }
    }

    /// Erase one memory segment.
    ///
    /// Flash has no isolated bulk erase on UPDI parts, so it is erased page
    /// by page. Kinds without an isolated erase fall back to a whole-device
    /// erase.
    pub fn erase_segment(&mut self, segment: &MemorySegment) -> Result<(), Error> {
        match segment.kind {
            MemoryKind::Eeprom => self.app.erase_eeprom(),
            MemoryKind::UserRow | MemoryKind::BootRow => self
                .app
                .erase_user_row(segment.address, segment.size as usize),
            MemoryKind::Flash => {
                let pages = segment.size / segment.page_size;
                debug!("erasing {} pages of flash", pages);
                for page in 0..pages {
                    self.app
                        .erase_flash_page(segment.address + page * segment.page_size)?;
                }
                Ok(())
            }
            _ => self.erase_all(),
        }
    }

    /// Write `data` into `segment` at `offset`, page by page.
    pub fn write(
        &mut self,
        segment: &MemorySegment,
        offset: u32,
        data: &[u8],
    ) -> Result<(), Error> {
        let (aligned, aligned_offset) = align_for_write(data, offset, segment.write_size);
        let mut address = segment.address + aligned_offset;

        // A user-row write on a locked part goes through the key protocol
        // and must carry a full page
        if segment.kind == MemoryKind::UserRow && self.policy == LockedDevicePolicy::UserRowOnly {
            info!("padding user row to {} bytes", segment.page_size);
            let padded = pad_to_size(&aligned, segment.page_size as usize, 0xFF);
            info!("writing user row on locked device");
            return self.app.write_user_row_locked_device(address, &padded);
        }

        let chunk_size = match segment.kind {
            MemoryKind::Flash
            | MemoryKind::Eeprom
            | MemoryKind::Fuses
            | MemoryKind::Lockbits => segment.page_size as usize,
            _ => aligned.len().max(1),
        };

        for chunk in aligned.chunks(chunk_size) {
            debug!("writing {} bytes to 0x{:06X}", chunk.len(), address);
            match segment.kind {
                MemoryKind::Fuses | MemoryKind::Lockbits => {
                    // Fuse-class memories are written a byte at a time
                    for (index, value) in chunk.iter().enumerate() {
                        self.app.write_fuse(address + index as u32, *value)?;
                    }
                }
                MemoryKind::Eeprom => self.app.write_eeprom(address, chunk)?,
                MemoryKind::UserRow | MemoryKind::BootRow => {
                    self.app.write_user_row(address, chunk)?
                }
                _ => self.app.write_flash(address, chunk)?,
            }
            address += chunk.len() as u32;
        }
        Ok(())
    }

    /// Read `length` bytes from `segment` starting at `offset`.
    pub fn read(
        &mut self,
        segment: &MemorySegment,
        offset: u32,
        length: usize,
    ) -> Result<Vec<u8>, Error> {
        let mut address = segment.address + offset;
        let mut data = Vec::with_capacity(length);
        let mut remaining = length;
        while remaining > 0 {
            let chunk = remaining.min(READ_CHUNK_SIZE);
            debug!("reading {} bytes from 0x{:06X}", chunk, address);
            data.extend_from_slice(&self.app.read_data(address, chunk)?);
            address += chunk as u32;
            remaining -= chunk;
        }
        Ok(data)
    }

    /// Leave programming mode, releasing the target.
    pub fn stop(&mut self) -> Result<(), Error> {
        self.app.leave_progmode()
    }
}
