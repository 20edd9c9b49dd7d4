//! ATmega4809 (megaAVR 0-series, NVM P:0)

use crate::memory::DeviceDescriptor;

/// ATmega4809 descriptor. Data from device pack Microchip.ATmega_DFP.
pub const ATMEGA4809: DeviceDescriptor = DeviceDescriptor {
    sigrow_address: 0x1100,
    syscfg_address: 0x0F00,
    nvmctrl_address: 0x1000,
    fuses_address: 0x1280,
    userrow_address: 0x1300,
    flash_start: 0x4000,
    flash_size: 0xC000,
    flash_pagesize: 0x80,
    expected_device_id: 0x1E9651,
};
