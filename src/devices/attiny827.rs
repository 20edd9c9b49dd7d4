//! ATtiny827 (tinyAVR 2-series, NVM P:0)

use crate::memory::DeviceDescriptor;

/// ATtiny827 descriptor. Data from device pack Microchip.ATtiny_DFP.
pub const ATTINY827: DeviceDescriptor = DeviceDescriptor {
    sigrow_address: 0x1100,
    syscfg_address: 0x0F00,
    nvmctrl_address: 0x1000,
    fuses_address: 0x1280,
    userrow_address: 0x1300,
    flash_start: 0x8000,
    flash_size: 0x2000,
    flash_pagesize: 0x40,
    expected_device_id: 0x1E9327,
};
