//! AVR128DA48 (AVR DA family, NVM P:2)

use crate::memory::DeviceDescriptor;

/// AVR128DA48 descriptor. Data from device pack Microchip.AVR-Dx_DFP.
/// Flash appears at 0x800000 in the 24-bit UPDI data space.
pub const AVR128DA48: DeviceDescriptor = DeviceDescriptor {
    sigrow_address: 0x1100,
    syscfg_address: 0x0F00,
    nvmctrl_address: 0x1000,
    fuses_address: 0x1050,
    userrow_address: 0x1080,
    flash_start: 0x80_0000,
    flash_size: 0x2_0000,
    flash_pagesize: 0x200,
    expected_device_id: 0x1E9708,
};
