//! Command-sequence tests for the NVM variant drivers

mod mock_port;
use mock_port::*;

use serial_updi::devices::{ATTINY827, AVR128DA48};
use serial_updi::{
    AddressMode, DeviceDescriptor, Error, NvmP0, NvmP2, NvmP3, NvmP4, NvmP5, UpdiDatalink,
    UpdiNvm, UpdiPhysical, UpdiReadWrite,
};

fn stack(port: MockPort, mode: AddressMode) -> UpdiReadWrite<MockPort> {
    let phy = UpdiPhysical::new(port).unwrap();
    UpdiReadWrite::new(UpdiDatalink::new(phy, mode))
}

/// A 24-bit part with the NVM controller at the usual base.
fn avr_ea_like() -> DeviceDescriptor {
    DeviceDescriptor {
        sigrow_address: 0x1100,
        syscfg_address: 0x0F00,
        nvmctrl_address: 0x1000,
        fuses_address: 0x1050,
        userrow_address: 0x1080,
        flash_start: 0x8000,
        flash_size: 0x1_0000,
        flash_pagesize: 0x80,
        expected_device_id: 0x1E0000,
    }
}

#[test]
fn p0_flash_page_write_runs_the_buffer_sequence() {
    let page: Vec<u8> = (0..64u32).map(|v| v as u8).collect();

    let mut steps = vec![handshake_step()];
    steps.push(read_byte_step16(0x1002, 0x00));
    steps.extend(write_byte_steps16(0x1000, 0x04)); // page buffer clear
    steps.push(read_byte_step16(0x1002, 0x00));
    // The buffer is loaded word-wise straight at the flash address
    steps.push(Step::new(st_ptr_frame16(0x8000), vec![ACK]));
    steps.push(Step::silent(repeat_frame(32)));
    steps.push(Step::silent(stcs_frame(CS_CTRLA, 0x88)));
    steps.push(Step::silent(st_ptr_inc16_frame()));
    steps.push(Step::silent(page.clone()));
    steps.push(Step::silent(stcs_frame(CS_CTRLA, 0x80)));
    steps.extend(write_byte_steps16(0x1000, 0x01)); // page write
    steps.push(read_byte_step16(0x1002, 0x00));

    let port = MockPort::new(steps);
    let mut rw = stack(port.clone(), AddressMode::Bits16);
    let mut nvm = NvmP0::new(&ATTINY827);

    nvm.write_flash(&mut rw, 0x8000, &page).unwrap();
    assert_eq!(port.remaining(), 0);
}

#[test]
fn p0_fuse_write_goes_through_addr_and_data_registers() {
    let mut steps = vec![handshake_step()];
    steps.push(read_byte_step16(0x1002, 0x00));
    steps.extend(write_byte_steps16(0x1008, 0x85)); // ADDR low
    steps.extend(write_byte_steps16(0x1009, 0x12)); // ADDR high
    steps.extend(write_byte_steps16(0x1006, 0xC4)); // DATA
    steps.extend(write_byte_steps16(0x1000, 0x07)); // fuse write
    steps.push(read_byte_step16(0x1002, 0x00));

    let port = MockPort::new(steps);
    let mut rw = stack(port.clone(), AddressMode::Bits16);
    let mut nvm = NvmP0::new(&ATTINY827);

    nvm.write_fuse(&mut rw, 0x1285, 0xC4).unwrap();
    assert_eq!(port.remaining(), 0);
}

#[test]
fn p0_user_row_erase_dummy_writes_every_byte() {
    let mut steps = vec![handshake_step()];
    steps.push(read_byte_step16(0x1002, 0x00));
    for offset in 0..4u32 {
        steps.extend(write_byte_steps16(0x1300 + offset, 0xFF));
    }
    steps.extend(write_byte_steps16(0x1000, 0x02)); // page erase
    steps.push(read_byte_step16(0x1002, 0x00));

    let port = MockPort::new(steps);
    let mut rw = stack(port.clone(), AddressMode::Bits16);
    let mut nvm = NvmP0::new(&ATTINY827);

    nvm.erase_user_row(&mut rw, 0x1300, 4).unwrap();
    assert_eq!(port.remaining(), 0);
}

#[test]
fn p2_flash_page_erase_arms_command_before_dummy_write() {
    let mut steps = vec![handshake_step()];
    steps.push(read_byte_step24(0x1002, 0x00));
    steps.extend(write_byte_steps24(0x1000, 0x08)); // flash page erase
    steps.extend(write_byte_steps24(0x80_0000, 0xFF)); // dummy write
    steps.push(read_byte_step24(0x1002, 0x00));
    steps.extend(write_byte_steps24(0x1000, 0x00)); // NOCMD

    let port = MockPort::new(steps);
    let mut rw = stack(port.clone(), AddressMode::Bits24);
    let mut nvm = NvmP2::new(&AVR128DA48);

    nvm.erase_flash_page(&mut rw, 0x80_0000).unwrap();
    assert_eq!(port.remaining(), 0);
}

#[test]
fn p2_eeprom_write_streams_without_a_buffer() {
    let mut steps = vec![handshake_step()];
    steps.push(read_byte_step24(0x1002, 0x00));
    steps.extend(write_byte_steps24(0x1000, 0x13)); // EEPROM erase/write
    steps.push(Step::new(st_ptr_frame24(0x1400), vec![ACK]));
    steps.push(Step::silent(repeat_frame(4)));
    steps.push(Step::new(st_ptr_inc8_frame(1), vec![ACK]));
    steps.push(Step::new(vec![2], vec![ACK]));
    steps.push(Step::new(vec![3], vec![ACK]));
    steps.push(Step::new(vec![4], vec![ACK]));
    steps.push(read_byte_step24(0x1002, 0x00));
    steps.extend(write_byte_steps24(0x1000, 0x00)); // NOCMD

    let port = MockPort::new(steps);
    let mut rw = stack(port.clone(), AddressMode::Bits24);
    let mut nvm = NvmP2::new(&AVR128DA48);

    nvm.write_eeprom(&mut rw, 0x1400, &[1, 2, 3, 4]).unwrap();
    assert_eq!(port.remaining(), 0);
}

#[test]
fn p3_page_write_commits_and_reads_back() {
    let page: Vec<u8> = (0..128u32).map(|v| (v ^ 0x5A) as u8).collect();

    let mut steps = vec![handshake_step()];
    steps.push(read_byte_step24(0x1006, 0x00));
    steps.extend(write_byte_steps24(0x1000, 0x0F)); // flash page buffer clear
    steps.push(read_byte_step24(0x1006, 0x00));
    steps.push(Step::new(st_ptr_frame24(0x8000), vec![ACK]));
    steps.push(Step::silent(repeat_frame(64)));
    steps.push(Step::silent(stcs_frame(CS_CTRLA, 0x88)));
    steps.push(Step::silent(st_ptr_inc16_frame()));
    steps.push(Step::silent(page.clone()));
    steps.push(Step::silent(stcs_frame(CS_CTRLA, 0x80)));
    steps.extend(write_byte_steps24(0x1000, 0x04)); // flash page write
    steps.push(read_byte_step24(0x1006, 0x00));
    steps.extend(write_byte_steps24(0x1000, 0x00)); // NOCMD
    // Read-back of the freshly programmed page
    steps.push(Step::new(st_ptr_frame24(0x8000), vec![ACK]));
    steps.push(Step::silent(repeat_frame(128)));
    steps.push(Step::new(ld_ptr_inc8_frame(), page.clone()));

    let port = MockPort::new(steps);
    let mut rw = stack(port.clone(), AddressMode::Bits24);
    let mut nvm = NvmP3::new(&avr_ea_like());

    nvm.write_flash(&mut rw, 0x8000, &page).unwrap();
    assert_eq!(rw.read_data(0x8000, 128).unwrap(), page);
    assert_eq!(port.remaining(), 0);
}

#[test]
fn p3_flash_page_erase_dummy_writes_before_arming() {
    let mut steps = vec![handshake_step()];
    steps.push(read_byte_step24(0x1006, 0x00));
    steps.extend(write_byte_steps24(0x8000, 0xFF)); // dummy write first
    steps.extend(write_byte_steps24(0x1000, 0x08)); // flash page erase
    steps.push(read_byte_step24(0x1006, 0x00));
    steps.extend(write_byte_steps24(0x1000, 0x00)); // NOCMD

    let port = MockPort::new(steps);
    let mut rw = stack(port.clone(), AddressMode::Bits24);
    let mut nvm = NvmP3::new(&avr_ea_like());

    nvm.erase_flash_page(&mut rw, 0x8000).unwrap();
    assert_eq!(port.remaining(), 0);
}

#[test]
fn p4_chip_erase_waits_out_the_busy_flags() {
    let mut steps = vec![handshake_step()];
    steps.push(read_byte_step24(0x1006, 0x00));
    steps.extend(write_byte_steps24(0x1000, 0x20)); // chip erase
    steps.push(read_byte_step24(0x1006, 0x02)); // flash busy
    steps.push(read_byte_step24(0x1006, 0x02)); // still busy
    steps.push(read_byte_step24(0x1006, 0x00)); // done
    steps.extend(write_byte_steps24(0x1000, 0x00)); // NOCMD

    let port = MockPort::new(steps);
    let mut rw = stack(port.clone(), AddressMode::Bits24);
    let mut nvm = NvmP4::new(&avr_ea_like());

    nvm.chip_erase(&mut rw).unwrap();
    assert_eq!(port.remaining(), 0);
}

#[test]
fn p5_eeprom_write_uses_the_eeprom_buffer() {
    let mut steps = vec![handshake_step()];
    steps.push(read_byte_step24(0x1006, 0x00));
    steps.extend(write_byte_steps24(0x1000, 0x1F)); // EEPROM page buffer clear
    steps.push(read_byte_step24(0x1006, 0x00));
    steps.extend(write_byte_steps24(0x1400, 0xAA));
    steps.extend(write_byte_steps24(0x1401, 0xBB));
    steps.extend(write_byte_steps24(0x1000, 0x15)); // EEPROM page erase/write
    steps.push(read_byte_step24(0x1006, 0x00));
    steps.extend(write_byte_steps24(0x1000, 0x00)); // NOCMD

    let port = MockPort::new(steps);
    let mut rw = stack(port.clone(), AddressMode::Bits24);
    let mut nvm = NvmP5::new(&avr_ea_like());

    nvm.write_eeprom(&mut rw, 0x1400, &[0xAA, 0xBB]).unwrap();
    assert_eq!(port.remaining(), 0);
}

#[test]
fn status_error_field_surfaces_the_code_and_clears_the_command() {
    let mut steps = vec![handshake_step()];
    steps.push(read_byte_step24(0x1006, 0x00));
    steps.extend(write_byte_steps24(0x1000, 0x30)); // EEPROM erase
    steps.push(read_byte_step24(0x1006, 0x30)); // error field = 3
    steps.extend(write_byte_steps24(0x1000, 0x00)); // NOCMD still issued

    let port = MockPort::new(steps);
    let mut rw = stack(port.clone(), AddressMode::Bits24);
    let mut nvm = NvmP4::new(&avr_ea_like());

    let result = nvm.erase_eeprom(&mut rw);
    assert!(matches!(result, Err(Error::Nvm { code: 3 })));
    assert_eq!(port.remaining(), 0);
}

#[test]
fn ready_timeout_surfaces_after_clearing_the_command() {
    let mut steps = vec![handshake_step()];
    steps.push(read_byte_step24(0x1002, 0x00));
    steps.extend(write_byte_steps24(0x1000, 0x30)); // EEPROM erase
    steps.push(Step::sticky(lds8_frame24(0x1002), vec![0x01])); // never ready
    steps.extend(write_byte_steps24(0x1000, 0x00)); // NOCMD still issued

    let port = MockPort::new(steps);
    let mut rw = stack(port.clone(), AddressMode::Bits24);
    let mut nvm = NvmP2::new(&AVR128DA48);

    let result = nvm.erase_eeprom(&mut rw);
    assert!(matches!(result, Err(Error::NvmTimeout(_))));
    assert_eq!(port.remaining(), 0);
}
