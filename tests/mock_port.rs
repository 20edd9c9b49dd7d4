//! Scripted mock transport and frame builders shared by the test suites
#![allow(unused)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;

use serial_updi::{Error, UpdiPort};

pub const SYNC: u8 = 0x55;
pub const ACK: u8 = 0x40;

/// Route stack logs into the test harness output (`RUST_LOG=debug`).
pub fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// Control/status register indices
pub const CS_STATUSA: u8 = 0x00;
pub const CS_CTRLA: u8 = 0x02;
pub const CS_CTRLB: u8 = 0x03;
pub const CS_KEY_STATUS: u8 = 0x07;
pub const CS_RESET_REQ: u8 = 0x08;
pub const CS_SYS_CTRLA: u8 = 0x0A;
pub const CS_SYS_STATUS: u8 = 0x0B;

/// One expected exchange: the exact frame the stack must transmit and the
/// bytes the simulated target answers with.
#[derive(Clone, Debug)]
pub struct Step {
    pub expect: Vec<u8>,
    pub reply: Vec<u8>,
    /// Sticky steps service a poll loop: they answer every repeat of the
    /// same frame and are dropped when a different frame arrives.
    pub sticky: bool,
}

impl Step {
    pub fn new(expect: Vec<u8>, reply: Vec<u8>) -> Step {
        Step {
            expect,
            reply,
            sticky: false,
        }
    }

    /// A frame with no reply (stores without a read-back, key payloads).
    pub fn silent(expect: Vec<u8>) -> Step {
        Step::new(expect, Vec::new())
    }

    pub fn sticky(expect: Vec<u8>, reply: Vec<u8>) -> Step {
        Step {
            expect,
            reply,
            sticky: true,
        }
    }
}

struct State {
    steps: VecDeque<Step>,
    rx: VecDeque<u8>,
    sent: Vec<Vec<u8>>,
    double_breaks: usize,
    corrupt_next_echo: bool,
}

/// Half-duplex transport driven by a script of [`Step`]s.
///
/// Every write is looped back into the receive queue (the wire echo)
/// before the scripted reply, exactly as the single-wire hardware behaves.
/// Cloning shares the underlying state so tests can keep a handle after
/// handing the port to the stack.
#[derive(Clone)]
pub struct MockPort {
    state: Rc<RefCell<State>>,
}

impl MockPort {
    pub fn new(steps: Vec<Step>) -> MockPort {
        MockPort {
            state: Rc::new(RefCell::new(State {
                steps: steps.into(),
                rx: VecDeque::new(),
                sent: Vec::new(),
                double_breaks: 0,
                corrupt_next_echo: false,
            })),
        }
    }

    /// Append further steps to the script.
    pub fn push_steps(&self, steps: Vec<Step>) {
        self.state.borrow_mut().steps.extend(steps);
    }

    /// Flip a bit in the next echo to simulate a disturbed wire.
    pub fn corrupt_next_echo(&self) {
        self.state.borrow_mut().corrupt_next_echo = true;
    }

    pub fn double_breaks(&self) -> usize {
        self.state.borrow().double_breaks
    }

    /// Count of unconsumed non-sticky steps; zero when the script ran dry.
    pub fn remaining(&self) -> usize {
        self.state
            .borrow()
            .steps
            .iter()
            .filter(|step| !step.sticky)
            .count()
    }

    pub fn sent_frames(&self) -> Vec<Vec<u8>> {
        self.state.borrow().sent.clone()
    }
}

impl UpdiPort for MockPort {
    fn send_bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
        let mut state = self.state.borrow_mut();

        if state.sent.len() < 10_000 {
            state.sent.push(bytes.to_vec());
        }

        // Loopback echo first, reply after, as on the wire
        if state.corrupt_next_echo {
            state.corrupt_next_echo = false;
            let mut corrupted = bytes.to_vec();
            corrupted[0] ^= 0x01;
            state.rx.extend(corrupted);
        } else {
            state.rx.extend(bytes.iter().copied());
        }

        loop {
            let (matches, sticky) = match state.steps.front() {
                Some(step) => (step.expect == bytes, step.sticky),
                None => panic!("frame {:02X?} sent after end of script", bytes),
            };
            if matches {
                let reply = state.steps.front().unwrap().reply.clone();
                state.rx.extend(reply);
                if !sticky {
                    let _ = state.steps.pop_front();
                }
                return Ok(());
            }
            if sticky {
                // The poll loop this step serviced has moved on
                let _ = state.steps.pop_front();
                continue;
            }
            let expected = state.steps.front().unwrap().expect.clone();
            panic!(
                "unexpected frame {:02X?}, script expected {:02X?}",
                bytes, expected
            );
        }
    }

    fn receive_bytes(&mut self, buffer: &mut [u8]) -> Result<(), Error> {
        let mut state = self.state.borrow_mut();
        for slot in buffer.iter_mut() {
            match state.rx.pop_front() {
                Some(byte) => *slot = byte,
                None => {
                    return Err(Error::Io(io::Error::new(
                        io::ErrorKind::TimedOut,
                        "mock receive ran dry",
                    )))
                }
            }
        }
        Ok(())
    }

    fn send_double_break(&mut self) -> Result<(), Error> {
        let mut state = self.state.borrow_mut();
        state.double_breaks += 1;
        state.rx.clear();
        Ok(())
    }

    fn flush_receiver(&mut self) -> Result<(), Error> {
        self.state.borrow_mut().rx.clear();
        Ok(())
    }
}

// ---------------------------------------------------------------------
// Frame builders: encodings written out by hand from the wire contract
// ---------------------------------------------------------------------

pub fn ldcs_frame(register: u8) -> Vec<u8> {
    vec![SYNC, 0x80 | register]
}

pub fn stcs_frame(register: u8, value: u8) -> Vec<u8> {
    vec![SYNC, 0xC0 | register, value]
}

pub fn lds8_frame16(address: u32) -> Vec<u8> {
    vec![SYNC, 0x04, address as u8, (address >> 8) as u8]
}

pub fn lds8_frame24(address: u32) -> Vec<u8> {
    vec![
        SYNC,
        0x08,
        address as u8,
        (address >> 8) as u8,
        (address >> 16) as u8,
    ]
}

pub fn sts8_frame16(address: u32) -> Vec<u8> {
    vec![SYNC, 0x44, address as u8, (address >> 8) as u8]
}

pub fn sts8_frame24(address: u32) -> Vec<u8> {
    vec![
        SYNC,
        0x48,
        address as u8,
        (address >> 8) as u8,
        (address >> 16) as u8,
    ]
}

pub fn st_ptr_frame16(address: u32) -> Vec<u8> {
    vec![SYNC, 0x69, address as u8, (address >> 8) as u8]
}

pub fn st_ptr_frame24(address: u32) -> Vec<u8> {
    vec![
        SYNC,
        0x6A,
        address as u8,
        (address >> 8) as u8,
        (address >> 16) as u8,
    ]
}

pub fn repeat_frame(count: usize) -> Vec<u8> {
    vec![SYNC, 0xA0, (count - 1) as u8]
}

pub fn ld_ptr_inc8_frame() -> Vec<u8> {
    vec![SYNC, 0x24]
}

pub fn ld_ptr_inc16_frame() -> Vec<u8> {
    vec![SYNC, 0x25]
}

pub fn st_ptr_inc8_frame(first: u8) -> Vec<u8> {
    vec![SYNC, 0x64, first]
}

pub fn st_ptr_inc16_frame() -> Vec<u8> {
    vec![SYNC, 0x65]
}

pub fn sib_frame() -> Vec<u8> {
    vec![SYNC, 0xE6]
}

pub fn key64_frame() -> Vec<u8> {
    vec![SYNC, 0xE0]
}

/// The steps of a byte store: address frame, ACK, data byte, ACK.
pub fn write_byte_steps16(address: u32, value: u8) -> Vec<Step> {
    vec![
        Step::new(sts8_frame16(address), vec![ACK]),
        Step::new(vec![value], vec![ACK]),
    ]
}

/// 24-bit variant of [`write_byte_steps16`].
pub fn write_byte_steps24(address: u32, value: u8) -> Vec<Step> {
    vec![
        Step::new(sts8_frame24(address), vec![ACK]),
        Step::new(vec![value], vec![ACK]),
    ]
}

/// A byte read: address frame answered with the value.
pub fn read_byte_step16(address: u32, value: u8) -> Step {
    Step::new(lds8_frame16(address), vec![value])
}

/// 24-bit variant of [`read_byte_step16`].
pub fn read_byte_step24(address: u32, value: u8) -> Step {
    Step::new(lds8_frame24(address), vec![value])
}

/// Open handshake: BREAK then SYNC, echo only.
pub fn handshake_step() -> Step {
    Step::silent(vec![0x00, SYNC])
}

/// Datalink activation: CTRLB collision-detect off, CTRLA guard time on,
/// then the STATUSA liveness read.
pub fn link_init_steps() -> Vec<Step> {
    vec![
        Step::silent(stcs_frame(CS_CTRLB, 0x08)),
        Step::silent(stcs_frame(CS_CTRLA, 0x80)),
        Step::new(ldcs_frame(CS_STATUSA), vec![0x30]),
    ]
}

/// A 32-byte SIB for a P:0 part.
pub fn p0_sib() -> Vec<u8> {
    b"tinyAVR P:0D:0-3M2 (01.59B14.0)\0".to_vec()
}

/// A 32-byte SIB for a P:2 part.
pub fn p2_sib() -> Vec<u8> {
    b"AVR     P:2D:1-3M2 (A3.KV00S.0)\0".to_vec()
}

/// Everything [`serial_updi::UpdiApplication::new`] sends.
pub fn app_new_steps() -> Vec<Step> {
    let mut steps = vec![handshake_step()];
    steps.extend(link_init_steps());
    steps
}

/// Everything `read_device_info` sends for a P:0 part that is not in
/// programming mode: SIB read, 16-bit link re-activation, PDI revision
/// read and the NVMPROG probe.
pub fn p0_device_info_steps() -> Vec<Step> {
    let mut steps = vec![Step::new(sib_frame(), p0_sib())];
    steps.extend(link_init_steps());
    steps.push(Step::new(ldcs_frame(CS_STATUSA), vec![0x30]));
    steps.push(Step::new(ldcs_frame(CS_SYS_STATUS), vec![0x00]));
    steps
}

/// `read_device_info` for a P:2 part outside programming mode.
pub fn p2_device_info_steps() -> Vec<Step> {
    vec![
        Step::new(sib_frame(), p2_sib()),
        Step::new(ldcs_frame(CS_STATUSA), vec![0x30]),
        Step::new(ldcs_frame(CS_SYS_STATUS), vec![0x00]),
    ]
}

/// A successful `enter_progmode` on an unlocked part: NVMPROG probe, reset
/// assert, key transfer, key status check, reset cycle, lock poll, NVMPROG
/// confirm.
pub fn enter_progmode_steps() -> Vec<Step> {
    vec![
        Step::new(ldcs_frame(CS_SYS_STATUS), vec![0x00]),
        Step::silent(stcs_frame(CS_RESET_REQ, 0x59)),
        Step::silent(key64_frame()),
        Step::silent(b" gorPMVN".to_vec()),
        Step::new(ldcs_frame(CS_KEY_STATUS), vec![0x10]),
        Step::silent(stcs_frame(CS_RESET_REQ, 0x59)),
        Step::silent(stcs_frame(CS_RESET_REQ, 0x00)),
        Step::new(ldcs_frame(CS_SYS_STATUS), vec![0x00]),
        Step::new(ldcs_frame(CS_SYS_STATUS), vec![0x08]),
    ]
}

/// `leave_progmode`: reset cycle then CTRLB with UPDIDIS | CCDETDIS.
pub fn leave_progmode_steps() -> Vec<Step> {
    vec![
        Step::silent(stcs_frame(CS_RESET_REQ, 0x59)),
        Step::silent(stcs_frame(CS_RESET_REQ, 0x00)),
        Step::silent(stcs_frame(CS_CTRLB, 0x0C)),
    ]
}
