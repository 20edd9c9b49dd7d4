//! UPDI protocol constants
//!
//! Instruction encodings, control/status register indices and key material
//! as defined by the UPDI chapter of the AVR device datasheets. These values
//! are the externally observable wire contract and are shared by every layer
//! of the stack.

/// Synchronisation character opening every frame. Also used by the target
/// for auto-baud detection.
pub const SYNC: u8 = 0x55;
/// Acknowledge byte returned after the address and data phases of ST/STS.
pub const ACK: u8 = 0x40;
/// A break character: one full character time of continuous low.
pub const BREAK: u8 = 0x00;

// Instruction opcodes (upper bits; size/mode fields are OR'd in below)
/// Load from absolute address.
pub const LDS: u8 = 0x00;
/// Store to absolute address.
pub const STS: u8 = 0x40;
/// Load via pointer.
pub const LD: u8 = 0x20;
/// Store via pointer.
pub const ST: u8 = 0x60;
/// Load control/status register.
pub const LDCS: u8 = 0x80;
/// Store control/status register.
pub const STCS: u8 = 0xC0;
/// Repeat the next instruction N+1 times.
pub const REPEAT: u8 = 0xA0;
/// Transfer a key or read the SIB.
pub const KEY: u8 = 0xE0;

// Pointer access mode for LD/ST
/// Access via pointer without post-increment.
pub const PTR: u8 = 0x00;
/// Access via pointer with post-increment.
pub const PTR_INC: u8 = 0x04;
/// Write the pointer register itself.
pub const PTR_ADDRESS: u8 = 0x08;

// Address size field for LDS/STS and pointer writes
/// 16-bit address operand.
pub const ADDRESS_16: u8 = 0x04;
/// 24-bit address operand.
pub const ADDRESS_24: u8 = 0x08;

// Data size field
/// 8-bit data operand.
pub const DATA_8: u8 = 0x00;
/// 16-bit data operand.
pub const DATA_16: u8 = 0x01;
/// 24-bit data operand (pointer-register writes only).
pub const DATA_24: u8 = 0x02;

// KEY instruction variants
/// Key transfer (host to target).
pub const KEY_KEY: u8 = 0x00;
/// SIB read (target to host).
pub const KEY_SIB: u8 = 0x04;
/// 64-bit (8-byte) key size code.
pub const KEY_64: u8 = 0x00;
/// 128-bit (16-byte) key size code.
pub const KEY_128: u8 = 0x01;
/// 256-bit (32-byte) key size code.
pub const KEY_256: u8 = 0x02;
/// SIB length select: a 32-byte SIB shares the 256-bit size encoding.
pub const SIB_32_BYTES: u8 = KEY_256;

/// REPEAT with a one-byte count operand.
pub const REPEAT_BYTE: u8 = 0x00;
/// Longest burst a single REPEAT can drive: one-byte counter plus the
/// off-by-one counting of the instruction.
pub const MAX_REPEAT_SIZE: usize = 0xFF + 1;

/// Control/status space register indices (4-bit, encoded into LDCS/STCS).
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CsRegister {
    /// General status (PDI revision in the high nibble).
    StatusA = 0x00,
    /// Error signature status.
    StatusB = 0x01,
    /// Guard time and response signature control.
    CtrlA = 0x02,
    /// Collision detection and interface disable control.
    CtrlB = 0x03,
    /// Key acceptance status.
    AsiKeyStatus = 0x07,
    /// Reset request.
    AsiResetReq = 0x08,
    /// ASI control.
    AsiCtrlA = 0x09,
    /// System control (user-row finalize).
    AsiSysCtrlA = 0x0A,
    /// System status (reset, sleep, progmode, lock).
    AsiSysStatus = 0x0B,
    /// CRC status.
    AsiCrcStatus = 0x0C,
}

// CTRLA / CTRLB bit positions
/// Inter-byte delay enable (guard time) in CTRLA.
pub const CTRLA_IBDLY_BIT: u8 = 7;
/// Response signature disable in CTRLA; suppresses ACKs during bursts.
pub const CTRLA_RSD_BIT: u8 = 3;
/// Collision detection disable in CTRLB.
pub const CTRLB_CCDETDIS_BIT: u8 = 3;
/// UPDI disable in CTRLB; releases any armed keys.
pub const CTRLB_UPDIDIS_BIT: u8 = 2;

// STATUSA / STATUSB bit positions
/// PDI revision field position in STATUSA.
pub const STATUSA_REVID_BIT: u8 = 4;
/// Error signature field position in STATUSB.
pub const STATUSB_PESIG_BIT: u8 = 0;

// ASI_KEY_STATUS bit positions
/// Chip-erase key armed.
pub const KEY_STATUS_CHIPERASE_BIT: u8 = 3;
/// Programming-mode key armed.
pub const KEY_STATUS_NVMPROG_BIT: u8 = 4;
/// User-row-write key armed.
pub const KEY_STATUS_UROWWRITE_BIT: u8 = 5;

// ASI_SYS_STATUS bit positions
/// System held in reset.
pub const SYS_STATUS_RSTSYS_BIT: u8 = 5;
/// System in sleep.
pub const SYS_STATUS_INSLEEP_BIT: u8 = 4;
/// NVM programming mode active.
pub const SYS_STATUS_NVMPROG_BIT: u8 = 3;
/// User-row programming mode active.
pub const SYS_STATUS_UROWPROG_BIT: u8 = 2;
/// Device locked.
pub const SYS_STATUS_LOCKSTATUS_BIT: u8 = 0;

/// Finalize bit in ASI_SYS_CTRLA: commits a user-row write on a locked
/// device.
pub const SYS_CTRLA_UROW_FINAL_BIT: u8 = 1;

/// Value written to ASI_RESET_REQ to assert reset; 0x00 releases it.
pub const RESET_REQ_VALUE: u8 = 0x59;

/// Key arming NVM programming mode. Transferred low byte first.
pub const KEY_NVMPROG: [u8; 8] = *b"NVMProg ";
/// Key arming chip erase (unlocks a locked part).
pub const KEY_CHIPERASE: [u8; 8] = *b"NVMErase";
/// Key arming a user-row write on a locked part.
pub const KEY_USERROW: [u8; 8] = *b"NVMUs&te";
