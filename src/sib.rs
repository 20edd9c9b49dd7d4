//! System Information Block decoding
//!
//! The SIB is a 32-byte self-describing ASCII blob the target returns over
//! the KEY instruction. Fixed-width fields identify the device family, the
//! NVM controller generation, the debug interface and the oscillator. The
//! NVM generation selects which variant driver the stack installs.

use std::fmt;
use std::str;

use log::info;

use crate::Error;

/// NVM controller generation advertised in the SIB.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NvmVersion {
    /// tiny0/1/2 and mega0: 16-bit addressing, page buffer.
    P0,
    /// AVR DA/DB/DD: 24-bit addressing, word-direct writes.
    P2,
    /// AVR EA: 24-bit addressing, page buffer.
    P3,
    /// AVR DU: 24-bit addressing, word-direct writes.
    P4,
    /// AVR EB: 24-bit addressing, separate flash and EEPROM page buffers.
    P5,
}

impl NvmVersion {
    fn from_tag(tag: char) -> Option<NvmVersion> {
        match tag {
            '0' => Some(NvmVersion::P0),
            '2' => Some(NvmVersion::P2),
            '3' => Some(NvmVersion::P3),
            '4' => Some(NvmVersion::P4),
            '5' => Some(NvmVersion::P5),
            _ => None,
        }
    }
}

impl fmt::Display for NvmVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            NvmVersion::P0 => '0',
            NvmVersion::P2 => '2',
            NvmVersion::P3 => '3',
            NvmVersion::P4 => '4',
            NvmVersion::P5 => '5',
        };
        write!(f, "P:{}", tag)
    }
}

/// Decoded System Information Block.
#[derive(Clone, PartialEq)]
pub struct SystemInfoBlock {
    family: String,
    nvm_version: Option<NvmVersion>,
    ocd: String,
    oscillator: String,
    extra: String,
}

impl SystemInfoBlock {
    /// Parse a SIB read from the target.
    ///
    /// The vital fields live in the first 19 characters; anything shorter,
    /// or containing non-ASCII content, is rejected so the caller can run
    /// the double-break recovery.
    pub fn parse(sib: &[u8]) -> Result<SystemInfoBlock, Error> {
        let text = match str::from_utf8(sib) {
            Ok(text) if text.is_ascii() => text,
            _ => {
                return Err(Error::Protocol(
                    "SIB read returned invalid characters".to_string(),
                ))
            }
        };
        if text.len() < 19 {
            return Err(Error::Protocol(
                "SIB read returned incomplete string".to_string(),
            ));
        }
        info!("SIB: '{}'", text.trim_end_matches('\0').trim_end());

        let family = text[0..7].trim().to_string();
        info!("device family: '{}'", family);

        // The NVM tag reads e.g. "P:2"; older parts report "NVM:0" with the
        // tag shifted, so fall back to scanning for the long spelling.
        let nvm_field = text[8..11].trim();
        let nvm_tag = match nvm_field.find(':') {
            Some(at) => nvm_field[at + 1..].chars().next(),
            None => text
                .find("NVM:")
                .and_then(|at| text[at + 4..].chars().next()),
        };
        let nvm_version = nvm_tag.and_then(NvmVersion::from_tag);
        match nvm_version {
            Some(version) => info!("NVM interface: {}", version),
            None => info!("NVM interface tag not recognised"),
        }

        let ocd = text[11..14].trim().to_string();
        info!("debug interface: '{}'", ocd);

        let oscillator = text[15..19].trim().to_string();
        info!("oscillator: '{}'", oscillator);

        let extra = text[19..].trim_end_matches('\0').trim().to_string();
        info!("extra info: '{}'", extra);

        Ok(SystemInfoBlock {
            family,
            nvm_version,
            ocd,
            oscillator,
            extra,
        })
    }

    /// Device family identifier, e.g. `"tinyAVR"`.
    pub fn family(&self) -> &str {
        &self.family
    }

    /// NVM controller generation, if the tag was recognised.
    pub fn nvm_version(&self) -> Option<NvmVersion> {
        self.nvm_version
    }

    /// On-chip debug interface tag.
    pub fn ocd(&self) -> &str {
        &self.ocd
    }

    /// Debug oscillator tag.
    pub fn oscillator(&self) -> &str {
        &self.oscillator
    }

    /// Trailing free-form content (firmware revision and friends).
    pub fn extra(&self) -> &str {
        &self.extra
    }
}

impl fmt::Debug for SystemInfoBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemInfoBlock")
            .field("family", &self.family)
            .field("nvm_version", &self.nvm_version)
            .field("ocd", &self.ocd)
            .field("oscillator", &self.oscillator)
            .field("extra", &self.extra)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_short_tag_form() {
        let sib = SystemInfoBlock::parse(b"megaAVR P:0D:0-3M2 (01.59B14.0)\0").unwrap();
        assert_eq!(sib.family(), "megaAVR");
        assert_eq!(sib.nvm_version(), Some(NvmVersion::P0));
        assert_eq!(sib.ocd(), "D:0");
        assert_eq!(sib.oscillator(), "3M2");
    }

    #[test]
    fn parses_avr_dx_tag() {
        let sib = SystemInfoBlock::parse(b"AVR     P:2D:1-3M2 (A3.KV00S.0)\0").unwrap();
        assert_eq!(sib.family(), "AVR");
        assert_eq!(sib.nvm_version(), Some(NvmVersion::P2));
    }

    #[test]
    fn parses_long_tag_form() {
        let sib = SystemInfoBlock::parse(b"tinyAVR  NVM:0 OCD:0 OSC:3M2 ext\0").unwrap();
        assert_eq!(sib.nvm_version(), Some(NvmVersion::P0));
    }

    #[test]
    fn rejects_short_sib() {
        assert!(SystemInfoBlock::parse(b"tinyAVR P:0").is_err());
    }

    #[test]
    fn rejects_non_ascii_sib() {
        let mut sib = *b"megaAVR P:0D:0-3M2 (01.59B14.0)\0";
        sib[3] = 0xFF;
        assert!(SystemInfoBlock::parse(&sib).is_err());
    }

    #[test]
    fn unknown_tag_is_none() {
        let sib = SystemInfoBlock::parse(b"futrAVR P:9D:0-3M2 (01.59B14.0)\0").unwrap();
        assert_eq!(sib.nvm_version(), None);
    }
}
