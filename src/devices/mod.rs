//! Descriptors for known target parts
//!
//! One representative part per supported NVM generation style; other parts
//! of the same families differ only in the geometry fields.

mod attiny827;
pub use attiny827::ATTINY827;

mod atmega4809;
pub use atmega4809::ATMEGA4809;

mod avr128da48;
pub use avr128da48::AVR128DA48;
