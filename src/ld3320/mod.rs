//! LD3320 speech recognition chip driver
//!
//! - `transport`: 3-byte SPI register frames and the reset pulse
//! - `init`: clock/PLL bring-up into ASR or MP3 mode
//! - `session`: keyword loading and the interrupt-driven recognition cycle
//! - `selftest`: power-on register check for wiring faults

mod error;
mod init;
pub mod registers;
mod selftest;
mod session;
mod transport;

#[cfg(test)]
pub(crate) mod mock;

pub use error::DriverError;
pub use init::{DeviceInitializer, OperatingMode};
pub use selftest::self_test;
pub use session::{validate_keyword, AsrSession};
pub use transport::{RegisterTransport, SpiTransport};
