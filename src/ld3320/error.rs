//! Driver error types

use embedded_hal::{digital, spi};

/// Errors that can occur while driving the LD3320
///
/// A busy chip is not an error: operations that need the chip idle
/// report it through their boolean result.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("SPI transaction failed: {0}")]
    Spi(spi::ErrorKind),

    #[error("reset line could not be driven: {0}")]
    ResetLine(digital::ErrorKind),

    #[error("keyword is {len} bytes, a slot holds at most {max}")]
    KeywordTooLong { len: usize, max: usize },

    #[error("keyword is empty")]
    EmptyKeyword,

    #[error("keyword contains non-ASCII characters: {0:?}")]
    NonAsciiKeyword(String),

    #[error("oscillator frequency {0} MHz is outside the supported range")]
    OscillatorOutOfRange(f64),
}

pub type Result<T> = std::result::Result<T, DriverError>;
