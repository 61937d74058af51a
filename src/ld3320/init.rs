//! Chip bring-up: clock/PLL programming and mode configuration
//!
//! Bring-up is fire and forget. The chip offers no handshake, so a wiring
//! or power fault only shows up later as a session that never goes idle.

use std::fmt;
use std::str::FromStr;

use tracing::info;

use super::error::{DriverError, Result};
use super::registers::*;
use super::transport::RegisterTransport;

/// Supported oscillator range in MHz
pub const OSC_MIN_MHZ: f64 = 4.0;
pub const OSC_MAX_MHZ: f64 = 48.0;

/// What the chip is configured to do after bring-up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatingMode {
    /// Keyword spotting
    Asr,
    /// MP3 decoding
    Mp3,
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperatingMode::Asr => write!(f, "asr"),
            OperatingMode::Mp3 => write!(f, "mp3"),
        }
    }
}

impl FromStr for OperatingMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asr" => Ok(OperatingMode::Asr),
            "mp3" => Ok(OperatingMode::Mp3),
            other => Err(format!("unknown operating mode '{other}' (expected asr or mp3)")),
        }
    }
}

/// Values for the four PLL registers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PllCoefficients {
    pub reg_11: u8,
    pub reg_19: u8,
    pub reg_1b: u8,
    pub reg_1d: u8,
}

impl PllCoefficients {
    /// Derive the PLL register values from the oscillator frequency
    ///
    /// Formulas are the datasheet's; rounding is half-to-even.
    pub fn for_mode(mode: OperatingMode, clk_mhz: f64) -> Result<Self> {
        if !(OSC_MIN_MHZ..=OSC_MAX_MHZ).contains(&clk_mhz) {
            return Err(DriverError::OscillatorOutOfRange(clk_mhz));
        }

        let divider = (clk_mhz / 2.0 - 1.0).round_ties_even();
        let reg_11 = to_register(divider, clk_mhz)?;

        match mode {
            OperatingMode::Asr => Ok(Self {
                reg_11,
                reg_19: to_register(
                    (clk_mhz * 32.0 / (divider + 1.0) - 0.51).round_ties_even(),
                    clk_mhz,
                )?,
                reg_1b: 0x48,
                reg_1d: 0x1F,
            }),
            OperatingMode::Mp3 => Ok(Self {
                reg_11,
                reg_19: 0x0F,
                reg_1b: 0x10,
                reg_1d: to_register(
                    (90.0 * (divider + 1.0) / clk_mhz - 1.0).round_ties_even(),
                    clk_mhz,
                )?,
            }),
        }
    }
}

fn to_register(value: f64, clk_mhz: f64) -> Result<u8> {
    if (0.0..=255.0).contains(&value) {
        Ok(value as u8)
    } else {
        Err(DriverError::OscillatorOutOfRange(clk_mhz))
    }
}

/// Register snapshot read back at the end of bring-up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitDiagnostics {
    pub interrupt_type: u8,
    pub interrupt_enable: u8,
    pub fifo_interrupt_enable: u8,
}

/// Brings the chip from reset into an operating mode
pub struct DeviceInitializer<'a, T> {
    transport: &'a mut T,
    clk_mhz: f64,
}

impl<'a, T: RegisterTransport> DeviceInitializer<'a, T> {
    pub fn new(transport: &'a mut T, clk_mhz: f64) -> Self {
        Self { transport, clk_mhz }
    }

    /// Run the common clock/PLL sequence followed by the mode configuration
    pub fn bring_up(&mut self, mode: OperatingMode) -> Result<InitDiagnostics> {
        let pll = PllCoefficients::for_mode(mode, self.clk_mhz)?;
        let diagnostics = self.init_common(&pll)?;

        match mode {
            OperatingMode::Asr => self.configure_asr()?,
            OperatingMode::Mp3 => self.configure_mp3()?,
        }

        info!(%mode, "LD3320 ready");
        Ok(diagnostics)
    }

    fn init_common(&mut self, pll: &PllCoefficients) -> Result<InitDiagnostics> {
        let t = &mut *self.transport;

        // Clock enable
        t.read_register(CHIP_ID)?;
        t.write_register(CLOCK_CONTROL, 0x35)?;
        t.delay_ms(10);
        t.read_register(CHIP_ID)?;

        // Power and clock source
        t.write_register(CLOCK_POWER, 0x03)?;
        t.delay_ms(5);
        t.write_register(CLOCK_ENABLE, 0x43)?;
        t.delay_ms(5);
        t.write_register(CLOCK_SOURCE, 0x02)?;

        // PLL
        t.write_register(PLL_11, pll.reg_11)?;
        t.write_register(ADC_CONTROL, 0x00)?;
        t.write_register(PLL_19, pll.reg_19)?;
        t.write_register(PLL_1B, pll.reg_1b)?;
        t.write_register(PLL_1D, pll.reg_1d)?;
        t.delay_ms(10);

        // Finalize
        t.write_register(POWER_CONTROL, 0x04)?;
        t.write_register(CLOCK_CONTROL, 0x4C)?;
        t.delay_ms(5);
        t.write_register(KEYWORD_LENGTH, 0x00)?;
        t.write_register(CLOCK_ENABLE, 0x4F)?;

        let diagnostics = InitDiagnostics {
            interrupt_type: t.read_register(INT_STATUS)?,
            interrupt_enable: t.read_register(INT_ENABLE)?,
            fifo_interrupt_enable: t.read_register(FIFO_INT_ENABLE)?,
        };
        info!(
            int_type = diagnostics.interrupt_type,
            int_enable = diagnostics.interrupt_enable,
            fifo_int = diagnostics.fifo_interrupt_enable,
            ?pll,
            "common init done"
        );
        Ok(diagnostics)
    }

    fn configure_asr(&mut self) -> Result<()> {
        let t = &mut *self.transport;
        t.write_register(MODE_SELECT, MODE_ASR)?;
        t.write_register(CLOCK_CONTROL, 0x48)?;
        t.delay_ms(10);

        for (address, value) in [
            (0x3C, 0x80),
            (0x3E, 0x07),
            (0x38, 0xFF),
            (0x3A, 0x07),
            (0x40, 0x00),
            (0x42, 0x08),
            (0x44, 0x00),
            (0x46, 0x08),
        ] {
            t.write_register(address, value)?;
        }
        t.delay_ms(1);
        Ok(())
    }

    fn configure_mp3(&mut self) -> Result<()> {
        let t = &mut *self.transport;
        t.write_register(MODE_SELECT, MODE_MP3)?;
        t.write_register(CLOCK_CONTROL, 0x48)?;
        t.delay_ms(10);

        for (address, value) in [
            (0x85, 0x52),
            (0x8F, 0x00),
            (0x81, 0x00),
            (0x83, 0x00),
            (0x8E, 0xFF),
            (0x8D, 0xFF),
        ] {
            t.write_register(address, value)?;
        }
        t.delay_ms(1);
        t.write_register(0x87, 0xFF)?;
        t.write_register(0x89, 0xFF)?;
        t.delay_ms(1);

        // Output volume and equalizer
        for (address, value) in [
            (0x22, 0x00),
            (0x23, 0x00),
            (0x20, 0xEF),
            (0x21, 0x07),
            (0x24, 0x77),
            (0x25, 0x03),
            (0x26, 0xBB),
            (0x27, 0x01),
        ] {
            t.write_register(address, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ld3320::mock::{Access, MockTransport};

    const CLK: f64 = 22.1184;

    #[test]
    fn test_pll_reference_clock() {
        assert_eq!(
            PllCoefficients::for_mode(OperatingMode::Asr, CLK).unwrap(),
            PllCoefficients { reg_11: 10, reg_19: 64, reg_1b: 0x48, reg_1d: 0x1F }
        );
        assert_eq!(
            PllCoefficients::for_mode(OperatingMode::Mp3, CLK).unwrap(),
            PllCoefficients { reg_11: 10, reg_19: 0x0F, reg_1b: 0x10, reg_1d: 44 }
        );
    }

    #[test]
    fn test_pll_valid_across_oscillator_range() {
        let mut tenths = (OSC_MIN_MHZ * 10.0) as u32;
        while f64::from(tenths) / 10.0 <= OSC_MAX_MHZ {
            let clk = f64::from(tenths) / 10.0;
            for mode in [OperatingMode::Asr, OperatingMode::Mp3] {
                assert!(
                    PllCoefficients::for_mode(mode, clk).is_ok(),
                    "{mode} at {clk} MHz"
                );
            }
            tenths += 1;
        }
    }

    #[test]
    fn test_pll_rejects_out_of_range_clock() {
        assert!(matches!(
            PllCoefficients::for_mode(OperatingMode::Asr, 100.0),
            Err(DriverError::OscillatorOutOfRange(_))
        ));
        assert!(PllCoefficients::for_mode(OperatingMode::Mp3, 0.0).is_err());
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("ASR".parse::<OperatingMode>().unwrap(), OperatingMode::Asr);
        assert_eq!("mp3".parse::<OperatingMode>().unwrap(), OperatingMode::Mp3);
        assert!("wav".parse::<OperatingMode>().is_err());
    }

    #[test]
    fn test_asr_bring_up_sequence() {
        let mut t = MockTransport::new().with_register(INT_STATUS, 0x01);
        let diag = DeviceInitializer::new(&mut t, CLK)
            .bring_up(OperatingMode::Asr)
            .unwrap();
        assert_eq!(diag.interrupt_type, 0x01);

        let writes = t.writes();
        assert_eq!(
            &writes[..14],
            &[
                (0x17, 0x35),
                (0x89, 0x03),
                (0xCF, 0x43),
                (0xCB, 0x02),
                (0x11, 10),
                (0x1E, 0x00),
                (0x19, 64),
                (0x1B, 0x48),
                (0x1D, 0x1F),
                (0xCD, 0x04),
                (0x17, 0x4C),
                (0xB9, 0x00),
                (0xCF, 0x4F),
                (0xBD, 0x00),
            ]
        );
        assert_eq!(writes.len(), 14 + 1 + 8);
        assert_eq!(writes.last(), Some(&(0x46, 0x08)));

        // Settle after clock enable precedes everything else
        assert_eq!(
            &t.log[..4],
            &[
                Access::Read(0x06),
                Access::Write(0x17, 0x35),
                Access::Delay(10),
                Access::Read(0x06),
            ]
        );
        assert_eq!(t.log.last(), Some(&Access::Delay(1)));
    }

    #[test]
    fn test_mp3_bring_up_sequence() {
        let mut t = MockTransport::new();
        DeviceInitializer::new(&mut t, CLK)
            .bring_up(OperatingMode::Mp3)
            .unwrap();

        let writes = t.writes();
        assert!(writes.contains(&(0x19, 0x0F)));
        assert!(writes.contains(&(0x1D, 44)));
        assert!(writes.contains(&(0xBD, 0x02)));
        assert_eq!(writes.last(), Some(&(0x27, 0x01)));
        assert_eq!(
            t.log.iter().filter(|a| **a == Access::Delay(1)).count(),
            2
        );
    }

    #[test]
    fn test_bad_clock_writes_nothing() {
        let mut t = MockTransport::new();
        assert!(DeviceInitializer::new(&mut t, 60.0)
            .bring_up(OperatingMode::Asr)
            .is_err());
        assert!(t.log.is_empty());
    }
}
