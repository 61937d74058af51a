//! Linux backend: spidev for the bus, GPIO character device for the lines
//!
//! Wiring on a Raspberry Pi header: SPI0 (CE0) to the chip's SPI pins,
//! RSTB on GPIO2, INTB on GPIO3 with a pull-up.

use anyhow::{anyhow, Context, Result};
use embedded_hal::digital::{self, OutputPin};
use gpio_cdev::{
    Chip, EventRequestFlags, EventType, LineEventHandle, LineHandle, LineRequestFlags,
};
use linux_embedded_hal::spidev::{SpiModeFlags, SpidevOptions};
use linux_embedded_hal::{Delay, SpidevDevice};
use tracing::{debug, info};

use crate::config::Config;
use crate::irq::InterruptLine;
use crate::ld3320::SpiTransport;

const CONSUMER: &str = "ld3320-daemon";

/// Register transport over the Linux peripherals
pub type LinuxTransport = SpiTransport<SpidevDevice, ResetLine, Delay>;

/// Open the SPI device and request the reset and interrupt lines
pub fn open(config: &Config) -> Result<(LinuxTransport, IrqLine)> {
    let mut spi = SpidevDevice::open(&config.spi_device)
        .map_err(|e| anyhow!("failed to open {}: {e:?}", config.spi_device.display()))?;

    // CPOL=1, CPHA=0, MSB first
    let options = SpidevOptions::new()
        .bits_per_word(8)
        .max_speed_hz(config.spi_hz)
        .lsb_first(false)
        .mode(SpiModeFlags::SPI_MODE_2)
        .build();
    spi.0
        .configure(&options)
        .with_context(|| format!("failed to configure {}", config.spi_device.display()))?;

    let mut chip = Chip::new(&config.gpio_chip)
        .with_context(|| format!("failed to open {}", config.gpio_chip.display()))?;

    let reset = chip
        .get_line(config.reset_line)
        .and_then(|line| line.request(LineRequestFlags::OUTPUT, 1, CONSUMER))
        .with_context(|| format!("failed to request reset line {}", config.reset_line))?;

    let irq = chip
        .get_line(config.irq_line)
        .and_then(|line| {
            line.events(
                LineRequestFlags::INPUT,
                EventRequestFlags::FALLING_EDGE,
                CONSUMER,
            )
        })
        .with_context(|| format!("failed to request interrupt line {}", config.irq_line))?;

    info!(
        spi = %config.spi_device.display(),
        spi_hz = config.spi_hz,
        gpio = %config.gpio_chip.display(),
        reset_line = config.reset_line,
        irq_line = config.irq_line,
        "hardware opened"
    );

    Ok((
        SpiTransport::new(spi, ResetLine(reset), Delay),
        IrqLine(irq),
    ))
}

/// Output line wired to the chip's reset pin
pub struct ResetLine(LineHandle);

#[derive(Debug)]
pub struct LineError(gpio_cdev::Error);

impl std::fmt::Display for LineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "GPIO line error: {}", self.0)
    }
}

impl std::error::Error for LineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

impl digital::Error for LineError {
    fn kind(&self) -> digital::ErrorKind {
        digital::ErrorKind::Other
    }
}

impl digital::ErrorType for ResetLine {
    type Error = LineError;
}

impl OutputPin for ResetLine {
    fn set_low(&mut self) -> Result<(), LineError> {
        self.0.set_value(0).map_err(LineError)
    }

    fn set_high(&mut self) -> Result<(), LineError> {
        self.0.set_value(1).map_err(LineError)
    }
}

/// Falling-edge event stream from the chip's interrupt pin
pub struct IrqLine(LineEventHandle);

impl InterruptLine for IrqLine {
    type Error = gpio_cdev::Error;

    fn wait_for_falling_edge(&mut self) -> Result<(), gpio_cdev::Error> {
        loop {
            let event = self.0.get_event()?;
            if matches!(event.event_type(), EventType::FallingEdge) {
                return Ok(());
            }
            debug!("ignoring rising edge on interrupt line");
        }
    }
}
