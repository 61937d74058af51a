//! Register transport over SPI
//!
//! Every register access is a single 3-byte SPI exchange. Reads send
//! `[OP_READ, addr, 0x00]` and take the value from the third clocked-in
//! byte; writes send `[OP_WRITE, addr, value]` and read nothing back.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{self, OutputPin};
use embedded_hal::spi::{self, SpiDevice};
use tracing::{debug, trace};

use super::error::{DriverError, Result};
use super::registers::{OP_READ, OP_WRITE};

/// Hold time for each phase of the reset pulse
const RESET_HOLD_MS: u32 = 1;

/// Register-level access to the chip
///
/// Implementations must serialize transactions: the chip's SPI state
/// machine is corrupted if a second exchange starts mid-frame.
pub trait RegisterTransport {
    /// Read one register
    fn read_register(&mut self, address: u8) -> Result<u8>;

    /// Write one register (no acknowledgement is available)
    fn write_register(&mut self, address: u8, value: u8) -> Result<()>;

    /// Pulse the reset line high, low, high with 1 ms holds
    fn reset_device(&mut self) -> Result<()>;

    /// Block for the given number of milliseconds
    fn delay_ms(&mut self, ms: u32);
}

/// [`RegisterTransport`] backed by embedded-hal peripherals
pub struct SpiTransport<SPI, RST, D> {
    spi: SPI,
    reset: RST,
    delay: D,
}

impl<SPI, RST, D> SpiTransport<SPI, RST, D>
where
    SPI: SpiDevice,
    RST: OutputPin,
    D: DelayNs,
{
    /// Create a transport from an SPI device, reset pin and delay provider
    pub fn new(spi: SPI, reset: RST, delay: D) -> Self {
        Self { spi, reset, delay }
    }
}

impl<SPI, RST, D> RegisterTransport for SpiTransport<SPI, RST, D>
where
    SPI: SpiDevice,
    RST: OutputPin,
    D: DelayNs,
{
    fn read_register(&mut self, address: u8) -> Result<u8> {
        let mut frame = [OP_READ, address, 0x00];
        self.spi.transfer_in_place(&mut frame).map_err(spi_error)?;
        trace!("read {:#04x} -> {:#04x}", address, frame[2]);
        Ok(frame[2])
    }

    fn write_register(&mut self, address: u8, value: u8) -> Result<()> {
        self.spi
            .write(&[OP_WRITE, address, value])
            .map_err(spi_error)?;
        trace!("write {:#04x} <- {:#04x}", address, value);
        Ok(())
    }

    fn reset_device(&mut self) -> Result<()> {
        self.reset.set_high().map_err(pin_error)?;
        self.delay.delay_ms(RESET_HOLD_MS);
        self.reset.set_low().map_err(pin_error)?;
        self.delay.delay_ms(RESET_HOLD_MS);
        self.reset.set_high().map_err(pin_error)?;
        debug!("LD3320 reset pulse sent");
        Ok(())
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }
}

fn spi_error<E: spi::Error>(e: E) -> DriverError {
    debug!(?e, "SPI error");
    DriverError::Spi(e.kind())
}

fn pin_error<E: digital::Error>(e: E) -> DriverError {
    debug!(?e, "reset pin error");
    DriverError::ResetLine(e.kind())
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::convert::Infallible;
    use std::rc::Rc;

    use embedded_hal::spi::{ErrorType, Operation};

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum Step {
        Frame(Vec<u8>),
        Pin(bool),
        DelayNs(u32),
    }

    type Log = Rc<RefCell<Vec<Step>>>;

    struct FakeSpi {
        log: Log,
        registers: HashMap<u8, u8>,
    }

    impl ErrorType for FakeSpi {
        type Error = Infallible;
    }

    impl SpiDevice for FakeSpi {
        fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> std::result::Result<(), Infallible> {
            for op in operations.iter_mut() {
                match op {
                    Operation::Write(buf) => {
                        self.log.borrow_mut().push(Step::Frame(buf.to_vec()));
                    }
                    Operation::TransferInPlace(buf) => {
                        self.log.borrow_mut().push(Step::Frame(buf.to_vec()));
                        if buf[0] == OP_READ {
                            buf[2] = self.registers.get(&buf[1]).copied().unwrap_or(0);
                        }
                    }
                    _ => unreachable!("transport only writes and transfers in place"),
                }
            }
            Ok(())
        }
    }

    struct FakePin(Log);

    impl digital::ErrorType for FakePin {
        type Error = Infallible;
    }

    impl OutputPin for FakePin {
        fn set_low(&mut self) -> std::result::Result<(), Infallible> {
            self.0.borrow_mut().push(Step::Pin(false));
            Ok(())
        }

        fn set_high(&mut self) -> std::result::Result<(), Infallible> {
            self.0.borrow_mut().push(Step::Pin(true));
            Ok(())
        }
    }

    struct FakeDelay(Log);

    impl DelayNs for FakeDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.0.borrow_mut().push(Step::DelayNs(ns));
        }
    }

    struct BrokenSpi;

    impl ErrorType for BrokenSpi {
        type Error = spi::ErrorKind;
    }

    impl SpiDevice for BrokenSpi {
        fn transaction(&mut self, _: &mut [Operation<'_, u8>]) -> std::result::Result<(), spi::ErrorKind> {
            Err(spi::ErrorKind::ModeFault)
        }
    }

    fn transport(registers: HashMap<u8, u8>) -> (SpiTransport<FakeSpi, FakePin, FakeDelay>, Log) {
        let log: Log = Rc::default();
        let spi = FakeSpi { log: log.clone(), registers };
        (
            SpiTransport::new(spi, FakePin(log.clone()), FakeDelay(log.clone())),
            log,
        )
    }

    #[test]
    fn test_read_frame() {
        let (mut t, log) = transport(HashMap::from([(0x06, 0x87)]));
        assert_eq!(t.read_register(0x06).unwrap(), 0x87);
        assert_eq!(*log.borrow(), vec![Step::Frame(vec![0x05, 0x06, 0x00])]);
    }

    #[test]
    fn test_write_frame() {
        let (mut t, log) = transport(HashMap::new());
        t.write_register(0x35, 0x50).unwrap();
        assert_eq!(*log.borrow(), vec![Step::Frame(vec![0x04, 0x35, 0x50])]);
    }

    #[test]
    fn test_reset_pulse_shape() {
        let (mut t, log) = transport(HashMap::new());
        t.reset_device().unwrap();

        let log = log.borrow();
        let pins: Vec<bool> = log
            .iter()
            .filter_map(|s| match s {
                Step::Pin(level) => Some(*level),
                _ => None,
            })
            .collect();
        assert_eq!(pins, vec![true, false, true]);

        // A delay of at least 1 ms separates every pair of pin changes
        let mut held_ns = 0u64;
        let mut holds = Vec::new();
        for step in log.iter() {
            match step {
                Step::Pin(_) => {
                    holds.push(held_ns);
                    held_ns = 0;
                }
                Step::DelayNs(ns) => held_ns += u64::from(*ns),
                Step::Frame(_) => panic!("reset must not touch the bus"),
            }
        }
        assert_eq!(holds.len(), 3);
        assert!(holds[1] >= 1_000_000);
        assert!(holds[2] >= 1_000_000);
        assert!(holds.iter().sum::<u64>() >= 2_000_000);
        assert_eq!(log.last(), Some(&Step::Pin(true)));
    }

    #[test]
    fn test_bus_failure_propagates() {
        let log: Log = Rc::default();
        let mut t = SpiTransport::new(BrokenSpi, FakePin(log.clone()), FakeDelay(log));
        assert!(matches!(
            t.read_register(0x06),
            Err(DriverError::Spi(spi::ErrorKind::ModeFault))
        ));
        assert!(matches!(
            t.write_register(0x06, 0),
            Err(DriverError::Spi(_))
        ));
    }
}
