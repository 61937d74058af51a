//! Interrupt line from the chip
//!
//! The LD3320 pulls its INTB line low when a recognition pass finishes.
//! Only one edge is tracked at a time: an edge that arrives before the
//! previous one was serviced is lost.

/// A digital input that can block until a falling edge
pub trait InterruptLine {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Block until the next falling edge
    fn wait_for_falling_edge(&mut self) -> Result<(), Self::Error>;
}
