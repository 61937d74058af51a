//! Hardware backends for the register transport and interrupt line

#[cfg(not(target_os = "linux"))]
compile_error!("ld3320-daemon needs Linux spidev and GPIO character devices");

mod linux;

pub use linux::open;
