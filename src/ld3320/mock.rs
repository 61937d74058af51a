//! Recording transport for unit tests

use std::collections::{HashMap, VecDeque};

use super::error::Result;
use super::transport::RegisterTransport;

/// One observed transport call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read(u8),
    Write(u8, u8),
    Delay(u32),
    Reset,
}

/// Serves register reads from per-address scripts and records every call
#[derive(Debug, Default)]
pub struct MockTransport {
    pub log: Vec<Access>,
    scripted: HashMap<u8, VecDeque<u8>>,
    fixed: HashMap<u8, u8>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every read of `address` returns `value` once scripts are exhausted
    pub fn with_register(mut self, address: u8, value: u8) -> Self {
        self.fixed.insert(address, value);
        self
    }

    /// Successive reads of `address` return `values` in order
    pub fn with_script(mut self, address: u8, values: &[u8]) -> Self {
        self.scripted
            .entry(address)
            .or_default()
            .extend(values.iter().copied());
        self
    }

    pub fn writes(&self) -> Vec<(u8, u8)> {
        self.log
            .iter()
            .filter_map(|a| match a {
                Access::Write(addr, value) => Some((*addr, *value)),
                _ => None,
            })
            .collect()
    }

    pub fn reads_of(&self, address: u8) -> usize {
        self.log
            .iter()
            .filter(|a| **a == Access::Read(address))
            .count()
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }
}

impl RegisterTransport for MockTransport {
    fn read_register(&mut self, address: u8) -> Result<u8> {
        self.log.push(Access::Read(address));
        let scripted = self
            .scripted
            .get_mut(&address)
            .and_then(|queue| queue.pop_front());
        Ok(scripted
            .or_else(|| self.fixed.get(&address).copied())
            .unwrap_or(0))
    }

    fn write_register(&mut self, address: u8, value: u8) -> Result<()> {
        self.log.push(Access::Write(address, value));
        Ok(())
    }

    fn reset_device(&mut self) -> Result<()> {
        self.log.push(Access::Reset);
        Ok(())
    }

    fn delay_ms(&mut self, ms: u32) {
        self.log.push(Access::Delay(ms));
    }
}
