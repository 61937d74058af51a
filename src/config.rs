//! Configuration loading and management

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Context, Result};

use crate::ld3320::registers::{KEYWORD_SLOTS, MAX_MIC_GAIN};
use crate::ld3320::{validate_keyword, OperatingMode};

const DEFAULT_KEYWORDS: &[&str] = &[
    "kai deng",
    "guan deng",
    "qing guan deng",
    "yang bo",
    "yang yi lin",
    "peng jin",
];

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// spidev node the chip is attached to
    pub spi_device: PathBuf,

    /// SPI clock in Hz
    pub spi_hz: u32,

    /// GPIO character device holding the reset and interrupt lines
    pub gpio_chip: PathBuf,

    /// Line offset driving the chip's RSTB pin
    pub reset_line: u32,

    /// Line offset wired to the chip's INTB pin
    pub irq_line: u32,

    /// Oscillator frequency feeding the chip, in MHz
    pub clk_mhz: f64,

    /// Operating mode selected at bring-up
    pub mode: OperatingMode,

    /// Microphone ADC gain
    pub mic_gain: u8,

    /// Pinyin keywords, loaded into slots in order
    pub keywords: Vec<String>,

    /// Run the register self-test before bring-up
    pub self_test: bool,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mic_gain: u8 = parse_or(&lookup, "LD3320_MIC_GAIN", 0x50)?;
        if mic_gain > MAX_MIC_GAIN {
            bail!("LD3320_MIC_GAIN must be at most {MAX_MIC_GAIN:#04x}, got {mic_gain:#04x}");
        }

        let keywords = match lookup("LD3320_KEYWORDS") {
            Some(list) => parse_keywords(&list),
            None => DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
        };
        if keywords.is_empty() {
            bail!("LD3320_KEYWORDS contains no keywords");
        }
        if keywords.len() > KEYWORD_SLOTS {
            bail!(
                "LD3320_KEYWORDS has {} keywords, the chip holds at most {KEYWORD_SLOTS}",
                keywords.len()
            );
        }
        for keyword in &keywords {
            validate_keyword(keyword)
                .with_context(|| format!("invalid keyword in LD3320_KEYWORDS: '{keyword}'"))?;
        }

        let mode = match lookup("LD3320_MODE") {
            Some(value) => value.parse::<OperatingMode>().map_err(anyhow::Error::msg)?,
            None => OperatingMode::Asr,
        };

        Ok(Self {
            spi_device: lookup("LD3320_SPI_DEV")
                .unwrap_or_else(|| "/dev/spidev0.0".to_string())
                .into(),
            spi_hz: parse_or(&lookup, "LD3320_SPI_HZ", 1_500_000)?,
            gpio_chip: lookup("LD3320_GPIO_CHIP")
                .unwrap_or_else(|| "/dev/gpiochip0".to_string())
                .into(),
            reset_line: parse_or(&lookup, "LD3320_RESET_LINE", 2)?,
            irq_line: parse_or(&lookup, "LD3320_IRQ_LINE", 3)?,
            clk_mhz: parse_or(&lookup, "LD3320_CLK_MHZ", 22.1184)?,
            mode,
            mic_gain,
            keywords,
            self_test: parse_or(&lookup, "LD3320_SELF_TEST", false)?,
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {key}: '{value}'")),
        None => Ok(default),
    }
}

/// Split a comma-separated keyword list, collapsing whitespace runs
fn parse_keywords(list: &str) -> Vec<String> {
    list.split(',')
        .map(|k| k.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|k| !k.is_empty())
        .collect()
}
