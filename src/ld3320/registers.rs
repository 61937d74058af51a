//! LD3320 register map
//!
//! Only the registers this driver touches are named. Several addresses
//! serve different purposes depending on the operating mode; names follow
//! the ASR usage unless noted.

/// SPI opcode for a register read: `[READ, addr, 0x00]`
pub const OP_READ: u8 = 0x05;
/// SPI opcode for a register write: `[WRITE, addr, value]`
pub const OP_WRITE: u8 = 0x04;

pub const FIFO_INT_ENABLE: u8 = 0x02;
/// Keyword character FIFO (ASR mode)
pub const FIFO_DATA: u8 = 0x05;
pub const CHIP_ID: u8 = 0x06;
/// FIFO control, bits pulse-cleared
pub const FIFO_CLEAR: u8 = 0x08;
pub const PLL_11: u8 = 0x11;
pub const CLOCK_CONTROL: u8 = 0x17;
pub const PLL_19: u8 = 0x19;
pub const PLL_1B: u8 = 0x1B;
pub const ADC_SWITCH: u8 = 0x1C;
pub const PLL_1D: u8 = 0x1D;
pub const ADC_CONTROL: u8 = 0x1E;
pub const INT_ENABLE: u8 = 0x29;
pub const INT_STATUS: u8 = 0x2B;
pub const MIC_GAIN: u8 = 0x35;
pub const ASR_COMMAND: u8 = 0x37;
pub const CLOCK_POWER: u8 = 0x89;
pub const ASR_STATUS: u8 = 0xB2;
pub const SCRATCH_B3: u8 = 0xB3;
pub const KEYWORD_LENGTH: u8 = 0xB9;
pub const RESULT_COUNT: u8 = 0xBA;
pub const MODE_SELECT: u8 = 0xBD;
pub const ASR_SUB_STATUS: u8 = 0xBF;
pub const KEYWORD_INDEX: u8 = 0xC1;
pub const KEYWORD_SLOT: u8 = 0xC3;
pub const RESULT_INDEX: u8 = 0xC5;
pub const CLOCK_SOURCE: u8 = 0xCB;
pub const POWER_CONTROL: u8 = 0xCD;
pub const CLOCK_ENABLE: u8 = 0xCF;

/// `ASR_STATUS` value while the recognizer accepts commands
pub const ASR_IDLE: u8 = 0x21;
/// `ASR_SUB_STATUS` value once a recognition pass has completed
pub const ASR_DONE: u8 = 0x35;
/// `INT_STATUS` bit raised by the recognizer
pub const INT_ASR: u8 = 0x10;

/// `ASR_COMMAND` triggers
pub const CMD_LOAD_KEYWORD: u8 = 0x04;
pub const CMD_START_ASR: u8 = 0x06;

/// `FIFO_CLEAR` pulse bits
pub const FIFO_CLEAR_DATA: u8 = 0x01;
pub const FIFO_CLEAR_KEYWORDS: u8 = 0x04;

/// `MODE_SELECT` values
pub const MODE_ASR: u8 = 0x00;
pub const MODE_MP3: u8 = 0x02;
pub const MODE_ASR_RESTART: u8 = 0x20;

/// `ADC_SWITCH` values
pub const ADC_OFF: u8 = 0x00;
pub const ADC_MIC: u8 = 0x09;
pub const ADC_MIC_ACTIVE: u8 = 0x0B;

/// Number of keyword slots addressable by a `u8` index
pub const KEYWORD_SLOTS: usize = 256;
/// Maximum bytes of pinyin text in one keyword slot
pub const MAX_KEYWORD_LEN: usize = 79;
/// Highest microphone gain accepted by `MIC_GAIN`
pub const MAX_MIC_GAIN: u8 = 0x7F;
