//! ASR session: vocabulary loading and the recognition cycle
//!
//! The authoritative session state lives on the chip and is only observable
//! through register polling. The state tracked here mirrors the last command
//! issued and is used for logging, not for deciding what the chip will accept.

use std::fmt;
use std::time::Instant;

use tracing::{debug, info, warn};

use super::error::{DriverError, Result};
use super::registers::*;
use super::transport::RegisterTransport;

/// Attempts made by [`AsrSession::is_idle`] before giving up
pub const IDLE_POLL_ATTEMPTS: u32 = 10;
/// Pause after each status read
pub const IDLE_POLL_INTERVAL_MS: u32 = 10;
/// Default ADC gain (typical range 0x40..=0x6F)
pub const DEFAULT_MIC_GAIN: u8 = 0x50;

/// Session phases as last commanded by this driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Ready to accept commands
    #[default]
    Idle,
    /// Writing a keyword into a slot
    KeywordLoading,
    /// Recognizer armed, waiting for the interrupt line
    Recognizing,
    /// Interrupt observed, result not yet consumed
    InterruptPending,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "Idle"),
            SessionState::KeywordLoading => write!(f, "KeywordLoading"),
            SessionState::Recognizing => write!(f, "Recognizing"),
            SessionState::InterruptPending => write!(f, "InterruptPending"),
        }
    }
}

/// Outcome of servicing a recognizer interrupt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecognitionResult {
    pub found: bool,
    /// Raw result register; stale or undefined unless `found`
    pub index: u8,
}

impl RecognitionResult {
    /// The recognized keyword index, if there was a match
    pub fn keyword_index(&self) -> Option<u8> {
        self.found.then_some(self.index)
    }
}

/// Manages the keyword table and the recognition lifecycle
pub struct AsrSession<T> {
    transport: T,
    mic_gain: u8,
    state: SessionState,
    state_entered_at: Option<Instant>,
}

impl<T: RegisterTransport> AsrSession<T> {
    /// Create a session on a chip already brought up in ASR mode
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            mic_gain: DEFAULT_MIC_GAIN,
            state: SessionState::Idle,
            state_entered_at: None,
        }
    }

    /// Set the microphone ADC gain applied on every recognition start
    pub fn with_mic_gain(mut self, gain: u8) -> Self {
        self.mic_gain = gain.min(MAX_MIC_GAIN);
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Poll the recognizer status until it reports idle
    ///
    /// Every read is followed by a settle delay, including the one that
    /// sees the idle sentinel. Returns `Ok(false)` if the sentinel was not
    /// seen within [`IDLE_POLL_ATTEMPTS`] reads.
    pub fn is_idle(&mut self) -> Result<bool> {
        for attempt in 1..=IDLE_POLL_ATTEMPTS {
            let status = self.transport.read_register(ASR_STATUS)?;
            self.transport.delay_ms(IDLE_POLL_INTERVAL_MS);
            if status == ASR_IDLE {
                debug!(attempt, "recognizer idle");
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Load one keyword into slot `index`
    ///
    /// `text` is the pinyin of the keyword with syllables separated by
    /// spaces. Returns `Ok(false)` without touching the chip when it is busy.
    pub fn add_keyword(&mut self, index: u8, text: &str) -> Result<bool> {
        validate_keyword(text)?;
        let length = u8::try_from(text.len()).map_err(|_| DriverError::KeywordTooLong {
            len: text.len(),
            max: MAX_KEYWORD_LEN,
        })?;

        if !self.is_idle()? {
            warn!(index, text, "recognizer busy, keyword not loaded");
            return Ok(false);
        }

        self.transition_to(SessionState::KeywordLoading);
        let t = &mut self.transport;
        t.write_register(KEYWORD_INDEX, index)?;
        t.write_register(KEYWORD_SLOT, 0x00)?;
        t.write_register(FIFO_CLEAR, FIFO_CLEAR_KEYWORDS)?;
        t.delay_ms(1);
        t.write_register(FIFO_CLEAR, 0x00)?;
        t.delay_ms(1);

        for byte in text.bytes() {
            t.write_register(FIFO_DATA, byte)?;
        }
        t.write_register(KEYWORD_LENGTH, length)?;
        t.write_register(ASR_STATUS, 0xFF)?;
        t.write_register(ASR_COMMAND, CMD_LOAD_KEYWORD)?;
        self.transition_to(SessionState::Idle);

        debug!(index, text, "keyword loaded");
        Ok(true)
    }

    /// Arm the recognizer
    ///
    /// Returns `Ok(false)` when the chip does not go idle after the ADC
    /// restart; the recognizer is not armed in that case.
    pub fn start_recognition(&mut self) -> Result<bool> {
        let t = &mut self.transport;
        t.write_register(MIC_GAIN, self.mic_gain)?;
        t.write_register(ADC_SWITCH, ADC_MIC)?;
        t.write_register(MODE_SELECT, MODE_ASR_RESTART)?;
        t.write_register(FIFO_CLEAR, FIFO_CLEAR_DATA)?;
        t.delay_ms(1);
        t.write_register(FIFO_CLEAR, 0x00)?;
        t.delay_ms(1);

        if !self.is_idle()? {
            warn!("recognizer busy, recognition not started");
            return Ok(false);
        }

        let t = &mut self.transport;
        t.write_register(ASR_STATUS, 0xFF)?;
        t.write_register(ASR_COMMAND, CMD_START_ASR)?;
        t.delay_ms(5);
        t.write_register(ADC_SWITCH, ADC_MIC_ACTIVE)?;
        t.write_register(INT_ENABLE, INT_ASR)?;
        t.write_register(MODE_SELECT, MODE_ASR)?;
        self.transition_to(SessionState::Recognizing);
        Ok(true)
    }

    /// Service the interrupt raised at the end of a recognition pass
    ///
    /// Interrupts are disabled and the interrupt status and ADC switch are
    /// cleared whatever the outcome, leaving the chip ready for the next
    /// [`start_recognition`](Self::start_recognition).
    pub fn handle_interrupt(&mut self) -> Result<RecognitionResult> {
        self.transition_to(SessionState::InterruptPending);

        let t = &mut self.transport;
        let interrupt_type = t.read_register(INT_STATUS)?;
        let interrupt_enable = t.read_register(INT_ENABLE)?;
        let fifo_interrupt = t.read_register(FIFO_INT_ENABLE)?;
        info!(
            int_type = interrupt_type,
            int_enable = interrupt_enable,
            fifo_int = fifo_interrupt,
            "interrupt received"
        );

        t.write_register(INT_ENABLE, 0x00)?;
        t.write_register(FIFO_INT_ENABLE, 0x00)?;

        let found = interrupt_type & INT_ASR != 0
            && t.read_register(ASR_STATUS)? == ASR_IDLE
            && t.read_register(ASR_SUB_STATUS)? == ASR_DONE
            && (1..=3).contains(&t.read_register(RESULT_COUNT)?);

        t.write_register(INT_STATUS, 0x00)?;
        t.write_register(ADC_SWITCH, ADC_OFF)?;
        let index = t.read_register(RESULT_INDEX)?;
        self.transition_to(SessionState::Idle);

        Ok(RecognitionResult { found, index })
    }

    /// Re-read the interrupt status and best-match index without side effects
    pub fn asr_result(&mut self) -> Result<u8> {
        let interrupt_type = self.transport.read_register(INT_STATUS)?;
        let index = self.transport.read_register(RESULT_INDEX)?;
        debug!(int_type = interrupt_type, index, "ASR result registers");
        Ok(index)
    }

    fn transition_to(&mut self, new_state: SessionState) {
        let old_state = self.state;
        if old_state == new_state {
            return;
        }
        let duration_ms = self
            .state_entered_at
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0);

        debug!(from = %old_state, to = %new_state, duration_ms, "session transition");

        self.state = new_state;
        self.state_entered_at = if new_state != SessionState::Idle {
            Some(Instant::now())
        } else {
            None
        };
    }

    #[cfg(test)]
    pub(crate) fn transport(&self) -> &T {
        &self.transport
    }

    #[cfg(test)]
    pub(crate) fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}

/// Check that `text` fits a keyword slot
pub fn validate_keyword(text: &str) -> Result<()> {
    if text.is_empty() {
        return Err(DriverError::EmptyKeyword);
    }
    if !text.is_ascii() {
        return Err(DriverError::NonAsciiKeyword(text.to_string()));
    }
    if text.len() > MAX_KEYWORD_LEN {
        return Err(DriverError::KeywordTooLong {
            len: text.len(),
            max: MAX_KEYWORD_LEN,
        });
    }
    Ok(())
}
