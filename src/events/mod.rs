//! Events module for recognition results
//!
//! Provides structured event types emitted by the recognizer thread
//! once per recognition cycle.

use serde::{Deserialize, Serialize};

/// Events emitted by the recognizer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecognitionEvent {
    /// Vocabulary written to the chip
    VocabularyLoaded {
        /// Keywords accepted by the chip
        loaded: usize,
        /// Keywords skipped because the chip stayed busy
        skipped: usize,
    },

    /// A keyword was matched
    Recognized {
        /// Slot index of the keyword
        index: u8,
        /// Pinyin text of the keyword
        keyword: String,
    },

    /// A recognition pass ended without a match
    NotRecognized,

    /// The chip did not go idle, recognition was not started
    Busy,
}

impl std::fmt::Display for RecognitionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecognitionEvent::VocabularyLoaded { loaded, skipped } => {
                write!(f, "VOCABULARY_LOADED ({} loaded, {} skipped)", loaded, skipped)
            }
            RecognitionEvent::Recognized { index, keyword } => {
                write!(f, "RECOGNIZED [{}] '{}'", index, keyword)
            }
            RecognitionEvent::NotRecognized => write!(f, "NOT_RECOGNIZED"),
            RecognitionEvent::Busy => write!(f, "BUSY"),
        }
    }
}
