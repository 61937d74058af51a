//! Recognizer module driving the chip's recognition cycle
//!
//! Runs vocabulary loading and the start/edge/interrupt loop on a
//! dedicated thread and reports results as `RecognitionEvent`s.

mod worker;

pub use worker::{Recognizer, RecognizerError};
