//! Recognition worker thread
//!
//! Owns the ASR session and the interrupt line. All register traffic
//! happens on this one thread, which keeps bus transactions serialized.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::events::RecognitionEvent;
use crate::irq::InterruptLine;
use crate::ld3320::registers::KEYWORD_SLOTS;
use crate::ld3320::{AsrSession, DriverError, RegisterTransport};

/// Attempts per keyword while the chip reports busy
const KEYWORD_LOAD_ATTEMPTS: u32 = 3;

/// Errors that end the recognizer
#[derive(Debug, thiserror::Error)]
pub enum RecognizerError {
    #[error("recognizer is already running")]
    AlreadyRunning,

    #[error("failed to spawn recognizer thread: {0}")]
    ThreadSpawn(String),

    #[error("vocabulary has {0} keywords, the chip holds at most 256")]
    VocabularyTooLarge(usize),

    #[error("no keyword could be loaded, the chip never went idle")]
    NoKeywordsLoaded,

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("interrupt line failed: {0}")]
    Interrupt(String),
}

/// Runs the load/recognize/interrupt cycle on a dedicated thread
pub struct Recognizer {
    event_tx: mpsc::Sender<RecognitionEvent>,
    running: Arc<AtomicBool>,
}

impl Recognizer {
    /// Create a recognizer that reports to `event_tx`
    pub fn new(event_tx: mpsc::Sender<RecognitionEvent>) -> Self {
        Self {
            event_tx,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start the recognizer
    ///
    /// Loads `vocabulary` into slots 0.. and then recognizes until
    /// [`stop`](Self::stop) is called, the event receiver is dropped or a
    /// fault occurs. The returned receiver resolves with the exit status.
    pub fn start<T, I>(
        &self,
        session: AsrSession<T>,
        irq: I,
        vocabulary: Vec<String>,
    ) -> Result<oneshot::Receiver<Result<(), RecognizerError>>, RecognizerError>
    where
        T: RegisterTransport + Send + 'static,
        I: InterruptLine + Send + 'static,
    {
        if vocabulary.len() > KEYWORD_SLOTS {
            return Err(RecognizerError::VocabularyTooLarge(vocabulary.len()));
        }
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(RecognizerError::AlreadyRunning);
        }

        let event_tx = self.event_tx.clone();
        let running = Arc::clone(&self.running);
        let (done_tx, done_rx) = oneshot::channel();

        thread::Builder::new()
            .name("ld3320-recognizer".to_string())
            .spawn(move || {
                info!("recognizer thread started");

                let result = run_session(session, irq, &vocabulary, event_tx, &running);
                if let Err(e) = &result {
                    error!(%e, "recognizer stopped on error");
                }

                running.store(false, Ordering::SeqCst);
                let _ = done_tx.send(result);
                info!("recognizer thread stopped");
            })
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                RecognizerError::ThreadSpawn(e.to_string())
            })?;

        Ok(done_rx)
    }

    /// Ask the recognizer to stop after the current cycle
    ///
    /// A thread blocked on the interrupt line only notices once the next
    /// edge arrives.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Check if the recognizer thread is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Load the vocabulary, then loop start -> edge -> interrupt
fn run_session<T, I>(
    mut session: AsrSession<T>,
    mut irq: I,
    vocabulary: &[String],
    event_tx: mpsc::Sender<RecognitionEvent>,
    running: &AtomicBool,
) -> Result<(), RecognizerError>
where
    T: RegisterTransport,
    I: InterruptLine,
{
    let loaded = load_vocabulary(&mut session, vocabulary)?;
    let skipped = vocabulary.len() - loaded;
    if loaded == 0 && !vocabulary.is_empty() {
        return Err(RecognizerError::NoKeywordsLoaded);
    }
    if event_tx
        .blocking_send(RecognitionEvent::VocabularyLoaded { loaded, skipped })
        .is_err()
    {
        return Ok(());
    }

    while running.load(Ordering::SeqCst) {
        if !session.start_recognition()? {
            if event_tx.blocking_send(RecognitionEvent::Busy).is_err() {
                break;
            }
            continue;
        }

        irq.wait_for_falling_edge()
            .map_err(|e| RecognizerError::Interrupt(e.to_string()))?;
        debug!(state = %session.state(), "interrupt edge observed");

        let result = session.handle_interrupt()?;
        let event = match result.keyword_index() {
            Some(index) => match vocabulary.get(usize::from(index)) {
                Some(keyword) => RecognitionEvent::Recognized {
                    index,
                    keyword: keyword.clone(),
                },
                None => {
                    warn!(index, "chip reported a slot outside the vocabulary");
                    RecognitionEvent::NotRecognized
                }
            },
            None => {
                let index = session.asr_result()?;
                debug!(index, "no match, result register ignored");
                RecognitionEvent::NotRecognized
            }
        };

        if event_tx.blocking_send(event).is_err() {
            debug!("event receiver dropped");
            break;
        }
    }

    Ok(())
}

/// Write every keyword into its slot, retrying while the chip is busy
fn load_vocabulary<T: RegisterTransport>(
    session: &mut AsrSession<T>,
    vocabulary: &[String],
) -> Result<usize, RecognizerError> {
    let mut loaded = 0;
    for (index, keyword) in vocabulary.iter().enumerate() {
        let slot = u8::try_from(index)
            .map_err(|_| RecognizerError::VocabularyTooLarge(vocabulary.len()))?;
        let mut accepted = false;
        for attempt in 1..=KEYWORD_LOAD_ATTEMPTS {
            if session.add_keyword(slot, keyword)? {
                accepted = true;
                break;
            }
            debug!(slot, attempt, "keyword load deferred, chip busy");
        }

        if accepted {
            info!(slot, keyword = %keyword, "keyword added");
            loaded += 1;
        } else {
            warn!(slot, keyword = %keyword, "keyword skipped, chip stayed busy");
        }
    }
    Ok(loaded)
}
