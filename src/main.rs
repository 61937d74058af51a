//! ld3320-daemon: keyword spotting with an LD3320 speech recognition chip
//!
//! This daemon drives the chip over SPI and provides:
//! - Reset, clock/PLL bring-up and ASR or MP3 mode configuration
//! - Vocabulary loading from configuration
//! - An interrupt-driven recognition loop on a dedicated thread
//! - Recognition events as JSON lines on stdout
//!
//! Audio capture and matching happen on the chip; the host only moves
//! register values.

mod config;
mod events;
mod irq;
mod ld3320;
mod lifecycle;
mod platform;
mod recognizer;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::events::RecognitionEvent;
use crate::ld3320::{AsrSession, DeviceInitializer, OperatingMode, RegisterTransport};
use crate::lifecycle::ShutdownSignal;
use crate::recognizer::Recognizer;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .with_writer(std::io::stderr)
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "ld3320-daemon starting"
    );

    // Load configuration
    let config = Config::load()?;
    info!(mode = %config.mode, clk_mhz = config.clk_mhz, "configuration loaded");

    // Create shutdown signal handler
    let shutdown = ShutdownSignal::new();

    let (mut transport, irq) = platform::open(&config)?;

    if config.self_test {
        let report = ld3320::self_test(&mut transport).context("register self-test")?;
        if !report.passed() {
            warn!(?report, "self-test failed, check SPI wiring");
        }
    }

    transport.reset_device().context("chip reset")?;
    DeviceInitializer::new(&mut transport, config.clk_mhz)
        .bring_up(config.mode)
        .context("chip bring-up")?;

    if config.mode == OperatingMode::Mp3 {
        info!("MP3 decoder ready, waiting for shutdown");
        let reason = shutdown.wait().await?;
        info!(%reason, "shutdown signal received");
        return Ok(());
    }

    // Recognizer thread -> main loop
    let (event_tx, mut event_rx) = mpsc::channel::<RecognitionEvent>(32);

    let session = AsrSession::new(transport).with_mic_gain(config.mic_gain);
    let recognizer = Recognizer::new(event_tx);
    let done_rx = recognizer.start(session, irq, config.keywords.clone())?;
    info!(keywords = config.keywords.len(), "recognizer started, speak a keyword");

    let session_loop = async {
        while let Some(event) = event_rx.recv().await {
            info!(%event, "recognition event");
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(e) => warn!(?e, "failed to encode event"),
            }
        }
        let outcome = done_rx
            .await
            .context("recognizer thread exited without a status")?;
        outcome.context("recognizer failed")
    };

    // A signal is a normal shutdown; a recognizer fault is an error exit
    tokio::select! {
        result = session_loop => {
            if let Err(e) = &result {
                error!(?e, "recognizer stopped");
            }
            result?;
            info!("recognizer finished");
        }

        reason = shutdown.wait() => {
            let reason = reason?;
            info!(%reason, "shutdown signal received");
        }
    }

    info!("shutting down...");
    recognizer.stop();
    if recognizer.is_running() {
        // Blocked on the interrupt line; it goes away with the process
        info!("recognizer thread still waiting for an interrupt edge");
    }

    info!("ld3320-daemon stopped");

    Ok(())
}
