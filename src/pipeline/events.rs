//! Structured pipeline events and the observer they are delivered to.
//!
//! Components never log failures directly: they emit a `PipelineEvent`
//! through an injected `PipelineObserver`. Production wiring uses
//! `TracingObserver`; tests use `RecordingObserver` to assert on events.

use std::sync::Mutex;

use super::extraction::{OcrAttempt, Slot};

/// A notable occurrence inside the prescription pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// Image preprocessing failed; the original bytes are used instead.
    PreprocessingFailed { slot: Slot, reason: String },
    /// The OCR service call failed (network, HTTP status, timeout, bad body).
    OcrServiceFailed {
        slot: Slot,
        attempt: OcrAttempt,
        reason: String,
    },
    /// The OCR service answered but returned no usable text.
    OcrReturnedNoText { slot: Slot, attempt: OcrAttempt },
    /// An OCR attempt for a slot produced text.
    SlotTextExtracted {
        slot: Slot,
        attempt: OcrAttempt,
        chars: usize,
    },
    /// The preprocessed attempt yielded nothing; retrying on the original bytes.
    FallingBackToOriginal { slot: Slot },
    /// Both OCR attempts yielded nothing; the slot has no text.
    SlotExhausted { slot: Slot },
}

/// Sink for pipeline events.
pub trait PipelineObserver: Send + Sync {
    fn on_event(&self, event: &PipelineEvent);
}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn on_event(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::PreprocessingFailed { slot, reason } => {
                tracing::warn!(%slot, reason = %reason, "Image preprocessing failed, using original bytes");
            }
            PipelineEvent::OcrServiceFailed {
                slot,
                attempt,
                reason,
            } => {
                tracing::warn!(%slot, %attempt, reason = %reason, "OCR service call failed");
            }
            PipelineEvent::OcrReturnedNoText { slot, attempt } => {
                tracing::debug!(%slot, %attempt, "OCR service returned no parsed text");
            }
            PipelineEvent::SlotTextExtracted {
                slot,
                attempt,
                chars,
            } => {
                tracing::info!(%slot, %attempt, chars, "Prescription text extracted");
            }
            PipelineEvent::FallingBackToOriginal { slot } => {
                tracing::info!(%slot, "No text from preprocessed image, retrying with original bytes");
            }
            PipelineEvent::SlotExhausted { slot } => {
                tracing::warn!(%slot, "No text extracted after both OCR attempts");
            }
        }
    }
}

/// Collects events in memory.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<PipelineEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn count_matching<F>(&self, predicate: F) -> usize
    where
        F: Fn(&PipelineEvent) -> bool,
    {
        self.events().iter().filter(|e| predicate(e)).count()
    }
}

impl PipelineObserver for RecordingObserver {
    fn on_event(&self, event: &PipelineEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
