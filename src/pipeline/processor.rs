//! Prescription processing orchestrator.
//!
//! Single entry point that drives the per-request pipeline:
//! extract (per slot, concurrently) → parse → summarize.
//!
//! Uses trait-based DI for preprocessing, OCR and event delivery so the
//! orchestrator remains fully testable with mock implementations.

use std::sync::Arc;

use serde::Serialize;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::ServiceConfig;
use crate::pipeline::events::{PipelineObserver, TracingObserver};
use crate::pipeline::extraction::orchestrator::SlotTextExtractor;
use crate::pipeline::extraction::preprocess::{ImagePreprocessor, OcrImagePreprocessor, PreprocessConfig};
use crate::pipeline::extraction::ocr::OcrSpaceClient;
use crate::pipeline::extraction::types::{OcrEngine, RawImage, Slot, SlotUploads, SupportedFormats};
use crate::pipeline::extraction::ExtractionError;
use crate::pipeline::structuring::{parse_prescription_text, ParsedPrescription, Vocabulary};
use crate::pipeline::summary::generate_health_summary;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that end a whole prescription request.
#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("No prescription images uploaded")]
    NoFilesProvided,

    #[error(transparent)]
    Extraction(#[from] ExtractionError),
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Outcome for one slot. Both fields are `None` when the slot had no upload
/// or OCR produced nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SlotResult {
    pub raw_text: Option<String>,
    pub parsed: Option<ParsedPrescription>,
}

impl SlotResult {
    fn from_text(raw_text: Option<String>, vocabulary: &Vocabulary) -> Self {
        let parsed = raw_text
            .as_deref()
            .map(|text| parse_prescription_text(Some(text), vocabulary));
        Self { raw_text, parsed }
    }
}

/// Full response payload for one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineResult {
    pub morning: SlotResult,
    pub afternoon: SlotResult,
    pub night: SlotResult,
    pub summary: String,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Stateless per-request pipeline. Cheap to share behind an `Arc`.
pub struct PrescriptionPipeline {
    ocr_engine: Arc<dyn OcrEngine>,
    preprocessor: Arc<dyn ImagePreprocessor>,
    observer: Arc<dyn PipelineObserver>,
    formats: SupportedFormats,
    vocabulary: Arc<Vocabulary>,
}

impl PrescriptionPipeline {
    pub fn new(ocr_engine: Arc<dyn OcrEngine>) -> Self {
        Self {
            ocr_engine,
            preprocessor: Arc::new(OcrImagePreprocessor::new(PreprocessConfig::default())),
            observer: Arc::new(TracingObserver),
            formats: SupportedFormats::default(),
            vocabulary: Arc::new(Vocabulary::default()),
        }
    }

    /// Production wiring: OCR.space client, default preprocessing, tracing observer.
    ///
    /// The client only reports outcomes; every event, OCR ones included, goes
    /// through the observer set with `with_observer`.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, ExtractionError> {
        let client = OcrSpaceClient::new(&config.ocr)?;
        Ok(Self::new(Arc::new(client)))
    }

    pub fn with_preprocessor(mut self, preprocessor: Arc<dyn ImagePreprocessor>) -> Self {
        self.preprocessor = preprocessor;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_formats(mut self, formats: SupportedFormats) -> Self {
        self.formats = formats;
        self
    }

    pub fn with_vocabulary(mut self, vocabulary: Vocabulary) -> Self {
        self.vocabulary = Arc::new(vocabulary);
        self
    }

    fn extractor(&self) -> SlotTextExtractor {
        SlotTextExtractor::new(
            Arc::clone(&self.preprocessor),
            Arc::clone(&self.ocr_engine),
            self.formats.clone(),
            Arc::clone(&self.observer),
        )
    }

    /// Run the pipeline over up to three slot uploads.
    ///
    /// Slots are extracted concurrently. The first `UnsupportedFormat` ends
    /// the request and drops the other in-flight slots.
    pub async fn process(&self, uploads: SlotUploads) -> Result<PipelineResult, ProcessingError> {
        if uploads.is_empty() {
            return Err(ProcessingError::NoFilesProvided);
        }

        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("prescription_pipeline", %request_id);

        async {
            tracing::info!(files = uploads.len(), "Processing prescription upload");
            let extractor = self.extractor();

            let (morning, afternoon, night) = tokio::try_join!(
                Self::extract_slot(&extractor, Slot::Morning, uploads.get(Slot::Morning)),
                Self::extract_slot(&extractor, Slot::Afternoon, uploads.get(Slot::Afternoon)),
                Self::extract_slot(&extractor, Slot::Night, uploads.get(Slot::Night)),
            )?;

            let morning = SlotResult::from_text(morning, &self.vocabulary);
            let afternoon = SlotResult::from_text(afternoon, &self.vocabulary);
            let night = SlotResult::from_text(night, &self.vocabulary);

            let summary = generate_health_summary(
                [&morning, &afternoon, &night]
                    .into_iter()
                    .filter_map(|slot| slot.parsed.as_ref()),
            );

            tracing::info!(
                slots_with_text = [&morning, &afternoon, &night]
                    .iter()
                    .filter(|slot| slot.raw_text.is_some())
                    .count(),
                "Prescription processing complete"
            );

            Ok::<_, ProcessingError>(PipelineResult {
                morning,
                afternoon,
                night,
                summary,
            })
        }
        .instrument(span)
        .await
    }

    async fn extract_slot(
        extractor: &SlotTextExtractor,
        slot: Slot,
        image: Option<&RawImage>,
    ) -> Result<Option<String>, ProcessingError> {
        let span = tracing::info_span!("slot", %slot);
        extractor
            .extract(slot, image)
            .instrument(span)
            .await
            .map_err(ProcessingError::from)
    }
}
