use std::sync::Arc;

use base64::Engine as _;

use super::preprocess::{prepare_for_ocr, ImagePreprocessor, PreparedImage};
use super::types::{
    ExtractionWarning, OcrAttempt, OcrEngine, OcrOutcome, RawImage, Slot, SupportedFormats,
};
use super::ExtractionError;
use crate::pipeline::events::{PipelineEvent, PipelineObserver};

/// Per-slot text extraction: preprocess, OCR, and one retry on the raw bytes.
///
/// Uses trait objects for preprocessing, OCR and event delivery so the
/// fallback sequence is testable with mocks.
#[derive(Clone)]
pub struct SlotTextExtractor {
    preprocessor: Arc<dyn ImagePreprocessor>,
    ocr_engine: Arc<dyn OcrEngine>,
    formats: SupportedFormats,
    observer: Arc<dyn PipelineObserver>,
}

impl SlotTextExtractor {
    pub fn new(
        preprocessor: Arc<dyn ImagePreprocessor>,
        ocr_engine: Arc<dyn OcrEngine>,
        formats: SupportedFormats,
        observer: Arc<dyn PipelineObserver>,
    ) -> Self {
        Self {
            preprocessor,
            ocr_engine,
            formats,
            observer,
        }
    }

    /// Extract text for one slot.
    ///
    /// Returns `Ok(None)` when the slot is empty or both OCR attempts yield
    /// nothing. The only error is `UnsupportedFormat`, raised before any
    /// preprocessing or OCR call and never retried.
    pub async fn extract(
        &self,
        slot: Slot,
        image: Option<&RawImage>,
    ) -> Result<Option<String>, ExtractionError> {
        let Some(image) = image else {
            return Ok(None);
        };

        if !self.formats.contains(image.extension()) {
            return Err(ExtractionError::UnsupportedFormat {
                name: image.file_name().to_string(),
            });
        }

        tracing::debug!(
            %slot,
            file_name = image.file_name(),
            size = image.bytes().len(),
            "Starting slot extraction"
        );

        // Attempt 1: preprocessed bytes
        let prepared = self.prepare(slot, image).await;
        let payload = base64::engine::general_purpose::STANDARD.encode(&prepared.bytes);
        drop(prepared);
        if let Some(text) = self
            .recognize(slot, OcrAttempt::Preprocessed, &payload, image)
            .await?
        {
            return Ok(Some(text));
        }

        // Attempt 2: original, unprocessed bytes
        self.observer
            .on_event(&PipelineEvent::FallingBackToOriginal { slot });
        let payload = base64::engine::general_purpose::STANDARD.encode(image.bytes());
        if let Some(text) = self
            .recognize(slot, OcrAttempt::Original, &payload, image)
            .await?
        {
            return Ok(Some(text));
        }

        self.observer.on_event(&PipelineEvent::SlotExhausted { slot });
        Ok(None)
    }

    /// Preprocess on the blocking pool. A panicked or failed task yields the
    /// original bytes.
    async fn prepare(&self, slot: Slot, image: &RawImage) -> PreparedImage {
        let preprocessor = Arc::clone(&self.preprocessor);
        let bytes = image.shared_bytes();
        let prepared = tokio::task::spawn_blocking(move || prepare_for_ocr(&*preprocessor, &bytes))
            .await
            .unwrap_or_else(|e| PreparedImage {
                bytes: image.bytes().to_vec(),
                warning: Some(ExtractionWarning::PreprocessingFailed {
                    reason: format!("preprocessing task failed: {e}"),
                }),
            });

        if let Some(ExtractionWarning::PreprocessingFailed { reason }) = &prepared.warning {
            self.observer.on_event(&PipelineEvent::PreprocessingFailed {
                slot,
                reason: reason.clone(),
            });
        }
        prepared
    }

    /// One OCR call, reported to the observer. Blank text counts as no text;
    /// service failures are absorbed here.
    async fn recognize(
        &self,
        slot: Slot,
        attempt: OcrAttempt,
        payload: &str,
        image: &RawImage,
    ) -> Result<Option<String>, ExtractionError> {
        let event = match self.ocr_engine.recognize(payload, image.extension()).await? {
            OcrOutcome::Text(text) if !text.trim().is_empty() => {
                self.observer.on_event(&PipelineEvent::SlotTextExtracted {
                    slot,
                    attempt,
                    chars: text.chars().count(),
                });
                return Ok(Some(text));
            }
            OcrOutcome::Text(_) | OcrOutcome::NoText => {
                PipelineEvent::OcrReturnedNoText { slot, attempt }
            }
            OcrOutcome::Failed { reason } => PipelineEvent::OcrServiceFailed {
                slot,
                attempt,
                reason,
            },
        };
        self.observer.on_event(&event);
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::events::RecordingObserver;
    use crate::pipeline::extraction::ocr::MockOcrEngine;
    use crate::pipeline::extraction::preprocess::{FailingPreprocessor, PassthroughPreprocessor};

    /// Preprocessor that tags its output so tests can tell attempts apart.
    struct TaggingPreprocessor;

    impl ImagePreprocessor for TaggingPreprocessor {
        fn preprocess(&self, image_bytes: &[u8]) -> Result<Vec<u8>, ExtractionError> {
            let mut out = b"processed:".to_vec();
            out.extend_from_slice(image_bytes);
            Ok(out)
        }
    }

    fn extractor(
        preprocessor: Arc<dyn ImagePreprocessor>,
        engine: Arc<MockOcrEngine>,
        observer: Arc<RecordingObserver>,
    ) -> SlotTextExtractor {
        SlotTextExtractor::new(preprocessor, engine, SupportedFormats::default(), observer)
    }

    fn b64(bytes: &[u8]) -> String {
        base64::engine::general_purpose::STANDARD.encode(bytes)
    }

    #[tokio::test]
    async fn empty_slot_returns_none_without_ocr() {
        let engine = Arc::new(MockOcrEngine::new("unused"));
        let observer = Arc::new(RecordingObserver::new());
        let ex = extractor(Arc::new(PassthroughPreprocessor), engine.clone(), observer.clone());

        assert_eq!(ex.extract(Slot::Morning, None).await.unwrap(), None);
        assert_eq!(engine.call_count(), 0);
        assert!(observer.events().is_empty());
    }

    #[tokio::test]
    async fn first_attempt_uses_preprocessed_bytes() {
        let engine = Arc::new(MockOcrEngine::new("Paracetamol 650mg"));
        let observer = Arc::new(RecordingObserver::new());
        let ex = extractor(Arc::new(TaggingPreprocessor), engine.clone(), observer.clone());
        let image = RawImage::new("rx.png", b"pixels".to_vec());

        let text = ex.extract(Slot::Morning, Some(&image)).await.unwrap();

        assert_eq!(text.as_deref(), Some("Paracetamol 650mg"));
        assert_eq!(engine.call_count(), 1);
        assert_eq!(engine.payloads(), vec![b64(b"processed:pixels")]);
        assert_eq!(
            observer.events(),
            vec![PipelineEvent::SlotTextExtracted {
                slot: Slot::Morning,
                attempt: OcrAttempt::Preprocessed,
                chars: 17,
            }]
        );
    }

    #[tokio::test]
    async fn falls_back_to_original_bytes() {
        let engine = Arc::new(MockOcrEngine::scripted(
            vec![None, Some("Dr. Rao".into())],
            None,
        ));
        let observer = Arc::new(RecordingObserver::new());
        let ex = extractor(Arc::new(TaggingPreprocessor), engine.clone(), observer.clone());
        let image = RawImage::new("rx.jpg", b"pixels".to_vec());

        let text = ex.extract(Slot::Night, Some(&image)).await.unwrap();

        assert_eq!(text.as_deref(), Some("Dr. Rao"));
        assert_eq!(
            engine.payloads(),
            vec![b64(b"processed:pixels"), b64(b"pixels")]
        );
        assert_eq!(
            observer.count_matching(|e| matches!(e, PipelineEvent::FallingBackToOriginal { .. })),
            1
        );
    }

    #[tokio::test]
    async fn exactly_two_attempts_then_none() {
        let engine = Arc::new(MockOcrEngine::silent());
        let observer = Arc::new(RecordingObserver::new());
        let ex = extractor(Arc::new(PassthroughPreprocessor), engine.clone(), observer.clone());
        let image = RawImage::new("rx.webp", b"pixels".to_vec());

        assert_eq!(ex.extract(Slot::Afternoon, Some(&image)).await.unwrap(), None);
        assert_eq!(engine.call_count(), 2);
        assert_eq!(
            observer.events().last(),
            Some(&PipelineEvent::SlotExhausted {
                slot: Slot::Afternoon
            })
        );
    }

    #[tokio::test]
    async fn service_failures_are_reported_per_attempt() {
        let engine = Arc::new(MockOcrEngine::failing("connection refused"));
        let observer = Arc::new(RecordingObserver::new());
        let ex = extractor(Arc::new(PassthroughPreprocessor), engine.clone(), observer.clone());
        let image = RawImage::new("rx.png", b"pixels".to_vec());

        assert_eq!(ex.extract(Slot::Night, Some(&image)).await.unwrap(), None);
        assert_eq!(
            observer.events(),
            vec![
                PipelineEvent::OcrServiceFailed {
                    slot: Slot::Night,
                    attempt: OcrAttempt::Preprocessed,
                    reason: "connection refused".into(),
                },
                PipelineEvent::FallingBackToOriginal { slot: Slot::Night },
                PipelineEvent::OcrServiceFailed {
                    slot: Slot::Night,
                    attempt: OcrAttempt::Original,
                    reason: "connection refused".into(),
                },
                PipelineEvent::SlotExhausted { slot: Slot::Night },
            ]
        );
    }

    #[tokio::test]
    async fn blank_text_counts_as_no_text() {
        let engine = Arc::new(MockOcrEngine::scripted(
            vec![Some("  \n ".into())],
            Some("Dr. Rao".into()),
        ));
        let observer = Arc::new(RecordingObserver::new());
        let ex = extractor(Arc::new(PassthroughPreprocessor), engine.clone(), observer.clone());
        let image = RawImage::new("rx.png", b"pixels".to_vec());

        let text = ex.extract(Slot::Morning, Some(&image)).await.unwrap();

        assert_eq!(text.as_deref(), Some("Dr. Rao"));
        assert_eq!(
            observer.events()[0],
            PipelineEvent::OcrReturnedNoText {
                slot: Slot::Morning,
                attempt: OcrAttempt::Preprocessed,
            }
        );
    }

    #[tokio::test]
    async fn unsupported_extension_fails_before_ocr() {
        let engine = Arc::new(MockOcrEngine::new("never"));
        let observer = Arc::new(RecordingObserver::new());
        let ex = extractor(Arc::new(PassthroughPreprocessor), engine.clone(), observer);
        let image = RawImage::new("setup.exe", b"MZ".to_vec());

        let err = ex.extract(Slot::Morning, Some(&image)).await.unwrap_err();

        assert_eq!(err.to_string(), "Unsupported format for file: setup.exe");
        assert_eq!(engine.call_count(), 0);
    }

    #[tokio::test]
    async fn preprocessing_failure_uses_original_and_reports() {
        let engine = Arc::new(MockOcrEngine::new("Amoxicillin 500mg"));
        let observer = Arc::new(RecordingObserver::new());
        let ex = extractor(Arc::new(FailingPreprocessor), engine.clone(), observer.clone());
        let image = RawImage::new("rx.bmp", b"pixels".to_vec());

        let text = ex.extract(Slot::Morning, Some(&image)).await.unwrap();

        assert_eq!(text.as_deref(), Some("Amoxicillin 500mg"));
        assert_eq!(engine.payloads(), vec![b64(b"pixels")]);
        assert_eq!(
            observer.count_matching(|e| matches!(e, PipelineEvent::PreprocessingFailed { .. })),
            1
        );
    }
}
