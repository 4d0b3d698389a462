use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::ExtractionError;

/// Time-of-day upload position. Exactly three exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    Morning,
    Afternoon,
    Night,
}

impl Slot {
    pub const ALL: [Slot; 3] = [Slot::Morning, Slot::Afternoon, Slot::Night];

    pub fn as_str(&self) -> &'static str {
        match self {
            Slot::Morning => "morning",
            Slot::Afternoon => "afternoon",
            Slot::Night => "night",
        }
    }

    /// Resolve a multipart field name. Names are matched exactly.
    pub fn from_field_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|slot| slot.as_str() == name)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An uploaded prescription photo, owned by the request that carried it.
#[derive(Debug, Clone)]
pub struct RawImage {
    file_name: String,
    extension: String,
    bytes: Arc<[u8]>,
}

impl RawImage {
    /// The extension is the lowercased text after the last `.` of the file name.
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        let file_name = file_name.into();
        let extension = file_name
            .rsplit('.')
            .next()
            .unwrap_or_default()
            .to_lowercase();
        Self {
            file_name,
            extension,
            bytes: bytes.into(),
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }
}

/// Up to one image per slot.
#[derive(Debug, Clone, Default)]
pub struct SlotUploads {
    morning: Option<RawImage>,
    afternoon: Option<RawImage>,
    night: Option<RawImage>,
}

impl SlotUploads {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, slot: Slot, image: RawImage) -> Self {
        self.insert(slot, image);
        self
    }

    /// Store an image for a slot. The first image per slot wins; returns
    /// `false` when the slot was already filled.
    pub fn insert(&mut self, slot: Slot, image: RawImage) -> bool {
        let entry = self.slot_mut(slot);
        if entry.is_some() {
            return false;
        }
        *entry = Some(image);
        true
    }

    pub fn get(&self, slot: Slot) -> Option<&RawImage> {
        match slot {
            Slot::Morning => self.morning.as_ref(),
            Slot::Afternoon => self.afternoon.as_ref(),
            Slot::Night => self.night.as_ref(),
        }
    }

    pub fn is_empty(&self) -> bool {
        Slot::ALL.iter().all(|slot| self.get(*slot).is_none())
    }

    pub fn len(&self) -> usize {
        Slot::ALL.iter().filter(|slot| self.get(**slot).is_some()).count()
    }

    fn slot_mut(&mut self, slot: Slot) -> &mut Option<RawImage> {
        match slot {
            Slot::Morning => &mut self.morning,
            Slot::Afternoon => &mut self.afternoon,
            Slot::Night => &mut self.night,
        }
    }
}

/// Allow-list of image extensions accepted for OCR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportedFormats {
    extensions: Vec<String>,
}

impl SupportedFormats {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|e| e.into().to_lowercase())
                .collect(),
        }
    }

    /// Case-insensitive membership test.
    pub fn contains(&self, extension: &str) -> bool {
        let extension = extension.to_lowercase();
        self.extensions.iter().any(|e| *e == extension)
    }
}

impl Default for SupportedFormats {
    fn default() -> Self {
        Self::new(["jpg", "jpeg", "png", "bmp", "gif", "webp", "tiff"])
    }
}

/// Which bytes an OCR attempt was made on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OcrAttempt {
    Preprocessed,
    Original,
}

impl fmt::Display for OcrAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OcrAttempt::Preprocessed => f.write_str("preprocessed"),
            OcrAttempt::Original => f.write_str("original"),
        }
    }
}

/// Non-fatal issues raised while preparing an image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ExtractionWarning {
    PreprocessingFailed { reason: String },
}

/// What a single OCR call produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OcrOutcome {
    Text(String),
    /// The service answered without usable text.
    NoText,
    /// Network, HTTP status, timeout or response-body failure.
    Failed { reason: String },
}

/// External OCR abstraction (allows mocking for tests).
///
/// Implementations reject extensions outside their allow-list with
/// `UnsupportedFormat` before any I/O. Service-level failures are never
/// errors: they come back as `OcrOutcome::Failed` for the caller to report.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(
        &self,
        base64_payload: &str,
        extension: &str,
    ) -> Result<OcrOutcome, ExtractionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_from_field_name_is_exact() {
        assert_eq!(Slot::from_field_name("morning"), Some(Slot::Morning));
        assert_eq!(Slot::from_field_name("night"), Some(Slot::Night));
        assert_eq!(Slot::from_field_name("Morning"), None);
        assert_eq!(Slot::from_field_name("evening"), None);
    }

    #[test]
    fn raw_image_extension_is_lowercased_suffix() {
        let image = RawImage::new("Scan.Final.JPG", vec![1u8, 2, 3]);
        assert_eq!(image.extension(), "jpg");
        assert_eq!(image.file_name(), "Scan.Final.JPG");
    }

    #[test]
    fn raw_image_without_dot_uses_whole_name() {
        let image = RawImage::new("prescription", vec![0u8]);
        assert_eq!(image.extension(), "prescription");
        assert!(!SupportedFormats::default().contains(image.extension()));
    }

    #[test]
    fn supported_formats_case_insensitive() {
        let formats = SupportedFormats::default();
        assert!(formats.contains("PNG"));
        assert!(formats.contains("tiff"));
        assert!(!formats.contains("tif"));
        assert!(!formats.contains("exe"));
        for ext in ["jpg", "jpeg", "bmp", "gif", "webp"] {
            assert!(formats.contains(ext), "{ext} should be supported");
        }
    }

    #[test]
    fn slot_uploads_first_image_wins() {
        let mut uploads = SlotUploads::new();
        assert!(uploads.is_empty());
        assert!(uploads.insert(Slot::Night, RawImage::new("a.png", vec![1u8])));
        assert!(!uploads.insert(Slot::Night, RawImage::new("b.png", vec![2u8])));
        assert_eq!(uploads.get(Slot::Night).unwrap().file_name(), "a.png");
        assert_eq!(uploads.len(), 1);
        assert!(uploads.get(Slot::Morning).is_none());
    }

    #[test]
    fn slot_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Slot::Afternoon).unwrap(), "\"afternoon\"");
    }
}
