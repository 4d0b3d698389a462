pub mod types;
pub mod preprocess;
pub mod ocr;
pub mod orchestrator;

pub use types::*;
pub use preprocess::*;
pub use ocr::*;
pub use orchestrator::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    /// File extension is not on the allow-list. Fatal for the whole request.
    #[error("Unsupported format for file: {name}")]
    UnsupportedFormat { name: String },

    #[error("OCR service failure: {0}")]
    OcrService(String),

    #[error("OCR request timed out after {0}s")]
    Timeout(u64),

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("HTTP client setup failed: {0}")]
    ClientSetup(String),
}
