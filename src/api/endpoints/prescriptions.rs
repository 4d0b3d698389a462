//! Prescription upload endpoint.
//!
//! `POST /api/prescription/parse` receives up to three photos in multipart
//! fields named `morning`, `afternoon`, `night`, runs the pipeline and
//! returns per-slot text, parsed entities and the combined summary.

use axum::extract::multipart::{Multipart, MultipartRejection};
use axum::extract::State;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, SuccessBody};
use crate::pipeline::extraction::{RawImage, Slot, SlotUploads};
use crate::pipeline::processor::PipelineResult;

/// `POST /api/prescription/parse`
pub async fn parse(
    State(ctx): State<ApiContext>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<SuccessBody<PipelineResult>>, ApiError> {
    let mut multipart = multipart?;
    let uploads = read_slot_uploads(&mut multipart, ctx.max_upload_bytes).await?;
    let result = ctx.pipeline.process(uploads).await?;
    Ok(Json(SuccessBody::new(result)))
}

/// Collect the first non-empty file for each slot field.
///
/// Unknown fields, parts without a file name and empty parts are skipped.
/// Any single file above `max_file_bytes` rejects the whole request.
async fn read_slot_uploads(
    multipart: &mut Multipart,
    max_file_bytes: usize,
) -> Result<SlotUploads, ApiError> {
    let mut uploads = SlotUploads::new();

    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().unwrap_or_default().to_string();
        let Some(slot) = Slot::from_field_name(&field_name) else {
            tracing::debug!(field = %field_name, "Ignoring unknown multipart field");
            continue;
        };

        if uploads.get(slot).is_some() {
            tracing::debug!(%slot, "Ignoring additional file for slot");
            continue;
        }

        let file_name = match field.file_name() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => {
                tracing::debug!(%slot, "Multipart field carries no file, skipping");
                continue;
            }
        };

        let bytes = field.bytes().await?;
        if bytes.is_empty() {
            tracing::debug!(%slot, file_name = %file_name, "Empty upload, treating slot as absent");
            continue;
        }
        if bytes.len() > max_file_bytes {
            return Err(ApiError::PayloadTooLarge(format!(
                "File {file_name} exceeds the maximum upload size of {max_file_bytes} bytes"
            )));
        }

        tracing::debug!(%slot, file_name = %file_name, size = bytes.len(), "Received prescription image");
        uploads.insert(slot, RawImage::new(file_name, bytes.to_vec()));
    }

    Ok(uploads)
}
