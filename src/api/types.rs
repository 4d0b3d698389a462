//! Shared types for the HTTP API layer.

use std::sync::Arc;

use serde::Serialize;

use crate::pipeline::processor::PrescriptionPipeline;

// ═══════════════════════════════════════════════════════════
// API context
// ═══════════════════════════════════════════════════════════

/// Shared context for all API routes.
#[derive(Clone)]
pub struct ApiContext {
    pub pipeline: Arc<PrescriptionPipeline>,
    /// Per-file upload bound in bytes.
    pub max_upload_bytes: usize,
}

impl ApiContext {
    pub fn new(pipeline: Arc<PrescriptionPipeline>, max_upload_bytes: usize) -> Self {
        Self {
            pipeline,
            max_upload_bytes,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Response envelope
// ═══════════════════════════════════════════════════════════

/// `{success: true, data: ...}` wrapper for successful responses.
#[derive(Debug, Serialize)]
pub struct SuccessBody<T> {
    pub success: bool,
    pub data: T,
}

impl<T> SuccessBody<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}
