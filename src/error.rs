//! Errors that abort an extraction request.
//!
//! Everything else (empty model output, malformed payloads, failed writes)
//! degrades to fewer artifacts and is reported in the outcome instead.

use thiserror::Error;

use crate::model::ModelError;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// The request is unusable; raised before any model call
    #[error("Validation error: {0}")]
    Validation(String),

    /// The model service could not be reached or refused the call
    #[error("Model invocation failed: {0}")]
    ModelInvocation(#[source] ModelError),
}

impl PipelineError {
    pub fn validation(message: impl Into<String>) -> Self {
        PipelineError::Validation(message.into())
    }
}
