//! Error types for the synchronization core.

use thiserror::Error;

/// Errors that can occur while moving values across the context boundary.
#[derive(Debug, Error)]
pub enum SyncError {
	/// A wire payload was not valid JSON.
	#[error("malformed payload: {0}")]
	MalformedPayload(#[from] serde_json::Error),

	/// A plain JSON tree could not be rebuilt into its rich type.
	#[error("rehydration failed: {0}")]
	Rehydrate(String),
}

/// Result type for synchronization operations.
pub type Result<T> = std::result::Result<T, SyncError>;
