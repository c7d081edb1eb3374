use ph_utils::FileIOError;

use reqwest::StatusCode;
use thiserror::Error;

/// Why a source document couldn't be downloaded.
///
/// All of these are expected for a single item and never abort a batch.
#[derive(Error, Debug)]
pub enum FetchError {
	#[error("document host answered with status {0}")]
	Status(StatusCode),
	#[error("unexpected content type: <expected='{expected}', received='{}'>", .received.as_deref().unwrap_or("none"))]
	ContentType {
		expected: String,
		received: Option<String>,
	},
	#[error("document is larger than the {limit} bytes limit")]
	TooLarge { limit: u64 },
	#[error("transport error: {0}")]
	Transport(#[from] reqwest::Error),
}

#[derive(Error, Debug)]
pub enum RenderError {
	#[error("failed to render document: {0}")]
	Render(#[from] ph_images::Error),
	#[error("renderer panicked: {0}")]
	Panicked(String),
	#[error("render worker failed: {0}")]
	Join(#[from] tokio::task::JoinError),
}

#[derive(Error, Debug)]
pub enum StoreError {
	/// The backend couldn't answer, distinct from a thumbnail not being there
	#[error("cache backend unavailable: {0}")]
	BackendUnavailable(String),
	#[error(transparent)]
	FileIO(#[from] FileIOError),
	#[error("identifier can't be used as a storage key: <identifier='{0}'>")]
	InvalidIdentifier(String),
	#[error("failed to generate locator: {0}")]
	Locator(String),
}

/// Batch level failures, per item failures live in
/// [`ThumbnailOutcome`](super::ThumbnailOutcome) instead.
#[derive(Error, Debug)]
pub enum ThumbnailerError {
	#[error("thumbnail batch was canceled")]
	Canceled,
}
