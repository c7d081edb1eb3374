//! Where rendered thumbnails are cached, keyed by identifier

use super::{Locator, StoreError};

use ph_images::RenderedImage;

use async_trait::async_trait;

mod local;
#[cfg(feature = "s3")]
mod s3;

pub use local::{get_shard_hex, LocalStore};
#[cfg(feature = "s3")]
pub use s3::S3Store;

/// Storage backend for rendered thumbnails.
///
/// Implementations must tolerate concurrent calls, including concurrent `store`s of
/// the same identifier, where the last writer wins and readers never see a partial image.
#[async_trait]
pub trait CacheStore: Send + Sync {
	/// Whether a thumbnail is stored for `identifier`.
	///
	/// A backend failure is an error, never a plain `false`.
	async fn exists(&self, identifier: &str) -> Result<bool, StoreError>;

	async fn store(&self, identifier: &str, image: &RenderedImage) -> Result<(), StoreError>;

	/// Reference to the stored thumbnail, as handed out by the backend.
	async fn locator(&self, identifier: &str) -> Result<Locator, StoreError>;
}

/// Identifiers become object keys and file names, so they can't escape their namespace
pub(super) fn validate_identifier(identifier: &str) -> Result<(), StoreError> {
	let is_invalid = identifier.is_empty()
		|| identifier == "."
		|| identifier == ".."
		|| identifier.contains(['/', '\\', '\0']);

	if is_invalid {
		Err(StoreError::InvalidIdentifier(identifier.to_string()))
	} else {
		Ok(())
	}
}
