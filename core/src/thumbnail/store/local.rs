use super::{validate_identifier, CacheStore};
use crate::thumbnail::{Locator, StoreError};

use ph_images::{RenderedImage, ThumbnailFormat};
use ph_utils::{report_error, FileIOError};

use std::{
	io,
	path::{Path, PathBuf},
};

use async_trait::async_trait;
use tokio::fs;
use tracing::{instrument, trace, warn};
use uuid::Uuid;

/// Keeps thumbnails on the local filesystem.
///
/// Files are laid out as `<root>/<shard>/<identifier>.<ext>`, see [`get_shard_hex`].
#[derive(Debug, Clone)]
pub struct LocalStore {
	root: PathBuf,
	format: ThumbnailFormat,
	public_base_url: Option<String>,
}

/// The practice of dividing files into hex coded folders, often called "sharding,"
/// is mainly used to optimize file system performance. File systems can start to slow down
/// as the number of files in a directory increases.
///
/// Identifiers aren't hashes themselves, so we hash them and take the first three hex
/// characters, giving us 4096 (16^3) possible directories, named 000 to fff.
#[must_use]
pub fn get_shard_hex(identifier: &str) -> String {
	let hash = blake3::hash(identifier.as_bytes());
	hash.to_hex()[..3].to_string()
}

impl LocalStore {
	/// Creates the root directory if needed and makes sure we can write to it.
	///
	/// Failing here is a configuration problem, so it should stop the process from starting.
	pub async fn new(
		root: impl AsRef<Path>,
		format: ThumbnailFormat,
		public_base_url: Option<String>,
	) -> Result<Self, FileIOError> {
		let root = root.as_ref();

		fs::create_dir_all(root)
			.await
			.map_err(|e| FileIOError::from((root, e, "creating thumbnails directory")))?;

		let root = fs::canonicalize(root)
			.await
			.map_err(|e| FileIOError::from((root, e, "resolving thumbnails directory")))?;

		let probe = root.join(format!(".probe-{}", Uuid::new_v4()));
		fs::write(&probe, b"")
			.await
			.map_err(|e| FileIOError::from((&probe, e, "thumbnails directory isn't writable")))?;
		if let Err(e) = fs::remove_file(&probe).await {
			warn!(?e, probe = %probe.display(), "Failed to remove write probe;");
		}

		Ok(Self {
			root,
			format,
			public_base_url: public_base_url.map(|url| url.trim_end_matches('/').to_string()),
		})
	}

	#[must_use]
	pub fn root(&self) -> &Path {
		&self.root
	}

	fn file_name(&self, identifier: &str) -> String {
		format!("{identifier}.{}", self.format.extension())
	}

	/// This does not check if a thumbnail exists, it just returns the path that it would exist at
	pub fn thumbnail_path(&self, identifier: &str) -> Result<PathBuf, StoreError> {
		validate_identifier(identifier)?;

		let mut path = self.root.join(get_shard_hex(identifier));
		path.push(self.file_name(identifier));
		Ok(path)
	}
}

#[async_trait]
impl CacheStore for LocalStore {
	async fn exists(&self, identifier: &str) -> Result<bool, StoreError> {
		let path = self.thumbnail_path(identifier)?;

		match fs::metadata(&path).await {
			Ok(metadata) => Ok(metadata.is_file()),
			Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
			Err(e) => Err(StoreError::BackendUnavailable(
				FileIOError::from((&path, e, "checking thumbnail")).to_string(),
			)),
		}
	}

	#[instrument(skip(self, image), fields(bytes = image.data.len()), err)]
	async fn store(&self, identifier: &str, image: &RenderedImage) -> Result<(), StoreError> {
		let path = self.thumbnail_path(identifier)?;

		let Some(shard_dir) = path.parent() else {
			return Err(StoreError::InvalidIdentifier(identifier.to_string()));
		};

		fs::create_dir_all(shard_dir)
			.await
			.map_err(|e| FileIOError::from((shard_dir, e, "creating shard directory")))?;

		// Concurrent writers each get their own temp file, the rename is atomic so
		// the last one wins and nobody reads a half written thumbnail
		let tmp_path = shard_dir.join(format!(".{}.{}.tmp", self.file_name(identifier), Uuid::new_v4()));

		if let Err(e) = fs::write(&tmp_path, &image.data).await {
			remove_tmp(&tmp_path).await;
			return Err(FileIOError::from((&tmp_path, e, "writing thumbnail")).into());
		}

		if let Err(e) = fs::rename(&tmp_path, &path).await {
			remove_tmp(&tmp_path).await;
			return Err(FileIOError::from((&path, e, "moving thumbnail into place")).into());
		}

		trace!(path = %path.display(), "Wrote thumbnail to disk");
		Ok(())
	}

	async fn locator(&self, identifier: &str) -> Result<Locator, StoreError> {
		let path = self.thumbnail_path(identifier)?;

		match &self.public_base_url {
			Some(base_url) => Ok(Locator::new(format!(
				"{base_url}/{}/{}",
				get_shard_hex(identifier),
				self.file_name(identifier)
			))),
			None => path
				.to_str()
				.map(Locator::new)
				.ok_or_else(|| StoreError::Locator(format!("non UTF-8 path: {}", path.display()))),
		}
	}
}

async fn remove_tmp(tmp_path: &Path) {
	report_error(
		&fs::remove_file(tmp_path)
			.await
			.map_err(|e| FileIOError::from((tmp_path, e, "removing temporary thumbnail"))),
	);
}

#[cfg(test)]
mod tests {
	use super::*;

	use std::sync::Arc;

	fn image(data: &[u8]) -> RenderedImage {
		RenderedImage {
			data: data.to_vec(),
			width: 600,
			height: 800,
			format: ThumbnailFormat::Jpeg,
		}
	}

	#[test]
	fn shards_are_stable_and_short() {
		let shard = get_shard_hex("2101.00001");
		assert_eq!(shard.len(), 3);
		assert_eq!(shard, get_shard_hex("2101.00001"));
		assert!(shard.chars().all(|c| c.is_ascii_hexdigit()));
	}

	#[tokio::test]
	async fn store_then_exists() {
		let dir = tempfile::tempdir().unwrap();
		let store = LocalStore::new(dir.path(), ThumbnailFormat::Jpeg, None)
			.await
			.unwrap();

		assert!(!store.exists("id1").await.unwrap());

		store.store("id1", &image(b"jpeg bytes")).await.unwrap();

		assert!(store.exists("id1").await.unwrap());
		let path = store.thumbnail_path("id1").unwrap();
		assert_eq!(fs::read(&path).await.unwrap(), b"jpeg bytes");
		assert!(path.to_string_lossy().ends_with("id1.jpg"));
	}

	#[tokio::test]
	async fn locator_is_the_absolute_path_without_base_url() {
		let dir = tempfile::tempdir().unwrap();
		let store = LocalStore::new(dir.path(), ThumbnailFormat::Png, None)
			.await
			.unwrap();

		let locator = store.locator("id1").await.unwrap();
		let path = Path::new(locator.as_str());
		assert!(path.is_absolute());
		assert!(path.starts_with(store.root()));
		assert_eq!(path.extension().unwrap(), "png");
	}

	#[tokio::test]
	async fn locator_uses_public_base_url() {
		let dir = tempfile::tempdir().unwrap();
		let store = LocalStore::new(
			dir.path(),
			ThumbnailFormat::Jpeg,
			Some("https://cdn.example.com/thumbnails/".to_string()),
		)
		.await
		.unwrap();

		let locator = store.locator("id1").await.unwrap();
		assert_eq!(
			locator.as_str(),
			format!(
				"https://cdn.example.com/thumbnails/{}/id1.jpg",
				get_shard_hex("id1")
			)
		);
	}

	#[tokio::test]
	async fn concurrent_writes_leave_one_complete_file() {
		let dir = tempfile::tempdir().unwrap();
		let store = Arc::new(
			LocalStore::new(dir.path(), ThumbnailFormat::Jpeg, None)
				.await
				.unwrap(),
		);

		let payloads = (0..8u8).map(|i| vec![i; 64 * 1024]).collect::<Vec<_>>();

		let handles = payloads
			.iter()
			.cloned()
			.map(|payload| {
				let store = Arc::clone(&store);
				tokio::spawn(async move { store.store("shared", &image(&payload)).await })
			})
			.collect::<Vec<_>>();

		for handle in handles {
			handle.await.unwrap().unwrap();
		}

		let written = fs::read(store.thumbnail_path("shared").unwrap())
			.await
			.unwrap();
		assert!(payloads.contains(&written));

		let mut shard = fs::read_dir(store.thumbnail_path("shared").unwrap().parent().unwrap())
			.await
			.unwrap();
		let mut entries = 0;
		while shard.next_entry().await.unwrap().is_some() {
			entries += 1;
		}
		assert_eq!(entries, 1, "temp files must not be left behind");
	}

	#[tokio::test]
	async fn invalid_identifiers_never_touch_disk() {
		let dir = tempfile::tempdir().unwrap();
		let store = LocalStore::new(dir.path(), ThumbnailFormat::Jpeg, None)
			.await
			.unwrap();

		assert!(matches!(
			store.store("../escape", &image(b"x")).await,
			Err(StoreError::InvalidIdentifier(_))
		));
		assert!(matches!(
			store.exists("../escape").await,
			Err(StoreError::InvalidIdentifier(_))
		));
	}

	#[cfg(unix)]
	#[tokio::test]
	async fn unwritable_directory_fails_at_construction() {
		use std::os::unix::fs::PermissionsExt;

		let dir = tempfile::tempdir().unwrap();
		let locked = dir.path().join("locked");
		std::fs::create_dir(&locked).unwrap();
		std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o555)).unwrap();

		// Root ignores permission bits, nothing to assert there
		if std::fs::write(locked.join("canary"), b"").is_ok() {
			return;
		}

		assert!(LocalStore::new(&locked, ThumbnailFormat::Jpeg, None)
			.await
			.is_err());
	}
}
