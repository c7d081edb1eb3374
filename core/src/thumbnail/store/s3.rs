use super::{validate_identifier, CacheStore};
use crate::thumbnail::{Locator, StoreError};

use ph_images::RenderedImage;

use std::{fmt, time::Duration};

use async_trait::async_trait;
use aws_sdk_s3::{
	error::{DisplayErrorContext, SdkError},
	presigning::PresigningConfig,
	primitives::ByteStream,
	Client,
};
use tracing::{instrument, trace};

/// Keeps thumbnails in an S3 bucket, keyed by identifier.
///
/// Locators are presigned `GetObject` URLs, valid for the configured expiry only.
#[derive(Debug, Clone)]
pub struct S3Store {
	client: Client,
	bucket: String,
	presigned_url_expiry: Duration,
}

impl S3Store {
	#[must_use]
	pub fn new(client: Client, bucket: impl Into<String>, presigned_url_expiry: Duration) -> Self {
		Self {
			client,
			bucket: bucket.into(),
			presigned_url_expiry,
		}
	}

	/// Builds a client from the ambient AWS configuration (env, profile, instance metadata)
	pub async fn from_env(
		bucket: impl Into<String>,
		endpoint_url: Option<&str>,
		region: Option<String>,
		force_path_style: bool,
		presigned_url_expiry: Duration,
	) -> Self {
		let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());

		if let Some(endpoint_url) = endpoint_url {
			loader = loader.endpoint_url(endpoint_url);
		}

		if let Some(region) = region {
			loader = loader.region(aws_config::Region::new(region));
		}

		let sdk_config = loader.load().await;
		let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
			.force_path_style(force_path_style)
			.build();

		Self::new(Client::from_conf(s3_config), bucket, presigned_url_expiry)
	}
}

fn unavailable<E, R>(err: SdkError<E, R>) -> StoreError
where
	E: std::error::Error + 'static,
	R: fmt::Debug,
{
	StoreError::BackendUnavailable(DisplayErrorContext(err).to_string())
}

#[async_trait]
impl CacheStore for S3Store {
	async fn exists(&self, identifier: &str) -> Result<bool, StoreError> {
		validate_identifier(identifier)?;

		match self
			.client
			.head_object()
			.bucket(&self.bucket)
			.key(identifier)
			.send()
			.await
		{
			Ok(_) => Ok(true),
			Err(e) if e.as_service_error().is_some_and(|e| e.is_not_found()) => Ok(false),
			Err(e) => Err(unavailable(e)),
		}
	}

	#[instrument(skip(self, image), fields(bucket = %self.bucket, bytes = image.data.len()), err)]
	async fn store(&self, identifier: &str, image: &RenderedImage) -> Result<(), StoreError> {
		validate_identifier(identifier)?;

		self.client
			.put_object()
			.bucket(&self.bucket)
			.key(identifier)
			.content_type(image.content_type())
			.body(ByteStream::from(image.data.clone()))
			.send()
			.await
			.map_err(unavailable)?;

		trace!("Uploaded thumbnail");
		Ok(())
	}

	async fn locator(&self, identifier: &str) -> Result<Locator, StoreError> {
		validate_identifier(identifier)?;

		let presigning = PresigningConfig::expires_in(self.presigned_url_expiry)
			.map_err(|e| StoreError::Locator(e.to_string()))?;

		let request = self
			.client
			.get_object()
			.bucket(&self.bucket)
			.key(identifier)
			.presigned(presigning)
			.await
			.map_err(|e| StoreError::Locator(DisplayErrorContext(e).to_string()))?;

		Ok(Locator::new(request.uri()))
	}
}
