//! Thumbnailer configuration management

use ph_utils::FileIOError;

use thiserror::Error;

mod thumbnailer;

pub use thumbnailer::{
	EndpointRewrite, StoreConfig, ThumbnailerConfig, DEFAULT_BUCKET, DEFAULT_MAX_CONCURRENT,
	DEFAULT_PRESIGNED_URL_EXPIRY_SECS, DEFAULT_THUMBNAILS_DIRECTORY,
};

/// Prefix of every environment variable recognized as a config override
pub const ENV_PREFIX: &str = "PH_THUMBNAIL__";

#[derive(Error, Debug)]
pub enum ConfigError {
	#[error(transparent)]
	FileIO(#[from] FileIOError),
	#[error("failed to (de)serialize config: {0}")]
	Json(#[from] serde_json::Error),
	#[error("invalid configuration: {0}")]
	Invalid(String),
	#[error("invalid value for environment variable <var='{var}'>: {reason}")]
	Env { var: String, reason: String },
	#[error("the '{0}' store backend was not compiled in, enable the matching feature")]
	BackendNotCompiled(&'static str),
	#[error("thumbnails directory is not usable: {0}")]
	StoreDirectory(FileIOError),
	#[error("failed to build http client: {0}")]
	HttpClient(#[from] reqwest::Error),
	#[error("invalid render settings: {0}")]
	Render(#[from] ph_images::Error),
}
