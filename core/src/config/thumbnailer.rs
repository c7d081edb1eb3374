//! Thumbnail pipeline configuration

use super::{ConfigError, ENV_PREFIX};

use ph_images::{RenderOptions, ThumbnailFormat, DEFAULT_QUALITY, DEFAULT_WIDTH, PDF_CONTENT_TYPE};
use ph_utils::FileIOError;

use std::{
	collections::HashMap,
	env,
	ffi::OsString,
	fs, io,
	path::{Path, PathBuf},
	time::Duration,
};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const DEFAULT_MAX_CONCURRENT: usize = 10;
pub const DEFAULT_PRESIGNED_URL_EXPIRY_SECS: u64 = 3600;
pub const DEFAULT_THUMBNAILS_DIRECTORY: &str = "thumbnails";
pub const DEFAULT_BUCKET: &str = "thumbnails";

/// Everything the thumbnail pipeline needs to be built
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThumbnailerConfig {
	/// Target width in pixels
	pub width: u32,

	/// Output raster format
	pub format: ThumbnailFormat,

	/// Encoding quality, 1 to 100
	pub quality: u8,

	/// Maximum number of requests in flight at once for a single batch
	pub max_concurrent: usize,

	/// MIME type source documents must be served with
	pub expected_content_type: String,

	/// Ceiling for a whole document download, unbounded when unset
	pub fetch_timeout_secs: Option<u64>,

	/// Ceiling for a document size, unbounded when unset
	pub max_document_bytes: Option<u64>,

	/// Where rendered thumbnails live
	pub store: StoreConfig,

	/// Rewrite applied to every generated locator
	pub locator_rewrite: Option<EndpointRewrite>,

	/// Default logging directive, `RUST_LOG` takes precedence
	pub log_level: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StoreConfig {
	Local {
		directory: PathBuf,
		/// Base URL the directory is served under, locators are file paths without it
		#[serde(default)]
		public_base_url: Option<String>,
	},
	S3 {
		bucket: String,
		/// Custom endpoint, for S3 compatible services
		#[serde(default)]
		endpoint_url: Option<String>,
		#[serde(default)]
		region: Option<String>,
		#[serde(default = "default_presigned_url_expiry_secs")]
		presigned_url_expiry_secs: u64,
		#[serde(default)]
		force_path_style: bool,
	},
}

const fn default_presigned_url_expiry_secs() -> u64 {
	DEFAULT_PRESIGNED_URL_EXPIRY_SECS
}

impl Default for StoreConfig {
	fn default() -> Self {
		Self::Local {
			directory: PathBuf::from(DEFAULT_THUMBNAILS_DIRECTORY),
			public_base_url: None,
		}
	}
}

/// Replaces the `from` prefix of a locator with `to`.
///
/// Used when the backend hands out references to an internal endpoint that callers
/// outside of that network can't reach.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointRewrite {
	pub from: String,
	pub to: String,
}

impl Default for ThumbnailerConfig {
	fn default() -> Self {
		Self {
			width: DEFAULT_WIDTH,
			format: ThumbnailFormat::default(),
			quality: DEFAULT_QUALITY,
			max_concurrent: DEFAULT_MAX_CONCURRENT,
			expected_content_type: PDF_CONTENT_TYPE.to_string(),
			fetch_timeout_secs: None,
			max_document_bytes: None,
			store: StoreConfig::default(),
			locator_rewrite: None,
			log_level: "info".to_string(),
		}
	}
}

impl ThumbnailerConfig {
	/// Load configuration from a JSON file, writing the defaults there if it doesn't exist
	pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();

		match fs::read_to_string(path) {
			Ok(json) => {
				info!(path = %path.display(), "Loading thumbnailer config");
				let config: Self = serde_json::from_str(&json)?;
				config.validate()?;
				Ok(config)
			}
			Err(e) if e.kind() == io::ErrorKind::NotFound => {
				warn!(path = %path.display(), "No config found, creating default");
				let config = Self::default();
				config.save(path)?;
				Ok(config)
			}
			Err(e) => Err(FileIOError::from((path, e, "reading config")).into()),
		}
	}

	/// Save configuration to disk
	pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
		let path = path.as_ref();

		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent)
				.map_err(|e| FileIOError::from((parent, e, "creating config directory")))?;
		}

		let json = serde_json::to_string_pretty(self)?;
		fs::write(path, json).map_err(|e| FileIOError::from((path, e, "writing config")))?;
		info!(path = %path.display(), "Saved thumbnailer config");
		Ok(())
	}

	/// Apply `PH_THUMBNAIL__*` overrides from the process environment
	pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
		self.with_overrides(prefixed_vars(env::vars_os())?)
	}

	/// Apply overrides given as `(variable, value)` pairs.
	///
	/// Recognized variables, without the prefix: `WIDTH`, `QUALITY`, `FORMAT`,
	/// `MAX_CONCURRENT`, `LOCAL_FOLDER`, `S3__BUCKET`, `S3__ENDPOINT_URL` and
	/// `S3__DEV_ENDPOINT`. Anything else carrying the prefix is ignored with a warning.
	pub fn with_overrides(
		mut self,
		vars: impl IntoIterator<Item = (String, String)>,
	) -> Result<Self, ConfigError> {
		let mut overrides = vars
			.into_iter()
			.filter_map(|(key, value)| {
				key.strip_prefix(ENV_PREFIX)
					.map(|name| (name.to_ascii_uppercase(), value))
			})
			.collect::<HashMap<_, _>>();

		if let Some(value) = overrides.remove("WIDTH") {
			self.width = parse_var("WIDTH", &value)?;
		}

		if let Some(value) = overrides.remove("QUALITY") {
			self.quality = parse_var("QUALITY", &value)?;
		}

		if let Some(value) = overrides.remove("FORMAT") {
			self.format = parse_var("FORMAT", &value)?;
		}

		if let Some(value) = overrides.remove("MAX_CONCURRENT") {
			self.max_concurrent = parse_var("MAX_CONCURRENT", &value)?;
		}

		if let Some(value) = overrides.remove("LOCAL_FOLDER") {
			let public_base_url = match &self.store {
				StoreConfig::Local {
					public_base_url, ..
				} => public_base_url.clone(),
				StoreConfig::S3 { .. } => None,
			};

			self.store = StoreConfig::Local {
				directory: PathBuf::from(value),
				public_base_url,
			};
		}

		if let Some(value) = overrides.remove("S3__BUCKET") {
			match &mut self.store {
				StoreConfig::S3 { bucket, .. } => *bucket = value,
				StoreConfig::Local { .. } => {
					self.store = StoreConfig::S3 {
						bucket: value,
						endpoint_url: None,
						region: None,
						presigned_url_expiry_secs: DEFAULT_PRESIGNED_URL_EXPIRY_SECS,
						force_path_style: false,
					};
				}
			}
		}

		// Must come before the dev endpoint, which rewrites this one
		if let Some(value) = overrides.remove("S3__ENDPOINT_URL") {
			let StoreConfig::S3 { endpoint_url, .. } = &mut self.store else {
				return Err(env_error("S3__ENDPOINT_URL", "store backend is not s3"));
			};
			*endpoint_url = Some(value);
		}

		if let Some(value) = overrides.remove("S3__DEV_ENDPOINT") {
			let StoreConfig::S3 {
				endpoint_url: Some(endpoint_url),
				..
			} = &self.store
			else {
				return Err(env_error(
					"S3__DEV_ENDPOINT",
					"requires an s3 store with an endpoint url",
				));
			};

			self.locator_rewrite = Some(EndpointRewrite {
				from: endpoint_url.clone(),
				to: value,
			});
		}

		for name in overrides.keys() {
			warn!(var = %format!("{ENV_PREFIX}{name}"), "Ignoring unknown config override");
		}

		self.validate()?;
		Ok(self)
	}

	pub fn validate(&self) -> Result<(), ConfigError> {
		self.render_options().validate()?;

		if self.max_concurrent == 0 {
			return Err(ConfigError::Invalid(
				"max_concurrent must be at least 1".to_string(),
			));
		}

		if self.expected_content_type.trim().is_empty() {
			return Err(ConfigError::Invalid(
				"expected_content_type can't be empty".to_string(),
			));
		}

		if self.fetch_timeout_secs == Some(0) {
			return Err(ConfigError::Invalid(
				"fetch_timeout_secs must be positive when set".to_string(),
			));
		}

		match &self.store {
			StoreConfig::Local { directory, .. } if directory.as_os_str().is_empty() => {
				return Err(ConfigError::Invalid(
					"local store directory can't be empty".to_string(),
				));
			}
			StoreConfig::S3 { bucket, .. } if bucket.trim().is_empty() => {
				return Err(ConfigError::Invalid("s3 bucket can't be empty".to_string()));
			}
			StoreConfig::S3 {
				presigned_url_expiry_secs: 0,
				..
			} => {
				return Err(ConfigError::Invalid(
					"presigned_url_expiry_secs must be positive".to_string(),
				));
			}
			_ => {}
		}

		if let Some(rewrite) = &self.locator_rewrite {
			if rewrite.from.is_empty() {
				return Err(ConfigError::Invalid(
					"locator_rewrite.from can't be empty".to_string(),
				));
			}
		}

		Ok(())
	}

	#[must_use]
	pub const fn render_options(&self) -> RenderOptions {
		RenderOptions {
			width: self.width,
			format: self.format,
			quality: self.quality,
		}
	}

	#[must_use]
	pub fn fetch_timeout(&self) -> Option<Duration> {
		self.fetch_timeout_secs.map(Duration::from_secs)
	}
}

/// Keeps variables carrying our prefix, others may hold anything and are never decoded
fn prefixed_vars(
	vars: impl IntoIterator<Item = (OsString, OsString)>,
) -> Result<Vec<(String, String)>, ConfigError> {
	vars.into_iter()
		.filter_map(|(key, value)| {
			let key = key.into_string().ok()?;
			key.starts_with(ENV_PREFIX).then_some((key, value))
		})
		.map(|(key, value)| match value.into_string() {
			Ok(value) => Ok((key, value)),
			Err(_) => Err(ConfigError::Env {
				var: key,
				reason: "value is not valid UTF-8".to_string(),
			}),
		})
		.collect()
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError>
where
	T::Err: std::fmt::Display,
{
	value
		.trim()
		.parse()
		.map_err(|e: T::Err| env_error(name, e.to_string()))
}

fn env_error(name: &str, reason: impl Into<String>) -> ConfigError {
	ConfigError::Env {
		var: format!("{ENV_PREFIX}{name}"),
		reason: reason.into(),
	}
}
