use crate::{Error, Result};

use std::{fmt, str::FromStr};

/// Raster format thumbnails are encoded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ThumbnailFormat {
	#[default]
	#[cfg_attr(feature = "serde", serde(alias = "jpg"))]
	Jpeg,
	Png,
	Webp,
}

impl ThumbnailFormat {
	#[must_use]
	pub const fn content_type(self) -> &'static str {
		match self {
			Self::Jpeg => "image/jpeg",
			Self::Png => "image/png",
			Self::Webp => "image/webp",
		}
	}

	#[must_use]
	pub const fn extension(self) -> &'static str {
		match self {
			Self::Jpeg => "jpg",
			Self::Png => "png",
			Self::Webp => "webp",
		}
	}

	/// PNG ignores the quality setting.
	#[must_use]
	pub const fn is_lossy(self) -> bool {
		!matches!(self, Self::Png)
	}
}

impl fmt::Display for ThumbnailFormat {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::Jpeg => "jpeg",
			Self::Png => "png",
			Self::Webp => "webp",
		})
	}
}

impl FromStr for ThumbnailFormat {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self> {
		match s.trim().to_ascii_lowercase().as_str() {
			"jpeg" | "jpg" => Ok(Self::Jpeg),
			"png" => Ok(Self::Png),
			"webp" => Ok(Self::Webp),
			_ => Err(Error::UnknownFormat(s.to_string())),
		}
	}
}
