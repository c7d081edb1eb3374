#![warn(
	clippy::all,
	clippy::pedantic,
	clippy::correctness,
	clippy::perf,
	clippy::style,
	clippy::suspicious,
	clippy::complexity,
	clippy::nursery,
	clippy::unwrap_used,
	unused_qualifications,
	rust_2018_idioms,
	clippy::expect_used,
	trivial_casts,
	trivial_numeric_casts,
	unused_allocation,
	clippy::as_conversions,
	clippy::dbg_macro
)]
#![forbid(unsafe_code)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

mod consts;
mod encoder;
mod error;
mod format;
mod pdf;

pub use consts::{DEFAULT_QUALITY, DEFAULT_WIDTH, MAXIMUM_WIDTH, PDF_CONTENT_TYPE};
pub use encoder::{encode_image, scale_to_width};
pub use error::{Error, Result};
pub use format::ThumbnailFormat;
pub use image::DynamicImage;
pub use pdf::{pdfium_available, PdfRenderer};

/// Turns raw document bytes into an encoded single page thumbnail.
///
/// Implementations are CPU bound and must not touch the filesystem or the network,
/// so callers on an async runtime should run them on a blocking thread.
pub trait DocumentRenderer: Send + Sync {
	fn render(&self, data: &[u8]) -> Result<RenderedImage>;
}

/// How thumbnails are rasterized and encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
	/// Target width in pixels, the height follows the page aspect ratio
	pub width: u32,
	pub format: ThumbnailFormat,
	pub quality: u8,
}

impl RenderOptions {
	pub fn validate(&self) -> Result<()> {
		if self.width == 0 || self.width > MAXIMUM_WIDTH {
			return Err(Error::InvalidOptions("width must be between 1 and 4096"));
		}

		if !(1..=100).contains(&self.quality) {
			return Err(Error::InvalidOptions("quality must be between 1 and 100"));
		}

		Ok(())
	}
}

impl Default for RenderOptions {
	fn default() -> Self {
		Self {
			width: DEFAULT_WIDTH,
			format: ThumbnailFormat::default(),
			quality: DEFAULT_QUALITY,
		}
	}
}

/// An encoded thumbnail, owned by whoever rendered it until it's stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedImage {
	pub data: Vec<u8>,
	pub width: u32,
	pub height: u32,
	pub format: ThumbnailFormat,
}

impl RenderedImage {
	#[must_use]
	pub const fn content_type(&self) -> &'static str {
		self.format.content_type()
	}
}
