use crate::{consts::MAXIMUM_WIDTH, Error, Result, ThumbnailFormat};

use std::ops::Deref;

use image::{
	codecs::{jpeg::JpegEncoder, png::PngEncoder},
	imageops, DynamicImage, GenericImageView,
};

/// Resizes `img` to `width` keeping its aspect ratio.
///
/// Images already at the requested width are returned untouched.
#[must_use]
pub fn scale_to_width(img: DynamicImage, width: u32) -> DynamicImage {
	let (w, h) = img.dimensions();
	if w == width || w == 0 {
		return img;
	}

	let height = scaled_height(w, h, width);

	DynamicImage::ImageRgba8(imageops::resize(
		&img,
		width,
		height,
		imageops::FilterType::Triangle,
	))
}

#[allow(
	clippy::cast_possible_truncation,
	clippy::cast_sign_loss,
	clippy::as_conversions
)]
fn scaled_height(w: u32, h: u32, width: u32) -> u32 {
	let height = (f64::from(h) * f64::from(width) / f64::from(w)).round();
	// Clamped below by 1 so extreme aspect ratios still produce an image
	(height as u32).max(1)
}

/// Encodes `img` in `format`.
///
/// `quality` is between 1 and 100 and ignored for lossless formats.
pub fn encode_image(img: &DynamicImage, format: ThumbnailFormat, quality: u8) -> Result<Vec<u8>> {
	if !(1..=100).contains(&quality) {
		return Err(Error::InvalidOptions("quality must be between 1 and 100"));
	}

	if img.width() > MAXIMUM_WIDTH {
		return Err(Error::InvalidOptions("image is wider than the maximum width"));
	}

	let mut buf = Vec::new();

	match format {
		ThumbnailFormat::Jpeg => {
			// JPEG has no alpha channel
			let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
			rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality))?;
		}
		ThumbnailFormat::Png => {
			img.write_with_encoder(PngEncoder::new(&mut buf))?;
		}
		ThumbnailFormat::Webp => {
			let rgba = DynamicImage::ImageRgba8(img.to_rgba8());
			let encoder = webp::Encoder::from_image(&rgba)
				.map_err(|reason| Error::WebPEncoding(reason.to_string()))?;

			// `WebPMemory` is !Send, so we copy it out right away
			buf = encoder.encode(f32::from(quality)).deref().to_owned();
		}
	}

	Ok(buf)
}
