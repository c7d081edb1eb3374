use std::num::TryFromIntError;

use pdfium_render::prelude::PdfiumError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
	#[error("failed to bind to the pdfium library")]
	PdfiumBinding,
	#[error("error with pdfium: {0}")]
	Pdfium(#[from] PdfiumError),
	#[error("the provided document is empty")]
	EmptyInput,
	#[error("the provided bytes are not a PDF document")]
	NotAPdf,
	#[error("error while encoding the image (via the `image` crate): {0}")]
	Image(#[from] image::ImageError),
	#[error("failed to encode webp: {0}")]
	WebPEncoding(String),
	#[error("there was an error while converting the rendered page to an `RgbaImage`")]
	RgbImageConversion,
	#[error("invalid render options: {0}")]
	InvalidOptions(&'static str),
	#[error("unknown thumbnail format: <format='{0}'>")]
	UnknownFormat(String),
	#[error("error while parsing integers")]
	TryFromInt(#[from] TryFromIntError),
}
