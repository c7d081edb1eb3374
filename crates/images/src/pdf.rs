use crate::{
	consts::{PDF_MAGIC, PDF_MAGIC_WINDOW},
	encode_image, scale_to_width, DocumentRenderer, Error, RenderOptions, RenderedImage, Result,
};

use image::{DynamicImage, RgbaImage};
use once_cell::sync::Lazy;
use pdfium_render::prelude::{PdfRenderConfig, Pdfium};
use tracing::{error, trace};

// This path is relative to the running binary
#[cfg(windows)]
const BINDING_LOCATION: &str = "./";
#[cfg(unix)]
const BINDING_LOCATION: &str = if cfg!(target_os = "macos") {
	"../Frameworks/"
} else {
	"../lib/paperhub"
};

static PDFIUM: Lazy<Option<Pdfium>> = Lazy::new(|| {
	Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
		BINDING_LOCATION,
	))
	.or_else(|_| Pdfium::bind_to_system_library())
	.map(Pdfium::new)
	.map_err(|err| error!("{err:#?}"))
	.ok()
});

/// Whether a pdfium library could be bound in this process.
#[must_use]
pub fn pdfium_available() -> bool {
	PDFIUM.is_some()
}

/// Renders the first page of a PDF document into an encoded thumbnail.
#[derive(Debug, Clone)]
pub struct PdfRenderer {
	options: RenderOptions,
}

impl PdfRenderer {
	pub fn new(options: RenderOptions) -> Result<Self> {
		options.validate()?;
		Ok(Self { options })
	}

	#[must_use]
	pub const fn options(&self) -> &RenderOptions {
		&self.options
	}

	fn rasterize_first_page(&self, data: &[u8]) -> Result<DynamicImage> {
		let pdfium = PDFIUM.as_ref().ok_or(Error::PdfiumBinding)?;

		let render_config =
			PdfRenderConfig::new().set_target_width(i32::try_from(self.options.width)?);

		// Pdfium will only load the portions of the document it actually needs into memory.
		let document = pdfium.load_pdf_from_byte_slice(data, None)?;
		let page = document.pages().first()?;
		let bitmap = page.render_with_config(&render_config)?;

		let (width, height) = (
			u32::try_from(bitmap.width())?,
			u32::try_from(bitmap.height())?,
		);

		RgbaImage::from_raw(width, height, bitmap.as_rgba_bytes())
			.map_or_else(
				|| Err(Error::RgbImageConversion),
				|x| Ok(DynamicImage::ImageRgba8(x)),
			)
	}
}

impl DocumentRenderer for PdfRenderer {
	fn render(&self, data: &[u8]) -> Result<RenderedImage> {
		if data.is_empty() {
			return Err(Error::EmptyInput);
		}

		if !looks_like_pdf(data) {
			return Err(Error::NotAPdf);
		}

		let page = self.rasterize_first_page(data)?;
		trace!(width = page.width(), height = page.height(), "Rasterized first page");

		self.thumbnail_from_page(page)
	}
}

impl PdfRenderer {
	fn thumbnail_from_page(&self, page: DynamicImage) -> Result<RenderedImage> {
		// Pdfium may round the target width, the thumbnail width is a hard contract
		let page = scale_to_width(page, self.options.width);

		let encoded = encode_image(&page, self.options.format, self.options.quality)?;

		Ok(RenderedImage {
			data: encoded,
			width: page.width(),
			height: page.height(),
			format: self.options.format,
		})
	}
}

fn looks_like_pdf(data: &[u8]) -> bool {
	data[..data.len().min(PDF_MAGIC_WINDOW)]
		.windows(PDF_MAGIC.len())
		.any(|window| window == PDF_MAGIC)
}
