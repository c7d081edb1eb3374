/// Width in pixels thumbnails are rendered at unless configured otherwise.
pub const DEFAULT_WIDTH: u32 = 600;

/// Encoding quality used unless configured otherwise, between 1 and 100.
///
/// Only lossy formats take it into account.
pub const DEFAULT_QUALITY: u8 = 50;

/// Upper bound for the configured width, a single first page rendered wider than
/// this is never a thumbnail.
pub const MAXIMUM_WIDTH: u32 = 4096;

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Every PDF starts with this marker, within the first KiB according to most readers.
pub(crate) const PDF_MAGIC: &[u8] = b"%PDF-";
pub(crate) const PDF_MAGIC_WINDOW: usize = 1024;
