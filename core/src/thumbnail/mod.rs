//! Thumbnail generation and caching pipeline
//!
//! Given a batch of `(source document URL, identifier)` pairs, produces a cached
//! preview image for each one, only fetching and rendering what isn't already in the
//! [`CacheStore`]. The pipeline for a single request is
//! `cache check -> fetch -> render -> store -> locator`, and ends either with a
//! [`Locator`] or with an absent thumbnail. Per request failures are kept in a
//! [`ThumbnailOutcome`] and never leak into sibling requests.

mod error;
mod fetcher;
mod locator;
mod outcome;
mod request;
mod store;
mod thumbnailer;

pub use error::{FetchError, RenderError, StoreError, ThumbnailerError};
pub use fetcher::{Fetch, HttpFetcher};
pub use locator::LocatorResolver;
pub use outcome::{BatchReport, BatchStats, ThumbnailOutcome};
pub use request::{Locator, ThumbnailRequest, ThumbnailResult};
pub use store::{get_shard_hex, CacheStore, LocalStore};
pub use thumbnailer::Thumbnailer;

#[cfg(feature = "s3")]
pub use store::S3Store;
