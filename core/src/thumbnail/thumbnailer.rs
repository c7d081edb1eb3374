use super::{
	BatchReport, CacheStore, Fetch, HttpFetcher, LocalStore, LocatorResolver, RenderError,
	StoreError, ThumbnailOutcome, ThumbnailRequest, ThumbnailResult, ThumbnailerError,
};
use crate::config::{ConfigError, StoreConfig, ThumbnailerConfig, DEFAULT_MAX_CONCURRENT};

use ph_images::{pdfium_available, DocumentRenderer, PdfRenderer, RenderedImage};

use std::{
	any::Any,
	collections::{HashMap, HashSet},
	panic::{self, AssertUnwindSafe},
	sync::Arc,
};

use bytes::Bytes;
use tokio::{
	sync::Semaphore,
	task::{spawn_blocking, JoinSet},
	time::Instant,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace, warn, Instrument};

/// Produces thumbnails for batches of source documents.
///
/// Each request goes through cache check, fetch, render, store and locator resolution
/// on its own task. At most `max_concurrent` requests of a batch are in flight at once
/// and a failing request never affects its siblings.
#[derive(Clone)]
pub struct Thumbnailer {
	pipeline: ItemPipeline,
	max_concurrent: usize,
}

/// Everything a single request needs, cheap to clone into its task
#[derive(Clone)]
struct ItemPipeline {
	fetcher: Arc<dyn Fetch>,
	renderer: Arc<dyn DocumentRenderer>,
	store: Arc<dyn CacheStore>,
	resolver: Arc<LocatorResolver>,
}

impl Thumbnailer {
	pub fn new(
		fetcher: Arc<dyn Fetch>,
		renderer: Arc<dyn DocumentRenderer>,
		store: Arc<dyn CacheStore>,
	) -> Self {
		Self {
			pipeline: ItemPipeline {
				fetcher,
				renderer,
				store,
				resolver: Arc::new(LocatorResolver::default()),
			},
			max_concurrent: DEFAULT_MAX_CONCURRENT,
		}
	}

	#[must_use]
	pub fn with_resolver(mut self, resolver: LocatorResolver) -> Self {
		self.pipeline.resolver = Arc::new(resolver);
		self
	}

	/// A bound of 0 is treated as 1
	#[must_use]
	pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
		self.max_concurrent = max_concurrent.max(1);
		self
	}

	#[must_use]
	pub const fn max_concurrent(&self) -> usize {
		self.max_concurrent
	}

	/// Wires up the HTTP fetcher, the PDF renderer and the configured store.
	pub async fn from_config(config: &ThumbnailerConfig) -> Result<Self, ConfigError> {
		config.validate()?;

		let fetcher = HttpFetcher::new(&config.expected_content_type, config.fetch_timeout())?
			.with_max_bytes(config.max_document_bytes);

		let renderer = PdfRenderer::new(config.render_options())?;
		if !pdfium_available() {
			warn!("No pdfium library could be bound, every document will fail to render");
		}

		let store: Arc<dyn CacheStore> = match &config.store {
			StoreConfig::Local {
				directory,
				public_base_url,
			} => Arc::new(
				LocalStore::new(directory, config.format, public_base_url.clone())
					.await
					.map_err(ConfigError::StoreDirectory)?,
			),

			#[cfg(feature = "s3")]
			StoreConfig::S3 {
				bucket,
				endpoint_url,
				region,
				presigned_url_expiry_secs,
				force_path_style,
			} => Arc::new(
				super::S3Store::from_env(
					bucket.clone(),
					endpoint_url.as_deref(),
					region.clone(),
					*force_path_style,
					std::time::Duration::from_secs(*presigned_url_expiry_secs),
				)
				.await,
			),

			#[cfg(not(feature = "s3"))]
			StoreConfig::S3 { .. } => return Err(ConfigError::BackendNotCompiled("s3")),
		};

		Ok(
			Self::new(Arc::new(fetcher), Arc::new(renderer), store)
				.with_resolver(LocatorResolver::new(config.locator_rewrite.clone()))
				.with_max_concurrent(config.max_concurrent),
		)
	}

	/// Thumbnail locators for every requested identifier, `None` where none could be made.
	///
	/// Nothing is retried, callers can send failed identifiers again in a later batch.
	pub async fn process(
		&self,
		requests: impl IntoIterator<Item = ThumbnailRequest>,
	) -> ThumbnailResult {
		self.process_detailed(requests).await.into()
	}

	/// Same as [`Thumbnailer::process`] but keeps the reason behind every outcome
	pub async fn process_detailed(
		&self,
		requests: impl IntoIterator<Item = ThumbnailRequest>,
	) -> BatchReport {
		match self.run_batch(requests, &CancellationToken::new()).await {
			Ok(report) => report,
			// The token is private to this call and never fires
			Err(ThumbnailerError::Canceled) => BatchReport::default(),
		}
	}

	/// Stops waiting on the batch as soon as `cancel` fires.
	///
	/// Requests still fetching or rendering stop at their next suspension point, those
	/// already storing their thumbnail are left to finish in the background.
	pub async fn process_with_cancellation(
		&self,
		requests: impl IntoIterator<Item = ThumbnailRequest>,
		cancel: CancellationToken,
	) -> Result<BatchReport, ThumbnailerError> {
		self.run_batch(requests, &cancel).await
	}

	#[instrument(skip_all, fields(max_concurrent = self.max_concurrent))]
	async fn run_batch(
		&self,
		requests: impl IntoIterator<Item = ThumbnailRequest>,
		cancel: &CancellationToken,
	) -> Result<BatchReport, ThumbnailerError> {
		let start = Instant::now();

		let mut seen = HashSet::new();
		let requests = requests
			.into_iter()
			.filter(|request| {
				let is_new = seen.insert(request.identifier.clone());
				if !is_new {
					debug!(identifier = %request.identifier, "Skipping duplicate identifier in batch");
				}
				is_new
			})
			.collect::<Vec<_>>();

		debug!(requests = requests.len(), "Processing thumbnail batch");

		let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
		let mut tasks = JoinSet::new();

		for request in requests {
			let pipeline = self.pipeline.clone();
			let semaphore = Arc::clone(&semaphore);
			let cancel = cancel.clone();

			tasks.spawn(
				async move {
					let outcome = pipeline.run_bounded(&request, &semaphore, &cancel).await;
					(request.identifier, outcome)
				}
				.in_current_span(),
			);
		}

		let mut outcomes = HashMap::with_capacity(seen.len());

		loop {
			tokio::select! {
				biased;

				() = cancel.cancelled() => {
					warn!(
						settled = outcomes.len(),
						pending = tasks.len(),
						"Thumbnail batch canceled, no longer waiting on pending requests"
					);
					tasks.detach_all();
					return Err(ThumbnailerError::Canceled);
				}

				joined = tasks.join_next() => match joined {
					Some(Ok((identifier, outcome))) => {
						outcomes.insert(identifier, outcome);
					}
					Some(Err(e)) => {
						// The identifier is lost with the task, it's filled in below
						error!(?e, "Thumbnail task failed;");
					}
					None => break,
				},
			}
		}

		for identifier in seen {
			outcomes
				.entry(identifier)
				.or_insert(ThumbnailOutcome::Panicked);
		}

		let report = BatchReport::new(outcomes, start.elapsed());

		info!(
			requested = report.stats.requested,
			cache_hits = report.stats.cache_hits,
			generated = report.stats.generated,
			failed = report.stats.failed,
			elapsed_ms = report.stats.elapsed.as_millis(),
			"Thumbnail batch done"
		);

		Ok(report)
	}
}

impl ItemPipeline {
	async fn run_bounded(
		&self,
		request: &ThumbnailRequest,
		semaphore: &Arc<Semaphore>,
		cancel: &CancellationToken,
	) -> ThumbnailOutcome {
		// Dropping the permit on any return path hands the slot to the next request
		let _permit = tokio::select! {
			() = cancel.cancelled() => return ThumbnailOutcome::Canceled,
			permit = Arc::clone(semaphore).acquire_owned() => match permit {
				Ok(permit) => permit,
				Err(_closed) => return ThumbnailOutcome::Canceled,
			},
		};

		let outcome = self.run(request, cancel).await;
		log_outcome(&request.identifier, &outcome);
		outcome
	}

	#[instrument(skip_all, fields(identifier = %request.identifier))]
	async fn run(&self, request: &ThumbnailRequest, cancel: &CancellationToken) -> ThumbnailOutcome {
		let identifier = request.identifier.as_str();

		match self.store.exists(identifier).await {
			Ok(true) => {
				trace!("Thumbnail already cached");
				return match self.resolver.resolve(&*self.store, identifier).await {
					Ok(locator) => ThumbnailOutcome::CacheHit(locator),
					Err(e) => store_failure(e),
				};
			}
			Ok(false) => {}
			Err(e @ StoreError::InvalidIdentifier(_)) => return ThumbnailOutcome::StoreFailed(e),
			Err(e) => return ThumbnailOutcome::BackendUnavailable(e),
		}

		let data = tokio::select! {
			() = cancel.cancelled() => return ThumbnailOutcome::Canceled,
			res = self.fetcher.fetch(&request.source_url) => match res {
				Ok(data) => data,
				Err(e) => return ThumbnailOutcome::FetchFailed(e),
			},
		};

		let image = tokio::select! {
			() = cancel.cancelled() => return ThumbnailOutcome::Canceled,
			res = render_blocking(Arc::clone(&self.renderer), data) => match res {
				Ok(image) => image,
				Err(e) => return ThumbnailOutcome::RenderFailed(e),
			},
		};

		trace!(width = image.width, height = image.height, "Rendered thumbnail");

		// Not raced against cancellation, a render that finished is worth keeping
		if let Err(e) = self.store.store(identifier, &image).await {
			return store_failure(e);
		}

		match self.resolver.resolve(&*self.store, identifier).await {
			Ok(locator) => ThumbnailOutcome::Generated(locator),
			Err(e) => store_failure(e),
		}
	}
}

fn store_failure(e: StoreError) -> ThumbnailOutcome {
	match e {
		StoreError::BackendUnavailable(_) => ThumbnailOutcome::BackendUnavailable(e),
		_ => ThumbnailOutcome::StoreFailed(e),
	}
}

/// Rendering is CPU bound, so it runs on the blocking pool to keep sibling fetches going
async fn render_blocking(
	renderer: Arc<dyn DocumentRenderer>,
	data: Bytes,
) -> Result<RenderedImage, RenderError> {
	spawn_blocking(move || panic::catch_unwind(AssertUnwindSafe(|| renderer.render(&data))))
		.await?
		.map_err(|payload| RenderError::Panicked(panic_message(payload.as_ref())))?
		.map_err(Into::into)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
	payload
		.downcast_ref::<&str>()
		.map(|s| (*s).to_string())
		.or_else(|| payload.downcast_ref::<String>().cloned())
		.unwrap_or_else(|| "Internal panic on third party crate".to_string())
}

fn log_outcome(identifier: &str, outcome: &ThumbnailOutcome) {
	match outcome {
		ThumbnailOutcome::CacheHit(_) | ThumbnailOutcome::Generated(_) => {
			trace!(%identifier, kind = outcome.kind(), "Thumbnail ready");
		}
		ThumbnailOutcome::FetchFailed(e) => {
			warn!(%identifier, %e, "Failed to fetch source document;");
		}
		ThumbnailOutcome::RenderFailed(e) => {
			warn!(%identifier, %e, "Failed to render thumbnail;");
		}
		ThumbnailOutcome::StoreFailed(e) => {
			warn!(%identifier, %e, "Failed to store thumbnail;");
		}
		ThumbnailOutcome::BackendUnavailable(e) => {
			error!(%identifier, %e, "Thumbnail cache backend unavailable;");
		}
		ThumbnailOutcome::Panicked | ThumbnailOutcome::Canceled => {
			debug!(%identifier, kind = outcome.kind(), "Thumbnail request abandoned");
		}
	}
}
