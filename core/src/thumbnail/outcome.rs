use super::{FetchError, Locator, RenderError, StoreError, ThumbnailResult};

use std::{collections::HashMap, time::Duration};

/// How a single request ended.
///
/// Only [`CacheHit`](Self::CacheHit) and [`Generated`](Self::Generated) carry a locator,
/// every other variant is an absent thumbnail with the reason attached.
#[derive(Debug)]
pub enum ThumbnailOutcome {
	CacheHit(Locator),
	Generated(Locator),
	FetchFailed(FetchError),
	RenderFailed(RenderError),
	StoreFailed(StoreError),
	/// The cache backend couldn't tell if the thumbnail exists, kept apart from
	/// [`StoreFailed`](Self::StoreFailed) so outages don't look like plain misses
	BackendUnavailable(StoreError),
	/// The item task panicked outside of the render step
	Panicked,
	Canceled,
}

impl ThumbnailOutcome {
	#[must_use]
	pub const fn locator(&self) -> Option<&Locator> {
		match self {
			Self::CacheHit(locator) | Self::Generated(locator) => Some(locator),
			_ => None,
		}
	}

	#[must_use]
	pub fn into_locator(self) -> Option<Locator> {
		match self {
			Self::CacheHit(locator) | Self::Generated(locator) => Some(locator),
			_ => None,
		}
	}

	#[must_use]
	pub const fn is_success(&self) -> bool {
		matches!(self, Self::CacheHit(_) | Self::Generated(_))
	}

	/// Short label for logs and counters
	#[must_use]
	pub const fn kind(&self) -> &'static str {
		match self {
			Self::CacheHit(_) => "cache_hit",
			Self::Generated(_) => "generated",
			Self::FetchFailed(_) => "fetch_failed",
			Self::RenderFailed(_) => "render_failed",
			Self::StoreFailed(_) => "store_failed",
			Self::BackendUnavailable(_) => "backend_unavailable",
			Self::Panicked => "panicked",
			Self::Canceled => "canceled",
		}
	}
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchStats {
	/// Distinct identifiers in the batch
	pub requested: usize,
	pub cache_hits: usize,
	pub generated: usize,
	pub failed: usize,
	pub elapsed: Duration,
}

/// Every outcome of a batch, keyed by identifier
#[derive(Debug, Default)]
pub struct BatchReport {
	pub outcomes: HashMap<String, ThumbnailOutcome>,
	pub stats: BatchStats,
}

impl BatchReport {
	pub(super) fn new(outcomes: HashMap<String, ThumbnailOutcome>, elapsed: Duration) -> Self {
		let mut stats = BatchStats {
			requested: outcomes.len(),
			elapsed,
			..Default::default()
		};

		for outcome in outcomes.values() {
			match outcome {
				ThumbnailOutcome::CacheHit(_) => stats.cache_hits += 1,
				ThumbnailOutcome::Generated(_) => stats.generated += 1,
				_ => stats.failed += 1,
			}
		}

		Self { outcomes, stats }
	}

	#[must_use]
	pub fn get(&self, identifier: &str) -> Option<&ThumbnailOutcome> {
		self.outcomes.get(identifier)
	}
}

impl From<BatchReport> for ThumbnailResult {
	fn from(report: BatchReport) -> Self {
		report
			.outcomes
			.into_iter()
			.map(|(identifier, outcome)| (identifier, outcome.into_locator()))
			.collect()
	}
}
