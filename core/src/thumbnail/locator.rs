use super::{CacheStore, Locator, StoreError};
use crate::config::EndpointRewrite;

use tracing::trace;

/// Turns stored identifiers into references callers can use.
///
/// Delegates to the store, then applies the optional endpoint rewrite so deployments
/// running outside the backend's network get a reachable URL.
#[derive(Debug, Clone, Default)]
pub struct LocatorResolver {
	rewrite: Option<EndpointRewrite>,
}

impl LocatorResolver {
	#[must_use]
	pub const fn new(rewrite: Option<EndpointRewrite>) -> Self {
		Self { rewrite }
	}

	pub async fn resolve(
		&self,
		store: &dyn CacheStore,
		identifier: &str,
	) -> Result<Locator, StoreError> {
		store.locator(identifier).await.map(|raw| self.rewrite(raw))
	}

	/// Only a leading `from` is replaced, locators not starting with it are left as is
	#[must_use]
	pub fn rewrite(&self, locator: Locator) -> Locator {
		let Some(EndpointRewrite { from, to }) = &self.rewrite else {
			return locator;
		};

		match locator.as_str().strip_prefix(from.as_str()) {
			Some(rest) => {
				trace!(%from, %to, "Rewriting locator endpoint");
				Locator::new(format!("{to}{rest}"))
			}
			None => locator,
		}
	}
}
