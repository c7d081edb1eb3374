use std::{
	collections::{hash_map, HashMap},
	fmt,
};

use serde::{Deserialize, Serialize};

/// A source document to make a thumbnail for, and the key the thumbnail is cached under.
///
/// Identifiers must be unique and safe to use in URLs and paths, callers usually pass
/// the primary key of the entity owning the document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThumbnailRequest {
	#[serde(alias = "url")]
	pub source_url: String,
	#[serde(alias = "id")]
	pub identifier: String,
}

impl ThumbnailRequest {
	pub fn new(source_url: impl Into<String>, identifier: impl Into<String>) -> Self {
		Self {
			source_url: source_url.into(),
			identifier: identifier.into(),
		}
	}
}

impl<U: Into<String>, I: Into<String>> From<(U, I)> for ThumbnailRequest {
	fn from((source_url, identifier): (U, I)) -> Self {
		Self::new(source_url, identifier)
	}
}

/// An externally usable reference to a stored thumbnail, a URL or a filesystem path.
///
/// Time bounded references are only valid for the expiry window of the backend that
/// issued them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Locator(String);

impl Locator {
	pub fn new(reference: impl Into<String>) -> Self {
		Self(reference.into())
	}

	#[must_use]
	pub fn as_str(&self) -> &str {
		&self.0
	}

	#[must_use]
	pub fn into_inner(self) -> String {
		self.0
	}
}

impl fmt::Display for Locator {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl AsRef<str> for Locator {
	fn as_ref(&self) -> &str {
		&self.0
	}
}

/// Identifier to locator mapping for a whole batch.
///
/// Every requested identifier is a key, `None` means no thumbnail could be produced
/// and callers should show a fallback instead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ThumbnailResult(HashMap<String, Option<Locator>>);

impl ThumbnailResult {
	#[must_use]
	pub fn len(&self) -> usize {
		self.0.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	#[must_use]
	pub fn contains(&self, identifier: &str) -> bool {
		self.0.contains_key(identifier)
	}

	/// `None` when the identifier wasn't requested, `Some(None)` when it has no thumbnail
	#[must_use]
	pub fn get(&self, identifier: &str) -> Option<Option<&Locator>> {
		self.0.get(identifier).map(Option::as_ref)
	}

	/// Locator for `identifier`, if it was requested and a thumbnail exists
	#[must_use]
	pub fn locator(&self, identifier: &str) -> Option<&Locator> {
		self.0.get(identifier).and_then(Option::as_ref)
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&Locator>)> {
		self.0.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
	}

	#[must_use]
	pub fn into_inner(self) -> HashMap<String, Option<Locator>> {
		self.0
	}
}

impl FromIterator<(String, Option<Locator>)> for ThumbnailResult {
	fn from_iter<T: IntoIterator<Item = (String, Option<Locator>)>>(iter: T) -> Self {
		Self(iter.into_iter().collect())
	}
}

impl IntoIterator for ThumbnailResult {
	type Item = (String, Option<Locator>);
	type IntoIter = hash_map::IntoIter<String, Option<Locator>>;

	fn into_iter(self) -> Self::IntoIter {
		self.0.into_iter()
	}
}
