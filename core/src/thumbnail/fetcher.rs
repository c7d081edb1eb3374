use super::FetchError;

use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use reqwest::{header::CONTENT_TYPE, redirect, Client, StatusCode};
use tracing::{instrument, trace};

/// Maximum number of redirects followed before giving up on a document
const MAX_REDIRECTS: usize = 10;

/// Retrieves raw source document bytes.
#[async_trait]
pub trait Fetch: Send + Sync {
	async fn fetch(&self, url: &str) -> Result<Bytes, FetchError>;
}

/// Fetches documents over HTTP(S), following redirects.
///
/// There is no timeout by default, large documents over slow links are still
/// downloaded in full, pass one to [`HttpFetcher::new`] when that matters.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
	client: Client,
	expected_content_type: String,
	max_bytes: Option<u64>,
}

impl HttpFetcher {
	pub fn new(
		expected_content_type: impl Into<String>,
		timeout: Option<Duration>,
	) -> Result<Self, reqwest::Error> {
		let mut builder = Client::builder().redirect(redirect::Policy::limited(MAX_REDIRECTS));

		if let Some(timeout) = timeout {
			builder = builder.timeout(timeout);
		}

		Ok(Self::with_client(builder.build()?, expected_content_type))
	}

	/// Reuses an existing client, which keeps its own redirect and timeout settings
	pub fn with_client(client: Client, expected_content_type: impl Into<String>) -> Self {
		Self {
			client,
			expected_content_type: expected_content_type.into(),
			max_bytes: None,
		}
	}

	#[must_use]
	pub const fn with_max_bytes(mut self, max_bytes: Option<u64>) -> Self {
		self.max_bytes = max_bytes;
		self
	}

	fn accepts(&self, content_type: Option<&str>) -> bool {
		content_type
			.map(mime_essence)
			.is_some_and(|essence| essence.eq_ignore_ascii_case(&self.expected_content_type))
	}
}

#[async_trait]
impl Fetch for HttpFetcher {
	#[instrument(skip(self), err(level = "debug"))]
	async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
		let mut response = self.client.get(url).send().await?;

		let status = response.status();
		if status != StatusCode::OK {
			return Err(FetchError::Status(status));
		}

		let content_type = response
			.headers()
			.get(CONTENT_TYPE)
			.and_then(|value| value.to_str().ok());

		if !self.accepts(content_type) {
			return Err(FetchError::ContentType {
				expected: self.expected_content_type.clone(),
				received: content_type.map(str::to_string),
			});
		}

		let Some(limit) = self.max_bytes else {
			let body = response.bytes().await?;
			trace!(bytes = body.len(), "Fetched document");
			return Ok(body);
		};

		if response.content_length().is_some_and(|len| len > limit) {
			return Err(FetchError::TooLarge { limit });
		}

		// Content-Length can be missing or lie, so the limit is enforced while reading
		let mut body = BytesMut::new();
		while let Some(chunk) = response.chunk().await? {
			if u64::try_from(body.len() + chunk.len()).map_or(true, |len| len > limit) {
				return Err(FetchError::TooLarge { limit });
			}
			body.extend_from_slice(&chunk);
		}

		trace!(bytes = body.len(), "Fetched document");
		Ok(body.freeze())
	}
}

/// `type/subtype` part of a content type, without parameters like `charset`
fn mime_essence(content_type: &str) -> &str {
	content_type
		.split_once(';')
		.map_or(content_type, |(essence, _params)| essence)
		.trim()
}

#[cfg(test)]
mod tests {
	use super::*;

	use mockito::Server;

	fn fetcher() -> HttpFetcher {
		HttpFetcher::new("application/pdf", Some(Duration::from_secs(5))).unwrap()
	}

	#[test]
	fn essence_drops_parameters() {
		assert_eq!(mime_essence("application/pdf"), "application/pdf");
		assert_eq!(mime_essence("application/pdf; qs=0.001"), "application/pdf");
		assert_eq!(mime_essence(" text/html ;charset=utf-8"), "text/html");
	}

	#[tokio::test]
	async fn returns_pdf_bodies() {
		let mut server = Server::new_async().await;
		let mock = server
			.mock("GET", "/a.pdf")
			.with_status(200)
			.with_header("content-type", "application/pdf")
			.with_body("%PDF-1.4 fake")
			.create_async()
			.await;

		let body = fetcher()
			.fetch(&format!("{}/a.pdf", server.url()))
			.await
			.unwrap();

		mock.assert_async().await;
		assert_eq!(&body[..], b"%PDF-1.4 fake");
	}

	#[tokio::test]
	async fn follows_redirects() {
		let mut server = Server::new_async().await;
		let redirect = server
			.mock("GET", "/abs/1234")
			.with_status(301)
			.with_header("location", "/pdf/1234.pdf")
			.create_async()
			.await;
		let target = server
			.mock("GET", "/pdf/1234.pdf")
			.with_status(200)
			.with_header("content-type", "application/pdf")
			.with_body("%PDF-1.7")
			.create_async()
			.await;

		let body = fetcher()
			.fetch(&format!("{}/abs/1234", server.url()))
			.await
			.unwrap();

		redirect.assert_async().await;
		target.assert_async().await;
		assert_eq!(&body[..], b"%PDF-1.7");
	}

	#[tokio::test]
	async fn non_ok_status_is_a_fetch_failure() {
		let mut server = Server::new_async().await;
		server
			.mock("GET", "/missing.pdf")
			.with_status(404)
			.create_async()
			.await;

		let err = fetcher()
			.fetch(&format!("{}/missing.pdf", server.url()))
			.await
			.unwrap_err();

		assert!(matches!(err, FetchError::Status(StatusCode::NOT_FOUND)));
	}

	#[tokio::test]
	async fn html_is_rejected_even_with_ok_status() {
		let mut server = Server::new_async().await;
		server
			.mock("GET", "/landing")
			.with_status(200)
			.with_header("content-type", "text/html; charset=utf-8")
			.with_body("<html></html>")
			.create_async()
			.await;

		let err = fetcher()
			.fetch(&format!("{}/landing", server.url()))
			.await
			.unwrap_err();

		assert!(
			matches!(&err, FetchError::ContentType { received: Some(ct), .. } if ct.starts_with("text/html")),
			"{err}"
		);
	}

	#[tokio::test]
	async fn content_type_parameters_are_tolerated() {
		let mut server = Server::new_async().await;
		server
			.mock("GET", "/a.pdf")
			.with_status(200)
			.with_header("content-type", "Application/PDF; qs=0.001")
			.with_body("%PDF-1.4")
			.create_async()
			.await;

		assert!(fetcher()
			.fetch(&format!("{}/a.pdf", server.url()))
			.await
			.is_ok());
	}

	#[tokio::test]
	async fn oversized_documents_are_refused() {
		let mut server = Server::new_async().await;
		server
			.mock("GET", "/big.pdf")
			.with_status(200)
			.with_header("content-type", "application/pdf")
			.with_body(vec![b'x'; 4096])
			.create_async()
			.await;

		let err = fetcher()
			.with_max_bytes(Some(1024))
			.fetch(&format!("{}/big.pdf", server.url()))
			.await
			.unwrap_err();

		assert!(matches!(err, FetchError::TooLarge { limit: 1024 }));
	}

	#[tokio::test]
	async fn connection_errors_are_transport_failures() {
		// Nothing listens on the discard port
		let err = fetcher()
			.fetch("http://127.0.0.1:9/a.pdf")
			.await
			.unwrap_err();

		assert!(matches!(err, FetchError::Transport(_)));
	}
}
