#![allow(dead_code)]

use ph_core::{
	thumbnail::{CacheStore, Fetch, FetchError, Locator, StoreError},
	DocumentRenderer, RenderedImage, ThumbnailFormat,
};

use std::{
	collections::HashMap,
	sync::{
		atomic::{AtomicBool, AtomicUsize, Ordering},
		Arc, Mutex,
	},
	time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use tokio::{sync::Notify, time::sleep};

/// Counts how many fetch/render operations run at the same time
#[derive(Debug, Default)]
pub struct InFlightProbe {
	current: AtomicUsize,
	max: AtomicUsize,
}

impl InFlightProbe {
	pub fn enter(&self) {
		let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
		self.max.fetch_max(now, Ordering::SeqCst);
	}

	pub fn leave(&self) {
		self.current.fetch_sub(1, Ordering::SeqCst);
	}

	pub fn max(&self) -> usize {
		self.max.load(Ordering::SeqCst)
	}
}

#[derive(Debug, Clone)]
pub enum FakeDocument {
	Pdf(&'static [u8]),
	Status(u16),
	Html,
	/// Never answers in any reasonable time
	Hang,
}

#[derive(Debug, Default)]
pub struct FakeFetcher {
	documents: HashMap<String, FakeDocument>,
	delay: Duration,
	pub calls: AtomicUsize,
	pub probe: Arc<InFlightProbe>,
}

impl FakeFetcher {
	pub fn new<U: Into<String>>(documents: impl IntoIterator<Item = (U, FakeDocument)>) -> Self {
		Self {
			documents: documents
				.into_iter()
				.map(|(url, doc)| (url.into(), doc))
				.collect(),
			..Default::default()
		}
	}

	pub fn with_delay(mut self, delay: Duration) -> Self {
		self.delay = delay;
		self
	}

	pub fn with_probe(mut self, probe: Arc<InFlightProbe>) -> Self {
		self.probe = probe;
		self
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl Fetch for FakeFetcher {
	async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		self.probe.enter();
		sleep(self.delay).await;
		self.probe.leave();

		match self.documents.get(url) {
			Some(FakeDocument::Pdf(data)) => Ok(Bytes::from_static(data)),
			Some(FakeDocument::Status(code)) => Err(FetchError::Status(
				StatusCode::from_u16(*code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
			)),
			Some(FakeDocument::Html) => Err(FetchError::ContentType {
				expected: "application/pdf".to_string(),
				received: Some("text/html".to_string()),
			}),
			Some(FakeDocument::Hang) => {
				sleep(Duration::from_secs(3600)).await;
				Err(FetchError::Status(StatusCode::GATEWAY_TIMEOUT))
			}
			None => Err(FetchError::Status(StatusCode::NOT_FOUND)),
		}
	}
}

pub const CORRUPT: &[u8] = b"corrupt";
pub const PANIC: &[u8] = b"panic";

/// Echoes the input as the "encoded" image, fails on [`CORRUPT`] and panics on [`PANIC`]
#[derive(Debug, Default)]
pub struct FakeRenderer {
	pub calls: AtomicUsize,
	pub probe: Arc<InFlightProbe>,
	pub work: Duration,
}

impl FakeRenderer {
	pub fn with_probe(probe: Arc<InFlightProbe>, work: Duration) -> Self {
		Self {
			probe,
			work,
			..Default::default()
		}
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}

impl DocumentRenderer for FakeRenderer {
	fn render(&self, data: &[u8]) -> ph_images::Result<RenderedImage> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		self.probe.enter();
		std::thread::sleep(self.work);
		self.probe.leave();

		if data == PANIC {
			panic!("renderer blew up");
		}

		if data == CORRUPT {
			return Err(ph_images::Error::NotAPdf);
		}

		Ok(RenderedImage {
			data: data.to_vec(),
			width: 600,
			height: 800,
			format: ThumbnailFormat::Jpeg,
		})
	}
}

#[derive(Debug, Default)]
pub struct MemoryStore {
	images: Mutex<HashMap<String, Vec<u8>>>,
	pub unavailable: AtomicBool,
	pub stores: AtomicUsize,
	/// Slows down `store` so tests can cancel while it runs
	pub store_delay: Duration,
	pub store_started: Notify,
	pub store_finished: AtomicUsize,
}

impl MemoryStore {
	pub fn with_store_delay(store_delay: Duration) -> Self {
		Self {
			store_delay,
			..Default::default()
		}
	}

	pub fn preload(&self, identifier: &str, data: &[u8]) {
		self.images
			.lock()
			.unwrap()
			.insert(identifier.to_string(), data.to_vec());
	}

	pub fn get(&self, identifier: &str) -> Option<Vec<u8>> {
		self.images.lock().unwrap().get(identifier).cloned()
	}

	pub fn stores(&self) -> usize {
		self.stores.load(Ordering::SeqCst)
	}

	fn check_available(&self) -> Result<(), StoreError> {
		if self.unavailable.load(Ordering::SeqCst) {
			Err(StoreError::BackendUnavailable("connection refused".to_string()))
		} else {
			Ok(())
		}
	}
}

#[async_trait]
impl CacheStore for MemoryStore {
	async fn exists(&self, identifier: &str) -> Result<bool, StoreError> {
		self.check_available()?;
		Ok(self.images.lock().unwrap().contains_key(identifier))
	}

	async fn store(&self, identifier: &str, image: &RenderedImage) -> Result<(), StoreError> {
		self.check_available()?;
		self.stores.fetch_add(1, Ordering::SeqCst);
		self.store_started.notify_one();
		sleep(self.store_delay).await;
		self.images
			.lock()
			.unwrap()
			.insert(identifier.to_string(), image.data.clone());
		self.store_finished.fetch_add(1, Ordering::SeqCst);
		Ok(())
	}

	async fn locator(&self, identifier: &str) -> Result<Locator, StoreError> {
		self.check_available()?;
		Ok(Locator::new(format!("http://internal-store/{identifier}")))
	}
}
