use ph_core::{
	config::ThumbnailerConfig,
	init_logger,
	thumbnail::{ThumbnailRequest, ThumbnailResult, Thumbnailer},
};

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::{
	fs,
	io::{self, AsyncReadExt},
	signal,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
	name = "ph-thumbnailer",
	about = "Generate and cache first page thumbnails for a batch of documents"
)]
struct Cli {
	/// Path to the JSON config file, written with defaults when missing
	#[arg(long, default_value = "thumbnailer.json")]
	config: PathBuf,

	/// JSON array of `{ "source_url", "identifier" }` objects, `-` reads stdin
	#[arg(long, conflicts_with_all = ["url", "id"])]
	input: Option<String>,

	/// Source document URL, paired in order with `--id`
	#[arg(long)]
	url: Vec<String>,

	/// Identifier the thumbnail is cached under, paired in order with `--url`
	#[arg(long)]
	id: Vec<String>,

	/// Pretty print the result
	#[arg(long)]
	pretty: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();

	let (config, source) = load_config(&cli.config)?;

	init_logger(&config.log_level).context("failed to initialize logger")?;
	log_config_source(&cli.config, source);

	let requests = read_requests(&cli).await?;
	if requests.is_empty() {
		warn!("No thumbnail requests given, pass --input or --url/--id pairs");
	}

	let thumbnailer = Thumbnailer::from_config(&config)
		.await
		.context("failed to set up thumbnailer")?;

	let cancel = CancellationToken::new();
	tokio::spawn({
		let cancel = cancel.clone();
		async move {
			if signal::ctrl_c().await.is_ok() {
				warn!("Received Ctrl-C, canceling thumbnail batch");
				cancel.cancel();
			}
		}
	});

	let report = thumbnailer
		.process_with_cancellation(requests, cancel)
		.await?;

	info!(
		cache_hits = report.stats.cache_hits,
		generated = report.stats.generated,
		failed = report.stats.failed,
		"Done"
	);

	let result = ThumbnailResult::from(report);
	let output = if cli.pretty {
		serde_json::to_string_pretty(&result)?
	} else {
		serde_json::to_string(&result)?
	};

	println!("{output}");

	Ok(())
}

/// Where the config came from, logged once the subscriber is installed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigSource {
	File,
	CreatedDefault,
}

fn load_config(path: &Path) -> Result<(ThumbnailerConfig, ConfigSource)> {
	let source = if path.exists() {
		ConfigSource::File
	} else {
		ConfigSource::CreatedDefault
	};

	let config = ThumbnailerConfig::load_from(path)
		.and_then(ThumbnailerConfig::with_env_overrides)
		.with_context(|| format!("failed to load config from {}", path.display()))?;

	Ok((config, source))
}

fn log_config_source(path: &Path, source: ConfigSource) {
	match source {
		ConfigSource::File => info!(path = %path.display(), "Loaded thumbnailer config"),
		ConfigSource::CreatedDefault => {
			warn!(path = %path.display(), "No config found, wrote the defaults");
		}
	}
}

async fn read_requests(cli: &Cli) -> Result<Vec<ThumbnailRequest>> {
	let Some(input) = &cli.input else {
		if cli.url.len() != cli.id.len() {
			bail!(
				"every --url needs a matching --id <urls={}, ids={}>",
				cli.url.len(),
				cli.id.len()
			);
		}

		return Ok(cli
			.url
			.iter()
			.zip(&cli.id)
			.map(|(url, id)| ThumbnailRequest::new(url, id))
			.collect());
	};

	let raw = if input == "-" {
		let mut raw = String::new();
		io::stdin()
			.read_to_string(&mut raw)
			.await
			.context("failed to read requests from stdin")?;
		raw
	} else {
		fs::read_to_string(input)
			.await
			.with_context(|| format!("failed to read requests from {input}"))?
	};

	serde_json::from_str(&raw)
		.context("requests must be a JSON array of { \"source_url\", \"identifier\" } objects")
}

#[cfg(test)]
mod tests {
	use super::*;

	use tempfile::tempdir;
	use tracing_test::traced_test;

	#[test]
	#[traced_test]
	fn config_source_is_reported_after_logger_setup() {
		let dir = tempdir().unwrap();
		let path = dir.path().join("thumbnailer.json");

		let (created, source) = load_config(&path).unwrap();
		assert_eq!(source, ConfigSource::CreatedDefault);
		log_config_source(&path, source);
		assert!(logs_contain("No config found, wrote the defaults"));

		let (loaded, source) = load_config(&path).unwrap();
		assert_eq!(source, ConfigSource::File);
		assert_eq!(loaded, created);
		log_config_source(&path, source);
		assert!(logs_contain("Loaded thumbnailer config"));
	}

	#[tokio::test]
	async fn url_id_pairs() {
		let cli = Cli::try_parse_from([
			"ph-thumbnailer",
			"--url",
			"http://host/a.pdf",
			"--id",
			"a",
			"--url",
			"http://host/b.pdf",
			"--id",
			"b",
		])
		.unwrap();

		let requests = read_requests(&cli).await.unwrap();
		assert_eq!(
			requests,
			vec![
				ThumbnailRequest::new("http://host/a.pdf", "a"),
				ThumbnailRequest::new("http://host/b.pdf", "b"),
			]
		);
	}

	#[tokio::test]
	async fn unpaired_url_is_rejected() {
		let cli = Cli::try_parse_from(["ph-thumbnailer", "--url", "http://host/a.pdf"]).unwrap();
		assert!(read_requests(&cli).await.is_err());
	}

	#[tokio::test]
	async fn requests_from_file_accept_short_keys() {
		let dir = tempdir().unwrap();
		let path = dir.path().join("requests.json");
		std::fs::write(
			&path,
			r#"[
				{ "source_url": "http://host/a.pdf", "identifier": "a" },
				{ "url": "http://host/b.pdf", "id": "b" }
			]"#,
		)
		.unwrap();

		let cli = Cli::try_parse_from([
			"ph-thumbnailer",
			"--input",
			path.to_str().unwrap(),
		])
		.unwrap();

		let requests = read_requests(&cli).await.unwrap();
		assert_eq!(requests.len(), 2);
		assert_eq!(requests[1].identifier, "b");
	}

	#[test]
	fn input_conflicts_with_pairs() {
		assert!(Cli::try_parse_from([
			"ph-thumbnailer",
			"--input",
			"-",
			"--url",
			"http://host/a.pdf",
			"--id",
			"a",
		])
		.is_err());
	}
}
