use tracing_subscriber::{fmt, prelude::*, util::TryInitError, EnvFilter};

/// Crates whose logs follow the configured level, everything else stays at `warn`
const OWN_CRATES: [&str; 3] = ["ph_core", "ph_images", "ph_thumbnailer"];

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` wins over `level` when set, e.g. `RUST_LOG=ph_core=trace,reqwest=debug`.
/// Fails if a global subscriber is already installed.
pub fn init_logger(level: &str) -> Result<(), TryInitError> {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
		EnvFilter::new(
			OWN_CRATES
				.iter()
				.fold(String::from("warn"), |directives, krate| {
					format!("{directives},{krate}={level}")
				}),
		)
	});

	tracing_subscriber::registry()
		.with(filter)
		.with(fmt::layer())
		.try_init()
}
