//! Logging prelude module for convenient access to tracing macros.
//!
//! ```ignore
//! use crate::logging::*;
//!
//! info!("Uploaded {} files", n);
//! warn!("Skipping {}: {}", path, e);
//! ```

pub use tracing::{debug, error, info, info_span, warn};

use std::io;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Registry};

/// Initialize the tracing subscriber with environment filter support.
///
/// By default, logs at INFO level and above go to stderr. Control the level with
/// `RUST_LOG`:
///
/// ```bash
/// RUST_LOG=debug labsync sync
/// RUST_LOG=labsync::trash=trace labsync sync
/// ```
///
/// When `log_file` is given, the same events are also written to a daily rotated
/// file next to it (`<name>.YYYY-MM-DD`). The returned guard flushes that file
/// when dropped; hold it until the process is about to exit.
pub fn init_tracing(log_file: Option<&Path>) -> io::Result<Option<WorkerGuard>> {
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
	let stderr_layer = fmt::layer().with_writer(io::stderr);

	let mut guard = None;
	let file_layer = match log_file {
		Some(path) => {
			let dir = match path.parent() {
				Some(dir) if !dir.as_os_str().is_empty() => dir,
				_ => Path::new("."),
			};
			let name = path.file_name().ok_or_else(|| {
				io::Error::new(
					io::ErrorKind::InvalidInput,
					format!("log file {} has no file name", path.display()),
				)
			})?;
			std::fs::create_dir_all(dir)?;
			let appender = tracing_appender::rolling::daily(dir, name);
			let (writer, file_guard) = tracing_appender::non_blocking(appender);
			guard = Some(file_guard);
			Some(fmt::layer().with_ansi(false).with_writer(writer))
		}
		None => None,
	};

	let subscriber = Registry::default().with(env_filter).with(stderr_layer).with(file_layer);
	tracing::subscriber::set_global_default(subscriber)
		.map_err(|e| io::Error::other(e.to_string()))?;
	Ok(guard)
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;
	use tempfile::TempDir;

	#[test]
	fn test_file_log_is_flushed_when_guard_drops() {
		let tmp = TempDir::new().unwrap();
		let guard = init_tracing(Some(&tmp.path().join("labsync.log"))).unwrap();
		assert!(guard.is_some());
		info!("Cycle finished: clean");
		drop(guard);

		let logged: String = fs::read_dir(tmp.path())
			.unwrap()
			.map(|e| fs::read_to_string(e.unwrap().path()).unwrap())
			.collect();
		assert!(logged.contains("Cycle finished: clean"));
	}
}

// vim: ts=4
