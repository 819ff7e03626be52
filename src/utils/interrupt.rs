//! Interrupt handling for a running cycle
//!
//! The first SIGINT/SIGTERM only raises a [`CancelFlag`]; the cycle finishes the
//! unit it is working on and stops issuing new ones. A second signal exits the
//! process immediately.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Shared cancellation request
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn cancel(&self) {
		self.0.store(true, Ordering::SeqCst);
	}

	pub fn is_cancelled(&self) -> bool {
		self.0.load(Ordering::SeqCst)
	}
}

/// Raise `flag` on the first interrupt, exit on the second
pub fn setup_signal_handlers(flag: CancelFlag) {
	tokio::spawn(async move {
		let mut received = 0u32;
		loop {
			let code = match wait_for_signal().await {
				Some(code) => code,
				None => return,
			};
			received += 1;
			if received == 1 {
				warn!("Interrupt received, stopping after the current file (repeat to abort)");
				flag.cancel();
			} else {
				debug!("Second interrupt, exiting");
				std::process::exit(code);
			}
		}
	});
}

/// Wait for SIGINT or SIGTERM, returning the matching exit code
#[cfg(unix)]
async fn wait_for_signal() -> Option<i32> {
	use tokio::signal::unix::{signal, SignalKind};

	let mut sigterm = match signal(SignalKind::terminate()) {
		Ok(stream) => stream,
		Err(e) => {
			warn!("Failed to setup SIGTERM handler: {}", e);
			return None;
		}
	};
	let mut sigint = match signal(SignalKind::interrupt()) {
		Ok(stream) => stream,
		Err(e) => {
			warn!("Failed to setup SIGINT handler: {}", e);
			return None;
		}
	};

	tokio::select! {
		_ = sigterm.recv() => Some(143), // 128 + SIGTERM(15)
		_ = sigint.recv() => Some(130), // 128 + SIGINT(2)
	}
}

#[cfg(not(unix))]
async fn wait_for_signal() -> Option<i32> {
	match tokio::signal::ctrl_c().await {
		Ok(()) => Some(130),
		Err(e) => {
			warn!("Failed to setup Ctrl-C handler: {}", e);
			None
		}
	}
}


// vim: ts=4
