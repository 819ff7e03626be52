//! Remote storage seam
//!
//! The cycle only depends on [`RemoteStorage`]; how it is reached (a mounted share
//! via [`FsRemote`], a gateway client) is hidden behind [`RemoteConnector`].
//! Credentials come from an injected [`CredentialProvider`] so the engine itself
//! never prompts.

mod fs;

pub use fs::{FsConnector, FsRemote};

use async_trait::async_trait;
use std::path::Path;

use crate::error::ConnectionError;
use crate::logging::*;

/// Result type for remote operations
pub type RemoteResult<T> = Result<T, ConnectionError>;

/// Operations the cycle consumes from the remote storage
///
/// Remote paths are slash-delimited and absolute (`/intake/MAC3/set/a.csv`).
#[async_trait]
pub trait RemoteStorage: Send + Sync {
	async fn exists(&self, path: &str) -> RemoteResult<bool>;

	/// Create one directory; the parent must exist
	async fn mkdir(&self, path: &str) -> RemoteResult<()>;

	/// Create a directory and any missing parents
	async fn mkdirs(&self, path: &str) -> RemoteResult<()>;

	/// Copy a remote file to a local path, returning bytes written
	async fn download(&self, remote: &str, local: &Path) -> RemoteResult<u64>;

	/// Copy a local file to a remote path, returning bytes sent
	async fn upload(&self, local: &Path, remote: &str) -> RemoteResult<u64>;
}

/// User name and password for the remote
#[derive(Clone)]
pub struct Credentials {
	pub user: String,
	pub password: String,
}

impl std::fmt::Debug for Credentials {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Credentials").field("user", &self.user).finish_non_exhaustive()
	}
}

/// Supplies credentials when the connector asks for them
pub trait CredentialProvider: Send + Sync {
	/// `attempt` starts at 1
	fn credentials(&self, attempt: u32) -> RemoteResult<Credentials>;
}

/// Provider for remotes that never need a login
pub struct NoCredentials;

impl CredentialProvider for NoCredentials {
	fn credentials(&self, _attempt: u32) -> RemoteResult<Credentials> {
		Err(ConnectionError::CredentialsUnavailable {
			message: "no credential provider configured".to_string(),
		})
	}
}

/// Establishes a session with the remote storage
#[async_trait]
pub trait RemoteConnector: Send + Sync {
	/// Human-readable location for logs
	fn location(&self) -> String;

	fn needs_credentials(&self) -> bool;

	async fn connect(&self, credentials: Option<&Credentials>) -> RemoteResult<Box<dyn RemoteStorage>>;
}

/// Connect, retrying failed logins up to `max_attempts` times
///
/// Authentication and reachability failures are retried; a provider that cannot
/// supply credentials aborts immediately. Running out of attempts yields
/// [`ConnectionError::MaxRetriesExceeded`].
pub async fn connect_with_retry(
	connector: &dyn RemoteConnector,
	provider: &dyn CredentialProvider,
	max_attempts: u32,
) -> RemoteResult<Box<dyn RemoteStorage>> {
	let max_attempts = max_attempts.max(1);
	for attempt in 1..=max_attempts {
		let credentials = if connector.needs_credentials() {
			Some(provider.credentials(attempt)?)
		} else {
			None
		};

		match connector.connect(credentials.as_ref()).await {
			Ok(remote) => {
				info!("Connected to {}", connector.location());
				return Ok(remote);
			}
			Err(e @ ConnectionError::AuthenticationFailed { .. })
			| Err(e @ ConnectionError::Unreachable { .. }) => {
				warn!("Connection attempt {}/{} failed: {}", attempt, max_attempts, e);
			}
			Err(e) => return Err(e),
		}
	}
	error!("Could not connect to {} after {} attempts", connector.location(), max_attempts);
	Err(ConnectionError::MaxRetriesExceeded { attempts: max_attempts })
}


// vim: ts=4
