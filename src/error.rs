//! Error types for labsync operations

use std::error::Error;
use std::fmt;
use std::io;

/// Main error type for a reconciliation cycle
///
/// Only connection, configuration and store-open failures reach the caller as
/// `Err`. Everything else a cycle runs into is folded into its report.
#[derive(Debug)]
pub enum SyncError {
	/// Remote storage could not be reached or authenticated
	Connection(ConnectionError),

	/// Configuration is missing or malformed
	Config(ConfigError),

	/// Local state store failure
	Store(StoreError),

	/// Checksum computation failure
	Checksum(ChecksumError),

	/// I/O error
	Io(io::Error),

	/// Operation aborted by user
	Aborted,

	/// Generic error message
	Other { message: String },
}

impl fmt::Display for SyncError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SyncError::Connection(e) => write!(f, "Connection error: {}", e),
			SyncError::Config(e) => write!(f, "Configuration error: {}", e),
			SyncError::Store(e) => write!(f, "State store error: {}", e),
			SyncError::Checksum(e) => write!(f, "Checksum error: {}", e),
			SyncError::Io(e) => write!(f, "I/O error: {}", e),
			SyncError::Aborted => write!(f, "Operation aborted by user"),
			SyncError::Other { message } => write!(f, "{}", message),
		}
	}
}

impl Error for SyncError {
	fn source(&self) -> Option<&(dyn Error + 'static)> {
		match self {
			SyncError::Connection(e) => Some(e),
			SyncError::Config(e) => Some(e),
			SyncError::Store(e) => Some(e),
			SyncError::Checksum(e) => Some(e),
			SyncError::Io(e) => Some(e),
			_ => None,
		}
	}
}

impl From<io::Error> for SyncError {
	fn from(e: io::Error) -> Self {
		SyncError::Io(e)
	}
}

impl From<String> for SyncError {
	fn from(e: String) -> Self {
		SyncError::Other { message: e }
	}
}

impl From<ConnectionError> for SyncError {
	fn from(e: ConnectionError) -> Self {
		SyncError::Connection(e)
	}
}

impl From<ConfigError> for SyncError {
	fn from(e: ConfigError) -> Self {
		SyncError::Config(e)
	}
}

impl From<StoreError> for SyncError {
	fn from(e: StoreError) -> Self {
		SyncError::Store(e)
	}
}

impl From<ChecksumError> for SyncError {
	fn from(e: ChecksumError) -> Self {
		SyncError::Checksum(e)
	}
}

/// Remote storage connection errors
#[derive(Debug)]
pub enum ConnectionError {
	/// Remote root or gateway cannot be reached
	Unreachable { location: String, source: Box<dyn Error + Send + Sync> },

	/// Credentials were rejected
	AuthenticationFailed { user: String },

	/// Every allowed attempt failed
	MaxRetriesExceeded { attempts: u32 },

	/// Credential entry was cancelled or failed
	CredentialsUnavailable { message: String },

	/// A remote operation failed
	Remote { operation: &'static str, path: String, source: io::Error },
}

impl fmt::Display for ConnectionError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ConnectionError::Unreachable { location, source } => {
				write!(f, "Cannot reach {}: {}", location, source)
			}
			ConnectionError::AuthenticationFailed { user } => {
				write!(f, "Authentication failed for user {}", user)
			}
			ConnectionError::MaxRetriesExceeded { attempts } => {
				write!(f, "Login failed {} times, giving up", attempts)
			}
			ConnectionError::CredentialsUnavailable { message } => {
				write!(f, "Credentials unavailable: {}", message)
			}
			ConnectionError::Remote { operation, path, source } => {
				write!(f, "Remote {} of {} failed: {}", operation, path, source)
			}
		}
	}
}

impl Error for ConnectionError {}

/// State store errors
#[derive(Debug)]
pub enum StoreError {
	/// Database file could not be opened or created
	Open { path: String, source: Box<dyn Error + Send + Sync> },

	/// Transaction could not be started
	Transaction(Box<dyn Error + Send + Sync>),

	/// Table could not be opened
	Table(Box<dyn Error + Send + Sync>),

	/// Read or write inside a table failed
	Storage(Box<dyn Error + Send + Sync>),

	/// Commit failed
	Commit(Box<dyn Error + Send + Sync>),

	/// Row could not be serialized
	Encode(serde_json::Error),

	/// Row could not be deserialized
	Decode { table: &'static str, id: u64, source: serde_json::Error },

	/// Row expected to exist was not found
	MissingRow { table: &'static str, id: u64 },
}

impl fmt::Display for StoreError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			StoreError::Open { path, source } => {
				write!(f, "Cannot open state store {}: {}", path, source)
			}
			StoreError::Transaction(e) => write!(f, "Transaction failed: {}", e),
			StoreError::Table(e) => write!(f, "Table access failed: {}", e),
			StoreError::Storage(e) => write!(f, "Storage failed: {}", e),
			StoreError::Commit(e) => write!(f, "Commit failed: {}", e),
			StoreError::Encode(e) => write!(f, "Cannot encode row: {}", e),
			StoreError::Decode { table, id, source } => {
				write!(f, "Cannot decode row {} of table {}: {}", id, table, source)
			}
			StoreError::MissingRow { table, id } => {
				write!(f, "Row {} of table {} does not exist", id, table)
			}
		}
	}
}

impl Error for StoreError {}

impl From<redb::TransactionError> for StoreError {
	fn from(e: redb::TransactionError) -> Self {
		StoreError::Transaction(Box::new(e))
	}
}

impl From<redb::TableError> for StoreError {
	fn from(e: redb::TableError) -> Self {
		StoreError::Table(Box::new(e))
	}
}

impl From<redb::StorageError> for StoreError {
	fn from(e: redb::StorageError) -> Self {
		StoreError::Storage(Box::new(e))
	}
}

impl From<redb::CommitError> for StoreError {
	fn from(e: redb::CommitError) -> Self {
		StoreError::Commit(Box::new(e))
	}
}

/// Checksum engine errors
#[derive(Debug)]
pub enum ChecksumError {
	/// File does not exist
	NotFound { path: String },

	/// Algorithm selector outside MD5 and SHA256
	UnsupportedAlgorithm { selector: String },

	/// File could not be read
	Read { path: String, source: io::Error },
}

impl fmt::Display for ChecksumError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ChecksumError::NotFound { path } => write!(f, "The file {} does not exist", path),
			ChecksumError::UnsupportedAlgorithm { selector } => {
				write!(f, "Unsupported checksum algorithm: {}", selector)
			}
			ChecksumError::Read { path, source } => {
				write!(f, "Cannot read {}: {}", path, source)
			}
		}
	}
}

impl Error for ChecksumError {}

/// Configuration errors
#[derive(Debug)]
pub enum ConfigError {
	/// Required setting is absent
	Missing { key: &'static str },

	/// Setting has an unusable value
	Invalid { key: &'static str, message: String },

	/// Config file could not be read
	Read { path: String, source: io::Error },

	/// Config file could not be parsed
	Parse { path: String, message: String },

	/// Workstation identity could not be resolved
	UnknownWorkstation { host: String },
}

impl fmt::Display for ConfigError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ConfigError::Missing { key } => write!(f, "Missing required setting: {}", key),
			ConfigError::Invalid { key, message } => {
				write!(f, "Invalid setting {}: {}", key, message)
			}
			ConfigError::Read { path, source } => {
				write!(f, "Cannot read config file {}: {}", path, source)
			}
			ConfigError::Parse { path, message } => {
				write!(f, "Cannot parse config file {}: {}", path, message)
			}
			ConfigError::UnknownWorkstation { host } => {
				write!(f, "Unknown lab workstation with host name: {}", host)
			}
		}
	}
}

impl Error for ConfigError {}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_sync_error_wraps_nested_display() {
		let err: SyncError = ConnectionError::MaxRetriesExceeded { attempts: 3 }.into();
		assert_eq!(err.to_string(), "Connection error: Login failed 3 times, giving up");
		assert!(err.source().is_some());
	}

	#[test]
	fn test_config_error_display() {
		let err = ConfigError::Missing { key: "syncRoot" };
		assert!(err.to_string().contains("syncRoot"));
	}

	#[test]
	fn test_checksum_error_display() {
		let err = ChecksumError::UnsupportedAlgorithm { selector: "CRC32".to_string() };
		assert!(err.to_string().contains("CRC32"));
	}
}

// vim: ts=4
