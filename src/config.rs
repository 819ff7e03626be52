//! Typed configuration for labsync
//!
//! A single `Config` is loaded once at startup from TOML (or JSON5 when the file
//! ends in `.json`/`.json5`), validated eagerly, and then handed to
//! [`SyncContext`](crate::context::SyncContext). Nothing reads settings by string key
//! after that point.
//!
//! ```toml
//! syncRoot = "/data/lab"
//! stateDb = "/var/lib/labsync/state.redb"
//!
//! [remote]
//! root = "/mnt/vault"
//! indexPath = "/vault/checksums.txt"
//! putDir = "/intake"
//!
//! [workstation.hosts]
//! goofy = "MAC3"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::checksum::DEFAULT_BLOCK_SIZE;
use crate::error::ConfigError;

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
	/// Local directory tree reconciled against the vault
	pub sync_root: Option<PathBuf>,

	/// redb file holding uploads, trash ledger and sync runs
	pub state_db: Option<PathBuf>,

	/// Move retired files into `quarantine_dir` instead of deleting them
	pub test_mode: bool,

	/// Destination of retired files in test mode
	pub quarantine_dir: Option<PathBuf>,

	pub remote: RemoteConfig,

	pub workstation: WorkstationConfig,

	pub timing: TimingConfig,

	/// Upload counter at which a record becomes a standing alert
	pub upload_alert_threshold: u32,

	/// Read block size for hashing, in bytes
	pub hash_block_size: usize,

	/// Upper bound on files hashed concurrently
	pub max_open_files: usize,

	pub notify: NotifyConfig,

	pub log: LogConfig,

	/// Dataset manifest; the built-in table is used when empty
	pub experiments: Vec<ExperimentConfig>,
}

impl Default for Config {
	fn default() -> Self {
		Config {
			sync_root: None,
			state_db: None,
			test_mode: false,
			quarantine_dir: None,
			remote: RemoteConfig::default(),
			workstation: WorkstationConfig::default(),
			timing: TimingConfig::default(),
			upload_alert_threshold: 5,
			hash_block_size: DEFAULT_BLOCK_SIZE,
			max_open_files: 8,
			notify: NotifyConfig::default(),
			log: LogConfig::default(),
			experiments: vec![],
		}
	}
}

/// Remote storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RemoteConfig {
	/// Mount point of the remote storage
	pub root: Option<PathBuf>,

	/// Remote path of the vault checksum index
	pub index_path: String,

	/// Remote intake directory; uploads land in `<putDir>/<workstation id>`
	pub put_dir: String,

	/// Login attempts before giving up
	pub max_auth_attempts: u32,
}

impl Default for RemoteConfig {
	fn default() -> Self {
		RemoteConfig {
			root: None,
			index_path: String::new(),
			put_dir: String::new(),
			max_auth_attempts: 3,
		}
	}
}

/// Workstation identity
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WorkstationConfig {
	/// Explicit id; takes precedence over `hosts`
	pub id: Option<String>,

	/// Short host name to workstation id
	pub hosts: BTreeMap<String, String>,
}

/// Time windows, in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TimingConfig {
	/// Minimum age of the newest upload before reuploads are attempted
	pub reupload_delay_secs: u64,

	/// Time a vault-matched file stays pending before it may be removed
	pub retention_secs: u64,
}

impl Default for TimingConfig {
	fn default() -> Self {
		TimingConfig {
			reupload_delay_secs: 24 * 3600,
			retention_secs: 60 * 24 * 3600,
		}
	}
}

/// Operator notification
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NotifyConfig {
	/// Command receiving the message on stdin, e.g. `sendmail -t`
	pub command: Option<String>,

	pub recipients: Vec<String>,

	pub subject_prefix: String,
}

impl Default for NotifyConfig {
	fn default() -> Self {
		NotifyConfig { command: None, recipients: vec![], subject_prefix: "[labsync]".to_string() }
	}
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LogConfig {
	/// Optional log file, rotated daily
	pub file: Option<PathBuf>,
}

/// One experiment type of the dataset manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentConfig {
	/// Experiment token as it appears in WEPV names
	pub name: String,

	/// Expected pseudocode prefix letter, `A` or `B`
	#[serde(default)]
	pub pseudocode_prefix: Option<String>,

	/// Registered waves, e.g. `9y`, `10m`
	#[serde(default)]
	pub waves: Vec<String>,

	/// Glob patterns every complete dataset must match at least once
	pub patterns: Vec<String>,
}

impl Config {
	/// Load and validate a configuration file
	pub fn load(path: &Path) -> Result<Config, ConfigError> {
		let display = path.display().to_string();
		let text = fs::read_to_string(path)
			.map_err(|e| ConfigError::Read { path: display.clone(), source: e })?;

		let config = match path.extension().and_then(|e| e.to_str()) {
			Some("json") | Some("json5") => Self::from_json5(&text),
			_ => Self::from_toml(&text),
		}
		.map_err(|message| ConfigError::Parse { path: display, message })?;

		config.validate()?;
		Ok(config)
	}

	pub fn from_toml(text: &str) -> Result<Config, String> {
		toml::from_str(text).map_err(|e| e.to_string())
	}

	pub fn from_json5(text: &str) -> Result<Config, String> {
		json5::from_str(text).map_err(|e| e.to_string())
	}

	/// Fail fast on missing or unusable settings
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.sync_root.is_none() {
			return Err(ConfigError::Missing { key: "syncRoot" });
		}
		if self.state_db.is_none() {
			return Err(ConfigError::Missing { key: "stateDb" });
		}
		if self.remote.root.is_none() {
			return Err(ConfigError::Missing { key: "remote.root" });
		}
		if self.remote.index_path.trim().is_empty() {
			return Err(ConfigError::Missing { key: "remote.indexPath" });
		}
		if self.remote.put_dir.trim().is_empty() {
			return Err(ConfigError::Missing { key: "remote.putDir" });
		}
		if self.test_mode && self.quarantine_dir.is_none() {
			return Err(ConfigError::Missing { key: "quarantineDir" });
		}
		if self.remote.max_auth_attempts == 0 {
			return Err(ConfigError::Invalid {
				key: "remote.maxAuthAttempts",
				message: "must be at least 1".to_string(),
			});
		}
		if self.hash_block_size == 0 {
			return Err(ConfigError::Invalid {
				key: "hashBlockSize",
				message: "must be positive".to_string(),
			});
		}
		if self.max_open_files == 0 {
			return Err(ConfigError::Invalid {
				key: "maxOpenFiles",
				message: "must be positive".to_string(),
			});
		}
		if self.upload_alert_threshold == 0 {
			return Err(ConfigError::Invalid {
				key: "uploadAlertThreshold",
				message: "must be positive".to_string(),
			});
		}
		for exp in &self.experiments {
			if exp.name.is_empty() || exp.patterns.is_empty() {
				return Err(ConfigError::Invalid {
					key: "experiments",
					message: format!("experiment '{}' needs a name and patterns", exp.name),
				});
			}
		}
		Ok(())
	}

	/// Sync root, after validation
	pub fn sync_root(&self) -> Result<&Path, ConfigError> {
		self.sync_root.as_deref().ok_or(ConfigError::Missing { key: "syncRoot" })
	}

	/// State database path, after validation
	pub fn state_db(&self) -> Result<&Path, ConfigError> {
		self.state_db.as_deref().ok_or(ConfigError::Missing { key: "stateDb" })
	}

	/// Directory holding the state database and the downloaded index
	pub fn state_dir(&self) -> Result<PathBuf, ConfigError> {
		let db = self.state_db()?;
		Ok(match db.parent() {
			Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
			_ => PathBuf::from("."),
		})
	}

	/// Local copy of the vault checksum index
	pub fn index_copy(&self) -> Result<PathBuf, ConfigError> {
		Ok(self.state_dir()?.join("checksums.txt"))
	}
}


// vim: ts=4
