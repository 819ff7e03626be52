//! Immutable per-process context
//!
//! Built once at startup from a validated [`Config`] and passed by reference to the
//! cycle and its components.

use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::ConfigError;
use crate::logging::*;
use crate::manifest::Manifest;
use crate::path::join_remote;
use crate::scan::ScanFilter;
use crate::wepv::WepvClassifier;

pub struct SyncContext {
	pub config: Config,
	pub workstation_id: String,
	/// Operating system family recorded in the trash ledger
	pub os_family: String,
	pub version: String,
	pub classifier: WepvClassifier,
	pub manifest: Manifest,
	sync_root: PathBuf,
	state_db: PathBuf,
	index_copy: PathBuf,
}

impl SyncContext {
	/// Resolve the workstation from config or host name, then build the context
	pub fn new(config: Config) -> Result<Self, ConfigError> {
		let host = sysinfo::System::host_name().unwrap_or_default();
		let workstation_id = resolve_workstation(&config, &host)?;
		Self::with_workstation(config, workstation_id)
	}

	/// Build with a known workstation id
	pub fn with_workstation(config: Config, workstation_id: String) -> Result<Self, ConfigError> {
		config.validate()?;
		let manifest = Manifest::new(&config.experiments)?;
		let sync_root = config.sync_root()?.to_path_buf();
		let state_db = config.state_db()?.to_path_buf();
		let index_copy = config.index_copy()?;
		info!("Workstation {} ({})", workstation_id, std::env::consts::FAMILY);

		Ok(SyncContext {
			config,
			workstation_id,
			os_family: std::env::consts::FAMILY.to_string(),
			version: env!("CARGO_PKG_VERSION").to_string(),
			classifier: WepvClassifier::new(),
			manifest,
			sync_root,
			state_db,
			index_copy,
		})
	}

	pub fn sync_root(&self) -> &Path {
		&self.sync_root
	}

	pub fn state_db(&self) -> &Path {
		&self.state_db
	}

	/// Local copy of the downloaded vault index
	pub fn index_copy(&self) -> &Path {
		&self.index_copy
	}

	/// Remote directory receiving this workstation's uploads
	pub fn upload_dir(&self) -> String {
		join_remote(&self.config.remote.put_dir, &self.workstation_id)
	}

	/// Scan rules with the store, index copy, quarantine and log file excluded
	pub fn scan_filter(&self) -> ScanFilter {
		let mut excluded = vec![self.state_db.clone(), self.index_copy.clone()];
		if let Some(q) = &self.config.quarantine_dir {
			excluded.push(q.clone());
		}
		if let Some(log) = &self.config.log.file {
			excluded.push(log.clone());
		}
		ScanFilter::for_root(&self.sync_root, &excluded)
	}
}

/// Workstation id from `workstation.id` or the short host name
pub fn resolve_workstation(config: &Config, host: &str) -> Result<String, ConfigError> {
	if let Some(id) = &config.workstation.id {
		return Ok(id.clone());
	}
	let short = host.split('.').next().unwrap_or(host);
	config
		.workstation
		.hosts
		.iter()
		.find(|(name, _)| name.eq_ignore_ascii_case(short))
		.map(|(_, id)| id.clone())
		.ok_or_else(|| ConfigError::UnknownWorkstation { host: host.to_string() })
}


// vim: ts=4
