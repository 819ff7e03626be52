//! Physical removal of retired files

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::logging::*;
use crate::path::RelPath;

/// What happens to a file cleared for removal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteMode {
	/// Unlink the file
	Remove,
	/// Move the file below this directory, keeping its relative path
	Quarantine(PathBuf),
}

impl DeleteMode {
	pub fn from_config(config: &Config) -> Self {
		match (&config.quarantine_dir, config.test_mode) {
			(Some(dir), true) => DeleteMode::Quarantine(dir.clone()),
			_ => DeleteMode::Remove,
		}
	}

	pub fn is_destructive(&self) -> bool {
		matches!(self, DeleteMode::Remove)
	}
}

/// Removes files below the sync root
pub struct DeleteHandler {
	root: PathBuf,
	mode: DeleteMode,
}

impl DeleteHandler {
	pub fn new(root: &Path, mode: DeleteMode) -> Self {
		DeleteHandler { root: root.to_path_buf(), mode }
	}

	pub fn mode(&self) -> &DeleteMode {
		&self.mode
	}

	/// Where a quarantined file ends up
	///
	/// Returns None in remove mode
	pub fn quarantine_path_for(&self, rel: &RelPath) -> Option<PathBuf> {
		match &self.mode {
			DeleteMode::Quarantine(dir) => Some(rel.to_native(dir)),
			DeleteMode::Remove => None,
		}
	}

	/// Delete or quarantine one file
	pub fn dispose(&self, rel: &RelPath) -> io::Result<()> {
		let path = rel.to_native(&self.root);
		match self.quarantine_path_for(rel) {
			None => {
				fs::remove_file(&path)?;
				debug!("Removed {}", path.display());
			}
			Some(target) => {
				if let Some(parent) = target.parent() {
					fs::create_dir_all(parent)?;
				}
				if let Err(e) = fs::rename(&path, &target) {
					// Quarantine may live on another filesystem
					debug!("Rename into quarantine failed ({}), copying instead", e);
					fs::copy(&path, &target)?;
					fs::remove_file(&path)?;
				}
				debug!("Quarantined {} -> {}", path.display(), target.display());
			}
		}
		Ok(())
	}

	/// Remove `dir` if nothing is left in it
	///
	/// Returns true when the directory was removed
	pub fn remove_empty_dir(&self, dir: &RelPath) -> io::Result<bool> {
		let path = dir.to_native(&self.root);
		if fs::read_dir(&path)?.next().is_some() {
			return Ok(false);
		}
		fs::remove_dir(&path)?;
		debug!("Removed empty directory {}", path.display());
		Ok(true)
	}
}


// vim: ts=4
