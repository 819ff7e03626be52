//! Normalized relative paths
//!
//! All reasoning inside the engine happens on [`RelPath`], a slash-delimited path
//! relative to the sync root. Conversion to native paths happens only when touching
//! the local filesystem or the remote client.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Slash-delimited path relative to the sync root
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelPath(String);

impl RelPath {
	/// Build from a native path below `root`
	///
	/// Returns `None` when `path` is not inside `root` or escapes it through `..`.
	pub fn from_native(root: &Path, path: &Path) -> Option<Self> {
		let rel = path.strip_prefix(root).ok()?;
		let mut parts = Vec::new();
		for component in rel.components() {
			match component {
				Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
				Component::CurDir => {}
				_ => return None,
			}
		}
		if parts.is_empty() {
			return None;
		}
		Some(RelPath(parts.join("/")))
	}

	/// Parse a slash or backslash delimited string, dropping empty and `.` segments
	pub fn parse(raw: &str) -> Option<Self> {
		let mut parts = Vec::new();
		for part in raw.split(['/', '\\']) {
			match part {
				"" | "." => {}
				".." => return None,
				p => parts.push(p),
			}
		}
		if parts.is_empty() {
			return None;
		}
		Some(RelPath(parts.join("/")))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Last segment
	pub fn file_name(&self) -> &str {
		match self.0.rsplit_once('/') {
			Some((_, name)) => name,
			None => &self.0,
		}
	}

	/// Everything before the last segment, `None` at top level
	pub fn parent(&self) -> Option<RelPath> {
		self.0.rsplit_once('/').map(|(dir, _)| RelPath(dir.to_string()))
	}

	/// Name of the directory directly containing this path
	pub fn parent_name(&self) -> Option<&str> {
		let (dir, _) = self.0.rsplit_once('/')?;
		Some(match dir.rsplit_once('/') {
			Some((_, name)) => name,
			None => dir,
		})
	}

	/// Native path below `root`
	pub fn to_native(&self, root: &Path) -> PathBuf {
		let mut path = root.to_path_buf();
		for part in self.0.split('/') {
			path.push(part);
		}
		path
	}

	/// Remote path below a slash-delimited remote base
	pub fn to_remote(&self, base: &str) -> String {
		join_remote(base, &self.0)
	}
}

impl fmt::Display for RelPath {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Join two remote path fragments with exactly one slash between them
pub fn join_remote(base: &str, rest: &str) -> String {
	let base = base.trim_end_matches('/');
	let rest = rest.trim_start_matches('/');
	if base.is_empty() {
		format!("/{}", rest)
	} else if rest.is_empty() {
		base.to_string()
	} else {
		format!("{}/{}", base, rest)
	}
}


// vim: ts=4
