//! Local tree walk and bounded parallel hashing
//!
//! The walk uses the same inclusion rules everywhere: regular files only, no hidden
//! entries, no editor backups ending in `~`, and nothing below an excluded path
//! (state database, downloaded index, quarantine). The consistency check in
//! [`trash`](crate::trash) lists directory members with [`list_members`], which
//! is stricter: anything non-hidden on disk counts.

use futures::stream::{self, StreamExt};
use ignore::WalkBuilder;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::checksum::{hash_file, Algorithm, FileHash};
use crate::error::ChecksumError;
use crate::logging::*;
use crate::path::RelPath;

/// Inclusion rules for the sync root
#[derive(Debug, Clone, Default)]
pub struct ScanFilter {
	excluded: Vec<RelPath>,
}

impl ScanFilter {
	pub fn new(excluded: Vec<RelPath>) -> Self {
		ScanFilter { excluded }
	}

	/// Exclude the given native paths when they lie below `root`
	pub fn for_root(root: &Path, paths: &[PathBuf]) -> Self {
		let root = canonical(root);
		let excluded = paths.iter().filter_map(|p| RelPath::from_native(&root, &canonical(p))).collect();
		ScanFilter { excluded }
	}

	/// Name-level rule of the walk
	pub fn is_scannable_name(name: &str) -> bool {
		!name.starts_with('.') && !name.ends_with('~')
	}

	pub fn is_excluded(&self, rel: &RelPath) -> bool {
		self.excluded.iter().any(|ex| {
			rel == ex
				|| rel.as_str().strip_prefix(ex.as_str()).is_some_and(|rest| rest.starts_with('/'))
		})
	}

	/// Every scannable file below `root`, sorted
	pub fn walk(&self, root: &Path) -> Vec<RelPath> {
		let mut files = Vec::new();
		let walker = WalkBuilder::new(root)
			.standard_filters(false)
			.hidden(true)
			.follow_links(false)
			.build();

		for entry in walker {
			let entry = match entry {
				Ok(entry) => entry,
				Err(e) => {
					warn!("Skipping unreadable entry: {}", e);
					continue;
				}
			};
			if !entry.file_type().is_some_and(|t| t.is_file()) {
				continue;
			}
			let Some(rel) = RelPath::from_native(root, entry.path()) else {
				continue;
			};
			if !Self::is_scannable_name(rel.file_name()) || self.is_excluded(&rel) {
				continue;
			}
			files.push(rel);
		}
		files.sort();
		files
	}
}

/// Every non-hidden entry directly inside `dir`, sorted
///
/// Unlike the walk this keeps subdirectories, backups and anything else that is
/// not a scannable file, so a dataset directory only counts as fully archived
/// when nothing else lives in it.
pub fn list_members(root: &Path, dir: &RelPath) -> io::Result<Vec<RelPath>> {
	let mut members = Vec::new();
	for entry in fs::read_dir(dir.to_native(root))? {
		let name = entry?.file_name().to_string_lossy().into_owned();
		if name.starts_with('.') {
			continue;
		}
		if let Some(rel) = RelPath::parse(&format!("{}/{}", dir, name)) {
			members.push(rel);
		}
	}
	members.sort();
	Ok(members)
}

fn canonical(path: &Path) -> PathBuf {
	if let Ok(p) = path.canonicalize() {
		return p;
	}
	// Not created yet: resolve the parent and keep the name
	match (path.parent(), path.file_name()) {
		(Some(parent), Some(name)) => match parent.canonicalize() {
			Ok(p) => p.join(name),
			Err(_) => path.to_path_buf(),
		},
		_ => path.to_path_buf(),
	}
}

/// A file found under the sync root, with its SHA256 identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
	pub path: PathBuf,
	pub rel: RelPath,
	pub size: u64,
	pub sha256: String,
}

/// A file left out of this cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
	pub rel: RelPath,
	pub reason: String,
}

#[derive(Debug, Default)]
pub struct ScanOutcome {
	pub files: Vec<LocalFile>,
	pub skipped: Vec<Skipped>,
}

/// Hash `rels` with at most `max_open` files open at once
///
/// Results come back in completion order.
pub async fn hash_all(
	root: &Path,
	rels: Vec<RelPath>,
	algorithm: Algorithm,
	block_size: usize,
	max_open: usize,
) -> Vec<(RelPath, Result<FileHash, ChecksumError>)> {
	stream::iter(rels)
		.map(|rel| {
			let path = rel.to_native(root);
			async move {
				let display = path.display().to_string();
				let result = tokio::task::spawn_blocking(move || hash_file(&path, algorithm, block_size))
					.await
					.unwrap_or_else(|e| {
						Err(ChecksumError::Read { path: display, source: io::Error::other(e) })
					});
				(rel, result)
			}
		})
		.buffer_unordered(max_open.max(1))
		.collect()
		.await
}

/// Walk `root` and compute SHA256 for every scannable file
///
/// Files that vanish or cannot be read are reported in `skipped` with a warning.
/// The outcome is complete before it is returned.
pub async fn scan(
	root: &Path,
	filter: &ScanFilter,
	block_size: usize,
	max_open: usize,
) -> ScanOutcome {
	let walk_root = root.to_path_buf();
	let walk_filter = filter.clone();
	let rels = match tokio::task::spawn_blocking(move || walk_filter.walk(&walk_root)).await {
		Ok(rels) => rels,
		Err(e) => {
			error!("Directory walk failed: {}", e);
			return ScanOutcome::default();
		}
	};
	debug!("Hashing {} files below {}", rels.len(), root.display());

	let mut outcome = ScanOutcome::default();
	for (rel, result) in hash_all(root, rels, Algorithm::Sha256, block_size, max_open).await {
		match result {
			Ok(hash) => outcome.files.push(LocalFile {
				path: rel.to_native(root),
				rel,
				size: hash.size,
				sha256: hash.digest,
			}),
			Err(e) => {
				warn!("Skipping {}: {}", rel, e);
				outcome.skipped.push(Skipped { rel, reason: e.to_string() });
			}
		}
	}
	outcome.files.sort_by(|a, b| a.rel.cmp(&b.rel));
	outcome.skipped.sort_by(|a, b| a.rel.cmp(&b.rel));
	outcome
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	fn touch(root: &Path, rel: &str, content: &[u8]) {
		let path = root.join(rel);
		fs::create_dir_all(path.parent().unwrap()).unwrap();
		fs::write(path, content).unwrap();
	}

	#[test]
	fn test_walk_skips_hidden_backup_and_excluded() {
		let tmp = TempDir::new().unwrap();
		let root = tmp.path();
		touch(root, "set/a.csv", b"a");
		touch(root, "set/.hidden", b"h");
		touch(root, ".git/config", b"g");
		touch(root, "set/a.csv~", b"b");
		touch(root, "state.redb", b"db");
		touch(root, "quarantine/old.csv", b"q");

		let filter = ScanFilter::for_root(root, &[root.join("state.redb"), root.join("quarantine")]);
		let files = filter.walk(root);
		assert_eq!(files, vec![RelPath::parse("set/a.csv").unwrap()]);
	}

	#[test]
	fn test_excluded_paths_outside_root_are_ignored() {
		let tmp = TempDir::new().unwrap();
		let other = TempDir::new().unwrap();
		let filter = ScanFilter::for_root(tmp.path(), &[other.path().join("state.redb")]);
		assert!(filter.excluded.is_empty());
	}

	#[test]
	fn test_is_excluded_matches_prefix_by_segment() {
		let filter = ScanFilter::new(vec![RelPath::parse("quarantine").unwrap()]);
		assert!(filter.is_excluded(&RelPath::parse("quarantine/x").unwrap()));
		assert!(!filter.is_excluded(&RelPath::parse("quarantined/x").unwrap()));
	}

	#[test]
	fn test_list_members_keeps_subdirs_and_backups() {
		let tmp = TempDir::new().unwrap();
		let root = tmp.path();
		touch(root, "set/a.csv", b"a");
		touch(root, "set/a.csv~", b"b");
		touch(root, "set/.DS_Store", b"x");
		touch(root, "set/raw/c.txt", b"c");
		let members = list_members(root, &RelPath::parse("set").unwrap()).unwrap();
		let names: Vec<&str> = members.iter().map(|m| m.as_str()).collect();
		assert_eq!(names, vec!["set/a.csv", "set/a.csv~", "set/raw"]);
	}

	#[tokio::test]
	async fn test_scan_hashes_every_file() {
		let tmp = TempDir::new().unwrap();
		let root = tmp.path();
		touch(root, "A.txt", b"abc");
		touch(root, "dir/B.txt", b"abcd");

		let outcome = scan(root, &ScanFilter::default(), 7, 2).await;
		assert!(outcome.skipped.is_empty());
		assert_eq!(outcome.files.len(), 2);
		assert_eq!(outcome.files[0].rel.as_str(), "A.txt");
		assert_eq!(outcome.files[0].sha256, "ungWv48Bz+pBQUDeXa4iI7ADYaOWF3qctBD/YfIAFa0=");
		assert_eq!(outcome.files[1].size, 4);
	}

	#[tokio::test]
	async fn test_hash_all_reports_vanished_files() {
		let tmp = TempDir::new().unwrap();
		let results = hash_all(
			tmp.path(),
			vec![RelPath::parse("gone.bin").unwrap()],
			Algorithm::Md5,
			4096,
			4,
		)
		.await;
		assert_eq!(results.len(), 1);
		assert!(matches!(results[0].1, Err(ChecksumError::NotFound { .. })));
	}
}

// vim: ts=4
