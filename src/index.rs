//! Vault checksum index
//!
//! The vault publishes one line per archived file:
//!
//! ```text
//! # comment
//! sha2 ungWv48Bz+pBQUDeXa4iI7ADYaOWF3qctBD/YfIAFa0= 3 /vault/set/A.txt
//! md5 900150983cd24fb0d6963f7d28e17f72 3 /vault/set/B.txt
//! ```
//!
//! The remote path is the rest of the line and may contain spaces.

use std::fs;
use std::io;
use std::path::Path;

use crate::checksum::Algorithm;
use crate::logging::*;

/// One line of the index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteIndexEntry {
	pub algorithm: Algorithm,
	pub digest: String,
	pub size: u64,
	pub remote_path: String,
}

/// Parsed index, with per-algorithm digest lists sorted for merging
#[derive(Debug, Default, Clone)]
pub struct RemoteIndex {
	entries: Vec<RemoteIndexEntry>,
	md5: Vec<String>,
	sha256: Vec<String>,
	ignored: usize,
}

fn next_token(s: &str) -> Option<(&str, &str)> {
	let s = s.trim_start();
	if s.is_empty() {
		return None;
	}
	match s.find(char::is_whitespace) {
		Some(end) => Some((&s[..end], &s[end..])),
		None => Some((s, "")),
	}
}

fn parse_line(line: &str) -> Option<RemoteIndexEntry> {
	let (tag, rest) = next_token(line)?;
	let (digest, rest) = next_token(rest)?;
	let (size, rest) = next_token(rest)?;
	let remote_path = rest.trim();
	if remote_path.is_empty() {
		return None;
	}
	Some(RemoteIndexEntry {
		algorithm: Algorithm::from_tag(tag)?,
		digest: digest.to_string(),
		size: size.parse().ok()?,
		remote_path: remote_path.to_string(),
	})
}

impl RemoteIndex {
	pub fn parse(text: &str) -> Self {
		let mut index = RemoteIndex::default();
		for (lineno, line) in text.lines().enumerate() {
			let trimmed = line.trim();
			if trimmed.is_empty() || trimmed.starts_with('#') {
				continue;
			}
			match parse_line(trimmed) {
				Some(entry) => index.push(entry),
				None => {
					debug!("Ignoring index line {}: {}", lineno + 1, trimmed);
					index.ignored += 1;
				}
			}
		}
		index.finish();
		index
	}

	/// Read and parse a downloaded index file
	pub fn load(path: &Path) -> io::Result<Self> {
		let text = fs::read_to_string(path)?;
		Ok(Self::parse(&text))
	}

	pub fn from_entries(entries: Vec<RemoteIndexEntry>) -> Self {
		let mut index = RemoteIndex::default();
		for entry in entries {
			index.push(entry);
		}
		index.finish();
		index
	}

	fn push(&mut self, entry: RemoteIndexEntry) {
		match entry.algorithm {
			Algorithm::Md5 => self.md5.push(entry.digest.clone()),
			Algorithm::Sha256 => self.sha256.push(entry.digest.clone()),
		}
		self.entries.push(entry);
	}

	fn finish(&mut self) {
		self.md5.sort_unstable();
		self.md5.dedup();
		self.sha256.sort_unstable();
		self.sha256.dedup();
	}

	/// Sorted, de-duplicated digests of one algorithm
	pub fn digests(&self, algorithm: Algorithm) -> &[String] {
		match algorithm {
			Algorithm::Md5 => &self.md5,
			Algorithm::Sha256 => &self.sha256,
		}
	}

	pub fn contains(&self, algorithm: Algorithm, digest: &str) -> bool {
		self.digests(algorithm).binary_search_by(|d| d.as_str().cmp(digest)).is_ok()
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Lines that were neither comments nor valid entries
	pub fn ignored(&self) -> usize {
		self.ignored
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const SAMPLE: &str = "\
# vault index
sha2 h2 100 /vault/set/B.txt
md5 m1 42 /vault/set/C.csv
sha256 h1 100 /vault/set/with space.txt

crc32 deadbeef 1 /vault/ignored.bin
sha2 h1 100 /vault/copy/A.txt
sha2 broken
";

	#[test]
	fn test_parse_partitions_by_algorithm() {
		let index = RemoteIndex::parse(SAMPLE);
		assert_eq!(index.len(), 4);
		assert_eq!(index.digests(Algorithm::Sha256), &["h1".to_string(), "h2".to_string()]);
		assert_eq!(index.digests(Algorithm::Md5), &["m1".to_string()]);
		assert_eq!(index.ignored(), 2);
	}

	#[test]
	fn test_remote_path_keeps_spaces() {
		let entry = parse_line("sha256 h1 100 /vault/set/with space.txt").unwrap();
		assert_eq!(entry.algorithm, Algorithm::Sha256);
		assert_eq!(entry.remote_path, "/vault/set/with space.txt");
		assert_eq!(entry.size, 100);
	}

	#[test]
	fn test_contains() {
		let index = RemoteIndex::parse(SAMPLE);
		assert!(index.contains(Algorithm::Sha256, "h1"));
		assert!(!index.contains(Algorithm::Md5, "h1"));
		assert!(index.contains(Algorithm::Md5, "m1"));
	}

	#[test]
	fn test_empty_index() {
		let index = RemoteIndex::parse("# nothing archived yet\n");
		assert!(index.is_empty());
		assert!(index.digests(Algorithm::Sha256).is_empty());
	}
}

// vim: ts=4
