//! Streaming file checksums
//!
//! Files are read in fixed-size blocks so memory use does not depend on file size.
//! SHA256 digests are base64-encoded and MD5 digests hex-encoded, matching the
//! notation of the vault's checksum index.

use base64::Engine;
use md5::Md5;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use crate::error::ChecksumError;

/// Default read block size in bytes
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

/// Supported checksum algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Algorithm {
	#[serde(rename = "md5")]
	Md5,
	#[serde(rename = "sha2")]
	Sha256,
}

impl Algorithm {
	/// Short tag used in the remote index and the state store
	pub fn tag(self) -> &'static str {
		match self {
			Algorithm::Md5 => "md5",
			Algorithm::Sha256 => "sha2",
		}
	}

	/// Upper-case name used in hash strings
	pub fn name(self) -> &'static str {
		match self {
			Algorithm::Md5 => "MD5",
			Algorithm::Sha256 => "SHA256",
		}
	}

	/// Recognize an index tag (`md5`, `sha2`, `sha256`, ...)
	pub fn from_tag(tag: &str) -> Option<Self> {
		let tag = tag.to_ascii_lowercase();
		if tag.contains("sha") {
			Some(Algorithm::Sha256)
		} else if tag.contains("md") {
			Some(Algorithm::Md5)
		} else {
			None
		}
	}
}

impl FromStr for Algorithm {
	type Err = ChecksumError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_uppercase().as_str() {
			"SHA256" | "SHA2" | "SHA-256" => Ok(Algorithm::Sha256),
			"MD5" | "MD-5" => Ok(Algorithm::Md5),
			_ => Err(ChecksumError::UnsupportedAlgorithm { selector: s.to_string() }),
		}
	}
}

impl fmt::Display for Algorithm {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

/// Content hash of one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHash {
	pub algorithm: Algorithm,
	pub digest: String,
	pub size: u64,
}

impl fmt::Display for FileHash {
	/// `"<ALGO> <digest> <byte_size>"`
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} {} {}", self.algorithm.name(), self.digest, self.size)
	}
}

enum Hasher {
	Md5(Md5),
	Sha256(Sha256),
}

impl Hasher {
	fn new(algorithm: Algorithm) -> Self {
		match algorithm {
			Algorithm::Md5 => Hasher::Md5(Md5::new()),
			Algorithm::Sha256 => Hasher::Sha256(Sha256::new()),
		}
	}

	fn update(&mut self, block: &[u8]) {
		match self {
			Hasher::Md5(h) => h.update(block),
			Hasher::Sha256(h) => h.update(block),
		}
	}

	fn finish(self) -> String {
		match self {
			Hasher::Md5(h) => hex::encode(h.finalize()),
			Hasher::Sha256(h) => base64::engine::general_purpose::STANDARD.encode(h.finalize()),
		}
	}
}

/// Hash a file with `algorithm`, reading `block_size` bytes at a time
pub fn hash_file(
	path: &Path,
	algorithm: Algorithm,
	block_size: usize,
) -> Result<FileHash, ChecksumError> {
	let display = path.display().to_string();
	let meta = match fs::metadata(path) {
		Ok(meta) => meta,
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
			return Err(ChecksumError::NotFound { path: display });
		}
		Err(e) => return Err(ChecksumError::Read { path: display, source: e }),
	};

	let mut file =
		fs::File::open(path).map_err(|e| ChecksumError::Read { path: display.clone(), source: e })?;
	let mut hasher = Hasher::new(algorithm);
	let mut buf = vec![0u8; block_size.max(1)];
	loop {
		let n = file
			.read(&mut buf)
			.map_err(|e| ChecksumError::Read { path: display.clone(), source: e })?;
		if n == 0 {
			break;
		}
		hasher.update(&buf[..n]);
	}

	Ok(FileHash { algorithm, digest: hasher.finish(), size: meta.len() })
}

/// Hash a file and format it as `"<ALGO> <digest> <byte_size>"`
///
/// `selector` is parsed like a command line argument, so anything other than the
/// MD5 and SHA256 spellings fails with an unsupported-algorithm error.
pub fn hash_string(path: &Path, selector: &str) -> Result<String, ChecksumError> {
	let algorithm = selector.parse::<Algorithm>()?;
	if !path.exists() {
		return Err(ChecksumError::NotFound { path: path.display().to_string() });
	}
	Ok(hash_file(path, algorithm, DEFAULT_BLOCK_SIZE)?.to_string())
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;
	use tempfile::TempDir;

	fn write_file(dir: &TempDir, name: &str, content: &[u8]) -> std::path::PathBuf {
		let path = dir.path().join(name);
		let mut f = fs::File::create(&path).unwrap();
		f.write_all(content).unwrap();
		path
	}

	#[test]
	fn test_sha256_is_base64() {
		let tmp = TempDir::new().unwrap();
		let path = write_file(&tmp, "abc.txt", b"abc");
		let hash = hash_file(&path, Algorithm::Sha256, DEFAULT_BLOCK_SIZE).unwrap();
		assert_eq!(hash.digest, "ungWv48Bz+pBQUDeXa4iI7ADYaOWF3qctBD/YfIAFa0=");
		assert_eq!(hash.size, 3);
	}

	#[test]
	fn test_md5_is_hex() {
		let tmp = TempDir::new().unwrap();
		let path = write_file(&tmp, "abc.txt", b"abc");
		let hash = hash_file(&path, Algorithm::Md5, DEFAULT_BLOCK_SIZE).unwrap();
		assert_eq!(hash.digest, "900150983cd24fb0d6963f7d28e17f72");
	}

	#[test]
	fn test_block_size_does_not_change_digest() {
		let tmp = TempDir::new().unwrap();
		let content: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
		let path = write_file(&tmp, "big.bin", &content);
		let small = hash_file(&path, Algorithm::Sha256, 7).unwrap();
		let large = hash_file(&path, Algorithm::Sha256, 1 << 16).unwrap();
		assert_eq!(small, large);
		assert_eq!(small.size, 10_000);
	}

	#[test]
	fn test_hash_string_format() {
		let tmp = TempDir::new().unwrap();
		let path = write_file(&tmp, "abc.txt", b"abc");
		let line = hash_string(&path, "MD5").unwrap();
		assert_eq!(line, "MD5 900150983cd24fb0d6963f7d28e17f72 3");
		let line = hash_string(&path, "sha256").unwrap();
		assert!(line.starts_with("SHA256 ungWv48B"));
		assert!(line.ends_with(" 3"));
	}

	#[test]
	fn test_missing_file_is_not_found() {
		let tmp = TempDir::new().unwrap();
		let err = hash_string(&tmp.path().join("nope"), "SHA256").unwrap_err();
		assert!(matches!(err, ChecksumError::NotFound { .. }));
	}

	#[test]
	fn test_unsupported_algorithm() {
		let tmp = TempDir::new().unwrap();
		let path = write_file(&tmp, "abc.txt", b"abc");
		let err = hash_string(&path, "CRC32").unwrap_err();
		assert!(matches!(err, ChecksumError::UnsupportedAlgorithm { .. }));
	}

	#[test]
	fn test_tags() {
		assert_eq!(Algorithm::from_tag("sha2"), Some(Algorithm::Sha256));
		assert_eq!(Algorithm::from_tag("MD5"), Some(Algorithm::Md5));
		assert_eq!(Algorithm::from_tag("crc"), None);
		assert_eq!(Algorithm::Sha256.tag(), "sha2");
	}
}

// vim: ts=4
