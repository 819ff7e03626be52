//! Local inventory against the vault index
//!
//! Every scanned file ends up in exactly one of two sets: upload candidates (the
//! vault has never seen its content) or trash candidates (the vault holds its
//! content under either algorithm). SHA256 is tried first; MD5 is only computed
//! for files the SHA256 list does not contain, and only when the index carries
//! MD5 entries at all.

use std::collections::HashMap;
use std::path::Path;

use crate::checksum::Algorithm;
use crate::index::RemoteIndex;
use crate::logging::*;
use crate::path::RelPath;
use crate::scan::{hash_all, LocalFile, Skipped};

/// A classified local file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
	pub file: LocalFile,
	/// Digest that decided the classification
	pub digest: String,
	pub algorithm: Algorithm,
}

impl Candidate {
	pub fn rel(&self) -> &RelPath {
		&self.file.rel
	}
}

#[derive(Debug, Default)]
pub struct Reconciliation {
	pub upload: Vec<Candidate>,
	pub trash: Vec<Candidate>,
	/// Files that disappeared between the SHA256 and MD5 passes
	pub skipped: Vec<Skipped>,
}

/// Split `local` into (absent, present) with a sorted two-pointer merge
///
/// `remote` must be sorted and de-duplicated. Equal digests advance only the local
/// cursor so several local copies of one archived file all match.
pub fn merge_partition<T>(
	mut local: Vec<(String, T)>,
	remote: &[String],
) -> (Vec<(String, T)>, Vec<(String, T)>) {
	local.sort_by(|a, b| a.0.cmp(&b.0));

	let mut absent = Vec::new();
	let mut present = Vec::new();
	let mut r = 0;
	for item in local {
		while r < remote.len() && remote[r].as_str() < item.0.as_str() {
			r += 1;
		}
		if r < remote.len() && remote[r] == item.0 {
			present.push(item);
		} else {
			absent.push(item);
		}
	}
	(absent, present)
}

fn candidates(items: Vec<(String, LocalFile)>, algorithm: Algorithm) -> Vec<Candidate> {
	items.into_iter().map(|(digest, file)| Candidate { file, digest, algorithm }).collect()
}

/// Classify a completed scan against the index
pub async fn reconcile(
	root: &Path,
	files: Vec<LocalFile>,
	index: &RemoteIndex,
	block_size: usize,
	max_open: usize,
) -> Reconciliation {
	let mut result = Reconciliation::default();

	let keyed: Vec<(String, LocalFile)> =
		files.into_iter().map(|f| (f.sha256.clone(), f)).collect();
	let (absent, present) = merge_partition(keyed, index.digests(Algorithm::Sha256));
	result.trash.extend(candidates(present, Algorithm::Sha256));

	if index.digests(Algorithm::Md5).is_empty() || absent.is_empty() {
		result.upload.extend(absent.into_iter().map(|(_, file)| Candidate {
			digest: file.sha256.clone(),
			file,
			algorithm: Algorithm::Sha256,
		}));
	} else {
		debug!("Computing MD5 for {} files not found by SHA256", absent.len());
		let mut pending: HashMap<RelPath, LocalFile> =
			absent.into_iter().map(|(_, f)| (f.rel.clone(), f)).collect();
		let rels = pending.keys().cloned().collect();

		let mut keyed = Vec::new();
		for (rel, hash) in hash_all(root, rels, Algorithm::Md5, block_size, max_open).await {
			let Some(file) = pending.remove(&rel) else {
				continue;
			};
			match hash {
				Ok(hash) => keyed.push((hash.digest, file)),
				Err(e) => {
					warn!("Skipping {}: {}", rel, e);
					result.skipped.push(Skipped { rel, reason: e.to_string() });
				}
			}
		}

		let (absent, present) = merge_partition(keyed, index.digests(Algorithm::Md5));
		result.trash.extend(candidates(present, Algorithm::Md5));
		result.upload.extend(absent.into_iter().map(|(_, file)| Candidate {
			digest: file.sha256.clone(),
			file,
			algorithm: Algorithm::Sha256,
		}));
	}

	result.upload.sort_by(|a, b| a.file.rel.cmp(&b.file.rel));
	result.trash.sort_by(|a, b| a.file.rel.cmp(&b.file.rel));
	result
}


// vim: ts=4
