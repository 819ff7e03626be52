//! Rows of the state store
//!
//! Rows are JSON-encoded into redb byte values under short field names, the same
//! way the file cache encodes its entries.

use serde::{Deserialize, Serialize};

use crate::checksum::Algorithm;
use crate::path::RelPath;

/// One file pushed to the intake area
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRecord {
	#[serde(rename = "id")]
	pub id: u64,
	/// Native path at upload time
	#[serde(rename = "fp")]
	pub full_path: String,
	#[serde(rename = "rp")]
	pub rel_path: RelPath,
	/// Last successful upload
	#[serde(rename = "ts")]
	pub uploaded_at: u64,
	#[serde(rename = "ck")]
	pub checksum: String,
	#[serde(rename = "al")]
	pub algorithm: Algorithm,
	/// Number of successful uploads, at least 1
	#[serde(rename = "ct")]
	pub count: u32,
}

#[derive(Debug, Clone)]
pub struct NewUpload {
	pub full_path: String,
	pub rel_path: RelPath,
	pub uploaded_at: u64,
	pub checksum: String,
	pub algorithm: Algorithm,
}

/// Ledger entry of a vault-matched file
///
/// `trashed == false` is the pending state; `trashed == true` means cleared for
/// removal, with `exit` set. Rows are never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrashRecord {
	#[serde(rename = "id")]
	pub id: u64,
	/// First time the checksum matched the vault
	#[serde(rename = "en")]
	pub entrance: u64,
	/// When the record became eligible
	#[serde(rename = "ex")]
	pub exit: Option<u64>,
	#[serde(rename = "ck")]
	pub checksum: String,
	#[serde(rename = "al")]
	pub algorithm: Algorithm,
	#[serde(rename = "pt")]
	pub path: RelPath,
	/// Native path as seen by the workstation
	#[serde(rename = "op")]
	pub original_path: String,
	#[serde(rename = "os")]
	pub os: String,
	#[serde(rename = "ws")]
	pub workstation: String,
	#[serde(rename = "tr")]
	pub trashed: bool,
	/// Eligible, but kept on disk by the dataset consistency check
	#[serde(rename = "wh", default)]
	pub withheld: bool,
}

#[derive(Debug, Clone)]
pub struct NewTrash {
	pub entrance: u64,
	pub checksum: String,
	pub algorithm: Algorithm,
	pub path: RelPath,
	pub original_path: String,
	pub os: String,
	pub workstation: String,
}

/// Audit row written once per cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRunRecord {
	#[serde(rename = "id")]
	pub id: u64,
	#[serde(rename = "st")]
	pub started: u64,
	#[serde(rename = "rd")]
	pub ready: u64,
	#[serde(rename = "ws")]
	pub workstation: String,
	#[serde(rename = "vr")]
	pub version: String,
	#[serde(rename = "up")]
	pub uploads_done: u64,
	#[serde(rename = "tr")]
	pub trashes_done: u64,
}

#[derive(Debug, Clone)]
pub struct NewSyncRun {
	pub started: u64,
	pub ready: u64,
	pub workstation: String,
	pub version: String,
	pub uploads_done: u64,
	pub trashes_done: u64,
}

// vim: ts=4
