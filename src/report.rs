//! Outcome of one reconciliation cycle

use serde::Serialize;
use std::fmt;
use uuid::Uuid;

use crate::path::RelPath;

/// Operator-facing summary of a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Posture {
	/// Everything applied, nothing to review
	Clean,
	/// Files withheld or flagged; human review needed
	Warned,
	/// State store statements failed
	Errored,
}

impl fmt::Display for Posture {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Posture::Clean => write!(f, "clean"),
			Posture::Warned => write!(f, "warned"),
			Posture::Errored => write!(f, "errored"),
		}
	}
}

/// Known checksum found under a different name (warnlist 1)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenameAnomaly {
	pub current: RelPath,
	pub recorded: RelPath,
	pub recorded_original: String,
}

/// Why a file was kept on disk (warnlist 2)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum WithholdReason {
	/// Directory holds entries that are not cleared for removal
	PartialSet { directory: RelPath, eligible: usize, on_disk: usize },
	/// Directory holds a renamed copy of a known checksum
	RenameInSet { directory: RelPath },
	/// Directory could not be listed
	Unlistable { directory: RelPath, message: String },
	/// File on disk no longer matches its ledger checksum
	ContentChanged,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Withheld {
	pub path: RelPath,
	pub reason: WithholdReason,
}

/// Upload record that keeps being pushed without reaching the vault
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadAlert {
	pub path: RelPath,
	pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedUpload {
	pub path: RelPath,
	pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
	pub path: RelPath,
	pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IncompleteSet {
	pub directory: RelPath,
	pub missing: Vec<String>,
}

/// Everything a cycle did and everything it refused to do
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
	pub run_id: Uuid,
	pub workstation: String,
	pub started: u64,
	pub finished: u64,
	pub test_mode: bool,

	pub uploaded: Vec<RelPath>,
	pub reuploaded: Vec<RelPath>,
	pub failed_uploads: Vec<FailedUpload>,
	/// Reuploads held back by the reupload delay
	pub suppressed_reuploads: usize,
	/// Seconds until reuploads are allowed again
	pub reupload_wait: Option<u64>,
	pub bytes_uploaded: u64,
	pub bytes_reuploaded: u64,
	pub standing_alerts: Vec<UploadAlert>,

	/// New pending ledger entries
	pub registered: usize,
	/// Records flipped to eligible this cycle
	pub promoted: usize,
	/// Files deleted, or moved to quarantine in test mode
	pub removed: Vec<RelPath>,
	pub removal_failures: Vec<FailedUpload>,
	pub rename_anomalies: Vec<RenameAnomaly>,
	pub withheld: Vec<Withheld>,
	pub resurrections: Vec<RelPath>,
	pub incomplete_sets: Vec<IncompleteSet>,

	pub skipped: Vec<SkippedFile>,
	pub db_errors: Vec<String>,
	pub interrupted: bool,
}

impl CycleReport {
	pub fn new(run_id: Uuid, workstation: &str, started: u64, test_mode: bool) -> Self {
		CycleReport {
			run_id,
			workstation: workstation.to_string(),
			started,
			finished: started,
			test_mode,
			uploaded: vec![],
			reuploaded: vec![],
			failed_uploads: vec![],
			suppressed_reuploads: 0,
			reupload_wait: None,
			bytes_uploaded: 0,
			bytes_reuploaded: 0,
			standing_alerts: vec![],
			registered: 0,
			promoted: 0,
			removed: vec![],
			removal_failures: vec![],
			rename_anomalies: vec![],
			withheld: vec![],
			resurrections: vec![],
			incomplete_sets: vec![],
			skipped: vec![],
			db_errors: vec![],
			interrupted: false,
		}
	}

	pub fn has_warnings(&self) -> bool {
		!self.rename_anomalies.is_empty()
			|| !self.withheld.is_empty()
			|| !self.resurrections.is_empty()
			|| !self.failed_uploads.is_empty()
			|| !self.removal_failures.is_empty()
			|| !self.standing_alerts.is_empty()
			|| self.interrupted
	}

	pub fn posture(&self) -> Posture {
		if !self.db_errors.is_empty() {
			Posture::Errored
		} else if self.has_warnings() {
			Posture::Warned
		} else {
			Posture::Clean
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn report() -> CycleReport {
		CycleReport::new(Uuid::new_v4(), "MAC3", 100, false)
	}

	#[test]
	fn test_clean_by_default() {
		assert_eq!(report().posture(), Posture::Clean);
	}

	#[test]
	fn test_withheld_files_warn() {
		let mut r = report();
		r.withheld.push(Withheld {
			path: RelPath::parse("set/a.csv").unwrap(),
			reason: WithholdReason::ContentChanged,
		});
		assert_eq!(r.posture(), Posture::Warned);
	}

	#[test]
	fn test_db_errors_dominate() {
		let mut r = report();
		r.interrupted = true;
		r.db_errors.push("insert upload: commit failed".to_string());
		assert_eq!(r.posture(), Posture::Errored);
	}

	#[test]
	fn test_json_report_shape() {
		let mut r = report();
		let dir = RelPath::parse("set").unwrap();
		r.removed.push(RelPath::parse("loose.csv").unwrap());
		r.withheld.push(Withheld {
			path: RelPath::parse("set/a.csv").unwrap(),
			reason: WithholdReason::PartialSet { directory: dir, eligible: 1, on_disk: 2 },
		});
		let json = serde_json::to_value(&r).unwrap();
		assert_eq!(json["workstation"], "MAC3");
		assert_eq!(json["removed"][0], "loose.csv");
		assert_eq!(json["withheld"][0]["path"], "set/a.csv");
		assert_eq!(json["withheld"][0]["reason"]["kind"], "partialSet");
		assert_eq!(json["withheld"][0]["reason"]["on_disk"], 2);
		assert_eq!(json["dbErrors"], serde_json::json!([]));
	}

	#[test]
	fn test_posture_display() {
		assert_eq!(Posture::Warned.to_string(), "warned");
	}
}

// vim: ts=4
