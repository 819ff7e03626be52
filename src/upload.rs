//! First-upload and reupload policy
//!
//! A file is *new* when the store has no upload record for its relative path; new
//! files are always pushed. Known files are pushed again only when the newest
//! upload across all records is at least `reupload_delay` old. The window is global:
//! one recent upload holds back every reupload of the cycle.

use std::collections::HashSet;

use crate::checksum::Algorithm;
use crate::clock::Clock;
use crate::logging::*;
use crate::reconcile::Candidate;
use crate::remote::RemoteStorage;
use crate::report::{CycleReport, FailedUpload, UploadAlert};
use crate::store::{NewUpload, StateStore, StatementErrors};
use crate::utils::CancelFlag;

/// Applies the upload rules to a cycle's upload candidates
pub struct UploadPolicy<'a> {
	pub store: &'a StateStore,
	pub remote: &'a dyn RemoteStorage,
	pub clock: &'a dyn Clock,
	pub cancel: &'a CancelFlag,
	/// Remote directory receiving this workstation's files
	pub upload_dir: String,
	pub reupload_delay: u64,
}

impl UploadPolicy<'_> {
	/// Seconds left in the reupload window, or None when reuploads may proceed
	///
	/// Must be called before the cycle's first upload.
	pub fn reupload_wait(&self, errors: &mut StatementErrors) -> Option<u64> {
		let latest = errors.check("read newest upload time", self.store.latest_upload_time())??;
		let age = self.clock.now().saturating_sub(latest);
		(age < self.reupload_delay).then(|| self.reupload_delay - age)
	}

	/// Upload every candidate the rules allow
	///
	/// Each upload and its store write form one unit; the cancel flag is checked
	/// before each unit. Upload failures are itemised and left for the next cycle.
	pub async fn apply(
		&self,
		candidates: &[Candidate],
		report: &mut CycleReport,
		errors: &mut StatementErrors,
	) {
		let wait = self.reupload_wait(errors);
		report.reupload_wait = wait;

		for (done, candidate) in candidates.iter().enumerate() {
			if self.cancel.is_cancelled() {
				warn!("Upload loop interrupted, {} candidates not processed", candidates.len() - done);
				report.interrupted = true;
				break;
			}
			let rel = candidate.rel();

			let Some(known) = errors.check("look up upload record", self.store.has_upload_for(rel)) else {
				continue;
			};
			if known && wait.is_some() {
				report.suppressed_reuploads += 1;
				continue;
			}

			let remote_path = rel.to_remote(&self.upload_dir);
			let parent = match rel.parent() {
				Some(dir) => dir.to_remote(&self.upload_dir),
				None => self.upload_dir.clone(),
			};
			let sent = match self.remote.mkdirs(&parent).await {
				Ok(()) => self.remote.upload(&candidate.file.path, &remote_path).await,
				Err(e) => Err(e),
			};
			let size = match sent {
				Ok(size) => size,
				Err(e) => {
					warn!("Upload of {} failed: {}", rel, e);
					report.failed_uploads.push(FailedUpload { path: rel.clone(), message: e.to_string() });
					continue;
				}
			};

			let now = self.clock.now();
			let new = NewUpload {
				full_path: candidate.file.path.display().to_string(),
				rel_path: rel.clone(),
				uploaded_at: now,
				checksum: candidate.file.sha256.clone(),
				algorithm: Algorithm::Sha256,
			};
			let recorded = if known {
				match errors.check("find upload record", self.store.find_upload(rel, &new.checksum)) {
					Some(Some(record)) => {
						errors.check("count reupload", self.store.record_reupload(record.id, now))
					}
					// Content changed under a known name
					Some(None) => errors.check("insert upload record", self.store.insert_upload(&new)),
					None => None,
				}
			} else {
				errors.check("insert upload record", self.store.insert_upload(&new))
			};

			match recorded {
				Some(record) => debug!("Uploaded {} (count {})", rel, record.count),
				None => error!("{} was uploaded but not recorded; check the intake manually", rel),
			}
			if known {
				report.reuploaded.push(rel.clone());
				report.bytes_reuploaded += size;
			} else {
				report.uploaded.push(rel.clone());
				report.bytes_uploaded += size;
			}
		}

		if report.suppressed_reuploads > 0 {
			if let Some(wait) = wait {
				info!(
					"Held back {} reuploads, next reupload window in {}h {}m",
					report.suppressed_reuploads,
					wait / 3600,
					(wait % 3600) / 60
				);
			}
		}
	}
}

/// Upload records pushed `threshold` times or more that still have not reached the vault
///
/// A record stops alerting once its file is gone from disk or its checksum shows up
/// among this cycle's trash candidates.
pub fn standing_alerts(
	store: &StateStore,
	trash_candidates: &[Candidate],
	threshold: u32,
	errors: &mut StatementErrors,
) -> Vec<UploadAlert> {
	let Some(records) = errors.check("read upload alerts", store.uploads_at_least(threshold)) else {
		return vec![];
	};
	let archived: HashSet<&str> = trash_candidates.iter().map(|c| c.file.sha256.as_str()).collect();

	let mut alerts = Vec::new();
	for record in records {
		if archived.contains(record.checksum.as_str()) {
			continue;
		}
		if !std::path::Path::new(&record.full_path).exists() {
			continue;
		}
		warn!("{} uploaded {} times without reaching the vault", record.rel_path, record.count);
		alerts.push(UploadAlert { path: record.rel_path, count: record.count });
	}
	alerts
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::clock::ManualClock;
	use crate::path::RelPath;
	use crate::remote::FsRemote;
	use crate::scan::LocalFile;
	use std::fs;
	use tempfile::TempDir;
	use uuid::Uuid;

	const DAY: u64 = 24 * 3600;

	struct Fixture {
		local: TempDir,
		remote_dir: TempDir,
		_state: TempDir,
		store: StateStore,
		remote: FsRemote,
		clock: ManualClock,
		cancel: CancelFlag,
	}

	impl Fixture {
		fn new() -> Self {
			let local = TempDir::new().unwrap();
			let remote_dir = TempDir::new().unwrap();
			let state = TempDir::new().unwrap();
			let store = StateStore::open(&state.path().join("state.redb")).unwrap();
			let remote = FsRemote::new(remote_dir.path().to_path_buf());
			Fixture {
				local,
				remote_dir,
				_state: state,
				store,
				remote,
				clock: ManualClock::new(1_000_000),
				cancel: CancelFlag::new(),
			}
		}

		fn policy(&self) -> UploadPolicy<'_> {
			UploadPolicy {
				store: &self.store,
				remote: &self.remote,
				clock: &self.clock,
				cancel: &self.cancel,
				upload_dir: "/intake/MAC3".to_string(),
				reupload_delay: DAY,
			}
		}

		fn candidate(&self, rel: &str, content: &[u8], digest: &str) -> Candidate {
			let rel = RelPath::parse(rel).unwrap();
			let path = rel.to_native(self.local.path());
			fs::create_dir_all(path.parent().unwrap()).unwrap();
			fs::write(&path, content).unwrap();
			Candidate {
				file: LocalFile { path, rel, size: content.len() as u64, sha256: digest.to_string() },
				digest: digest.to_string(),
				algorithm: Algorithm::Sha256,
			}
		}

		async fn run(&self, candidates: &[Candidate]) -> (CycleReport, StatementErrors) {
			let mut report = CycleReport::new(Uuid::new_v4(), "MAC3", self.clock.now(), false);
			let mut errors = StatementErrors::default();
			self.policy().apply(candidates, &mut report, &mut errors).await;
			(report, errors)
		}
	}

	#[tokio::test]
	async fn test_new_file_is_uploaded_and_recorded() {
		let fx = Fixture::new();
		let c = fx.candidate("set/a.csv", b"abc", "h1");
		let (report, errors) = fx.run(&[c]).await;

		assert!(errors.is_empty());
		assert_eq!(report.uploaded.len(), 1);
		assert_eq!(report.bytes_uploaded, 3);
		assert!(fx.remote_dir.path().join("intake/MAC3/set/a.csv").is_file());
		let record = fx.store.find_upload(&RelPath::parse("set/a.csv").unwrap(), "h1").unwrap().unwrap();
		assert_eq!(record.count, 1);
	}

	#[tokio::test]
	async fn test_reupload_suppressed_inside_window() {
		let fx = Fixture::new();
		let c = fx.candidate("a.csv", b"abc", "h1");
		fx.run(std::slice::from_ref(&c)).await;

		fx.clock.advance(DAY - 1);
		let (report, _) = fx.run(std::slice::from_ref(&c)).await;
		assert!(report.reuploaded.is_empty());
		assert_eq!(report.suppressed_reuploads, 1);
		assert_eq!(report.reupload_wait, Some(1));
		let record = fx.store.find_upload(c.rel(), "h1").unwrap().unwrap();
		assert_eq!(record.count, 1);
	}

	#[tokio::test]
	async fn test_reupload_after_window_counts() {
		let fx = Fixture::new();
		let c = fx.candidate("a.csv", b"abc", "h1");
		fx.run(std::slice::from_ref(&c)).await;

		fx.clock.advance(DAY);
		let (report, _) = fx.run(std::slice::from_ref(&c)).await;
		assert_eq!(report.reuploaded.len(), 1);
		assert_eq!(report.bytes_reuploaded, 3);
		let record = fx.store.find_upload(c.rel(), "h1").unwrap().unwrap();
		assert_eq!(record.count, 2);
		assert_eq!(record.uploaded_at, fx.clock.now());
	}

	#[tokio::test]
	async fn test_changed_content_gets_fresh_record() {
		let fx = Fixture::new();
		let c = fx.candidate("a.csv", b"abc", "h1");
		fx.run(&[c]).await;

		fx.clock.advance(DAY);
		let changed = fx.candidate("a.csv", b"abcd", "h2");
		fx.run(&[changed]).await;
		assert_eq!(fx.store.uploads().unwrap().len(), 2);
		let record = fx.store.find_upload(&RelPath::parse("a.csv").unwrap(), "h2").unwrap().unwrap();
		assert_eq!(record.count, 1);
	}

	#[tokio::test]
	async fn test_new_files_ignore_window() {
		let fx = Fixture::new();
		fx.run(&[fx.candidate("a.csv", b"abc", "h1")]).await;
		let (report, _) = fx.run(&[fx.candidate("b.csv", b"xyz", "h2")]).await;
		assert_eq!(report.uploaded.len(), 1);
	}

	#[tokio::test]
	async fn test_failed_upload_is_itemised() {
		let fx = Fixture::new();
		let c = fx.candidate("a.csv", b"abc", "h1");
		fs::remove_file(&c.file.path).unwrap();
		let (report, _) = fx.run(&[c]).await;
		assert_eq!(report.failed_uploads.len(), 1);
		assert!(fx.store.uploads().unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_cancel_stops_before_next_unit() {
		let fx = Fixture::new();
		fx.cancel.cancel();
		let (report, _) = fx.run(&[fx.candidate("a.csv", b"abc", "h1")]).await;
		assert!(report.interrupted);
		assert!(report.uploaded.is_empty());
	}

	#[tokio::test]
	async fn test_standing_alerts() {
		let fx = Fixture::new();
		let c = fx.candidate("a.csv", b"abc", "h1");
		for _ in 0..5 {
			fx.run(std::slice::from_ref(&c)).await;
			fx.clock.advance(DAY);
		}
		let mut errors = StatementErrors::default();
		let alerts = standing_alerts(&fx.store, &[], 5, &mut errors);
		assert_eq!(alerts, vec![UploadAlert { path: c.rel().clone(), count: 5 }]);

		// Reached the vault
		assert!(standing_alerts(&fx.store, std::slice::from_ref(&c), 5, &mut errors).is_empty());

		// Gone from disk
		fs::remove_file(&c.file.path).unwrap();
		assert!(standing_alerts(&fx.store, &[], 5, &mut errors).is_empty());
	}
}

// vim: ts=4
