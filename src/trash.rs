//! Trash lifecycle: retention ledger, anomaly detection, dataset consistency
//!
//! A vault-matched file enters the ledger as *pending*. Once
//! `now - entrance >= retention` the record flips to *eligible* and the file becomes
//! a deletion candidate. Before anything is removed, candidates are grouped by
//! their WEPV directory: a directory is only cleared when every entry on disk in it
//! is a candidate file and none of its members was seen under a new name. Anything
//! in doubt stays on disk and is reported.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::clock::Clock;
use crate::context::SyncContext;
use crate::delete::DeleteHandler;
use crate::logging::*;
use crate::manifest::SetStatus;
use crate::path::RelPath;
use crate::reconcile::Candidate;
use crate::report::{
	CycleReport, FailedUpload, IncompleteSet, RenameAnomaly, WithholdReason, Withheld,
};
use crate::scan::list_members;
use crate::store::{NewTrash, StateStore, StatementErrors, TrashRecord};

/// An eligible record whose file is still on disk and matches its ledger checksum
struct Removal {
	record: TrashRecord,
}

pub struct TrashLifecycle<'a> {
	pub ctx: &'a SyncContext,
	pub store: &'a StateStore,
	pub clock: &'a dyn Clock,
	pub deleter: &'a DeleteHandler,
	pub retention: u64,
}

impl TrashLifecycle<'_> {
	/// Run the whole lifecycle for one cycle's trash candidates
	pub fn apply(&self, candidates: &[Candidate], report: &mut CycleReport, errors: &mut StatementErrors) {
		let renamed = self.register(candidates, report, errors);
		let flipped = self.promote(report, errors);
		let removals = self.collect_removals(candidates, &flipped, report, errors);
		self.remove(removals, &renamed, report, errors);
	}

	/// Insert pending records for unseen checksums, flag known checksums under a new name
	///
	/// Returns the paths of renamed files.
	fn register(
		&self,
		candidates: &[Candidate],
		report: &mut CycleReport,
		errors: &mut StatementErrors,
	) -> HashSet<RelPath> {
		let now = self.clock.now();
		let mut renamed = HashSet::new();

		for candidate in candidates {
			let rel = candidate.rel();
			let existing = errors.check("look up trash checksum", self.store.find_trash_by_checksum(&candidate.digest));
			match existing {
				None => {}
				Some(None) => {
					let new = NewTrash {
						entrance: now,
						checksum: candidate.digest.clone(),
						algorithm: candidate.algorithm,
						path: rel.clone(),
						original_path: candidate.file.path.display().to_string(),
						os: self.ctx.os_family.clone(),
						workstation: self.ctx.workstation_id.clone(),
					};
					if errors.check("insert trash record", self.store.insert_trash(&new)).is_some() {
						debug!("Pending: {}", rel);
						report.registered += 1;
					}
				}
				Some(Some(record)) if record.path != *rel => {
					warn!("{} has the checksum of {} (recorded as {})", rel, record.path, record.original_path);
					report.rename_anomalies.push(RenameAnomaly {
						current: rel.clone(),
						recorded: record.path,
						recorded_original: record.original_path,
					});
					renamed.insert(rel.clone());
				}
				Some(Some(_)) => {}
			}
		}
		renamed
	}

	/// Flip pending records past the retention delta to eligible
	///
	/// Returns the ids flipped by this call.
	fn promote(&self, report: &mut CycleReport, errors: &mut StatementErrors) -> HashSet<u64> {
		let now = self.clock.now();
		let mut flipped = HashSet::new();
		let Some(pending) = errors.check("read pending trash", self.store.pending_trash()) else {
			return flipped;
		};

		for record in pending {
			if now.saturating_sub(record.entrance) < self.retention {
				continue;
			}
			if errors.check("mark trash eligible", self.store.mark_eligible(record.id, now)).is_some() {
				debug!("Eligible: {}", record.path);
				flipped.insert(record.id);
			}
		}
		report.promoted = flipped.len();
		flipped
	}

	/// Walk eligible records still on disk: deletion candidates, changed content, resurrections
	fn collect_removals(
		&self,
		candidates: &[Candidate],
		flipped: &HashSet<u64>,
		report: &mut CycleReport,
		errors: &mut StatementErrors,
	) -> Vec<Removal> {
		let Some(eligible) = errors.check("read eligible trash", self.store.eligible_trash()) else {
			return vec![];
		};
		let current: HashMap<&RelPath, &Candidate> = candidates.iter().map(|c| (c.rel(), c)).collect();

		let mut removals = Vec::new();
		for record in eligible {
			if !record.path.to_native(self.ctx.sync_root()).exists() {
				continue;
			}
			if !flipped.contains(&record.id) && !record.withheld {
				warn!("{} was retired earlier but is back on disk", record.path);
				report.resurrections.push(record.path.clone());
				continue;
			}

			let matches = current.get(&record.path).is_some_and(|c| c.digest == record.checksum);
			if matches {
				removals.push(Removal { record });
			} else {
				warn!("{} changed since it matched the vault, keeping it", record.path);
				if !record.withheld {
					errors.check("flag withheld trash", self.store.set_withheld(record.id, true));
				}
				report.withheld.push(Withheld { path: record.path, reason: WithholdReason::ContentChanged });
			}
		}
		removals
	}

	/// Consistency check per WEPV directory, then delete or quarantine
	fn remove(
		&self,
		removals: Vec<Removal>,
		renamed: &HashSet<RelPath>,
		report: &mut CycleReport,
		errors: &mut StatementErrors,
	) {
		let root = self.ctx.sync_root();
		let mut sets: BTreeMap<RelPath, Vec<Removal>> = BTreeMap::new();
		let mut loose = Vec::new();
		for removal in removals {
			match (removal.record.path.parent(), removal.record.path.parent_name()) {
				(Some(dir), Some(name)) if self.ctx.classifier.is_match(name) => {
					sets.entry(dir).or_default().push(removal);
				}
				_ => loose.push(removal),
			}
		}

		for (dir, members) in sets {
			let on_disk = match list_members(root, &dir) {
				Ok(files) => files,
				Err(e) => {
					warn!("Cannot list {}: {}", dir, e);
					let reason = WithholdReason::Unlistable { directory: dir.clone(), message: e.to_string() };
					let paths = members.iter().map(|m| m.record.path.clone()).collect();
					self.withhold(&members, paths, reason, report, errors);
					continue;
				}
			};

			let poisoned = renamed.iter().any(|r| r.parent().as_ref() == Some(&dir));
			let cleared: HashSet<&RelPath> = members.iter().map(|m| &m.record.path).collect();
			let complete = on_disk.len() == members.len() && on_disk.iter().all(|p| cleared.contains(p));
			if poisoned || !complete {
				let reason = if poisoned {
					WithholdReason::RenameInSet { directory: dir.clone() }
				} else {
					WithholdReason::PartialSet {
						directory: dir.clone(),
						eligible: members.len(),
						on_disk: on_disk.len(),
					}
				};
				warn!(
					"Keeping all {} files in {}: {} cleared for removal{}",
					on_disk.len(),
					dir,
					members.len(),
					if poisoned { ", renamed member" } else { "" }
				);
				self.withhold(&members, on_disk, reason, report, errors);
				continue;
			}

			if let Some(name) = self.ctx.classifier.classify(dir.file_name()) {
				if let SetStatus::Incomplete { missing } =
					self.ctx.manifest.evaluate(&name, on_disk.iter().map(|r| r.file_name()))
				{
					info!("{} is incomplete (missing {}), removing as archived", dir, missing.join(", "));
					report.incomplete_sets.push(IncompleteSet { directory: dir.clone(), missing });
				}
			}

			for member in &members {
				self.dispose(&member.record, report, errors);
			}
			match self.deleter.remove_empty_dir(&dir) {
				Ok(true) => debug!("Removed dataset directory {}", dir),
				Ok(false) => {}
				Err(e) => debug!("Could not remove {}: {}", dir, e),
			}
		}

		for removal in &loose {
			self.dispose(&removal.record, report, errors);
		}
	}

	fn withhold(
		&self,
		members: &[Removal],
		paths: Vec<RelPath>,
		reason: WithholdReason,
		report: &mut CycleReport,
		errors: &mut StatementErrors,
	) {
		for member in members {
			if !member.record.withheld {
				errors.check("flag withheld trash", self.store.set_withheld(member.record.id, true));
			}
		}
		for path in paths {
			report.withheld.push(Withheld { path, reason: reason.clone() });
		}
	}

	fn dispose(&self, record: &TrashRecord, report: &mut CycleReport, errors: &mut StatementErrors) {
		match self.deleter.dispose(&record.path) {
			Ok(()) => {
				info!("Retired {}", record.path);
				if record.withheld {
					errors.check("clear withheld trash", self.store.set_withheld(record.id, false));
				}
				report.removed.push(record.path.clone());
			}
			Err(e) => {
				warn!("Could not retire {}: {}", record.path, e);
				// Keep it a deletion candidate for the next cycle
				if !record.withheld {
					errors.check("flag withheld trash", self.store.set_withheld(record.id, true));
				}
				report.removal_failures.push(FailedUpload { path: record.path.clone(), message: e.to_string() });
			}
		}
	}
}


// vim: ts=4
