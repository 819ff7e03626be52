//! Durable sync state backed by redb
//!
//! Three row tables (uploads, trash ledger, sync runs) keyed by auto-incrementing
//! ids, plus two lookup tables: `(relative path, checksum)` to upload id and
//! checksum to trash id. Every mutating call is its own write transaction, so a
//! crash mid-cycle leaves every unit either fully recorded or absent.
//!
//! redb holds an exclusive lock on the file while a [`StateStore`] is open; a
//! second cycle against the same store fails in [`StateStore::open`].

mod records;

pub use records::{NewSyncRun, NewTrash, NewUpload, SyncRunRecord, TrashRecord, UploadRecord};

use redb::{ReadableDatabase, ReadableTable, TableDefinition};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

use crate::error::StoreError;
use crate::logging::*;
use crate::path::RelPath;

type RowTable = TableDefinition<'static, u64, &'static [u8]>;

const UPLOADS: &str = "uploads";
const TRASH: &str = "trash";
const SYNC_RUNS: &str = "sync_runs";

/// Key: id, value: serialized UploadRecord
const UPLOADS_TABLE: RowTable = TableDefinition::new(UPLOADS);

/// Key: id, value: serialized TrashRecord
const TRASH_TABLE: RowTable = TableDefinition::new(TRASH);

/// Key: id, value: serialized SyncRunRecord
const SYNC_RUNS_TABLE: RowTable = TableDefinition::new(SYNC_RUNS);

/// Key: "<relative path>\t<checksum>", value: upload id
const UPLOAD_KEYS_TABLE: TableDefinition<&str, u64> = TableDefinition::new("upload_keys");

/// Key: checksum, value: id of the first trash record with it
const TRASH_CHECKSUMS_TABLE: TableDefinition<&str, u64> = TableDefinition::new("trash_checksums");

fn upload_key(rel: &RelPath, checksum: &str) -> String {
	format!("{}\t{}", rel, checksum)
}

fn encode<T: Serialize>(row: &T) -> Result<Vec<u8>, StoreError> {
	serde_json::to_vec(row).map_err(StoreError::Encode)
}

fn decode<T: DeserializeOwned>(table: &'static str, id: u64, bytes: &[u8]) -> Result<T, StoreError> {
	serde_json::from_slice(bytes).map_err(|source| StoreError::Decode { table, id, source })
}

/// Handle on the state database
pub struct StateStore {
	db: redb::Database,
}

impl StateStore {
	/// Open or create the store; creating the tables is idempotent
	pub fn open(path: &Path) -> Result<Self, StoreError> {
		if let Some(parent) = path.parent() {
			if !parent.as_os_str().is_empty() {
				std::fs::create_dir_all(parent).map_err(|e| StoreError::Open {
					path: path.display().to_string(),
					source: Box::new(e),
				})?;
			}
		}
		let db = redb::Database::create(path).map_err(|e| StoreError::Open {
			path: path.display().to_string(),
			source: Box::new(e),
		})?;

		let write_txn = db.begin_write()?;
		{
			let _ = write_txn.open_table(UPLOADS_TABLE)?;
			let _ = write_txn.open_table(TRASH_TABLE)?;
			let _ = write_txn.open_table(SYNC_RUNS_TABLE)?;
			let _ = write_txn.open_table(UPLOAD_KEYS_TABLE)?;
			let _ = write_txn.open_table(TRASH_CHECKSUMS_TABLE)?;
		}
		write_txn.commit()?;
		debug!("Opened state store {}", path.display());

		Ok(StateStore { db })
	}

	fn rows<T: DeserializeOwned>(&self, def: RowTable, name: &'static str) -> Result<Vec<T>, StoreError> {
		let read_txn = self.db.begin_read()?;
		let table = read_txn.open_table(def)?;
		let mut rows = Vec::new();
		for entry in table.iter()? {
			let (key, value) = entry?;
			rows.push(decode(name, key.value(), value.value())?);
		}
		Ok(rows)
	}

	fn row<T: DeserializeOwned>(
		&self,
		def: RowTable,
		name: &'static str,
		id: u64,
	) -> Result<Option<T>, StoreError> {
		let read_txn = self.db.begin_read()?;
		let table = read_txn.open_table(def)?;
		let row = match table.get(id)? {
			Some(value) => Some(decode(name, id, value.value())?),
			None => None,
		};
		Ok(row)
	}

	/// Read-modify-write of one row in its own transaction
	fn update_row<T, F>(
		&self,
		def: RowTable,
		name: &'static str,
		id: u64,
		apply: F,
	) -> Result<T, StoreError>
	where
		T: Serialize + DeserializeOwned,
		F: FnOnce(&mut T),
	{
		let write_txn = self.db.begin_write()?;
		let row = {
			let mut table = write_txn.open_table(def)?;
			let mut row: T = match table.get(id)? {
				Some(value) => decode(name, id, value.value())?,
				None => return Err(StoreError::MissingRow { table: name, id }),
			};
			apply(&mut row);
			let bytes = encode(&row)?;
			table.insert(id, bytes.as_slice())?;
			row
		};
		write_txn.commit()?;
		Ok(row)
	}

	fn next_id(table: &impl ReadableTable<u64, &'static [u8]>) -> Result<u64, StoreError> {
		Ok(match table.last()? {
			Some((key, _)) => key.value() + 1,
			None => 1,
		})
	}

	// ------------------------------------------------------------------
	// Uploads
	// ------------------------------------------------------------------

	/// Record a first upload with counter 1
	pub fn insert_upload(&self, new: &NewUpload) -> Result<UploadRecord, StoreError> {
		let write_txn = self.db.begin_write()?;
		let record = {
			let mut table = write_txn.open_table(UPLOADS_TABLE)?;
			let id = Self::next_id(&table)?;
			let record = UploadRecord {
				id,
				full_path: new.full_path.clone(),
				rel_path: new.rel_path.clone(),
				uploaded_at: new.uploaded_at,
				checksum: new.checksum.clone(),
				algorithm: new.algorithm,
				count: 1,
			};
			let bytes = encode(&record)?;
			table.insert(id, bytes.as_slice())?;

			let mut keys = write_txn.open_table(UPLOAD_KEYS_TABLE)?;
			keys.insert(upload_key(&record.rel_path, &record.checksum).as_str(), id)?;
			record
		};
		write_txn.commit()?;
		Ok(record)
	}

	/// Look up by (relative path, checksum)
	pub fn find_upload(&self, rel: &RelPath, checksum: &str) -> Result<Option<UploadRecord>, StoreError> {
		let id = {
			let read_txn = self.db.begin_read()?;
			let keys = read_txn.open_table(UPLOAD_KEYS_TABLE)?;
			let found = keys.get(upload_key(rel, checksum).as_str())?.map(|v| v.value());
			found
		};
		match id {
			Some(id) => self.row(UPLOADS_TABLE, UPLOADS, id),
			None => Ok(None),
		}
	}

	/// Is there any upload record for this relative path?
	pub fn has_upload_for(&self, rel: &RelPath) -> Result<bool, StoreError> {
		let lo = format!("{}\t", rel);
		let hi = format!("{}\n", rel);
		let read_txn = self.db.begin_read()?;
		let keys = read_txn.open_table(UPLOAD_KEYS_TABLE)?;
		let mut range = keys.range(lo.as_str()..hi.as_str())?;
		Ok(range.next().transpose()?.is_some())
	}

	/// Count one more successful upload and refresh the timestamp
	pub fn record_reupload(&self, id: u64, now: u64) -> Result<UploadRecord, StoreError> {
		self.update_row(UPLOADS_TABLE, UPLOADS, id, |row: &mut UploadRecord| {
			row.count += 1;
			row.uploaded_at = now;
		})
	}

	/// Newest upload timestamp over all records
	pub fn latest_upload_time(&self) -> Result<Option<u64>, StoreError> {
		let uploads: Vec<UploadRecord> = self.rows(UPLOADS_TABLE, UPLOADS)?;
		Ok(uploads.iter().map(|u| u.uploaded_at).max())
	}

	pub fn uploads(&self) -> Result<Vec<UploadRecord>, StoreError> {
		self.rows(UPLOADS_TABLE, UPLOADS)
	}

	/// Records uploaded at least `threshold` times
	pub fn uploads_at_least(&self, threshold: u32) -> Result<Vec<UploadRecord>, StoreError> {
		let mut uploads = self.uploads()?;
		uploads.retain(|u| u.count >= threshold);
		Ok(uploads)
	}

	// ------------------------------------------------------------------
	// Trash ledger
	// ------------------------------------------------------------------

	/// Insert a pending record
	pub fn insert_trash(&self, new: &NewTrash) -> Result<TrashRecord, StoreError> {
		let write_txn = self.db.begin_write()?;
		let record = {
			let mut table = write_txn.open_table(TRASH_TABLE)?;
			let id = Self::next_id(&table)?;
			let record = TrashRecord {
				id,
				entrance: new.entrance,
				exit: None,
				checksum: new.checksum.clone(),
				algorithm: new.algorithm,
				path: new.path.clone(),
				original_path: new.original_path.clone(),
				os: new.os.clone(),
				workstation: new.workstation.clone(),
				trashed: false,
				withheld: false,
			};
			let bytes = encode(&record)?;
			table.insert(id, bytes.as_slice())?;

			let mut checksums = write_txn.open_table(TRASH_CHECKSUMS_TABLE)?;
			let indexed = checksums.get(record.checksum.as_str())?.is_some();
			if !indexed {
				checksums.insert(record.checksum.as_str(), id)?;
			}
			record
		};
		write_txn.commit()?;
		Ok(record)
	}

	pub fn find_trash_by_checksum(&self, checksum: &str) -> Result<Option<TrashRecord>, StoreError> {
		let id = {
			let read_txn = self.db.begin_read()?;
			let checksums = read_txn.open_table(TRASH_CHECKSUMS_TABLE)?;
			let found = checksums.get(checksum)?.map(|v| v.value());
			found
		};
		match id {
			Some(id) => self.row(TRASH_TABLE, TRASH, id),
			None => Ok(None),
		}
	}

	pub fn trash_records(&self) -> Result<Vec<TrashRecord>, StoreError> {
		self.rows(TRASH_TABLE, TRASH)
	}

	pub fn pending_trash(&self) -> Result<Vec<TrashRecord>, StoreError> {
		let mut records = self.trash_records()?;
		records.retain(|r| !r.trashed);
		Ok(records)
	}

	pub fn eligible_trash(&self) -> Result<Vec<TrashRecord>, StoreError> {
		let mut records = self.trash_records()?;
		records.retain(|r| r.trashed);
		Ok(records)
	}

	/// Pending to eligible
	pub fn mark_eligible(&self, id: u64, exit: u64) -> Result<TrashRecord, StoreError> {
		self.update_row(TRASH_TABLE, TRASH, id, |row: &mut TrashRecord| {
			row.trashed = true;
			row.exit = Some(exit);
		})
	}

	pub fn set_withheld(&self, id: u64, withheld: bool) -> Result<TrashRecord, StoreError> {
		self.update_row(TRASH_TABLE, TRASH, id, |row: &mut TrashRecord| {
			row.withheld = withheld;
		})
	}

	/// (pending, eligible)
	pub fn trash_counts(&self) -> Result<(usize, usize), StoreError> {
		let records = self.trash_records()?;
		let eligible = records.iter().filter(|r| r.trashed).count();
		Ok((records.len() - eligible, eligible))
	}

	// ------------------------------------------------------------------
	// Sync runs
	// ------------------------------------------------------------------

	pub fn insert_run(&self, new: &NewSyncRun) -> Result<SyncRunRecord, StoreError> {
		let write_txn = self.db.begin_write()?;
		let record = {
			let mut table = write_txn.open_table(SYNC_RUNS_TABLE)?;
			let id = Self::next_id(&table)?;
			let record = SyncRunRecord {
				id,
				started: new.started,
				ready: new.ready,
				workstation: new.workstation.clone(),
				version: new.version.clone(),
				uploads_done: new.uploads_done,
				trashes_done: new.trashes_done,
			};
			let bytes = encode(&record)?;
			table.insert(id, bytes.as_slice())?;
			record
		};
		write_txn.commit()?;
		Ok(record)
	}

	pub fn sync_runs(&self) -> Result<Vec<SyncRunRecord>, StoreError> {
		self.rows(SYNC_RUNS_TABLE, SYNC_RUNS)
	}

	/// Up to `limit` most recent runs, newest first
	pub fn recent_runs(&self, limit: usize) -> Result<Vec<SyncRunRecord>, StoreError> {
		let mut runs = self.sync_runs()?;
		runs.reverse();
		runs.truncate(limit);
		Ok(runs)
	}
}

/// Failed statements of one cycle
///
/// Store failures never stop a cycle. Each is logged where it happens and kept
/// here; a non-empty tally marks the cycle as errored.
#[derive(Debug, Default, Clone)]
pub struct StatementErrors {
	errors: Vec<String>,
}

impl StatementErrors {
	pub fn record(&mut self, context: &str, err: &StoreError) {
		error!("State store: {}: {}", context, err);
		self.errors.push(format!("{}: {}", context, err));
	}

	/// Keep `Ok` values, tally `Err`
	pub fn check<T>(&mut self, context: &str, result: Result<T, StoreError>) -> Option<T> {
		match result {
			Ok(v) => Some(v),
			Err(e) => {
				self.record(context, &e);
				None
			}
		}
	}

	pub fn is_empty(&self) -> bool {
		self.errors.is_empty()
	}

	pub fn len(&self) -> usize {
		self.errors.len()
	}

	pub fn into_messages(self) -> Vec<String> {
		self.errors
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::checksum::Algorithm;
	use tempfile::TempDir;

	fn rel(s: &str) -> RelPath {
		RelPath::parse(s).unwrap()
	}

	fn new_upload(path: &str, checksum: &str, at: u64) -> NewUpload {
		NewUpload {
			full_path: format!("/data/{}", path),
			rel_path: rel(path),
			uploaded_at: at,
			checksum: checksum.to_string(),
			algorithm: Algorithm::Sha256,
		}
	}

	fn new_trash(path: &str, checksum: &str, at: u64) -> NewTrash {
		NewTrash {
			entrance: at,
			checksum: checksum.to_string(),
			algorithm: Algorithm::Sha256,
			path: rel(path),
			original_path: format!("/data/{}", path),
			os: "unix".to_string(),
			workstation: "MAC3".to_string(),
		}
	}

	#[test]
	fn test_open_is_idempotent() {
		let tmp = TempDir::new().unwrap();
		let path = tmp.path().join("state/labsync.redb");
		{
			let store = StateStore::open(&path).unwrap();
			store.insert_upload(&new_upload("A.txt", "h1", 10)).unwrap();
		}
		let store = StateStore::open(&path).unwrap();
		assert_eq!(store.uploads().unwrap().len(), 1);
	}

	#[test]
	fn test_second_open_is_refused() {
		let tmp = TempDir::new().unwrap();
		let path = tmp.path().join("labsync.redb");
		let _store = StateStore::open(&path).unwrap();
		assert!(matches!(StateStore::open(&path), Err(StoreError::Open { .. })));
	}

	#[test]
	fn test_upload_lookup_by_path_and_checksum() {
		let tmp = TempDir::new().unwrap();
		let store = StateStore::open(&tmp.path().join("s.redb")).unwrap();
		let first = store.insert_upload(&new_upload("set/A.txt", "h1", 10)).unwrap();
		assert_eq!(first.id, 1);
		assert_eq!(first.count, 1);

		assert!(store.has_upload_for(&rel("set/A.txt")).unwrap());
		assert!(!store.has_upload_for(&rel("set/A")).unwrap());
		assert!(!store.has_upload_for(&rel("set/A.txt2")).unwrap());
		assert_eq!(store.find_upload(&rel("set/A.txt"), "h1").unwrap(), Some(first.clone()));
		assert_eq!(store.find_upload(&rel("set/A.txt"), "h2").unwrap(), None);

		let again = store.record_reupload(first.id, 99).unwrap();
		assert_eq!(again.count, 2);
		assert_eq!(again.uploaded_at, 99);
		assert_eq!(store.latest_upload_time().unwrap(), Some(99));
	}

	#[test]
	fn test_uploads_at_least() {
		let tmp = TempDir::new().unwrap();
		let store = StateStore::open(&tmp.path().join("s.redb")).unwrap();
		let rec = store.insert_upload(&new_upload("A.txt", "h1", 1)).unwrap();
		store.insert_upload(&new_upload("B.txt", "h2", 1)).unwrap();
		for t in 2..6 {
			store.record_reupload(rec.id, t).unwrap();
		}
		let alerts = store.uploads_at_least(5).unwrap();
		assert_eq!(alerts.len(), 1);
		assert_eq!(alerts[0].rel_path, rel("A.txt"));
	}

	#[test]
	fn test_trash_lifecycle_rows() {
		let tmp = TempDir::new().unwrap();
		let store = StateStore::open(&tmp.path().join("s.redb")).unwrap();
		let rec = store.insert_trash(&new_trash("set/A.txt", "h1", 100)).unwrap();
		assert!(!rec.trashed);
		assert_eq!(store.find_trash_by_checksum("h1").unwrap().unwrap().id, rec.id);
		assert_eq!(store.trash_counts().unwrap(), (1, 0));

		let flipped = store.mark_eligible(rec.id, 200).unwrap();
		assert!(flipped.trashed);
		assert_eq!(flipped.exit, Some(200));
		assert_eq!(store.pending_trash().unwrap().len(), 0);
		assert_eq!(store.eligible_trash().unwrap().len(), 1);

		let held = store.set_withheld(rec.id, true).unwrap();
		assert!(held.withheld && held.trashed);
	}

	#[test]
	fn test_update_missing_row() {
		let tmp = TempDir::new().unwrap();
		let store = StateStore::open(&tmp.path().join("s.redb")).unwrap();
		assert!(matches!(store.mark_eligible(42, 1), Err(StoreError::MissingRow { id: 42, .. })));
	}

	#[test]
	fn test_runs_newest_first() {
		let tmp = TempDir::new().unwrap();
		let store = StateStore::open(&tmp.path().join("s.redb")).unwrap();
		for i in 0..3 {
			store
				.insert_run(&NewSyncRun {
					started: i,
					ready: i + 1,
					workstation: "MAC3".to_string(),
					version: "0.3.0".to_string(),
					uploads_done: i,
					trashes_done: 0,
				})
				.unwrap();
		}
		let recent = store.recent_runs(2).unwrap();
		assert_eq!(recent.iter().map(|r| r.started).collect::<Vec<_>>(), vec![2, 1]);
	}

	#[test]
	fn test_statement_errors() {
		let mut tally = StatementErrors::default();
		assert_eq!(tally.check("ok", Ok::<_, StoreError>(1)), Some(1));
		assert!(tally.is_empty());
		let err = StoreError::MissingRow { table: "trash", id: 3 };
		assert_eq!(tally.check::<()>("flip", Err(err)), None);
		assert_eq!(tally.len(), 1);
		assert!(tally.into_messages()[0].starts_with("flip:"));
	}
}

// vim: ts=4
