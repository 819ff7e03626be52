//! One reconciliation cycle
//!
//! connect → download index → scan → reconcile → uploads → trash lifecycle →
//! audit row → report. Connection and index failures abort before anything local
//! is touched; everything after that is folded into the [`CycleReport`].

use tracing::Instrument;
use uuid::Uuid;

use crate::clock::Clock;
use crate::context::SyncContext;
use crate::delete::{DeleteHandler, DeleteMode};
use crate::error::SyncError;
use crate::index::RemoteIndex;
use crate::logging::*;
use crate::notify::{notify_if_needed, Notifier};
use crate::reconcile::reconcile;
use crate::remote::{connect_with_retry, CredentialProvider, RemoteConnector, RemoteStorage};
use crate::report::{CycleReport, SkippedFile};
use crate::scan::scan;
use crate::store::{NewSyncRun, StateStore, StatementErrors};
use crate::trash::TrashLifecycle;
use crate::upload::{standing_alerts, UploadPolicy};
use crate::utils::CancelFlag;

const MB: f64 = 1024.0 * 1024.0;

/// Collaborators of one cycle
pub struct Cycle<'a> {
	ctx: &'a SyncContext,
	store: &'a StateStore,
	remote: &'a dyn RemoteStorage,
	clock: &'a dyn Clock,
	cancel: CancelFlag,
}

impl<'a> Cycle<'a> {
	pub fn new(
		ctx: &'a SyncContext,
		store: &'a StateStore,
		remote: &'a dyn RemoteStorage,
		clock: &'a dyn Clock,
	) -> Self {
		Cycle { ctx, store, remote, clock, cancel: CancelFlag::new() }
	}

	/// Share an externally raised cancellation flag
	pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
		self.cancel = cancel;
		self
	}

	pub async fn run(&self) -> Result<CycleReport, SyncError> {
		let run_id = Uuid::new_v4();
		self.run_inner(run_id).instrument(info_span!("cycle", run = %run_id)).await
	}

	async fn run_inner(&self, run_id: Uuid) -> Result<CycleReport, SyncError> {
		let ctx = self.ctx;
		let config = &ctx.config;
		let root = ctx.sync_root();
		let started = self.clock.now();
		let mut report = CycleReport::new(run_id, &ctx.workstation_id, started, config.test_mode);
		let mut errors = StatementErrors::default();
		info!("Cycle started on {} ({})", ctx.workstation_id, root.display());

		let upload_dir = ctx.upload_dir();
		if !self.remote.exists(&upload_dir).await? {
			info!("Creating upload directory {}", upload_dir);
			self.remote.mkdir(&upload_dir).await?;
		}

		self.remote.download(&config.remote.index_path, ctx.index_copy()).await?;
		let index = RemoteIndex::load(ctx.index_copy())?;
		if index.ignored() > 0 {
			warn!("Vault index: {} entries, {} unreadable lines ignored", index.len(), index.ignored());
		} else {
			info!("Vault index: {} entries", index.len());
		}

		let filter = ctx.scan_filter();
		let outcome = scan(root, &filter, config.hash_block_size, config.max_open_files).await;
		let scanned = outcome.files.len();
		let recon = reconcile(root, outcome.files, &index, config.hash_block_size, config.max_open_files).await;
		report.skipped.extend(
			outcome
				.skipped
				.into_iter()
				.chain(recon.skipped)
				.map(|s| SkippedFile { path: s.rel, reason: s.reason }),
		);
		info!(
			"Scanned {} files: {} not in the vault, {} archived, {} skipped",
			scanned,
			recon.upload.len(),
			recon.trash.len(),
			report.skipped.len()
		);

		report.standing_alerts =
			standing_alerts(self.store, &recon.trash, config.upload_alert_threshold, &mut errors);

		let uploads = UploadPolicy {
			store: self.store,
			remote: self.remote,
			clock: self.clock,
			cancel: &self.cancel,
			upload_dir,
			reupload_delay: config.timing.reupload_delay_secs,
		};
		uploads.apply(&recon.upload, &mut report, &mut errors).await;

		if report.interrupted || self.cancel.is_cancelled() {
			report.interrupted = true;
			warn!("Interrupted, skipping the trash phase");
		} else {
			let deleter = DeleteHandler::new(root, DeleteMode::from_config(config));
			if !deleter.mode().is_destructive() {
				info!("Test mode: retired files are moved to quarantine");
			}
			let lifecycle = TrashLifecycle {
				ctx,
				store: self.store,
				clock: self.clock,
				deleter: &deleter,
				retention: config.timing.retention_secs,
			};
			lifecycle.apply(&recon.trash, &mut report, &mut errors);
		}

		report.finished = self.clock.now();
		let run = NewSyncRun {
			started,
			ready: report.finished,
			workstation: ctx.workstation_id.clone(),
			version: ctx.version.clone(),
			uploads_done: (report.uploaded.len() + report.reuploaded.len()) as u64,
			trashes_done: report.promoted as u64,
		};
		errors.check("insert sync run", self.store.insert_run(&run));
		report.db_errors = errors.into_messages();

		info!(
			"Uploaded {} files ({:.2} MB), reuploaded {} ({:.2} MB), retired {}, withheld {}",
			report.uploaded.len(),
			report.bytes_uploaded as f64 / MB,
			report.reuploaded.len(),
			report.bytes_reuploaded as f64 / MB,
			report.removed.len(),
			report.withheld.len()
		);
		info!("Cycle finished: {}", report.posture());
		Ok(report)
	}
}

/// Connect, run one cycle and notify the operator
///
/// The state store is opened for the duration of the cycle; a second process
/// holding it makes this fail before anything else happens.
pub async fn sync(
	ctx: &SyncContext,
	connector: &dyn RemoteConnector,
	credentials: &dyn CredentialProvider,
	clock: &dyn Clock,
	cancel: CancelFlag,
	notifier: &dyn Notifier,
) -> Result<CycleReport, SyncError> {
	let store = StateStore::open(ctx.state_db())?;
	let remote = connect_with_retry(connector, credentials, ctx.config.remote.max_auth_attempts).await?;
	let report = Cycle::new(ctx, &store, remote.as_ref(), clock).with_cancel(cancel).run().await?;
	notify_if_needed(&report, &ctx.config.notify, notifier).await;
	Ok(report)
}

// vim: ts=4
