//! Operator notification after a cycle

use async_trait::async_trait;
use std::fmt::Write as _;
use std::io;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;

use crate::config::NotifyConfig;
use crate::logging::*;
use crate::report::{CycleReport, Posture, WithholdReason};

/// Composed message, ready to hand to a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
	pub subject: String,
	pub recipients: Vec<String>,
	pub body: String,
}

impl Notification {
	/// RFC 822 style text as accepted by `sendmail -t`
	pub fn to_message(&self) -> String {
		format!("To: {}\nSubject: {}\n\n{}", self.recipients.join(", "), self.subject, self.body)
	}
}

fn section<T>(body: &mut String, title: &str, items: &[T], line: impl Fn(&T) -> String) {
	if items.is_empty() {
		return;
	}
	let _ = writeln!(body, "\n{} ({}):", title, items.len());
	for item in items {
		let _ = writeln!(body, "  {}", line(item));
	}
}

/// Build the message for a finished cycle
pub fn compose(report: &CycleReport, config: &NotifyConfig) -> Notification {
	let posture = report.posture();
	let subject = format!("{} {}: cycle {}", config.subject_prefix, report.workstation, posture);

	let mut body = String::new();
	let _ = writeln!(body, "Workstation: {}", report.workstation);
	let _ = writeln!(body, "Run: {}", report.run_id);
	let _ = writeln!(body, "Posture: {}", posture);
	if report.test_mode {
		let _ = writeln!(body, "Test mode: retired files were quarantined");
	}
	if report.interrupted {
		let _ = writeln!(body, "The cycle was interrupted; trash phase skipped");
	}
	let _ = writeln!(
		body,
		"Uploaded {} ({} bytes), reuploaded {} ({} bytes), retired {}",
		report.uploaded.len(),
		report.bytes_uploaded,
		report.reuploaded.len(),
		report.bytes_reuploaded,
		report.removed.len()
	);

	if !report.db_errors.is_empty() {
		let _ = writeln!(body, "\nDATABASE ERRORS: {}", report.db_errors.len());
		for msg in &report.db_errors {
			let _ = writeln!(body, "  {}", msg);
		}
	}
	section(&mut body, "Renamed files (warnlist 1)", &report.rename_anomalies, |a| {
		format!("{} has the checksum of {} ({})", a.current, a.recorded, a.recorded_original)
	});
	section(&mut body, "Withheld from removal (warnlist 2)", &report.withheld, |w| match &w.reason {
		WithholdReason::PartialSet { eligible, on_disk, .. } => {
			format!("{}: {} of {} files cleared", w.path, eligible, on_disk)
		}
		WithholdReason::RenameInSet { .. } => format!("{}: renamed member in set", w.path),
		WithholdReason::Unlistable { message, .. } => format!("{}: {}", w.path, message),
		WithholdReason::ContentChanged => format!("{}: changed after matching the vault", w.path),
	});
	section(&mut body, "Back on disk after retirement", &report.resurrections, |p| p.to_string());
	section(&mut body, "Failed uploads", &report.failed_uploads, |f| format!("{}: {}", f.path, f.message));
	section(&mut body, "Failed removals", &report.removal_failures, |f| format!("{}: {}", f.path, f.message));
	section(&mut body, "Uploaded repeatedly without reaching the vault", &report.standing_alerts, |a| {
		format!("{} ({} times)", a.path, a.count)
	});
	section(&mut body, "Incomplete datasets", &report.incomplete_sets, |s| {
		format!("{}: missing {}", s.directory, s.missing.join(", "))
	});
	section(&mut body, "Skipped files", &report.skipped, |s| format!("{}: {}", s.path, s.reason));

	Notification { subject, recipients: config.recipients.clone(), body }
}

/// Delivers a notification
#[async_trait]
pub trait Notifier: Send + Sync {
	async fn send(&self, notification: &Notification) -> io::Result<()>;
}

/// Writes the message to the log
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
	async fn send(&self, notification: &Notification) -> io::Result<()> {
		warn!("{}\n{}", notification.subject, notification.body);
		Ok(())
	}
}

/// Pipes the message into an external command such as `sendmail -t`
pub struct CommandNotifier {
	program: String,
	args: Vec<String>,
}

impl CommandNotifier {
	/// Split a command line on whitespace; None when empty
	pub fn parse(command: &str) -> Option<Self> {
		let mut parts = command.split_whitespace().map(str::to_string);
		let program = parts.next()?;
		Some(CommandNotifier { program, args: parts.collect() })
	}
}

#[async_trait]
impl Notifier for CommandNotifier {
	async fn send(&self, notification: &Notification) -> io::Result<()> {
		let mut child = tokio::process::Command::new(&self.program)
			.args(&self.args)
			.stdin(Stdio::piped())
			.stdout(Stdio::null())
			.spawn()?;
		if let Some(mut stdin) = child.stdin.take() {
			stdin.write_all(notification.to_message().as_bytes()).await?;
		}
		let status = child.wait().await?;
		if !status.success() {
			return Err(io::Error::other(format!("{} exited with {}", self.program, status)));
		}
		Ok(())
	}
}

/// Transport for the configured command, or the log
pub fn notifier_from_config(config: &NotifyConfig) -> Box<dyn Notifier> {
	match config.command.as_deref().and_then(CommandNotifier::parse) {
		Some(notifier) => Box::new(notifier),
		None => Box::new(LogNotifier),
	}
}

/// Notify when the cycle needs attention; failures are logged only
pub async fn notify_if_needed(report: &CycleReport, config: &NotifyConfig, notifier: &dyn Notifier) {
	if report.posture() == Posture::Clean {
		return;
	}
	let notification = compose(report, config);
	match notifier.send(&notification).await {
		Ok(()) => debug!("Notification sent: {}", notification.subject),
		Err(e) => error!("Failed to send notification: {}", e),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::path::RelPath;
	use crate::report::{RenameAnomaly, Withheld};
	use std::sync::Mutex;
	use uuid::Uuid;

	struct Capture(Mutex<Vec<Notification>>);

	#[async_trait]
	impl Notifier for Capture {
		async fn send(&self, notification: &Notification) -> io::Result<()> {
			self.0.lock().unwrap().push(notification.clone());
			Ok(())
		}
	}

	struct Broken;

	#[async_trait]
	impl Notifier for Broken {
		async fn send(&self, _notification: &Notification) -> io::Result<()> {
			Err(io::Error::other("mail relay down"))
		}
	}

	fn rel(s: &str) -> RelPath {
		RelPath::parse(s).unwrap()
	}

	fn warned_report() -> CycleReport {
		let mut report = CycleReport::new(Uuid::new_v4(), "MAC3", 0, false);
		report.rename_anomalies.push(RenameAnomaly {
			current: rel("set/b.csv"),
			recorded: rel("set/a.csv"),
			recorded_original: "/data/set/a.csv".to_string(),
		});
		report.withheld.push(Withheld {
			path: rel("set/a.csv"),
			reason: WithholdReason::RenameInSet { directory: rel("set") },
		});
		report
	}

	#[test]
	fn test_compose_lists_both_warnlists() {
		let config = NotifyConfig { recipients: vec!["lab@example.org".to_string()], ..Default::default() };
		let n = compose(&warned_report(), &config);
		assert_eq!(n.subject, "[labsync] MAC3: cycle warned");
		assert!(n.body.contains("set/b.csv has the checksum of set/a.csv"));
		assert!(n.body.contains("Withheld from removal (warnlist 2) (1):"));
		assert!(n.to_message().starts_with("To: lab@example.org\nSubject: "));
	}

	#[tokio::test]
	async fn test_clean_cycle_sends_nothing() {
		let capture = Capture(Mutex::new(vec![]));
		let report = CycleReport::new(Uuid::new_v4(), "MAC3", 0, false);
		notify_if_needed(&report, &NotifyConfig::default(), &capture).await;
		assert!(capture.0.lock().unwrap().is_empty());

		notify_if_needed(&warned_report(), &NotifyConfig::default(), &capture).await;
		assert_eq!(capture.0.lock().unwrap().len(), 1);
	}

	#[tokio::test]
	async fn test_send_failure_is_not_fatal() {
		notify_if_needed(&warned_report(), &NotifyConfig::default(), &Broken).await;
	}

	#[test]
	fn test_parse_command() {
		let n = CommandNotifier::parse("sendmail -t -oi").unwrap();
		assert_eq!(n.program, "sendmail");
		assert_eq!(n.args, vec!["-t", "-oi"]);
		assert!(CommandNotifier::parse("   ").is_none());
	}

	#[cfg(unix)]
	#[tokio::test]
	async fn test_command_notifier_pipes_message() {
		let n = CommandNotifier::parse("cat").unwrap();
		n.send(&compose(&warned_report(), &NotifyConfig::default())).await.unwrap();
		let failing = CommandNotifier::parse("false").unwrap();
		assert!(failing.send(&compose(&warned_report(), &NotifyConfig::default())).await.is_err());
	}
}

// vim: ts=4
