//! Configuration files through to a ready context

use std::fs;
use tempfile::TempDir;

use labsync::config::Config;
use labsync::context::{resolve_workstation, SyncContext};
use labsync::error::ConfigError;
use labsync::wepv::WepvClassifier;

fn write_config(dir: &TempDir, name: &str, body: &str) -> std::path::PathBuf {
	let path = dir.path().join(name);
	fs::write(&path, body).unwrap();
	path
}

// ============================================================================
// TOML
// ============================================================================

#[test]
fn test_full_toml_config() {
	let dir = TempDir::new().unwrap();
	let path = write_config(
		&dir,
		"labsync.toml",
		r#"
syncRoot = "/data/lab"
stateDb = "/var/lib/labsync/state.redb"
testMode = true
quarantineDir = "/data/fake_trash"
uploadAlertThreshold = 3
maxOpenFiles = 2

[remote]
root = "/mnt/vault"
indexPath = "/vault/checksums.txt"
putDir = "/intake"
maxAuthAttempts = 5

[workstation]
id = "MAC3"

[timing]
reuploadDelaySecs = 3600
retentionSecs = 86400

[notify]
command = "sendmail -t"
recipients = ["datamanager@example.org"]

[log]
file = "/var/log/labsync/labsync.log"

[[experiments]]
name = "cyberball"
pseudocodePrefix = "A"
waves = ["9y"]
patterns = ["*settings.txt", "*.csv"]
"#,
	);

	let config = Config::load(&path).unwrap();
	assert!(config.test_mode);
	assert_eq!(config.upload_alert_threshold, 3);
	assert_eq!(config.remote.max_auth_attempts, 5);
	assert_eq!(config.timing.retention_secs, 86400);
	assert_eq!(config.notify.subject_prefix, "[labsync]");
	assert_eq!(config.experiments[0].pseudocode_prefix.as_deref(), Some("A"));

	let ctx = SyncContext::with_workstation(config, "MAC3".to_string()).unwrap();
	assert_eq!(ctx.upload_dir(), "/intake/MAC3");
	assert!(ctx.manifest.is_registered("cyberball"));
	// Configured experiments replace the built-in table
	assert!(!ctx.manifest.is_registered("trustgame"));
}

#[test]
fn test_missing_put_dir_fails_early() {
	let dir = TempDir::new().unwrap();
	let path = write_config(
		&dir,
		"labsync.toml",
		r#"
syncRoot = "/data/lab"
stateDb = "/var/lib/labsync/state.redb"
[remote]
root = "/mnt/vault"
indexPath = "/vault/checksums.txt"
"#,
	);
	assert!(matches!(Config::load(&path).unwrap_err(), ConfigError::Missing { key: "remote.putDir" }));
}

#[test]
fn test_bad_experiment_pattern() {
	let mut config = Config::from_toml(
		r#"
syncRoot = "/data/lab"
stateDb = "/var/lib/labsync/state.redb"
[remote]
root = "/mnt/vault"
indexPath = "/vault/checksums.txt"
putDir = "/intake"
[[experiments]]
name = "cyberball"
patterns = ["*[.csv"]
"#,
	)
	.unwrap();
	config.workstation.id = Some("MAC3".to_string());
	assert!(matches!(SyncContext::new(config), Err(ConfigError::Invalid { key: "experiments", .. })));
}

#[test]
fn test_missing_file() {
	let dir = TempDir::new().unwrap();
	let err = Config::load(&dir.path().join("nope.toml")).unwrap_err();
	assert!(matches!(err, ConfigError::Read { .. }));
}

// ============================================================================
// Workstation identity
// ============================================================================

#[test]
fn test_host_lookup_ignores_domain_and_case() {
	let config = Config::from_toml(
		r#"
[workstation.hosts]
Goofy = "MAC3"
"#,
	)
	.unwrap();
	assert_eq!(resolve_workstation(&config, "GOOFY.lab.example.org").unwrap(), "MAC3");
	assert!(matches!(
		resolve_workstation(&config, "mickey"),
		Err(ConfigError::UnknownWorkstation { .. })
	));
}

#[test]
fn test_workstation_tag_in_wepv_names() {
	let w = WepvClassifier::new().classify("a02980_9Y_Cyberball_20160706_1432_MAC3").unwrap();
	assert_eq!(w.pseudocode, "A02980");
	assert_eq!(w.wave, "9y");
	assert_eq!(w.experiment, "cyberball");
	assert_eq!(w.tag, "MAC3");
}

// vim: ts=4
