use clap::{Arg, ArgAction, Command};
use std::error::Error;
use std::{env, path, process};

use labsync::checksum::hash_string;
use labsync::clock::SystemClock;
use labsync::config::Config;
use labsync::context::SyncContext;
use labsync::cycle;
use labsync::logging::{self, *};
use labsync::manifest::survey;
use labsync::notify::notifier_from_config;
use labsync::prompt::TerminalCredentials;
use labsync::remote::{FsConnector, RemoteConnector};
use labsync::report::Posture;
use labsync::store::StateStore;
use labsync::utils::{setup_signal_handlers, CancelFlag};
use labsync::wepv::WepvClassifier;
use tracing_appender::non_blocking::WorkerGuard;

///////////////////////
// Utility functions //
///////////////////////

fn default_config_path() -> Result<path::PathBuf, Box<dyn Error>> {
	if let Ok(path) = env::var("LABSYNC_CONFIG") {
		return Ok(path::PathBuf::from(path));
	}
	match env::var("HOME") {
		Ok(home) => Ok(path::PathBuf::from(home).join(".labsync").join("config.toml")),
		Err(_e) => Err("Could not determine HOME directory, use --config".into()),
	}
}

fn load_config(matches: &clap::ArgMatches) -> Result<(Config, Option<WorkerGuard>), Box<dyn Error>> {
	let path = match matches.get_one::<String>("config") {
		Some(path) => path::PathBuf::from(path),
		None => default_config_path()?,
	};
	let config = Config::load(&path)?;
	let guard = logging::init_tracing(config.log.file.as_deref())?;
	debug!("Loaded configuration from {}", path.display());
	Ok((config, guard))
}

fn posture_exit_code(posture: Posture) -> i32 {
	match posture {
		Posture::Clean => 0,
		Posture::Warned => 1,
		Posture::Errored => 2,
	}
}

//////////////////
// Subcommands //
//////////////////

async fn run_sync(config: Config, user: Option<String>, json: bool) -> Result<i32, Box<dyn Error>> {
	let root = config.remote.root.clone().ok_or("remote.root is not configured")?;
	let connector = FsConnector::new(root);
	let credentials = TerminalCredentials::new(connector.location(), user);
	let notifier = notifier_from_config(&config.notify);

	// Re-validate after command line overrides
	config.validate()?;
	let ctx = SyncContext::new(config)?;

	let cancel = CancelFlag::new();
	setup_signal_handlers(cancel.clone());

	let report = cycle::sync(&ctx, &connector, &credentials, &SystemClock, cancel, notifier.as_ref()).await?;
	if json {
		println!("{}", serde_json::to_string_pretty(&report)?);
	} else {
		println!(
			"{}: uploaded {}, reuploaded {}, retired {}, withheld {}",
			report.posture(),
			report.uploaded.len(),
			report.reuploaded.len(),
			report.removed.len(),
			report.withheld.len()
		);
	}
	Ok(posture_exit_code(report.posture()))
}

fn run_init(config: &Config) -> Result<(), Box<dyn Error>> {
	let db = config.state_db()?;
	let existed = db.exists();
	StateStore::open(db)?;
	if existed {
		println!("State store {} already present", db.display());
	} else {
		println!("Created state store {}", db.display());
	}
	Ok(())
}

fn run_status(config: Config) -> Result<(), Box<dyn Error>> {
	let threshold = config.upload_alert_threshold;
	let ctx = SyncContext::new(config)?;
	let store = StateStore::open(ctx.state_db())?;

	println!("Workstation: {}", ctx.workstation_id);
	let (pending, eligible) = store.trash_counts()?;
	println!("Trash ledger: {} pending, {} retired", pending, eligible);

	let alerts = store.uploads_at_least(threshold)?;
	if !alerts.is_empty() {
		println!("Uploaded {} or more times:", threshold);
		for record in alerts {
			println!("  {} ({} times)", record.rel_path, record.count);
		}
	}

	println!("Recent runs:");
	for run in store.recent_runs(5)? {
		println!(
			"  #{} {} v{}: started {}, took {}s, {} uploads, {} retired",
			run.id,
			run.workstation,
			run.version,
			run.started,
			run.ready.saturating_sub(run.started),
			run.uploads_done,
			run.trashes_done
		);
	}
	Ok(())
}

fn run_survey(config: Config) -> Result<i32, Box<dyn Error>> {
	let ctx = SyncContext::new(config)?;
	let report = survey(ctx.sync_root(), &ctx.scan_filter(), &ctx.classifier, &ctx.manifest);

	for dir in &report.complete {
		println!("complete      {}", dir);
	}
	for (dir, missing) in &report.incomplete {
		println!("incomplete    {} (missing {})", dir, missing.join(", "));
	}
	for (dir, reason) in &report.unregistered {
		println!("unregistered  {} ({})", dir, reason);
	}
	println!(
		"{} complete, {} incomplete, {} unregistered, {} files outside datasets",
		report.complete.len(),
		report.incomplete.len(),
		report.unregistered.len(),
		report.unrecognised.len()
	);
	Ok(if report.incomplete.is_empty() && report.unregistered.is_empty() { 0 } else { 1 })
}

fn run_checksum(files: Vec<&String>, algo: &str) -> i32 {
	let mut code = 0;
	for file in files {
		match hash_string(path::Path::new(file), algo) {
			Ok(line) => println!("{}  {}", line, file),
			Err(e) => {
				eprintln!("{}: {}", file, e);
				code = 1;
			}
		}
	}
	code
}

fn run_wepv(names: Vec<&String>) -> i32 {
	let classifier = WepvClassifier::new();
	let mut code = 0;
	for name in names {
		match classifier.classify(name) {
			Some(w) => println!(
				"{}: pseudocode={} wave={} experiment={} date={} time={} tag={}",
				name, w.pseudocode, w.wave, w.experiment, w.date, w.time, w.tag
			),
			None => {
				println!("{}: not a WEPV name", name);
				code = 1;
			}
		}
	}
	code
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
	let matches = Command::new("labsync")
		.version(env!("CARGO_PKG_VERSION"))
		.about("Reconcile lab workstation data against the vault")
		.subcommand_required(true)
		.arg(
			Arg::new("config")
				.short('c')
				.long("config")
				.value_name("CONFIG")
				.global(true)
				.help("Configuration file (default: $LABSYNC_CONFIG or ~/.labsync/config.toml)"),
		)
		.subcommand(
			Command::new("sync")
				.about("Run one reconciliation cycle (exit code 1 = warnings, 2 = store errors)")
				.arg(
					Arg::new("test-mode")
						.long("test-mode")
						.action(ArgAction::SetTrue)
						.help("Move retired files to the quarantine directory instead of deleting them"),
				)
				.arg(Arg::new("user").short('u').long("user").value_name("USER").help("Remote user name"))
				.arg(
					Arg::new("json")
						.long("json")
						.action(ArgAction::SetTrue)
						.help("Print the full cycle report as JSON"),
				),
		)
		.subcommand(Command::new("init").about("Create the state store"))
		.subcommand(Command::new("status").about("Show upload alerts, trash ledger and recent runs"))
		.subcommand(Command::new("survey").about("Check WEPV datasets against the manifest"))
		.subcommand(
			Command::new("checksum")
				.about("Print checksums as '<ALGO> <digest> <size>'")
				.arg(
					Arg::new("algo")
						.short('a')
						.long("algo")
						.value_name("ALGO")
						.default_value("sha256")
						.help("md5 or sha256"),
				)
				.arg(Arg::new("file").required(true).action(ArgAction::Append).num_args(1..)),
		)
		.subcommand(
			Command::new("wepv")
				.about("Decompose WEPV names")
				.arg(Arg::new("name").required(true).action(ArgAction::Append).num_args(1..)),
		)
		.get_matches();

	let mut log_guard = None;
	let code = if let Some(sub_matches) = matches.subcommand_matches("sync") {
		let (mut config, guard) = load_config(&matches)?;
		log_guard = guard;
		if sub_matches.get_flag("test-mode") {
			config.test_mode = true;
		}
		let user = sub_matches.get_one::<String>("user").cloned();
		match run_sync(config, user, sub_matches.get_flag("json")).await {
			Ok(code) => code,
			Err(e) => {
				error!("{}", e);
				3
			}
		}
	} else if matches.subcommand_matches("init").is_some() {
		let (config, guard) = load_config(&matches)?;
		log_guard = guard;
		run_init(&config)?;
		0
	} else if matches.subcommand_matches("status").is_some() {
		let (config, guard) = load_config(&matches)?;
		log_guard = guard;
		run_status(config)?;
		0
	} else if matches.subcommand_matches("survey").is_some() {
		let (config, guard) = load_config(&matches)?;
		log_guard = guard;
		run_survey(config)?
	} else if let Some(sub_matches) = matches.subcommand_matches("checksum") {
		let algo = sub_matches.get_one::<String>("algo").map(|s| s.as_str()).unwrap_or("sha256");
		let files = sub_matches.get_many::<String>("file").ok_or("checksum: file argument required")?;
		run_checksum(files.collect(), algo)
	} else if let Some(sub_matches) = matches.subcommand_matches("wepv") {
		let names = sub_matches.get_many::<String>("name").ok_or("wepv: name argument required")?;
		run_wepv(names.collect())
	} else {
		0
	};

	// process::exit skips destructors, flush the log file first
	drop(log_guard);
	process::exit(code);
}

// vim: ts=4
