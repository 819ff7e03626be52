//! Dataset manifest and completeness survey
//!
//! Each experiment type lists the filename patterns a complete WEPV directory
//! contains. The manifest is what turns the lexical WEPV match into "registered
//! experiment, expected wave, every required file present".

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::collections::BTreeMap;
use std::path::Path;

use crate::config::ExperimentConfig;
use crate::error::ConfigError;
use crate::path::RelPath;
use crate::scan::ScanFilter;
use crate::wepv::{WepvClassifier, WepvName};

const CHILD_PATTERNS: &[&str] = &["*settings.txt", "*.csv", "*.mat"];

const GAZE_PATTERNS: &[&str] = &[
	"*settings.txt",
	"*all_gazedata.mat",
	"*all_gazedata.csv",
	"*all_trials.csv",
	"*all_trials.mat",
	"*calib_*.mat",
	"*report.zip",
	"*backup.zip",
];

const EEG_PATTERNS: &[&str] = &["*settings.txt", "*.mat", "*.csv", "*.mp4", "*.bdf"];

const CHILD_WAVES: &[&str] = &["9y", "12y", "15y"];
const INFANT_WAVES: &[&str] = &["5m", "10m"];

fn experiment(name: &str, prefix: &str, waves: &[&str], patterns: &[&str]) -> ExperimentConfig {
	ExperimentConfig {
		name: name.to_string(),
		pseudocode_prefix: Some(prefix.to_string()),
		waves: waves.iter().map(|w| w.to_string()).collect(),
		patterns: patterns.iter().map(|p| p.to_string()).collect(),
	}
}

fn with_conditions(patterns: &[&'static str]) -> Vec<&'static str> {
	let mut all = patterns.to_vec();
	all.push("*conditions.mat");
	all
}

/// Built-in manifest of the lab's experiment types
pub fn default_experiments() -> Vec<ExperimentConfig> {
	let gaze_conditions = with_conditions(GAZE_PATTERNS);
	vec![
		experiment("chantigap", "A", CHILD_WAVES, &gaze_conditions),
		experiment("chprogap", "A", CHILD_WAVES, &gaze_conditions),
		experiment("chsgaze", "A", CHILD_WAVES, GAZE_PATTERNS),
		experiment("cyberball", "A", CHILD_WAVES, CHILD_PATTERNS),
		experiment("discount", "A", CHILD_WAVES, &["*settings.txt", "*.txt"]),
		experiment("peabody", "A", CHILD_WAVES, &["*settings.txt", "*.csv", "*.mat", "*answers.csv"]),
		experiment("trustgame", "A", CHILD_WAVES, CHILD_PATTERNS),
		experiment("infprogap", "B", INFANT_WAVES, &gaze_conditions),
		experiment("infpop", "B", INFANT_WAVES, GAZE_PATTERNS),
		experiment("infsgaze", "B", INFANT_WAVES, GAZE_PATTERNS),
		experiment("coherence", "B", INFANT_WAVES, &["*settings.txt", "*.mat", "*.mp4", "*.bdf"]),
		experiment("faceemo", "B", &["10m"], EEG_PATTERNS),
		experiment("facehouse", "B", INFANT_WAVES, EEG_PATTERNS),
	]
}

/// Completeness of one WEPV directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetStatus {
	/// Every required pattern matched at least one file
	Complete,
	/// Patterns without a matching file
	Incomplete { missing: Vec<String> },
	/// Experiment, wave or prefix not in the manifest
	Unregistered { reason: String },
}

struct Experiment {
	def: ExperimentConfig,
	globs: GlobSet,
}

/// Compiled manifest
pub struct Manifest {
	experiments: BTreeMap<String, Experiment>,
}

impl Manifest {
	/// Compile a manifest, falling back to the built-in table when `experiments` is empty
	pub fn new(experiments: &[ExperimentConfig]) -> Result<Self, ConfigError> {
		let definitions = if experiments.is_empty() { default_experiments() } else { experiments.to_vec() };

		let mut compiled = BTreeMap::new();
		for def in definitions {
			let mut builder = GlobSetBuilder::new();
			for pattern in &def.patterns {
				let glob = GlobBuilder::new(pattern).case_insensitive(true).build().map_err(|e| {
					ConfigError::Invalid {
						key: "experiments",
						message: format!("{}: bad pattern {}: {}", def.name, pattern, e),
					}
				})?;
				builder.add(glob);
			}
			let globs = builder.build().map_err(|e| ConfigError::Invalid {
				key: "experiments",
				message: format!("{}: {}", def.name, e),
			})?;
			compiled.insert(def.name.to_ascii_lowercase(), Experiment { def, globs });
		}
		Ok(Manifest { experiments: compiled })
	}

	pub fn is_registered(&self, experiment: &str) -> bool {
		self.experiments.contains_key(&experiment.to_ascii_lowercase())
	}

	/// Check a WEPV directory's file names against its experiment's patterns
	pub fn evaluate<'a, I>(&self, name: &WepvName, files: I) -> SetStatus
	where
		I: IntoIterator<Item = &'a str>,
	{
		let Some(exp) = self.experiments.get(&name.experiment) else {
			return SetStatus::Unregistered {
				reason: format!("unknown experiment '{}'", name.experiment),
			};
		};
		if !exp.def.waves.is_empty() && !exp.def.waves.iter().any(|w| w.eq_ignore_ascii_case(&name.wave)) {
			return SetStatus::Unregistered {
				reason: format!("wave '{}' not registered for {}", name.wave, name.experiment),
			};
		}
		if let Some(prefix) = &exp.def.pseudocode_prefix {
			if !prefix.eq_ignore_ascii_case(&name.prefix.to_string()) {
				return SetStatus::Unregistered {
					reason: format!("pseudocode {} does not use prefix {}", name.pseudocode, prefix),
				};
			}
		}

		let mut seen = vec![false; exp.def.patterns.len()];
		for file in files {
			for idx in exp.globs.matches(file) {
				seen[idx] = true;
			}
		}
		let missing: Vec<String> = exp
			.def
			.patterns
			.iter()
			.zip(seen)
			.filter(|(_, hit)| !hit)
			.map(|(p, _)| p.clone())
			.collect();

		if missing.is_empty() {
			SetStatus::Complete
		} else {
			SetStatus::Incomplete { missing }
		}
	}
}

/// Result of [`survey`]
#[derive(Debug, Default)]
pub struct SurveyReport {
	pub complete: Vec<RelPath>,
	pub incomplete: Vec<(RelPath, Vec<String>)>,
	pub unregistered: Vec<(RelPath, String)>,
	/// Files that do not live directly inside a WEPV directory
	pub unrecognised: Vec<RelPath>,
}

/// Classify every WEPV directory below `root` by manifest completeness
pub fn survey(
	root: &Path,
	filter: &ScanFilter,
	classifier: &WepvClassifier,
	manifest: &Manifest,
) -> SurveyReport {
	let mut groups: BTreeMap<RelPath, Vec<String>> = BTreeMap::new();
	let mut report = SurveyReport::default();

	for rel in filter.walk(root) {
		match (rel.parent(), rel.parent_name()) {
			(Some(dir), Some(dir_name)) if classifier.is_match(dir_name) => {
				groups.entry(dir).or_default().push(rel.file_name().to_string());
			}
			_ => report.unrecognised.push(rel),
		}
	}

	for (dir, files) in groups {
		let Some(name) = classifier.classify(dir.file_name()) else {
			continue;
		};
		match manifest.evaluate(&name, files.iter().map(String::as_str)) {
			SetStatus::Complete => report.complete.push(dir),
			SetStatus::Incomplete { missing } => report.incomplete.push((dir, missing)),
			SetStatus::Unregistered { reason } => report.unregistered.push((dir, reason)),
		}
	}
	report
}


// vim: ts=4
