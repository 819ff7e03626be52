//! WEPV naming classifier
//!
//! Recognizes the Wave-Experiment-Pseudocode-Version convention used to name
//! dataset directories and their member files, e.g.
//! `A02980_9y_trustgame_20160706_1432_MAC04` or
//! `B10233_5m_infpop_20170101_0915_settings.txt`.
//!
//! Matching is purely lexical. Whether the experiment or wave is registered is
//! checked against the [`Manifest`](crate::manifest::Manifest).

use regex::Regex;

const WEPV_PATTERN: &str = concat!(
	r"(?i)^([ab])([0-9]{5})_([0-9]{1,2}[ym])_([a-z]{5,10})_",
	r"([0-9]{4})(1[0-2]|0[1-9])(3[01]|0[1-9]|[12][0-9])_",
	r"([01]?[0-9]|2[0-3])([0-5][0-9])([^0-9].*)$",
);

/// Decomposed fields of a WEPV name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WepvName {
	/// Prefix letter, upper-cased
	pub prefix: char,
	/// Prefix letter plus five digits, e.g. `A02980`
	pub pseudocode: String,
	/// Digits plus unit letter, e.g. `9y` or `5m`
	pub wave: String,
	/// Lower-cased experiment type
	pub experiment: String,
	/// `YYYYMMDD`
	pub date: String,
	/// `HHMM` as written
	pub time: String,
	/// Whatever follows the time, leading underscore stripped (`MAC04`, `settings.txt`, `.csv`)
	pub tag: String,
}

/// Compiled WEPV grammar
#[derive(Debug, Clone)]
pub struct WepvClassifier {
	regex: Regex,
}

impl WepvClassifier {
	pub fn new() -> Self {
		// The pattern is a constant; failing to compile it is a programming error.
		let regex = Regex::new(WEPV_PATTERN).expect("WEPV pattern must compile");
		WepvClassifier { regex }
	}

	/// Does `segment` follow the grammar?
	pub fn is_match(&self, segment: &str) -> bool {
		self.regex.is_match(segment)
	}

	/// Decompose a file or directory name
	pub fn classify(&self, segment: &str) -> Option<WepvName> {
		let caps = self.regex.captures(segment)?;
		let prefix = caps[1].chars().next()?.to_ascii_uppercase();
		let tail = &caps[10];
		Some(WepvName {
			prefix,
			pseudocode: format!("{}{}", prefix, &caps[2]),
			wave: caps[3].to_ascii_lowercase(),
			experiment: caps[4].to_ascii_lowercase(),
			date: format!("{}{}{}", &caps[5], &caps[6], &caps[7]),
			time: format!("{}{}", &caps[8], &caps[9]),
			tag: tail.strip_prefix('_').unwrap_or(tail).to_string(),
		})
	}
}

impl Default for WepvClassifier {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_directory_name() {
		let c = WepvClassifier::new();
		let name = c.classify("A02980_9y_trustgame_20160706_1432_MAC04").unwrap();
		assert_eq!(name.prefix, 'A');
		assert_eq!(name.pseudocode, "A02980");
		assert_eq!(name.wave, "9y");
		assert_eq!(name.experiment, "trustgame");
		assert_eq!(name.date, "20160706");
		assert_eq!(name.time, "1432");
		assert_eq!(name.tag, "MAC04");
	}

	#[test]
	fn test_file_names() {
		let c = WepvClassifier::new();
		let settings = c.classify("A02980_9y_trustgame_20160706_1432_settings.txt").unwrap();
		assert_eq!(settings.tag, "settings.txt");
		let csv = c.classify("A02980_9y_trustgame_20160706_1432.csv").unwrap();
		assert_eq!(csv.tag, ".csv");
		let infant = c.classify("B10233_10m_infpop_20170101_0915_all_trials.mat").unwrap();
		assert_eq!(infant.wave, "10m");
		assert_eq!(infant.experiment, "infpop");
	}

	#[test]
	fn test_prefix_is_case_insensitive() {
		let c = WepvClassifier::new();
		let name = c.classify("b10233_5m_infpop_20170101_0915_DELL2").unwrap();
		assert_eq!(name.prefix, 'B');
		assert_eq!(name.pseudocode, "B10233");
	}

	#[test]
	fn test_rejects_malformed_names() {
		let c = WepvClassifier::new();
		// day 33
		assert!(!c.is_match("A08024_9y_cyberball_20160633_1550_MAC04"));
		// six digit pseudocode
		assert!(!c.is_match("A080246_9y_cyberball_20160622_1550.mat"));
		// month 13
		assert!(!c.is_match("A58094_9y_cyberball_20161324_1516.mat"));
		// unknown prefix letter
		assert!(!c.is_match("C58094_9y_cyberball_20160624_1516.mat"));
		// nothing after the time
		assert!(!c.is_match("A58094_9y_cyberball_20160624_1516"));
		assert!(!c.is_match("notes.txt"));
	}

	#[test]
	fn test_experiment_token_is_lexical() {
		let c = WepvClassifier::new();
		// Not a registered experiment, still a lexical match
		assert!(c.is_match("A12345_9y_madeupexp_20160624_1516_MAC01"));
		// Too short an experiment token
		assert!(!c.is_match("A12345_9y_abc_20160624_1516_MAC01"));
	}
}

// vim: ts=4
