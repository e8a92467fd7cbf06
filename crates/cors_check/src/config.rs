use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use cors_probe::{Probe, RunSettings, default_probes};
use serde::Deserialize;

use crate::cli::Cli;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProbeFile {
	#[serde(default)]
	pub settings: SettingsConfig,
	#[serde(default)]
	pub probes: Vec<Probe>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsConfig {
	pub origin: Option<String>,
	pub timeout_secs: Option<u64>,
	pub run_timeout_secs: Option<u64>,
	pub concurrency: Option<usize>,
}

impl ProbeFile {
	pub fn load(path: &Path) -> anyhow::Result<Self> {
		let content =
			fs::read_to_string(path).context(format!("Failed to read probe file: {}", path.display()))?;

		let file: Self = toml::from_str(&content).context("Failed to parse probe file")?;

		Ok(file)
	}
}

/// Command-line flags win over the probe file, which wins over built-in defaults.
///
/// Without a probe file the default SPA checks run, built for the resolved origin. A probe file with no
/// probes is passed through as-is so the runner rejects it.
pub fn resolve(cli: &Cli, file: Option<ProbeFile>) -> (RunSettings, Vec<Probe>) {
	let defaults = RunSettings::default();
	let (settings, probes) = match file {
		Some(file) => (file.settings, Some(file.probes)),
		None => (SettingsConfig::default(), None),
	};

	let origin = cli.origin.clone().or(settings.origin).unwrap_or(defaults.origin);
	let request_timeout =
		cli.timeout.or(settings.timeout_secs).map_or(defaults.request_timeout, Duration::from_secs);
	let run_timeout = cli.run_timeout.or(settings.run_timeout_secs).map_or(defaults.run_timeout, Duration::from_secs);
	let concurrency = cli.concurrency.or(settings.concurrency).unwrap_or(defaults.concurrency);

	let probes = probes.unwrap_or_else(|| default_probes(&origin));

	(RunSettings { origin, request_timeout, run_timeout, concurrency }, probes)
}

#[cfg(test)]
mod tests {
	use clap::Parser;
	use cors_probe::{DEFAULT_ORIGIN, HttpMethod};

	use super::*;

	const PROBE_FILE: &str = r#"
		[settings]
		origin = "https://app.example"
		timeout_secs = 3
		concurrency = 2

		[[probes]]
		name = "preflight"
		method = "OPTIONS"
		path = "/api/analyze-part"
		headers = { "Access-Control-Request-Method" = "POST", "Access-Control-Request-Headers" = "Content-Type" }

		[probes.expect]
		require_allow_origin = true
		allowed_origin = "https://app.example"
		allowed_methods = ["POST"]

		[[probes]]
		name = "credentialed"
		method = "POST"
		path = "/api/analyze-part"
		body = '{"part_number":"PA-10116"}'
		credentials = true

		[probes.expect]
		require_credentials_header = true
	"#;

	fn cli(args: &[&str]) -> Cli {
		Cli::parse_from(std::iter::once("cors_check").chain(args.iter().copied()))
	}

	#[test]
	fn probe_file_parses() {
		let file: ProbeFile = toml::from_str(PROBE_FILE).expect("probe file should parse");

		assert_eq!(file.probes.len(), 2);
		assert_eq!(file.probes[0].method, HttpMethod::Options);
		assert_eq!(file.probes[0].requested_method().as_deref(), Some("POST"));
		assert!(file.probes[1].credentials);
		assert!(file.probes[1].expectation.require_credentials_header);
		assert_eq!(file.settings.timeout_secs, Some(3));
	}

	#[test]
	fn shipped_example_parses() {
		let file: ProbeFile =
			toml::from_str(include_str!("../../../probes.example.toml")).expect("example should parse");

		assert_eq!(file.probes.len(), 3);
		assert_eq!(file.settings.origin.as_deref(), Some("http://localhost:3000"));
	}

	#[test]
	fn defaults_apply_without_a_probe_file() {
		let (settings, probes) = resolve(&cli(&["https://api.example"]), None);

		assert_eq!(settings, RunSettings::default());
		assert_eq!(probes, default_probes(DEFAULT_ORIGIN));
	}

	#[test]
	fn flags_override_file_settings() {
		let file: ProbeFile = toml::from_str(PROBE_FILE).expect("probe file should parse");
		let (settings, probes) = resolve(&cli(&["https://api.example", "--timeout", "9", "--run-timeout", "12"]), Some(file));

		assert_eq!(settings.origin, "https://app.example");
		assert_eq!(settings.request_timeout, Duration::from_secs(9));
		assert_eq!(settings.run_timeout, Duration::from_secs(12));
		assert_eq!(settings.concurrency, 2);
		assert_eq!(probes.len(), 2);
	}

	#[test]
	fn origin_flag_feeds_the_default_probes() {
		let (settings, probes) = resolve(&cli(&["https://api.example", "--origin", "https://spa.example"]), None);

		assert_eq!(settings.origin, "https://spa.example");
		assert_eq!(probes[1].expectation.allowed_origin.as_deref(), Some("https://spa.example"));
	}

	#[test]
	fn empty_probe_file_is_passed_through() {
		let (_, probes) = resolve(&cli(&["https://api.example"]), Some(ProbeFile::default()));
		assert!(probes.is_empty());
	}

	#[test]
	fn missing_probe_file_reports_the_path() {
		let error = ProbeFile::load(Path::new("/nonexistent/probes.toml")).expect_err("file does not exist");
		assert!(error.to_string().contains("/nonexistent/probes.toml"));
	}
}
