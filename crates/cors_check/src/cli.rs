use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "cors_check", version, about = "Checks whether an API's CORS policy admits a browser origin")]
pub struct Cli {
	/// Base URL of the API under test, e.g. https://api.example.com
	pub base_url: String,
	/// TOML file with `[settings]` and `[[probes]]`; the built-in SPA checks run when omitted
	#[arg(long, value_name = "FILE")]
	pub probes: Option<PathBuf>,
	/// Origin the simulated browser page is served from
	#[arg(long)]
	pub origin: Option<String>,
	/// Per-request timeout
	#[arg(long, value_name = "SECS")]
	pub timeout: Option<u64>,
	/// Deadline for the whole run; probes still in flight are recorded as timed out
	#[arg(long, value_name = "SECS")]
	pub run_timeout: Option<u64>,
	/// Maximum probes in flight at once
	#[arg(long, value_name = "N")]
	pub concurrency: Option<usize>,
	/// Print the report as JSON instead of text
	#[arg(long)]
	pub json: bool,
}
