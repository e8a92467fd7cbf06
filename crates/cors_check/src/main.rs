use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use cors_probe::{ReqwestTransport, Runner};
use tracing::info;

use crate::{
	cli::Cli,
	config::ProbeFile,
	output::{render_json, render_text},
};

mod cli;
mod config;
mod output;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
	tracing_subscriber::fmt()
		.with_writer(std::io::stderr)
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
		)
		.init();

	let cli = Cli::parse();

	let probe_file = match &cli.probes {
		Some(path) => Some(ProbeFile::load(path).context("Failed to load probes")?),
		None => None,
	};
	let (settings, probes) = config::resolve(&cli, probe_file);
	info!("✅ Configuration loaded ({} probes)", probes.len());

	let transport = ReqwestTransport::new(settings.request_timeout).context("Failed to initialize HTTP client")?;
	let runner = Runner::new(&cli.base_url, probes, Arc::new(transport), settings).context("Invalid configuration")?;

	let report = runner.run().await;

	let rendered = if cli.json { render_json(&report)? } else { render_text(&report) };
	println!("{rendered}");

	Ok(if report.overall_pass { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
