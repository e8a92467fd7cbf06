use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use reqwest::header::{HeaderName, HeaderValue};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
	ConfigError, HttpRequest, ORIGIN_HEADER, Probe, ProbeError, ProbeResult, Report, ReportAggregator, Transport,
};

pub const DEFAULT_ORIGIN: &str = "http://localhost:3000";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_CONCURRENCY: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
	/// Sent as `Origin` on every request, standing in for the browser page's origin.
	pub origin: String,
	pub request_timeout: Duration,
	pub run_timeout: Duration,
	pub concurrency: usize,
}

impl Default for RunSettings {
	fn default() -> Self {
		Self {
			origin: String::from(DEFAULT_ORIGIN),
			request_timeout: DEFAULT_REQUEST_TIMEOUT,
			run_timeout: DEFAULT_RUN_TIMEOUT,
			concurrency: DEFAULT_CONCURRENCY,
		}
	}
}

pub struct Runner {
	base_url: String,
	probes: Vec<Probe>,
	targets: Vec<Url>,
	transport: Arc<dyn Transport>,
	settings: RunSettings,
}

impl Runner {
	/// Validates everything up front so a bad configuration never reaches the network.
	pub fn new(
		base_url: &str,
		probes: Vec<Probe>,
		transport: Arc<dyn Transport>,
		settings: RunSettings,
	) -> Result<Self, ConfigError> {
		let base_url = parse_base_url(base_url)?;

		if probes.is_empty() {
			return Err(ConfigError::EmptyProbeSet);
		}
		if settings.concurrency == 0 {
			return Err(ConfigError::ZeroConcurrency);
		}
		if let Err(error) = HeaderValue::from_str(&settings.origin) {
			return Err(ConfigError::InvalidOrigin { origin: settings.origin.clone(), reason: error.to_string() });
		}

		let mut names = HashSet::new();
		let mut targets = Vec::with_capacity(probes.len());
		for probe in &probes {
			if !names.insert(probe.name.as_str()) {
				return Err(ConfigError::DuplicateProbeName(probe.name.clone()));
			}
			validate_headers(probe)?;
			targets.push(probe_url(&base_url, probe)?);
		}

		Ok(Self { base_url, probes, targets, transport, settings })
	}

	/// Runs every probe once. Never fails: per-probe errors end up in the report.
	pub async fn run(&self) -> Report {
		info!(
			"🚀 Running {} CORS probes against {} as origin {}",
			self.probes.len(),
			self.base_url,
			self.settings.origin
		);

		let mut aggregator = ReportAggregator::new(self.base_url.as_str(), self.settings.origin.as_str());
		// No deadline when the run timeout does not fit in an `Instant`.
		let deadline = Instant::now().checked_add(self.settings.run_timeout);

		{
			let pending = stream::iter(self.probes.iter().zip(&self.targets).enumerate())
				.map(|(index, (probe, url))| async move { (index, self.execute(probe, url).await) })
				.buffer_unordered(self.settings.concurrency);
			let mut pending = std::pin::pin!(pending);

			loop {
				let next = match deadline {
					Some(deadline) => tokio::time::timeout_at(deadline, pending.next()).await,
					None => Ok(pending.next().await),
				};

				match next {
					Ok(Some((index, result))) => {
						info!("{} {} {} -> {}", verdict_icon(&result), result.method, result.url, result.verdict);
						aggregator.record(index, result);
					},
					Ok(None) => break,
					Err(_) => {
						warn!(
							"⏱️ Run timeout of {:?} reached with {} probes still in flight",
							self.settings.run_timeout,
							self.probes.len() - aggregator.len()
						);
						break;
					},
				}
			}
		}

		for (index, (probe, url)) in self.probes.iter().zip(&self.targets).enumerate() {
			if !aggregator.is_recorded(index) {
				aggregator.record(index, ProbeResult::timed_out(probe, url.as_str(), self.settings.run_timeout));
			}
		}

		let report = aggregator.finalize();
		info!("📊 {} passed, {} failed", report.passed(), report.failed());

		report
	}

	async fn execute(&self, probe: &Probe, url: &Url) -> ProbeResult {
		let mut headers: Vec<(String, String)> =
			probe.headers.iter().map(|(name, value)| (name.clone(), value.clone())).collect();
		if probe.header(ORIGIN_HEADER).is_none() {
			headers.insert(0, (String::from(ORIGIN_HEADER), self.settings.origin.clone()));
		}

		let request = HttpRequest { method: probe.method, url: url.clone(), headers, body: probe.body.clone() };

		debug!(probe = %probe.name, "🔍 Probing {} {}", probe.method, url);
		let outcome = match tokio::time::timeout(self.settings.request_timeout, self.transport.send(request)).await {
			Ok(outcome) => outcome,
			Err(_) => Err(ProbeError::timeout(self.settings.request_timeout)),
		};

		if let Err(error) = &outcome {
			warn!(probe = %probe.name, "❌ {} {} failed: {error}", probe.method, url);
		}

		ProbeResult::from_exchange(probe, url.as_str(), outcome)
	}
}

fn verdict_icon(result: &ProbeResult) -> &'static str {
	if result.verdict.is_pass() { "✅" } else { "❌" }
}

fn parse_base_url(raw: &str) -> Result<String, ConfigError> {
	let invalid = |reason: String| ConfigError::InvalidBaseUrl { url: String::from(raw), reason };

	let url = Url::parse(raw.trim()).map_err(|error| invalid(error.to_string()))?;
	if !matches!(url.scheme(), "http" | "https") {
		return Err(invalid(format!("unsupported scheme {:?}", url.scheme())));
	}
	if url.host_str().is_none_or(str::is_empty) {
		return Err(invalid(String::from("missing host")));
	}
	if url.query().is_some() || url.fragment().is_some() {
		return Err(invalid(String::from("query strings and fragments are not supported")));
	}

	Ok(url.as_str().trim_end_matches('/').to_owned())
}

fn validate_headers(probe: &Probe) -> Result<(), ConfigError> {
	let invalid = |header: &str, reason: String| ConfigError::InvalidProbeHeader {
		name: probe.name.clone(),
		header: String::from(header),
		reason,
	};

	for (header, value) in &probe.headers {
		HeaderName::from_bytes(header.as_bytes()).map_err(|error| invalid(header, error.to_string()))?;
		HeaderValue::from_str(value).map_err(|error| invalid(header, error.to_string()))?;
	}

	Ok(())
}

fn probe_url(base_url: &str, probe: &Probe) -> Result<Url, ConfigError> {
	let invalid = || ConfigError::InvalidProbePath { name: probe.name.clone(), path: probe.path.clone() };

	if !probe.path.starts_with('/') {
		return Err(invalid());
	}

	Url::parse(&format!("{base_url}{}", probe.path)).map_err(|_| invalid())
}
