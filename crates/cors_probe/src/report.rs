use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;
use tracing::warn;

use crate::{HttpMethod, HttpResponse, Probe, ProbeError, Verdict, evaluate};

pub const BODY_SNIPPET_CHARS: usize = 200;

const CORS_HEADER_PREFIX: &str = "access-control-";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeResult {
	pub name: String,
	pub method: HttpMethod,
	pub url: String,
	/// Transport-level success. A 500 response is still a success here.
	pub succeeded: bool,
	pub status_code: Option<u16>,
	pub headers: Vec<(String, String)>,
	pub body_snippet: Option<String>,
	/// Transport failure, or a malformed body noted alongside a completed exchange.
	pub error: Option<ProbeError>,
	pub verdict: Verdict,
}

impl ProbeResult {
	#[must_use]
	pub fn from_exchange(probe: &Probe, url: &str, outcome: Result<HttpResponse, ProbeError>) -> Self {
		let verdict = evaluate(probe, outcome.as_ref());

		match outcome {
			Ok(response) => Self {
				name: probe.name.clone(),
				method: probe.method,
				url: String::from(url),
				succeeded: true,
				status_code: Some(response.status),
				body_snippet: body_snippet(&response.body),
				error: malformed_body(&response),
				headers: response.headers,
				verdict,
			},
			Err(error) => Self::failed(probe, url, error, verdict),
		}
	}

	/// Recorded for probes still in flight when the run deadline passed.
	#[must_use]
	pub fn timed_out(probe: &Probe, url: &str, after: Duration) -> Self {
		let error = ProbeError::timeout(after);
		let verdict = evaluate(probe, Err(&error));
		Self::failed(probe, url, error, verdict)
	}

	fn failed(probe: &Probe, url: &str, error: ProbeError, verdict: Verdict) -> Self {
		Self {
			name: probe.name.clone(),
			method: probe.method,
			url: String::from(url),
			succeeded: false,
			status_code: None,
			headers: Vec::new(),
			body_snippet: None,
			error: Some(error),
			verdict,
		}
	}

	pub fn cors_headers(&self) -> impl Iterator<Item = (&str, &str)> {
		self.headers
			.iter()
			.filter(|(name, _)| name.to_ascii_lowercase().starts_with(CORS_HEADER_PREFIX))
			.map(|(name, value)| (name.as_str(), value.as_str()))
	}
}

fn body_snippet(body: &[u8]) -> Option<String> {
	if body.is_empty() {
		return None;
	}

	Some(String::from_utf8_lossy(body).chars().take(BODY_SNIPPET_CHARS).collect())
}

fn malformed_body(response: &HttpResponse) -> Option<ProbeError> {
	let declares_json = response.header("Content-Type").is_some_and(|value| value.to_ascii_lowercase().contains("json"));
	if !declares_json || response.body.is_empty() {
		return None;
	}

	serde_json::from_slice::<serde_json::Value>(&response.body)
		.err()
		.map(|error| ProbeError::MalformedResponse(format!("body is not valid JSON: {error}")))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
	pub base_url: String,
	pub origin: String,
	pub results: Vec<ProbeResult>,
	pub overall_pass: bool,
}

impl Report {
	#[must_use]
	pub fn new(base_url: String, origin: String, results: Vec<ProbeResult>) -> Self {
		let overall_pass = results.iter().all(|result| result.verdict.is_pass());
		Self { base_url, origin, results, overall_pass }
	}

	#[must_use]
	pub fn passed(&self) -> usize {
		self.results.iter().filter(|result| result.verdict.is_pass()).count()
	}

	#[must_use]
	pub fn failed(&self) -> usize {
		self.results.len() - self.passed()
	}
}

/// Collects results as probes complete, in any order, and hands back a report in definition order.
#[derive(Debug, Clone)]
pub struct ReportAggregator {
	base_url: String,
	origin: String,
	results: BTreeMap<usize, ProbeResult>,
}

impl ReportAggregator {
	#[must_use]
	pub fn new(base_url: impl Into<String>, origin: impl Into<String>) -> Self {
		Self { base_url: base_url.into(), origin: origin.into(), results: BTreeMap::new() }
	}

	/// `index` is the probe's position in the definition order. The first result for an index wins.
	pub fn record(&mut self, index: usize, result: ProbeResult) {
		if let Some(existing) = self.results.get(&index) {
			warn!(probe = %existing.name, "ignoring second result for probe");
			return;
		}

		self.results.insert(index, result);
	}

	#[must_use]
	pub fn is_recorded(&self, index: usize) -> bool {
		self.results.contains_key(&index)
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.results.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.results.is_empty()
	}

	#[must_use]
	pub fn finalize(&self) -> Report {
		Report::new(self.base_url.clone(), self.origin.clone(), self.results.values().cloned().collect())
	}
}
