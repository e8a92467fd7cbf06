use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Per-probe failure. Always recovered into a `ProbeResult`, never propagated out of a run.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ProbeError {
	#[error("transport error: {0}")]
	Transport(String),
	#[error("timed out after {0} ms")]
	Timeout(u64),
	#[error("malformed response: {0}")]
	MalformedResponse(String),
}

impl ProbeError {
	#[must_use]
	pub fn timeout(after: Duration) -> Self {
		Self::Timeout(after.as_millis() as u64)
	}

	/// Timeouts count as transport failures.
	#[must_use]
	pub const fn is_transport(&self) -> bool {
		matches!(self, Self::Transport(_) | Self::Timeout(_))
	}
}

/// Rejected before any request is sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
	#[error("invalid base URL {url:?}: {reason}")]
	InvalidBaseUrl { url: String, reason: String },
	#[error("probe set is empty")]
	EmptyProbeSet,
	#[error("duplicate probe name {0:?}")]
	DuplicateProbeName(String),
	#[error("probe {name:?} has path {path:?}, expected it to start with '/'")]
	InvalidProbePath { name: String, path: String },
	#[error("probe {name:?} has invalid header {header:?}: {reason}")]
	InvalidProbeHeader { name: String, header: String, reason: String },
	#[error("origin {origin:?} cannot be sent as a header: {reason}")]
	InvalidOrigin { origin: String, reason: String },
	#[error("concurrency must be at least 1")]
	ZeroConcurrency,
	#[error("failed to build HTTP client: {0}")]
	HttpClient(String),
}
