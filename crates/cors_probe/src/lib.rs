mod error;
mod evaluator;
mod http;
mod probe;
mod report;
mod runner;

pub use error::{ConfigError, ProbeError};
pub use evaluator::{TRANSPORT_ERROR_REASON, Verdict, evaluate};
pub use http::ReqwestTransport;
pub use probe::{
	CorsExpectation, HttpMethod, ORIGIN_HEADER, Probe, REQUEST_HEADERS_HEADER, REQUEST_METHOD_HEADER, default_probes,
	split_list,
};
pub use report::{BODY_SNIPPET_CHARS, ProbeResult, Report, ReportAggregator};
pub use runner::{DEFAULT_ORIGIN, RunSettings, Runner};

/// The HTTP capability a run depends on. Swapped for a fake in tests.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
	async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ProbeError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
	pub method: HttpMethod,
	pub url: url::Url,
	pub headers: Vec<(String, String)>,
	pub body: Option<String>,
}

/// A completed exchange, whatever its status code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpResponse {
	pub status: u16,
	pub headers: Vec<(String, String)>,
	pub body: Vec<u8>,
}

impl HttpResponse {
	#[must_use]
	pub fn new(status: u16) -> Self {
		Self { status, ..Default::default() }
	}

	#[must_use]
	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.push((name.into(), value.into()));
		self
	}

	#[must_use]
	pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.body = body.into();
		self
	}

	/// Case-insensitive lookup. Repeated headers are joined with ", " the way HTTP allows for list values.
	#[must_use]
	pub fn header(&self, name: &str) -> Option<String> {
		let values: Vec<&str> =
			self.headers.iter().filter(|(key, _)| key.eq_ignore_ascii_case(name)).map(|(_, value)| value.as_str()).collect();

		if values.is_empty() { None } else { Some(values.join(", ")) }
	}
}
