use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

pub const ORIGIN_HEADER: &str = "Origin";
pub const REQUEST_METHOD_HEADER: &str = "Access-Control-Request-Method";
pub const REQUEST_HEADERS_HEADER: &str = "Access-Control-Request-Headers";

const SAMPLE_PART_NUMBER_BODY: &str = r#"{"part_number":"PA-10116"}"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
	Get,
	Head,
	Post,
	Put,
	Patch,
	Delete,
	Options,
}

impl HttpMethod {
	#[must_use]
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Get => "GET",
			Self::Head => "HEAD",
			Self::Post => "POST",
			Self::Put => "PUT",
			Self::Patch => "PATCH",
			Self::Delete => "DELETE",
			Self::Options => "OPTIONS",
		}
	}
}

impl fmt::Display for HttpMethod {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// What a probe's response must contain to count as CORS-compliant.
///
/// Every field is optional in a probe file; an empty expectation accepts any completed exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsExpectation {
	pub require_allow_origin: bool,
	/// Exact origin the server must echo. `*` in the response is also accepted.
	pub allowed_origin: Option<String>,
	pub require_credentials_header: bool,
	pub allowed_methods: Option<BTreeSet<String>>,
	pub allowed_headers: Option<BTreeSet<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Probe {
	pub name: String,
	pub method: HttpMethod,
	pub path: String,
	#[serde(default)]
	pub headers: BTreeMap<String, String>,
	#[serde(default)]
	pub body: Option<String>,
	/// Simulates `credentials: "include"`; wildcard origins are rejected for such probes.
	#[serde(default)]
	pub credentials: bool,
	#[serde(default, alias = "expect")]
	pub expectation: CorsExpectation,
}

impl Probe {
	#[must_use]
	pub fn new(name: impl Into<String>, method: HttpMethod, path: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			method,
			path: path.into(),
			headers: BTreeMap::new(),
			body: None,
			credentials: false,
			expectation: CorsExpectation::default(),
		}
	}

	#[must_use]
	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.insert(name.into(), value.into());
		self
	}

	#[must_use]
	pub fn with_body(mut self, body: impl Into<String>) -> Self {
		self.body = Some(body.into());
		self
	}

	#[must_use]
	pub const fn with_credentials(mut self) -> Self {
		self.credentials = true;
		self
	}

	#[must_use]
	pub fn expecting(mut self, expectation: CorsExpectation) -> Self {
		self.expectation = expectation;
		self
	}

	#[must_use]
	pub fn is_preflight(&self) -> bool {
		self.method == HttpMethod::Options
	}

	/// Case-insensitive lookup of a header the probe sends.
	#[must_use]
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers.iter().find(|(key, _)| key.eq_ignore_ascii_case(name)).map(|(_, value)| value.as_str())
	}

	#[must_use]
	pub fn requested_method(&self) -> Option<String> {
		self.header(REQUEST_METHOD_HEADER).map(str::trim).filter(|method| !method.is_empty()).map(str::to_ascii_uppercase)
	}

	#[must_use]
	pub fn requested_headers(&self) -> Vec<String> {
		self.header(REQUEST_HEADERS_HEADER).map(split_list).unwrap_or_default()
	}
}

/// Splits a comma separated header value, dropping blanks.
#[must_use]
pub fn split_list(value: &str) -> Vec<String> {
	value.split(',').map(str::trim).filter(|item| !item.is_empty()).map(String::from).collect()
}

/// The five checks a React SPA needs to pass before it can talk to its API.
#[must_use]
pub fn default_probes(origin: &str) -> Vec<Probe> {
	let matching_origin =
		CorsExpectation { require_allow_origin: true, allowed_origin: Some(String::from(origin)), ..Default::default() };

	vec![
		spa_request(Probe::new("health", HttpMethod::Get, "/health")),
		spa_request(Probe::new("analyze-part", HttpMethod::Post, "/api/analyze-part"))
			.with_body(SAMPLE_PART_NUMBER_BODY)
			.expecting(matching_origin.clone()),
		Probe::new("analyze-part-preflight", HttpMethod::Options, "/api/analyze-part")
			.with_header(REQUEST_METHOD_HEADER, "POST")
			.with_header(REQUEST_HEADERS_HEADER, "Content-Type, Authorization, X-Requested-With")
			.expecting(CorsExpectation {
				allowed_methods: Some(BTreeSet::from([String::from("POST")])),
				allowed_headers: Some(BTreeSet::from([String::from("Content-Type"), String::from("X-Requested-With")])),
				..matching_origin.clone()
			}),
		spa_request(Probe::new("cors-debug", HttpMethod::Get, "/api/cors-debug"))
			.expecting(CorsExpectation { require_allow_origin: true, ..Default::default() }),
		spa_request(Probe::new("credentialed-fetch", HttpMethod::Post, "/api/analyze-part"))
			.with_header("Accept", "application/json")
			.with_body(SAMPLE_PART_NUMBER_BODY)
			.with_credentials()
			.expecting(CorsExpectation { require_credentials_header: true, ..matching_origin }),
	]
}

fn spa_request(probe: Probe) -> Probe {
	probe.with_header("Content-Type", "application/json").with_header("X-Requested-With", "XMLHttpRequest")
}
