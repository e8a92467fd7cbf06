use std::fmt;

use serde::Serialize;

use crate::probe::split_list;
use crate::{CorsExpectation, HttpResponse, Probe, ProbeError};

pub const ALLOW_ORIGIN_HEADER: &str = "Access-Control-Allow-Origin";
pub const ALLOW_METHODS_HEADER: &str = "Access-Control-Allow-Methods";
pub const ALLOW_HEADERS_HEADER: &str = "Access-Control-Allow-Headers";
pub const ALLOW_CREDENTIALS_HEADER: &str = "Access-Control-Allow-Credentials";

pub const TRANSPORT_ERROR_REASON: &str = "transport error";

const WILDCARD: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum Verdict {
	Pass,
	Fail(String),
	NotApplicable(String),
}

impl Verdict {
	#[must_use]
	pub const fn is_pass(&self) -> bool {
		matches!(self, Self::Pass)
	}

	#[must_use]
	pub fn reason(&self) -> Option<&str> {
		match self {
			Self::Pass => None,
			Self::Fail(reason) | Self::NotApplicable(reason) => Some(reason),
		}
	}
}

impl fmt::Display for Verdict {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Pass => f.write_str("PASS"),
			Self::Fail(_) => f.write_str("FAIL"),
			Self::NotApplicable(_) => f.write_str("N/A"),
		}
	}
}

/// Judges one exchange against the probe's expectation.
///
/// Pure: the same probe and outcome always give the same verdict. All failed checks are reported
/// together, joined with "; ".
#[must_use]
pub fn evaluate(probe: &Probe, outcome: Result<&HttpResponse, &ProbeError>) -> Verdict {
	let Ok(response) = outcome else {
		return Verdict::Fail(String::from(TRANSPORT_ERROR_REASON));
	};

	if !probe.is_preflight() && !probe.credentials && only_preflight_checks(&probe.expectation) {
		return Verdict::NotApplicable(String::from("allowed methods and headers are only checked on OPTIONS requests"));
	}

	let mut failures = Vec::new();

	check_allow_origin(probe, response, &mut failures);

	if probe.is_preflight() {
		check_preflight(probe, response, &mut failures);
	}

	if probe.expectation.require_credentials_header {
		match response.header(ALLOW_CREDENTIALS_HEADER) {
			Some(value) if value.trim().eq_ignore_ascii_case("true") => {},
			Some(value) => failures.push(format!("{ALLOW_CREDENTIALS_HEADER} is {value:?}, expected \"true\"")),
			None => failures.push(format!("missing {ALLOW_CREDENTIALS_HEADER}")),
		}
	}

	if failures.is_empty() { Verdict::Pass } else { Verdict::Fail(failures.join("; ")) }
}

/// True when the expectation names nothing but preflight lists.
const fn only_preflight_checks(expectation: &CorsExpectation) -> bool {
	(expectation.allowed_methods.is_some() || expectation.allowed_headers.is_some())
		&& !expectation.require_allow_origin
		&& !expectation.require_credentials_header
}

fn check_allow_origin(probe: &Probe, response: &HttpResponse, failures: &mut Vec<String>) {
	let expectation = &probe.expectation;
	let allow_origin = response.header(ALLOW_ORIGIN_HEADER);
	let allow_origin = allow_origin.as_deref().map(str::trim).filter(|value| !value.is_empty());
	let credentialed = probe.credentials || expectation.require_credentials_header;

	if credentialed && allow_origin == Some(WILDCARD) {
		failures.push(format!("wildcard {ALLOW_ORIGIN_HEADER} is rejected for credentialed requests"));
		return;
	}

	if !expectation.require_allow_origin {
		return;
	}

	match (allow_origin, expectation.allowed_origin.as_deref()) {
		(None, _) => failures.push(format!("missing {ALLOW_ORIGIN_HEADER}")),
		(Some(WILDCARD), _) | (Some(_), None | Some(WILDCARD)) => {},
		(Some(actual), Some(expected)) if actual == expected => {},
		(Some(actual), Some(expected)) => {
			failures.push(format!("{ALLOW_ORIGIN_HEADER} is {actual:?}, expected {expected:?}"));
		},
	}
}

fn check_preflight(probe: &Probe, response: &HttpResponse, failures: &mut Vec<String>) {
	let expectation = &probe.expectation;

	if let Some(methods) = &expectation.allowed_methods {
		let mut required: Vec<String> = methods.iter().map(|method| method.to_ascii_uppercase()).collect();
		required.extend(probe.requested_method());

		let missing = missing_entries(response.header(ALLOW_METHODS_HEADER).as_deref(), &required);
		if !missing.is_empty() {
			failures.push(format!("{ALLOW_METHODS_HEADER} is missing {}", missing.join(", ")));
		}
	}

	if let Some(headers) = &expectation.allowed_headers {
		let mut required: Vec<String> = headers.iter().cloned().collect();
		required.extend(probe.requested_headers());

		let missing = missing_entries(response.header(ALLOW_HEADERS_HEADER).as_deref(), &required);
		if !missing.is_empty() {
			failures.push(format!("{ALLOW_HEADERS_HEADER} is missing {}", missing.join(", ")));
		}
	}
}

/// Required entries absent from a reflected list. `*` in the list allows everything.
fn missing_entries(reflected: Option<&str>, required: &[String]) -> Vec<String> {
	let reflected = reflected.map(split_list).unwrap_or_default();
	if reflected.iter().any(|entry| entry == WILDCARD) {
		return Vec::new();
	}

	let mut missing: Vec<String> = Vec::new();
	for entry in required {
		let allowed = reflected.iter().any(|candidate| candidate.eq_ignore_ascii_case(entry));
		let already_listed = missing.iter().any(|seen| seen.eq_ignore_ascii_case(entry));
		if !allowed && !already_listed {
			missing.push(entry.clone());
		}
	}

	missing
}
