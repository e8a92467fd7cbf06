use std::error::Error as _;
use std::time::Duration;

use reqwest::{Method, redirect};
use tracing::debug;

use crate::{ConfigError, HttpMethod, HttpRequest, HttpResponse, ProbeError, Transport};

pub struct ReqwestTransport {
	client: reqwest::Client,
	timeout: Duration,
}

impl ReqwestTransport {
	/// Redirects are not followed: CORS headers are judged on the URL the probe names.
	pub fn new(timeout: Duration) -> Result<Self, ConfigError> {
		let client = reqwest::Client::builder()
			.timeout(timeout)
			.redirect(redirect::Policy::none())
			.build()
			.map_err(|error| ConfigError::HttpClient(error.to_string()))?;

		Ok(Self { client, timeout })
	}

	fn map_error(&self, error: &reqwest::Error) -> ProbeError {
		if error.is_timeout() {
			return ProbeError::timeout(self.timeout);
		}

		let mut message = error.to_string();
		let mut source = error.source();
		while let Some(cause) = source {
			message = format!("{message}: {cause}");
			source = cause.source();
		}

		ProbeError::Transport(message)
	}
}

#[async_trait::async_trait]
impl Transport for ReqwestTransport {
	async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ProbeError> {
		debug!(method = %request.method, url = %request.url, "sending probe request");

		let mut builder = self.client.request(to_reqwest_method(request.method), request.url);
		for (name, value) in &request.headers {
			builder = builder.header(name.as_str(), value.as_str());
		}
		if let Some(body) = request.body {
			builder = builder.body(body);
		}

		let response = builder.send().await.map_err(|error| self.map_error(&error))?;

		let status = response.status().as_u16();
		let headers = response
			.headers()
			.iter()
			.map(|(name, value)| (name.as_str().to_owned(), String::from_utf8_lossy(value.as_bytes()).into_owned()))
			.collect();
		let body = response.bytes().await.map_err(|error| self.map_error(&error))?.to_vec();

		Ok(HttpResponse { status, headers, body })
	}
}

fn to_reqwest_method(method: HttpMethod) -> Method {
	match method {
		HttpMethod::Get => Method::GET,
		HttpMethod::Head => Method::HEAD,
		HttpMethod::Post => Method::POST,
		HttpMethod::Put => Method::PUT,
		HttpMethod::Patch => Method::PATCH,
		HttpMethod::Delete => Method::DELETE,
		HttpMethod::Options => Method::OPTIONS,
	}
}
