use std::sync::Arc;
use std::time::Duration;

use cors_probe::{
	CorsExpectation, DEFAULT_ORIGIN, HttpMethod, Probe, ProbeError, REQUEST_METHOD_HEADER, ReqwestTransport, RunSettings,
	Runner, Verdict, default_probes,
};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn runner(base_url: &str, probes: Vec<Probe>) -> Runner {
	let settings = RunSettings { request_timeout: Duration::from_secs(2), ..Default::default() };
	let transport = ReqwestTransport::new(settings.request_timeout).expect("http client");
	Runner::new(base_url, probes, Arc::new(transport), settings).expect("valid runner")
}

fn preflight_probe() -> Probe {
	Probe::new("analyze-part-preflight", HttpMethod::Options, "/api/analyze-part")
		.with_header(REQUEST_METHOD_HEADER, "POST")
		.expecting(CorsExpectation {
			require_allow_origin: true,
			allowed_methods: Some(["POST"].into_iter().map(String::from).collect()),
			..Default::default()
		})
}

#[tokio::test]
async fn health_probe_passes_without_cors_headers_and_sends_origin() {
	let server = MockServer::start().await;
	Mock::given(method("GET"))
		.and(path("/health"))
		.and(header("origin", DEFAULT_ORIGIN))
		.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "status": "healthy" })))
		.expect(1)
		.mount(&server)
		.await;

	let report = runner(&server.uri(), vec![Probe::new("health", HttpMethod::Get, "/health")]).run().await;

	let result = &report.results[0];
	assert!(result.succeeded);
	assert_eq!(result.status_code, Some(200));
	assert_eq!(result.verdict, Verdict::Pass);
	assert!(result.body_snippet.as_deref().is_some_and(|body| body.contains("healthy")));
	assert!(report.overall_pass);
}

#[tokio::test]
async fn preflight_passes_when_post_is_allowed() {
	let server = MockServer::start().await;
	Mock::given(method("OPTIONS"))
		.and(path("/api/analyze-part"))
		.and(header("access-control-request-method", "POST"))
		.respond_with(
			ResponseTemplate::new(204)
				.insert_header("Access-Control-Allow-Origin", DEFAULT_ORIGIN)
				.insert_header("Access-Control-Allow-Methods", "GET, POST"),
		)
		.mount(&server)
		.await;

	let report = runner(&server.uri(), vec![preflight_probe()]).run().await;

	assert_eq!(report.results[0].status_code, Some(204));
	assert_eq!(report.results[0].verdict, Verdict::Pass);
	assert!(report.overall_pass);
}

#[tokio::test]
async fn preflight_fails_when_post_is_not_allowed() {
	let server = MockServer::start().await;
	Mock::given(method("OPTIONS"))
		.and(path("/api/analyze-part"))
		.respond_with(
			ResponseTemplate::new(204)
				.insert_header("Access-Control-Allow-Origin", DEFAULT_ORIGIN)
				.insert_header("Access-Control-Allow-Methods", "GET"),
		)
		.mount(&server)
		.await;

	let report = runner(&server.uri(), vec![preflight_probe()]).run().await;

	assert_eq!(report.results[0].verdict, Verdict::Fail(String::from("Access-Control-Allow-Methods is missing POST")));
	assert!(!report.overall_pass);
}

#[tokio::test]
async fn server_errors_are_completed_exchanges() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/api/analyze-part"))
		.respond_with(
			ResponseTemplate::new(500)
				.insert_header("Access-Control-Allow-Origin", DEFAULT_ORIGIN)
				.set_body_string("Internal Server Error"),
		)
		.mount(&server)
		.await;

	let probe = Probe::new("analyze-part", HttpMethod::Post, "/api/analyze-part")
		.with_body(r#"{"part_number":"PA-10116"}"#)
		.expecting(CorsExpectation {
			require_allow_origin: true,
			allowed_origin: Some(String::from(DEFAULT_ORIGIN)),
			..Default::default()
		});
	let report = runner(&server.uri(), vec![probe]).run().await;

	let result = &report.results[0];
	assert!(result.succeeded);
	assert_eq!(result.status_code, Some(500));
	assert!(result.error.is_none());
	assert!(result.verdict.is_pass());
}

#[tokio::test]
async fn default_probes_against_a_permissive_server_pass() {
	let server = MockServer::start().await;
	Mock::given(method("OPTIONS"))
		.respond_with(
			ResponseTemplate::new(204)
				.insert_header("Access-Control-Allow-Origin", DEFAULT_ORIGIN)
				.insert_header("Access-Control-Allow-Methods", "GET, POST, OPTIONS")
				.insert_header("Access-Control-Allow-Headers", "*")
				.insert_header("Access-Control-Allow-Credentials", "true"),
		)
		.mount(&server)
		.await;
	Mock::given(wiremock::matchers::any())
		.respond_with(
			ResponseTemplate::new(200)
				.insert_header("Access-Control-Allow-Origin", DEFAULT_ORIGIN)
				.insert_header("Access-Control-Allow-Credentials", "true")
				.set_body_json(serde_json::json!({ "ok": true })),
		)
		.mount(&server)
		.await;

	let report = runner(&server.uri(), default_probes(DEFAULT_ORIGIN)).run().await;

	let failures: Vec<_> = report.results.iter().filter(|result| !result.verdict.is_pass()).collect();
	assert!(failures.is_empty(), "unexpected failures: {failures:?}");
	assert_eq!(report.results.len(), 5);
}

#[tokio::test]
async fn connection_refused_fails_every_probe() {
	let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
	let port = listener.local_addr().expect("local addr").port();
	drop(listener);

	let report = runner(&format!("http://127.0.0.1:{port}"), default_probes(DEFAULT_ORIGIN)).run().await;

	assert_eq!(report.results.len(), 5);
	for result in &report.results {
		assert!(!result.succeeded);
		assert!(matches!(result.error, Some(ProbeError::Transport(_))), "{result:?}");
		assert_eq!(result.verdict, Verdict::Fail(String::from("transport error")));
	}
	assert!(!report.overall_pass);
}

#[tokio::test]
async fn slow_server_is_reported_as_timeout() {
	let server = MockServer::start().await;
	Mock::given(method("GET"))
		.and(path("/health"))
		.respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
		.mount(&server)
		.await;

	let settings = RunSettings { request_timeout: Duration::from_millis(200), ..Default::default() };
	let transport = ReqwestTransport::new(settings.request_timeout).expect("http client");
	let probes = vec![Probe::new("health", HttpMethod::Get, "/health")];
	let runner = Runner::new(&server.uri(), probes, Arc::new(transport), settings).expect("valid runner");

	let report = runner.run().await;

	assert_eq!(report.results[0].error, Some(ProbeError::Timeout(200)));
	assert!(!report.overall_pass);
}
