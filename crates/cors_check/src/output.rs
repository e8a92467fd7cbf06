use anyhow::Context;
use cors_probe::{ProbeResult, Report, Verdict};

pub fn render_json(report: &Report) -> anyhow::Result<String> {
	serde_json::to_string_pretty(report).context("Failed to serialize report")
}

pub fn render_text(report: &Report) -> String {
	let mut sections = vec![format_header(report)];
	sections.extend(report.results.iter().map(format_result));
	sections.push(format_summary(report));

	sections.join("\n\n")
}

fn format_header(report: &Report) -> String {
	format!("🌐 API base URL: {}\n📍 Origin: {}", report.base_url, report.origin)
}

fn format_result(result: &ProbeResult) -> String {
	let icon = match result.verdict {
		Verdict::Pass => "✅",
		Verdict::Fail(_) => "❌",
		Verdict::NotApplicable(_) => "➖",
	};

	let status = result.status_code.map_or_else(|| String::from("no response"), |status| status.to_string());
	let verdict = match result.verdict.reason() {
		Some(reason) => format!("{} ({reason})", result.verdict),
		None => result.verdict.to_string(),
	};

	let mut lines = vec![
		format!("{icon} {} | {} {}", result.name, result.method, result.url),
		format!("   Status: {status}"),
		format!("   Verdict: {verdict}"),
	];

	if let Some(error) = &result.error {
		lines.push(format!("   Error: {error}"));
	}

	let cors_headers: Vec<String> =
		result.cors_headers().map(|(name, value)| format!("     {name}: {value}")).collect();
	if !cors_headers.is_empty() {
		lines.push(String::from("   CORS headers:"));
		lines.extend(cors_headers);
	}

	lines.join("\n")
}

fn format_summary(report: &Report) -> String {
	let total = report.results.len();

	if report.overall_pass {
		format!("🎉 All {total} probes passed! CORS is working correctly.")
	} else {
		format!("⚠️ {} of {total} probes did not pass. Check the details above.", report.failed())
	}
}
