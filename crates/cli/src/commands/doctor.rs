use std::time::Duration;

use dabini_core::config::{AppConfig, LoadOptions};
use dabini_discord::verify::SignatureVerifier;
use reqwest::Url;
use serde::Serialize;
use tokio::net::TcpStream;

use super::CommandResult;

const ENGINE_PROBE_TIMEOUT: Duration = Duration::from_secs(3);
const FAILED_EXIT_CODE: u8 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into() }
    }

    fn skipped(name: &'static str) -> Self {
        Self {
            name,
            status: CheckStatus::Skipped,
            details: "skipped because configuration did not load".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { FAILED_EXIT_CODE };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let checks = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => vec![
            DoctorCheck::pass("config_validation", "configuration loaded and validated"),
            check_public_key(&config),
            check_engine_reachability(&config),
        ],
        Err(error) => vec![
            DoctorCheck::fail("config_validation", error.to_string()),
            DoctorCheck::skipped("webhook_public_key"),
            DoctorCheck::skipped("engine_reachability"),
        ],
    };

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

/// Config validation only checks the hex shape; this also rejects points off the curve.
fn check_public_key(config: &AppConfig) -> DoctorCheck {
    match SignatureVerifier::from_hex(&config.discord.public_key) {
        Ok(_) => DoctorCheck::pass("webhook_public_key", "ed25519 public key decoded"),
        Err(error) => DoctorCheck::fail("webhook_public_key", error.to_string()),
    }
}

fn check_engine_reachability(config: &AppConfig) -> DoctorCheck {
    const NAME: &str = "engine_reachability";

    let address = match engine_socket_address(&config.engine.base_url) {
        Ok(address) => address,
        Err(details) => return DoctorCheck::fail(NAME, details),
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck::fail(NAME, format!("failed to initialize async runtime: {error}"));
        }
    };

    let result = runtime.block_on(async {
        tokio::time::timeout(ENGINE_PROBE_TIMEOUT, TcpStream::connect(address.as_str())).await
    });

    match result {
        Ok(Ok(_)) => DoctorCheck::pass(NAME, format!("tcp connect to `{address}` succeeded")),
        Ok(Err(error)) => DoctorCheck::fail(NAME, format!("tcp connect to `{address}` failed: {error}")),
        Err(_) => DoctorCheck::fail(
            NAME,
            format!("tcp connect to `{address}` timed out after {}s", ENGINE_PROBE_TIMEOUT.as_secs()),
        ),
    }
}

fn engine_socket_address(base_url: &str) -> Result<String, String> {
    let url = Url::parse(base_url).map_err(|error| format!("engine.base_url is not a URL: {error}"))?;
    let host = url.host_str().ok_or_else(|| "engine.base_url has no host".to_string())?;
    let port = url
        .port_or_known_default()
        .ok_or_else(|| "engine.base_url has no port for its scheme".to_string())?;

    if host.contains(':') {
        Ok(format!("[{}]:{port}", host.trim_start_matches('[').trim_end_matches(']')))
    } else {
        Ok(format!("{host}:{port}"))
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::engine_socket_address;

    #[test]
    fn engine_address_uses_the_scheme_default_port() {
        assert_eq!(
            engine_socket_address("https://engine.example.com/v1"),
            Ok("engine.example.com:443".to_string())
        );
        assert_eq!(engine_socket_address("http://127.0.0.1:7000"), Ok("127.0.0.1:7000".to_string()));
        assert_eq!(engine_socket_address("http://[::1]:7000"), Ok("[::1]:7000".to_string()));
        assert!(engine_socket_address("not a url").is_err());
    }
}
