use crate::api::pipeline::{PipelineConfig, SecurityHeadersConfig, DEFAULT_REQUEST_TIMEOUT_SECONDS};
use clap::{builder::BoolishValueParser, Arg, ArgAction, ArgMatches, Command};
use std::time::Duration;

pub const ARG_ALLOWED_ORIGINS: &str = "allowed-origins";
pub const ARG_TRUST_PROXY_HEADERS: &str = "trust-proxy-headers";
pub const ARG_REQUEST_TIMEOUT: &str = "request-timeout";
pub const ARG_CSP: &str = "csp";
pub const ARG_HSTS: &str = "hsts";

/// Parse the request pipeline settings.
#[must_use]
pub fn parse(matches: &ArgMatches) -> PipelineConfig {
    let flag = |id: &str, default: bool| matches.get_one::<bool>(id).copied().unwrap_or(default);

    let allowed_origins: Vec<String> = matches
        .get_many::<String>(ARG_ALLOWED_ORIGINS)
        .map(|origins| {
            origins
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect()
        })
        .unwrap_or_default();

    PipelineConfig {
        security: SecurityHeadersConfig::new()
            .with_csp(flag(ARG_CSP, true))
            .with_hsts(flag(ARG_HSTS, true)),
        allowed_origins: if allowed_origins.is_empty() {
            vec!["*".to_string()]
        } else {
            allowed_origins
        },
        request_timeout: Duration::from_secs(
            matches
                .get_one::<u64>(ARG_REQUEST_TIMEOUT)
                .copied()
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECONDS),
        ),
        trust_proxy_headers: flag(ARG_TRUST_PROXY_HEADERS, false),
    }
}

fn boolish(id: &'static str, default: &'static str) -> Arg {
    Arg::new(id)
        .long(id)
        .num_args(0..=1)
        .default_value(default)
        .default_missing_value("true")
        .action(ArgAction::Set)
        .value_parser(BoolishValueParser::new())
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_ALLOWED_ORIGINS)
                .long(ARG_ALLOWED_ORIGINS)
                .help("Comma separated CORS origins, `*` allows any")
                .env("FINGERD_ALLOWED_ORIGINS")
                .value_delimiter(',')
                .default_value("*"),
        )
        .arg(
            boolish(ARG_TRUST_PROXY_HEADERS, "false")
                .help("Identify clients by X-Forwarded-For / X-Real-IP (only behind a trusted proxy)")
                .env("FINGERD_TRUST_PROXY_HEADERS"),
        )
        .arg(
            Arg::new(ARG_REQUEST_TIMEOUT)
                .long(ARG_REQUEST_TIMEOUT)
                .help("Seconds before an in-flight request is abandoned")
                .env("FINGERD_REQUEST_TIMEOUT")
                .default_value("30")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            boolish(ARG_CSP, "true")
                .help("Send a Content-Security-Policy header")
                .env("FINGERD_CSP"),
        )
        .arg(
            boolish(ARG_HSTS, "true")
                .help("Send a Strict-Transport-Security header")
                .env("FINGERD_HSTS"),
        )
}
