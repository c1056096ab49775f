use crate::{
    api::{self, pipeline::PipelineConfig, ServerSettings},
    cache::CacheConfig,
    cli::commands::{auth, cache, limits},
};
use anyhow::Result;
use tracing::info;
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub auth: auth::Options,
    pub cache: cache::Options,
    pub limits: limits::Options,
    pub pipeline: PipelineConfig,
}

impl Args {
    #[must_use]
    pub fn into_settings(self) -> ServerSettings {
        let cache: CacheConfig = self.cache.config();
        ServerSettings {
            port: self.port,
            dsn: self.dsn,
            jwt_secret: self.auth.jwt_secret,
            tokens: self.auth.tokens,
            cache,
            rate_limit: self.limits.rate_limit,
            pipeline: self.pipeline,
            maintenance_interval: self.limits.maintenance_interval,
        }
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database is unreachable, the credential settings are invalid,
/// or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);
    api::new(args.into_settings()).await
}

fn log_startup_args(args: &Args) {
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        ("dsn", redact_dsn(&args.dsn)),
        ("token_issuer", args.auth.tokens.issuer().to_string()),
        (
            "token_ttl",
            format!("{}s", args.auth.tokens.ttl().as_secs()),
        ),
        ("cache_prefix", args.cache.prefix.clone()),
        ("cache_max_entries", args.cache.max_entries.to_string()),
        (
            "rate_limit",
            format!(
                "{}/s burst {}",
                args.limits.rate_limit.rate_per_second(),
                args.limits.rate_limit.burst()
            ),
        ),
        ("allowed_origins", args.pipeline.allowed_origins.join(",")),
        (
            "trust_proxy_headers",
            args.pipeline.trust_proxy_headers.to_string(),
        ),
    ];
    log_entries("Startup configuration", &entries);
}

fn redact_dsn(dsn: &str) -> String {
    match Url::parse(dsn) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("REDACTED"));
            }
            parsed.to_string()
        }
        Err(_) => "invalid-dsn".to_string(),
    }
}

fn log_entries(title: &str, entries: &[(&str, String)]) {
    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!(
        "fingerd {} - {}\n\n{title}:",
        env!("CARGO_PKG_VERSION"),
        short_commit(crate::GIT_COMMIT_HASH)
    );
    for (key, value) in entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn short_commit(hash: &str) -> String {
    hash.trim().chars().take(7).collect()
}
