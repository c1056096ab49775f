use crate::token::{TokenConfig, DEFAULT_ISSUER, DEFAULT_TOKEN_TTL_SECONDS, MIN_SECRET_LEN};
use anyhow::{anyhow, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;
use std::time::Duration;

pub const ARG_JWT_SECRET: &str = "jwt-secret";
pub const ARG_TOKEN_ISSUER: &str = "token-issuer";
pub const ARG_TOKEN_TTL: &str = "token-ttl";

#[derive(Debug)]
pub struct Options {
    pub jwt_secret: SecretString,
    pub tokens: TokenConfig,
}

impl Options {
    /// Parse credential arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the secret is missing or shorter than [`MIN_SECRET_LEN`] bytes.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let secret = matches
            .get_one::<String>(ARG_JWT_SECRET)
            .cloned()
            .ok_or_else(|| anyhow!("missing required argument: --{ARG_JWT_SECRET}"))?;
        if secret.len() < MIN_SECRET_LEN {
            return Err(anyhow!(
                "--{ARG_JWT_SECRET} must be at least {MIN_SECRET_LEN} bytes"
            ));
        }

        let issuer = matches
            .get_one::<String>(ARG_TOKEN_ISSUER)
            .cloned()
            .filter(|issuer| !issuer.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ISSUER.to_string());
        let ttl = matches
            .get_one::<u64>(ARG_TOKEN_TTL)
            .copied()
            .unwrap_or(DEFAULT_TOKEN_TTL_SECONDS);

        Ok(Self {
            jwt_secret: SecretString::from(secret),
            tokens: TokenConfig::new()
                .with_issuer(issuer)
                .with_ttl(Duration::from_secs(ttl)),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_JWT_SECRET)
                .long(ARG_JWT_SECRET)
                .help("HS256 signing secret for credentials, at least 32 bytes")
                .env("FINGERD_JWT_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_TOKEN_ISSUER)
                .long(ARG_TOKEN_ISSUER)
                .help("Issuer claim stamped on and required from credentials")
                .env("FINGERD_TOKEN_ISSUER")
                .default_value(DEFAULT_ISSUER),
        )
        .arg(
            Arg::new(ARG_TOKEN_TTL)
                .long(ARG_TOKEN_TTL)
                .help("Credential lifetime in seconds")
                .env("FINGERD_TOKEN_TTL")
                .default_value("86400")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}
