use crate::cli::{
    actions::{server::Args, Action},
    commands::{auth, cache, http, limits, ARG_DSN, ARG_PORT},
};
use anyhow::{Context, Result};

/// # Errors
/// Returns an error if required arguments are missing or invalid.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>(ARG_DSN)
        .cloned()
        .context("missing required argument: --dsn")?;

    Ok(Action::Server(Args {
        port,
        dsn,
        auth: auth::Options::parse(matches)?,
        cache: cache::Options::parse(matches),
        limits: limits::Options::parse(matches),
        pipeline: http::parse(matches),
    }))
}
