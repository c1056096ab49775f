use crate::cache::{
    keys::DEFAULT_PREFIX, CacheConfig, DEFAULT_MAX_ENTRIES, DEFAULT_RECORD_TTL_SECONDS,
    DEFAULT_SEARCH_EMPTY_TTL_SECONDS, DEFAULT_SEARCH_TTL_SECONDS, MAX_TTL_SECONDS,
};
use clap::{Arg, ArgMatches, Command};
use std::time::Duration;

pub const ARG_CACHE_MAX_ENTRIES: &str = "cache-max-entries";
pub const ARG_CACHE_PREFIX: &str = "cache-prefix";
pub const ARG_CACHE_TTL: &str = "cache-ttl";
pub const ARG_SEARCH_TTL: &str = "search-ttl";
pub const ARG_SEARCH_EMPTY_TTL: &str = "search-empty-ttl";

#[derive(Debug, Clone)]
pub struct Options {
    pub max_entries: usize,
    pub prefix: String,
    pub record_ttl_seconds: u64,
    pub search_ttl_seconds: u64,
    pub search_empty_ttl_seconds: u64,
}

impl Options {
    #[must_use]
    pub fn parse(matches: &ArgMatches) -> Self {
        let seconds = |id: &str, default: u64| matches.get_one::<u64>(id).copied().unwrap_or(default);

        Self {
            max_entries: matches
                .get_one::<usize>(ARG_CACHE_MAX_ENTRIES)
                .copied()
                .unwrap_or(DEFAULT_MAX_ENTRIES),
            prefix: matches
                .get_one::<String>(ARG_CACHE_PREFIX)
                .cloned()
                .unwrap_or_else(|| DEFAULT_PREFIX.to_string()),
            record_ttl_seconds: seconds(ARG_CACHE_TTL, DEFAULT_RECORD_TTL_SECONDS),
            search_ttl_seconds: seconds(ARG_SEARCH_TTL, DEFAULT_SEARCH_TTL_SECONDS),
            search_empty_ttl_seconds: seconds(ARG_SEARCH_EMPTY_TTL, DEFAULT_SEARCH_EMPTY_TTL_SECONDS),
        }
    }

    #[must_use]
    pub fn config(&self) -> CacheConfig {
        CacheConfig::new()
            .with_prefix(self.prefix.clone())
            .with_max_entries(self.max_entries)
            .with_record_ttl(Duration::from_secs(self.record_ttl_seconds))
            .with_search_ttl(Duration::from_secs(self.search_ttl_seconds))
            .with_search_empty_ttl(Duration::from_secs(self.search_empty_ttl_seconds))
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_CACHE_MAX_ENTRIES)
                .long(ARG_CACHE_MAX_ENTRIES)
                .help("Maximum number of cached records and searches")
                .env("FINGERD_CACHE_MAX_ENTRIES")
                .default_value("10000")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new(ARG_CACHE_PREFIX)
                .long(ARG_CACHE_PREFIX)
                .help("Prefix for every cache key")
                .env("FINGERD_CACHE_PREFIX")
                .default_value(DEFAULT_PREFIX),
        )
        .arg(
            Arg::new(ARG_CACHE_TTL)
                .long(ARG_CACHE_TTL)
                .help("TTL in seconds for cached WebFinger records")
                .env("FINGERD_CACHE_TTL")
                .default_value("300")
                .value_parser(clap::value_parser!(u64).range(..=MAX_TTL_SECONDS)),
        )
        .arg(
            Arg::new(ARG_SEARCH_TTL)
                .long(ARG_SEARCH_TTL)
                .help("TTL in seconds for cached search results")
                .env("FINGERD_SEARCH_TTL")
                .default_value("300")
                .value_parser(clap::value_parser!(u64).range(..=MAX_TTL_SECONDS)),
        )
        .arg(
            Arg::new(ARG_SEARCH_EMPTY_TTL)
                .long(ARG_SEARCH_EMPTY_TTL)
                .help("TTL in seconds for cached empty search results, capped at --search-ttl")
                .env("FINGERD_SEARCH_EMPTY_TTL")
                .default_value("60")
                .value_parser(clap::value_parser!(u64).range(..=MAX_TTL_SECONDS)),
        )
}
