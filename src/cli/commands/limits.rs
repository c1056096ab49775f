use crate::{
    api::maintenance::DEFAULT_MAINTENANCE_INTERVAL_SECONDS,
    ratelimit::{RateLimitConfig, DEFAULT_BURST, DEFAULT_RATE_PER_SECOND},
};
use clap::{Arg, ArgMatches, Command};
use std::time::Duration;

pub const ARG_RATE_LIMIT_RPS: &str = "rate-limit-rps";
pub const ARG_RATE_LIMIT_BURST: &str = "rate-limit-burst";
pub const ARG_MAINTENANCE_INTERVAL: &str = "maintenance-interval";

#[derive(Debug, Clone)]
pub struct Options {
    pub rate_limit: RateLimitConfig,
    pub maintenance_interval: Duration,
}

impl Options {
    #[must_use]
    pub fn parse(matches: &ArgMatches) -> Self {
        let rate = matches
            .get_one::<f64>(ARG_RATE_LIMIT_RPS)
            .copied()
            .unwrap_or(DEFAULT_RATE_PER_SECOND);
        let burst = matches
            .get_one::<u32>(ARG_RATE_LIMIT_BURST)
            .copied()
            .unwrap_or(DEFAULT_BURST);
        let interval = matches
            .get_one::<u64>(ARG_MAINTENANCE_INTERVAL)
            .copied()
            .unwrap_or(DEFAULT_MAINTENANCE_INTERVAL_SECONDS);

        Self {
            rate_limit: RateLimitConfig::new()
                .with_rate_per_second(rate)
                .with_burst(burst),
            maintenance_interval: Duration::from_secs(interval),
        }
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_RATE_LIMIT_RPS)
                .long(ARG_RATE_LIMIT_RPS)
                .help("Steady request rate allowed per client, in requests per second")
                .env("FINGERD_RATE_LIMIT_RPS")
                .default_value("10")
                .value_parser(clap::value_parser!(f64)),
        )
        .arg(
            Arg::new(ARG_RATE_LIMIT_BURST)
                .long(ARG_RATE_LIMIT_BURST)
                .help("Requests a client may send in a burst before throttling")
                .env("FINGERD_RATE_LIMIT_BURST")
                .default_value("20")
                .value_parser(clap::value_parser!(u32).range(1..)),
        )
        .arg(
            Arg::new(ARG_MAINTENANCE_INTERVAL)
                .long(ARG_MAINTENANCE_INTERVAL)
                .help("Seconds between expired-session sweeps and idle bucket pruning")
                .env("FINGERD_MAINTENANCE_INTERVAL")
                .default_value("300")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}
