//! Runtime configuration, from flags or environment.

use std::net::SocketAddr;

use chrono::Duration;
use clap::Parser;

use crate::queue::RetrySpec;
use crate::webhooks::RouterOptions;

#[derive(Debug, Parser)]
#[command(name = "docket-bot", about = "Court-filing webhook bot")]
pub struct Config {
    /// Address the webhook server listens on.
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8080")]
    pub bind_addr: SocketAddr,

    /// Grace period before resolving filings with no archived document,
    /// giving the source system time to fetch free copies.
    #[arg(long, env = "WEBHOOK_DELAY_SECS", default_value_t = 120)]
    pub webhook_delay_secs: u64,

    /// Retries per queued job after the first failed attempt.
    #[arg(long, env = "JOB_MAX_RETRIES", default_value_t = 3)]
    pub job_max_retries: u32,

    /// Delay between a job failure and its retry.
    #[arg(long, env = "JOB_RETRY_INTERVAL_SECS", default_value_t = 60)]
    pub job_retry_interval_secs: u64,

    /// Base URL of the filing-tracking service.
    #[arg(
        long,
        env = "COURTLISTENER_BASE_URL",
        default_value = "https://www.courtlistener.com"
    )]
    pub courtlistener_base_url: String,

    /// API token for the filing-tracking service.
    #[arg(long, env = "COURTLISTENER_TOKEN", hide_env_values = true)]
    pub courtlistener_token: String,

    /// Base URL of the thumbnail-rendering microservice.
    #[arg(
        long,
        env = "THUMBNAIL_BASE_URL",
        default_value = "http://localhost:5050"
    )]
    pub thumbnail_base_url: String,

    /// Mastodon instance to post to; posting is disabled when unset.
    #[arg(long, env = "MASTODON_BASE_URL")]
    pub mastodon_base_url: Option<String>,

    /// Mastodon API access token.
    #[arg(long, env = "MASTODON_ACCESS_TOKEN", hide_env_values = true)]
    pub mastodon_access_token: Option<String>,

    /// Handle of the posting account, for logs.
    #[arg(long, env = "MASTODON_ACCOUNT", default_value = "@docketbot")]
    pub mastodon_account: String,
}

impl Config {
    pub fn retry_spec(&self) -> RetrySpec {
        RetrySpec {
            max_retries: self.job_max_retries,
            interval: Duration::seconds(self.job_retry_interval_secs as i64),
        }
    }

    pub fn router_options(&self) -> RouterOptions {
        RouterOptions {
            webhook_delay: Duration::seconds(self.webhook_delay_secs as i64),
            retry: self.retry_spec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse() {
        let config = Config::parse_from(["docket-bot", "--courtlistener-token", "secret"]);
        assert_eq!(config.webhook_delay_secs, 120);
        assert_eq!(config.retry_spec().max_retries, 3);
        assert_eq!(config.router_options().webhook_delay, Duration::minutes(2));
        assert!(config.mastodon_base_url.is_none());
    }

    #[test]
    fn flags_override_defaults() {
        let config = Config::parse_from([
            "docket-bot",
            "--courtlistener-token",
            "secret",
            "--webhook-delay-secs",
            "5",
            "--job-max-retries",
            "0",
        ]);
        assert_eq!(config.webhook_delay_secs, 5);
        assert_eq!(config.retry_spec().max_retries, 0);
    }
}
