use std::time::Duration;

use clap::{Parser, Subcommand};

use crate::rate_limit::RateLimitPolicy;
use crate::retry::RetryPolicy;

pub const API_URL_ENV: &str = "STOREFRONT_API_URL";
pub const SITE_URL_ENV: &str = "STOREFRONT_SITE_URL";
pub const TIMEOUT_ENV: &str = "STOREFRONT_TIMEOUT_SECS";

const DEFAULT_API_URL: &str = "http://localhost:5000/api";
const DEFAULT_SITE_URL: &str = "http://localhost:3000";

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_site_url() -> String {
    DEFAULT_SITE_URL.to_string()
}

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    pub site_url: String, // canonical storefront URL, used for absolute links
    pub timeout: Duration,
    pub login_redirect_delay: Duration,
    pub retry: RetryPolicy,
    pub general_limit: RateLimitPolicy,
    pub auth_limit: RateLimitPolicy,
    pub payment_limit: RateLimitPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            site_url: default_site_url(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            login_redirect_delay: Duration::from_millis(1500),
            retry: RetryPolicy::default(),
            general_limit: RateLimitPolicy::GENERAL,
            auth_limit: RateLimitPolicy::AUTH,
            payment_limit: RateLimitPolicy::PAYMENT,
        }
    }
}

impl ClientConfig {
    /// Create config from environment variables.
    ///
    /// | Variable | Description |
    /// |----------|-------------|
    /// | `STOREFRONT_API_URL` | Backend base URL |
    /// | `STOREFRONT_SITE_URL` | Canonical site URL |
    /// | `STOREFRONT_TIMEOUT_SECS` | Request timeout in seconds (default: 30) |
    pub fn from_env() -> Self {
        Self {
            api_url: std::env::var(API_URL_ENV).unwrap_or_else(|_| default_api_url()),
            site_url: std::env::var(SITE_URL_ENV).unwrap_or_else(|_| default_site_url()),
            timeout: std::env::var(TIMEOUT_ENV)
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            ..Self::default()
        }
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn with_site_url(mut self, url: impl Into<String>) -> Self {
        self.site_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_login_redirect_delay(mut self, delay: Duration) -> Self {
        self.login_redirect_delay = delay;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_limits(
        mut self,
        general: RateLimitPolicy,
        auth: RateLimitPolicy,
        payment: RateLimitPolicy,
    ) -> Self {
        self.general_limit = general;
        self.auth_limit = auth;
        self.payment_limit = payment;
        self
    }

    // Absolute storefront URL for a page path
    pub fn site_link(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.site_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "storefront")]
#[command(about = "Command-line client for the storefront backend API")]
pub struct Args {
    // Backend base URL
    #[arg(long, env = "STOREFRONT_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    // Canonical site URL
    #[arg(long, env = "STOREFRONT_SITE_URL", default_value = DEFAULT_SITE_URL)]
    pub site_url: String,

    // Request timeout in seconds
    #[arg(short, long, env = "STOREFRONT_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,

    // Retry transient failures (429/502/503/504) up to this many times
    #[arg(long, default_value_t = 3)]
    pub max_retries: u32,

    // Print prometheus metrics after the command
    #[arg(long)]
    pub metrics: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List products
    Products {
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Show one product
    Product { id: String },
    /// List categories
    Categories,
    /// Show one order
    Order { id: String },
    /// Track a shipment by tracking number
    Track { tracking_number: String },
    /// Fetch a CSRF token from the backend
    Csrf,
}

impl Args {
    pub fn to_config(&self) -> ClientConfig {
        ClientConfig::default()
            .with_api_url(self.api_url.clone())
            .with_site_url(self.site_url.clone())
            .with_timeout(Duration::from_secs(self.timeout))
            .with_retry(RetryPolicy {
                max_retries: self.max_retries,
                ..RetryPolicy::default()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.auth_limit, RateLimitPolicy::AUTH);
        assert_eq!(config.retry.max_retries, 3);
    }

    #[test]
    fn test_site_link_joins_slashes() {
        let config = ClientConfig::default().with_site_url("https://shop.example.com/");
        assert_eq!(
            config.site_link("/products/42"),
            "https://shop.example.com/products/42"
        );
    }

    #[test]
    fn test_cli_defaults_match_library_defaults() {
        let from_cli = Args::parse_from(["storefront", "categories"]).to_config();
        let library = ClientConfig::default();
        assert_eq!(from_cli.api_url, library.api_url);
        assert_eq!(from_cli.site_url, library.site_url);
        assert_eq!(from_cli.timeout, library.timeout);
    }

    #[test]
    fn test_args_parse_into_config() {
        let args = Args::parse_from([
            "storefront",
            "--api-url",
            "https://api.example.com",
            "--timeout",
            "5",
            "--max-retries",
            "1",
            "track",
            "1Z999",
        ]);
        let config = args.to_config();
        assert_eq!(config.api_url, "https://api.example.com");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.retry.max_retries, 1);
        assert!(matches!(args.command, Command::Track { ref tracking_number } if tracking_number == "1Z999"));
    }
}
