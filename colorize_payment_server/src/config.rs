//! Server configuration.
//!
//! Everything is read from `CPG_*` environment variables (a `.env` file is loaded first, if there is one). Missing or
//! malformed values are logged and replaced with defaults. The server never refuses to start because of a typo in an
//! optional setting.
use std::{env, fmt::Display, str::FromStr, time::Duration};

use colorize_payment_engine::{cpe_api::retry::SettlementPolicy, SweepSettings};
use cpg_common::{helpers::parse_boolean_flag, Secret};
use gateway_tools::GatewayConfig;
use log::*;

use crate::integrations::analytics::AnalyticsConfig;

const DEFAULT_CPG_HOST: &str = "127.0.0.1";
const DEFAULT_CPG_PORT: u16 = 8360;
const DEFAULT_ASSET_TIMEOUT: Duration = Duration::from_secs(20);
const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(300);
const DEFAULT_STATUS_CACHE_TTL: Duration = Duration::from_secs(300);
const DEFAULT_POLL_MAX_ATTEMPTS: u32 = 10;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Shared secret for the `/internal` endpoints. If empty, every call to them is refused.
    pub internal_secret: Secret<String>,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_forwarded: bool,
    pub gateway: GatewayConfig,
    pub analytics: AnalyticsConfig,
    /// Upper bound on fetching a result image from the asset store.
    pub asset_timeout: Duration,
    pub reconciliation: ReconciliationConfig,
    /// How long a terminal gateway observation is remembered by this instance.
    pub status_cache_ttl: Duration,
    /// After this many polls of a still-undecided payment, the client is told to contact support.
    pub poll_max_attempts: u32,
}

#[derive(Clone, Copy, Debug)]
pub struct ReconciliationConfig {
    pub interval: Duration,
    pub sweep: SweepSettings,
    /// Set when an external scheduler calls `/internal/reconcile` instead.
    pub disable_worker: bool,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self { interval: DEFAULT_RECONCILE_INTERVAL, sweep: SweepSettings::default(), disable_worker: false }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_CPG_HOST.to_string(),
            port: DEFAULT_CPG_PORT,
            database_url: String::default(),
            internal_secret: Secret::default(),
            use_x_forwarded_for: false,
            use_forwarded: false,
            gateway: GatewayConfig::default(),
            analytics: AnalyticsConfig::default(),
            asset_timeout: DEFAULT_ASSET_TIMEOUT,
            reconciliation: ReconciliationConfig::default(),
            status_cache_ttl: DEFAULT_STATUS_CACHE_TTL,
            poll_max_attempts: DEFAULT_POLL_MAX_ATTEMPTS,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("CPG_HOST").ok().unwrap_or_else(|| DEFAULT_CPG_HOST.into());
        let port = env_or_default("CPG_PORT", DEFAULT_CPG_PORT);
        let database_url = env::var("CPG_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ CPG_DATABASE_URL is not set. Please set it to the URL for the payment database.");
            String::default()
        });
        let internal_secret = env::var("CPG_INTERNAL_SECRET").ok().unwrap_or_else(|| {
            warn!(
                "🪛️ CPG_INTERNAL_SECRET is not set. The /internal endpoints will refuse every request until it is \
                 configured."
            );
            String::default()
        });
        let use_x_forwarded_for = parse_boolean_flag(env::var("CPG_USE_X_FORWARDED_FOR").ok(), false);
        let use_forwarded = parse_boolean_flag(env::var("CPG_USE_FORWARDED").ok(), false);
        let asset_timeout =
            Duration::from_millis(env_or_default("CPG_ASSET_TIMEOUT_MS", millis(DEFAULT_ASSET_TIMEOUT)));
        let status_cache_ttl =
            Duration::from_secs(env_or_default("CPG_STATUS_CACHE_TTL_SECS", DEFAULT_STATUS_CACHE_TTL.as_secs()));
        let poll_max_attempts = env_or_default("CPG_POLL_MAX_ATTEMPTS", DEFAULT_POLL_MAX_ATTEMPTS);
        Self {
            host,
            port,
            database_url,
            internal_secret: Secret::new(internal_secret),
            use_x_forwarded_for,
            use_forwarded,
            gateway: GatewayConfig::new_from_env_or_default(),
            analytics: AnalyticsConfig::from_env_or_default(),
            asset_timeout,
            reconciliation: ReconciliationConfig::from_env_or_default(),
            status_cache_ttl,
            poll_max_attempts,
        }
    }

    /// The settlement timings, with the configurable parts taken from this configuration.
    pub fn settlement_policy(&self) -> SettlementPolicy {
        SettlementPolicy::default()
            .with_terminal_cache_ttl(self.status_cache_ttl)
            .with_max_poll_attempts(self.poll_max_attempts)
    }
}

impl ReconciliationConfig {
    pub fn from_env_or_default() -> Self {
        let defaults = SweepSettings::default();
        let interval =
            Duration::from_secs(env_or_default("CPG_RECONCILE_INTERVAL_SECS", DEFAULT_RECONCILE_INTERVAL.as_secs()));
        let grace_secs = env_or_default("CPG_RECONCILE_GRACE_SECS", defaults.grace_period.num_seconds());
        let batch_size = env_or_default("CPG_RECONCILE_BATCH_SIZE", defaults.batch_size);
        let budget = Duration::from_secs(env_or_default("CPG_RECONCILE_BUDGET_SECS", defaults.time_budget.as_secs()));
        if budget >= interval {
            warn!(
                "🪛️ The reconciliation budget ({}s) is not shorter than its interval ({}s). Runs may overlap.",
                budget.as_secs(),
                interval.as_secs()
            );
        }
        let disable_worker = parse_boolean_flag(env::var("CPG_DISABLE_RECONCILE_WORKER").ok(), false);
        let grace_period = chrono::Duration::seconds(grace_secs);
        let sweep = SweepSettings { grace_period, batch_size, time_budget: budget };
        Self { interval, sweep, disable_worker }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Reads and parses `name`, logging and falling back to `default` if it is missing or invalid.
fn env_or_default<T>(name: &str, default: T) -> T
where
    T: FromStr + Display + Copy,
    T::Err: Display,
{
    match env::var(name) {
        Ok(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            error!("🪛️ {s} is not a valid value for {name}. {e} Using the default, {default}, instead.");
            default
        }),
        Err(_) => {
            debug!("🪛️ {name} is not set. Using the default value of {default}.");
            default
        },
    }
}

//-------------------------------------------------  ServerOptions  ----------------------------------------------------
/// A subset of the server configuration that handlers need. Generally we try to keep this as small as possible, and
/// exclude secrets to avoid passing sensitive information around the system.
#[derive(Clone, Copy, Debug, Default)]
pub struct ServerOptions {
    pub use_x_forwarded_for: bool,
    pub use_forwarded: bool,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self { use_x_forwarded_for: config.use_x_forwarded_for, use_forwarded: config.use_forwarded }
    }
}
