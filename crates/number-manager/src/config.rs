//! Service configuration loaded from environment variables.

use anyhow::{Context, Result};
use number_store::ProviderName;
use serde::Deserialize;
use std::time::Duration;

/// Service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Number database
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Record cache
    #[serde(default)]
    pub cache: CacheConfig,

    /// Telnyx carrier API
    pub telnyx: TelnyxConfig,

    /// Billing service
    #[serde(default)]
    pub billing: BillingConfig,

    /// Outbound event delivery
    #[serde(default)]
    pub webhook: WebhookConfig,

    /// Carrier selection
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Background renewal
    #[serde(default)]
    pub renewal: RenewalConfig,

    #[serde(default)]
    pub virtual_numbers: VirtualNumberConfig,

    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Redis URL. The in-process cache is used when unset.
    #[serde(default)]
    pub redis_url: Option<String>,

    /// How long a cached record stays valid
    #[serde(default = "default_cache_ttl", with = "humantime_serde")]
    pub ttl: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelnyxConfig {
    /// Telnyx API key
    pub api_key: String,

    #[serde(default = "default_telnyx_url")]
    pub base_url: String,

    /// Voice connection attached to purchased numbers
    #[serde(default)]
    pub connection_id: Option<String>,

    /// Messaging profile attached to purchased numbers
    #[serde(default)]
    pub messaging_profile_id: Option<String>,

    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BillingConfig {
    #[serde(default = "default_billing_url")]
    pub base_url: String,

    /// Country used for renewal balance checks
    #[serde(default = "default_reference_country")]
    pub reference_country: String,

    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    /// Event endpoint. Events are only logged when unset.
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// Carrier used for purchases and number search
    #[serde(default = "default_provider")]
    pub default: ProviderName,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenewalConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Time between renewal runs
    #[serde(default = "default_renewal_interval", with = "humantime_serde")]
    pub interval: Duration,

    /// Numbers whose last renewal is older than this many days are renewed
    #[serde(default = "default_renewal_days")]
    pub days: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VirtualNumberConfig {
    /// 0 disables the limit
    #[serde(default = "default_max_virtual_per_customer")]
    pub max_per_customer: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `text` or `json`
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default implementations
impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            ttl: default_cache_ttl(),
        }
    }
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            base_url: default_billing_url(),
            reference_country: default_reference_country(),
            timeout: default_timeout(),
        }
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout: default_timeout(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            default: default_provider(),
        }
    }
}

impl Default for RenewalConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            interval: default_renewal_interval(),
            days: default_renewal_days(),
        }
    }
}

impl Default for VirtualNumberConfig {
    fn default() -> Self {
        Self {
            max_per_customer: default_max_virtual_per_customer(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default value functions
fn default_database_url() -> String {
    "sqlite://number-manager.db".into()
}

fn default_max_connections() -> u32 {
    5
}

fn default_cache_ttl() -> Duration {
    Duration::from_secs(24 * 60 * 60) // 24 hours
}

fn default_telnyx_url() -> String {
    telnyx_client::DEFAULT_BASE_URL.into()
}

fn default_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_billing_url() -> String {
    "http://billing-manager:8080".into()
}

fn default_reference_country() -> String {
    "us".into()
}

fn default_provider() -> ProviderName {
    ProviderName::Telnyx
}

fn default_true() -> bool {
    true
}

fn default_renewal_interval() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_renewal_days() -> u32 {
    30
}

fn default_max_virtual_per_customer() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "text".into()
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        Self::from_environment(config::Environment::default())
    }

    fn from_environment(environment: config::Environment) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(
                environment
                    .separator("__")
                    // Numbers such as +14703298699 must stay strings.
                    .try_parsing(false),
            )
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Handler tunables derived from this configuration.
    pub fn handler_settings(&self) -> crate::handler::HandlerSettings {
        crate::handler::HandlerSettings {
            reference_country: self.billing.reference_country.clone(),
            max_virtual_per_customer: self.virtual_numbers.max_per_customer,
        }
    }
}
