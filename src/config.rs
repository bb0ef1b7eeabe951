use crate::core::models::bidder::BidderInfo;
use crate::core::models::publisher::Publisher;
use crate::core::privacy::ActivityControls;
use crate::core::selection::MultiformatStrategy;
use config::Config;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, Builder)]
#[serde(default)]
pub struct AuctionConfig {
    /// Applied when the request carries no tmax
    pub default_tmax_ms: u64,
    /// Requests may not ask for more time than this
    pub max_tmax_ms: u64,
    /// Subtracted from every bidder deadline so we can assemble
    /// the response inside the caller's budget
    pub safety_margin_ms: u64,
    /// When true, an auction with zero selectable bidders is a
    /// request error rather than an empty response
    pub require_bidders: bool,
    /// When true, an unknown or disabled publisher aborts the auction
    pub strict_publishers: bool,
    /// Targeting identifier presented in place of the bidder code
    /// for platform demand seats
    pub platform_seat: String,
}

impl Default for AuctionConfig {
    fn default() -> Self {
        Self {
            default_tmax_ms: 500,
            max_tmax_ms: 1_500,
            safety_margin_ms: 50,
            require_bidders: false,
            strict_publishers: true,
            platform_seat: "platform".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Builder)]
#[serde(default)]
pub struct CurrencyConfig {
    /// Target currency when the request does not declare one
    pub default_currency: String,
    /// External rate source returning `{"conversions": {from: {to: rate}}}`.
    /// When unset the table only ever holds request supplied rates
    pub refresh_url: Option<String>,
    #[serde(with = "humantime_serde")]
    pub refresh_interval: Duration,
    /// Past this age conversions still run but log a warning
    #[serde(with = "humantime_serde")]
    pub stale_after: Duration,
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        Self {
            default_currency: "USD".to_string(),
            refresh_url: None,
            refresh_interval: Duration::from_secs(30 * 60),
            stale_after: Duration::from_secs(24 * 60 * 60),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Builder)]
#[serde(default)]
pub struct MultibidConfig {
    pub enabled: bool,
    /// Bids a single bidder may land across the whole response
    pub max_per_bidder_total: u32,
    /// Bids a single bidder may land on one impression
    pub max_per_bidder_per_imp: u32,
}

impl Default for MultibidConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_per_bidder_total: 3,
            max_per_bidder_per_imp: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[serde(default)]
pub struct MultiformatConfig {
    pub strategy: MultiformatStrategy,
}

#[derive(Debug, Clone, Serialize, Deserialize, Builder)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive failures before the circuit opens
    pub failure_threshold: u32,
    /// How long an open circuit rejects callouts before allowing
    /// a half open probe
    #[serde(with = "humantime_serde")]
    pub open_cooldown: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_cooldown: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Builder)]
#[serde(default)]
pub struct ClientConfig {
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    pub pool_max_idle_per_host: usize,
    pub user_agent: String,
    /// Cap on adapter produced request bodies, bytes
    pub max_request_body: usize,
    /// Cap on response bodies before decompression, bytes
    pub max_response_body_compressed: usize,
    /// Absolute cap on response bodies after decompression, bytes
    pub max_response_body: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(1),
            pool_max_idle_per_host: 100,
            user_agent: "apex-exchange".to_string(),
            max_request_body: 256 * 1024,
            max_response_body_compressed: 1024 * 1024,
            max_response_body: 10 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Builder)]
#[serde(default)]
pub struct CacheConfig {
    pub cache_pub_sz: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { cache_pub_sz: 50_000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileRotation {
    Daily,
    Hourly,
    Never,
}

impl Default for FileRotation {
    fn default() -> Self {
        FileRotation::Daily
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LogType {
    Stdout {
        #[serde(default = "default_logtype_color")]
        color: bool,
        #[serde(default)]
        json: bool,
    },
    File {
        path: PathBuf,
        #[serde(default)]
        json: bool,
        #[serde(default)]
        rotation: FileRotation,
        #[serde(default)]
        max_files: usize,
    },
}

fn default_logtype_color() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSink {
    /// Whether spans should be exported to this sink
    pub spans: bool,
    /// The kind of observability sink
    pub dest: LogType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub span_sample_rate: f32,
    #[serde(default)]
    pub sinks: Vec<LogSink>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            span_sample_rate: 0.01,
            sinks: vec![LogSink {
                spans: true,
                dest: LogType::Stdout {
                    color: true,
                    json: false,
                },
            }],
        }
    }
}

impl LoggingConfig {
    /// Validates the logging configuration
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.sinks.is_empty() {
            anyhow::bail!("At least one logging sink must be configured");
        }

        self.level.parse::<tracing::Level>().map_err(|_| {
            anyhow::anyhow!(
                "Invalid log level: '{}'. Valid levels: trace, debug, info, warn, error",
                self.level
            )
        })?;

        if !(0.0..=1.0).contains(&self.span_sample_rate) {
            anyhow::bail!(
                "span_sample_rate must be between 0.0 and 1.0, got {}",
                self.span_sample_rate
            );
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[builder(default)]
#[serde(default)]
pub struct ExchangeConfig {
    pub auction: AuctionConfig,
    pub currency: CurrencyConfig,
    pub multibid: MultibidConfig,
    pub multiformat: MultiformatConfig,
    pub breaker: BreakerConfig,
    pub client: ClientConfig,
    pub caches: CacheConfig,
    pub privacy: ActivityControls,
    pub bidders: Vec<BidderInfo>,
    pub publishers: Vec<Publisher>,
    pub logging: LoggingConfig,
}

impl ExchangeConfig {
    pub fn load(path: &PathBuf) -> Result<ExchangeConfig, anyhow::Error> {
        let cfg = Config::builder()
            .add_source(config::File::from(path.to_path_buf()))
            .build()?;

        let cfg: ExchangeConfig = cfg.try_deserialize()?;
        cfg.validate()?;

        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.logging.validate()?;

        if self.auction.max_tmax_ms < self.auction.default_tmax_ms {
            anyhow::bail!(
                "max_tmax_ms {} is below default_tmax_ms {}",
                self.auction.max_tmax_ms,
                self.auction.default_tmax_ms
            );
        }

        if self.currency.default_currency.len() != 3 {
            anyhow::bail!(
                "default_currency must be an ISO-4217 alpha code, got '{}'",
                self.currency.default_currency
            );
        }

        for bidder in &self.bidders {
            bidder.validate()?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let cfg = ExchangeConfig::default();

        assert_eq!(cfg.auction.safety_margin_ms, 50);
        assert_eq!(cfg.currency.default_currency, "USD");
        assert_eq!(cfg.multibid.max_per_bidder_total, 3);
        assert_eq!(cfg.multibid.max_per_bidder_per_imp, 1);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_inverted_tmax_bounds() {
        let mut cfg = ExchangeConfig::default();
        cfg.auction.max_tmax_ms = 100;
        cfg.auction.default_tmax_ms = 500;

        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_currency_code() {
        let mut cfg = ExchangeConfig::default();
        cfg.currency.default_currency = "DOLLARS".to_string();

        assert!(cfg.validate().is_err());
    }
}
