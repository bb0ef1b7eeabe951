use crate::config::CurrencyConfig;
use anyhow::{Context, anyhow};
use arc_swap::ArcSwap;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Read side interface the auction consumes. `get_rate` answers
/// how many units of `to` one unit of `from` buys
pub trait CurrencyRates: Send + Sync {
    fn get_rate(&self, from: &str, to: &str) -> Result<f64, anyhow::Error>;
}

type Rates = HashMap<String, HashMap<String, f64>>;

#[derive(Debug, Deserialize)]
struct RatesBody {
    conversions: Rates,
}

struct RateSnapshot {
    rates: Rates,
    fetched_at: Option<Instant>,
}

fn lookup(rates: &Rates, from: &str, to: &str) -> Option<f64> {
    if let Some(rate) = rates.get(from).and_then(|row| row.get(to)) {
        return Some(*rate);
    }

    // tables are often published one directional
    rates
        .get(to)
        .and_then(|row| row.get(from))
        .filter(|inverse| **inverse != 0.0)
        .map(|inverse| 1.0 / inverse)
}

/// Process lifetime FX table, refreshed in the background and read
/// by every auction through an atomic snapshot. Auctions never block
/// the refresher and the refresher never blocks auctions beyond the
/// pointer swap
pub struct CurrencyConverter {
    snapshot: ArcSwap<RateSnapshot>,
    stale_after: Duration,
    refresh_url: Option<String>,
    refresh_interval: Duration,
    client: reqwest::Client,
}

impl CurrencyConverter {
    pub fn new(cfg: &CurrencyConfig) -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(RateSnapshot {
                rates: Rates::new(),
                fetched_at: None,
            }),
            stale_after: cfg.stale_after,
            refresh_url: cfg.refresh_url.clone(),
            refresh_interval: cfg.refresh_interval,
            client: reqwest::Client::new(),
        }
    }

    /// Seed the table directly, used by tests and fixed-rate deploys
    pub fn with_rates(cfg: &CurrencyConfig, rates: Rates) -> Self {
        let converter = Self::new(cfg);

        converter.snapshot.store(Arc::new(RateSnapshot {
            rates,
            fetched_at: Some(Instant::now()),
        }));

        converter
    }

    async fn refresh(&self) -> Result<(), anyhow::Error> {
        let url = self
            .refresh_url
            .as_ref()
            .ok_or_else(|| anyhow!("No currency refresh url configured"))?;

        let bytes = self
            .client
            .get(url)
            .send()
            .await
            .context("Currency rate fetch failed")?
            .error_for_status()
            .context("Currency rate fetch returned error status")?
            .bytes()
            .await
            .context("Currency rate body read failed")?;

        let body: RatesBody =
            serde_json::from_slice(&bytes).context("Currency rate body did not parse")?;

        debug!(
            "Refreshed currency table with {} base currencies",
            body.conversions.len()
        );

        self.snapshot.store(Arc::new(RateSnapshot {
            rates: body.conversions,
            fetched_at: Some(Instant::now()),
        }));

        Ok(())
    }

    /// Background refresh loop. Failures keep the previous table and
    /// retry next interval
    pub fn spawn_refresher(self: &Arc<Self>) -> Option<tokio::task::JoinHandle<()>> {
        self.refresh_url.as_ref()?;

        let converter = Arc::clone(self);

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(converter.refresh_interval);

            loop {
                ticker.tick().await;

                if let Err(e) = converter.refresh().await {
                    warn!("Currency refresh failed, keeping previous table: {:#}", e);
                }
            }
        }))
    }

    fn check_staleness(&self, snapshot: &RateSnapshot) {
        let stale = match snapshot.fetched_at {
            Some(fetched_at) => fetched_at.elapsed() > self.stale_after,
            None => !snapshot.rates.is_empty(),
        };

        if stale {
            warn!("Currency table is stale, converting on old rates");
        }
    }
}

impl CurrencyRates for CurrencyConverter {
    fn get_rate(&self, from: &str, to: &str) -> Result<f64, anyhow::Error> {
        if from == to {
            return Ok(1.0);
        }

        let snapshot = self.snapshot.load();
        self.check_staleness(&snapshot);

        lookup(&snapshot.rates, from, to)
            .ok_or_else(|| anyhow!("No conversion rate for {} -> {}", from, to))
    }
}

/// Auction scoped view combining the server table with any custom
/// rates the request supplied under `ext.prebid.currency.rates`.
/// By default custom rates win; `usepbsrates` flips the priority
pub struct AuctionRates<'a> {
    server: &'a dyn CurrencyRates,
    custom: Rates,
    server_priority: bool,
}

impl<'a> AuctionRates<'a> {
    pub fn new(server: &'a dyn CurrencyRates, custom: Rates, server_priority: bool) -> Self {
        Self {
            server,
            custom,
            server_priority,
        }
    }

    pub fn without_custom(server: &'a dyn CurrencyRates) -> Self {
        Self::new(server, Rates::new(), true)
    }

    pub fn get_rate(&self, from: &str, to: &str) -> Result<f64, anyhow::Error> {
        if from == to {
            return Ok(1.0);
        }

        let custom = lookup(&self.custom, from, to);

        if self.server_priority {
            return self
                .server
                .get_rate(from, to)
                .or_else(|server_err| custom.ok_or(server_err));
        }

        match custom {
            Some(rate) => Ok(rate),
            None => self.server.get_rate(from, to),
        }
    }

    pub fn convert(&self, amount: f64, from: &str, to: &str) -> Result<f64, anyhow::Error> {
        Ok(amount * self.get_rate(from, to)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CurrencyConfig;

    fn table(entries: &[(&str, &str, f64)]) -> Rates {
        let mut rates = Rates::new();

        for (from, to, rate) in entries {
            rates
                .entry(from.to_string())
                .or_default()
                .insert(to.to_string(), *rate);
        }

        rates
    }

    fn converter(entries: &[(&str, &str, f64)]) -> CurrencyConverter {
        CurrencyConverter::with_rates(&CurrencyConfig::default(), table(entries))
    }

    #[test]
    fn test_identity_rate_is_one() {
        let converter = converter(&[]);

        for cur in ["USD", "EUR", "JPY"] {
            assert_eq!(converter.get_rate(cur, cur).unwrap(), 1.0);
        }
    }

    #[test]
    fn test_direct_rate() {
        let converter = converter(&[("USD", "EUR", 0.92)]);

        assert_eq!(converter.get_rate("USD", "EUR").unwrap(), 0.92);
    }

    #[test]
    fn test_reciprocal_fallback() {
        let converter = converter(&[("USD", "EUR", 0.92)]);

        let rate = converter.get_rate("EUR", "USD").unwrap();
        assert!((rate - 1.0 / 0.92).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_pair_errors() {
        let converter = converter(&[("USD", "EUR", 0.92)]);

        assert!(converter.get_rate("USD", "JPY").is_err());
    }

    #[test]
    fn test_custom_rates_win_by_default() {
        let converter = converter(&[("USD", "EUR", 0.92)]);
        let rates = AuctionRates::new(&converter, table(&[("USD", "EUR", 0.5)]), false);

        assert_eq!(rates.get_rate("USD", "EUR").unwrap(), 0.5);
    }

    #[test]
    fn test_usepbsrates_prefers_server_table() {
        let converter = converter(&[("USD", "EUR", 0.92)]);
        let rates = AuctionRates::new(&converter, table(&[("USD", "EUR", 0.5)]), true);

        assert_eq!(rates.get_rate("USD", "EUR").unwrap(), 0.92);
    }

    #[test]
    fn test_custom_fills_server_gaps_under_server_priority() {
        let converter = converter(&[]);
        let rates = AuctionRates::new(&converter, table(&[("USD", "JPY", 151.0)]), true);

        assert_eq!(rates.get_rate("USD", "JPY").unwrap(), 151.0);
    }

    #[test]
    fn test_convert_multiplies() {
        let converter = converter(&[("USD", "EUR", 0.92)]);
        let rates = AuctionRates::without_custom(&converter);

        let converted = rates.convert(2.0, "USD", "EUR").unwrap();
        assert!((converted - 1.84).abs() < 1e-12);
    }
}
