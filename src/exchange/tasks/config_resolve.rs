use crate::config::AuctionConfig;
use crate::core::errors::ErrorKind;
use crate::core::models::publisher::Publisher;
use crate::core::privacy::PrivacyContext;
use crate::core::spec::nobidreasons;
use crate::core::store::ConfigStore;
use crate::exchange::AuctionError;
use crate::exchange::context::{AuctionContext, BidResponseState};
use crate::pipeline::BlockingTask;
use anyhow::{Error, bail};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Resolves everything auction scoped that comes from outside the
/// request: the publisher record, the target currency, the privacy
/// context, and the wall clock deadline
pub struct ConfigResolveTask {
    store: Arc<dyn ConfigStore>,
    cfg: AuctionConfig,
    default_currency: String,
}

impl ConfigResolveTask {
    pub fn new(store: Arc<dyn ConfigStore>, cfg: AuctionConfig, default_currency: String) -> Self {
        Self {
            store,
            cfg,
            default_currency,
        }
    }

    fn request_domain(context: &AuctionContext) -> Option<String> {
        let req = context.req.read();

        req.site
            .as_ref()
            .and_then(|site| site.domain.clone())
            .or_else(|| req.app.as_ref().and_then(|app| app.domain.clone()))
    }
}

impl BlockingTask<AuctionContext, Error> for ConfigResolveTask {
    fn run(&self, context: &AuctionContext) -> Result<(), Error> {
        let domain = Self::request_domain(context).unwrap_or_default();

        let publisher = match self.store.get_publisher_by_domain(&domain) {
            Some(publisher) => publisher,
            None if self.cfg.strict_publishers => {
                context.set_response(BidResponseState::no_bid(
                    context.request_id(),
                    nobidreasons::UNKNOWN_SELLER,
                    "Unknown publisher domain",
                ));

                return Err(Error::new(AuctionError::new(
                    ErrorKind::Config,
                    format!("no publisher configured for domain '{}'", domain),
                )));
            }
            None => {
                debug!("Unknown domain '{}', continuing with neutral publisher", domain);
                Publisher::default()
            }
        };

        if !publisher.id.is_empty() && !publisher.enabled {
            context.set_response(BidResponseState::no_bid(
                context.request_id(),
                nobidreasons::SELLER_DISABLED,
                "Publisher disabled",
            ));

            bail!("Publisher '{}' is disabled", publisher.id);
        }

        let (tmax_ms, target_currency, privacy) = {
            let req = context.req.read();

            let tmax_ms = req
                .tmax
                .unwrap_or(self.cfg.default_tmax_ms)
                .min(self.cfg.max_tmax_ms);

            let target_currency = req
                .cur
                .as_ref()
                .and_then(|cur| cur.first().cloned())
                .unwrap_or_else(|| self.default_currency.clone());

            (tmax_ms, target_currency, PrivacyContext::from_request(&req))
        };

        let deadline = context.started_mono + Duration::from_millis(tmax_ms);

        context
            .publisher
            .set(publisher)
            .map_err(|_| anyhow::anyhow!("Publisher already resolved"))?;
        context
            .target_currency
            .set(target_currency)
            .map_err(|_| anyhow::anyhow!("Target currency already resolved"))?;
        context
            .privacy
            .set(privacy)
            .map_err(|_| anyhow::anyhow!("Privacy context already resolved"))?;
        context
            .deadline
            .set(deadline)
            .map_err(|_| anyhow::anyhow!("Deadline already resolved"))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::publisher::PublisherBuilder;
    use crate::core::store::StaticConfigStore;
    use crate::openrtb::{BidRequestBuilder, Site};

    fn store(enabled: bool) -> Arc<StaticConfigStore> {
        Arc::new(StaticConfigStore::new(
            Vec::new(),
            vec![
                PublisherBuilder::default()
                    .id("pub1".to_string())
                    .enabled(enabled)
                    .domains(vec!["news.example".to_string()])
                    .bid_multiplier(1.1)
                    .build()
                    .unwrap(),
            ],
            64,
        ))
    }

    fn request(domain: &str) -> crate::openrtb::BidRequest {
        BidRequestBuilder::default()
            .id("r1".to_string())
            .site(Some(Site {
                domain: Some(domain.to_string()),
                ..Default::default()
            }))
            .cur(Some(vec!["EUR".to_string(), "USD".to_string()]))
            .tmax(Some(300u64))
            .build()
            .unwrap()
    }

    fn task(store: Arc<StaticConfigStore>, strict: bool) -> ConfigResolveTask {
        let mut cfg = AuctionConfig::default();
        cfg.strict_publishers = strict;

        ConfigResolveTask::new(store, cfg, "USD".to_string())
    }

    #[tokio::test]
    async fn test_resolves_publisher_currency_deadline() {
        let context = AuctionContext::new(request("news.example"));

        task(store(true), true).run(&context).unwrap();

        assert_eq!(context.publisher.get().unwrap().id, "pub1");
        assert_eq!(context.target_currency(), "EUR");
        assert!(context.deadline.get().is_some());
    }

    #[tokio::test]
    async fn test_unknown_domain_strict_is_config_error() {
        let context = AuctionContext::new(request("rogue.example"));

        let err = task(store(true), true).run(&context).unwrap_err();
        let auction_err = err.downcast_ref::<AuctionError>().unwrap();

        assert_eq!(auction_err.kind, ErrorKind::Config);
    }

    #[tokio::test]
    async fn test_unknown_domain_lenient_degrades() {
        let context = AuctionContext::new(request("rogue.example"));

        task(store(true), false).run(&context).unwrap();

        let publisher = context.publisher.get().unwrap();
        assert!(publisher.id.is_empty());
        assert_eq!(publisher.bid_multiplier, 1.0);
    }

    #[tokio::test]
    async fn test_disabled_publisher_no_bids() {
        let context = AuctionContext::new(request("news.example"));

        let err = task(store(false), true).run(&context).unwrap_err();

        assert!(err.downcast_ref::<AuctionError>().is_none(), "Not a 4xx");
        assert!(matches!(
            context.res.get(),
            Some(BidResponseState::NoBidReason {
                nbr: nobidreasons::SELLER_DISABLED,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_tmax_clamped_by_exchange_policy() {
        let mut req = request("news.example");
        req.tmax = Some(60_000);

        let context = AuctionContext::new(req);
        task(store(true), true).run(&context).unwrap();

        let deadline = *context.deadline.get().unwrap();
        let budget = deadline.saturating_duration_since(context.started_mono);

        assert!(budget <= Duration::from_millis(AuctionConfig::default().max_tmax_ms));
    }
}
