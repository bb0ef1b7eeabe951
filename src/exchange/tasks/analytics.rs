use crate::core::analytics::AnalyticsModule;
use crate::core::models::auction::{
    AuctionObject, RequestSummary, WinningBid,
};
use crate::core::privacy::{Activity, ActivityControls, ComponentType, PrivacyContext};
use crate::core::spec::dimensions::{Channel, StatsDeviceType};
use crate::exchange::context::AuctionContext;
use crate::openrtb::MediaType;
use crate::pipeline::AsyncTask;
use anyhow::Error;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

/// Builds the immutable auction snapshot and hands it to the
/// analytics sinks. Runs as a finalizer so even auctions that
/// exited early leave a record; emission is spawned off the
/// auction path and never delays the caller
pub struct AnalyticsTask {
    modules: Arc<dyn AnalyticsModule>,
    controls: ActivityControls,
}

impl AnalyticsTask {
    pub fn new(modules: Arc<dyn AnalyticsModule>, controls: ActivityControls) -> Self {
        Self { modules, controls }
    }

    fn build_object(context: &AuctionContext) -> AuctionObject {
        let req = context.req.read();

        let mut media_types: Vec<MediaType> =
            req.imp.iter().flat_map(|imp| imp.media_types()).collect();
        media_types.sort_by_key(|mt| mt.to_string());
        media_types.dedup();

        let summary = RequestSummary {
            request_id: req.id.clone(),
            channel: Channel::from_request(&req),
            device_type: req
                .device
                .as_ref()
                .and_then(|d| d.devicetype)
                .map(StatsDeviceType::from_openrtb)
                .unwrap_or_default(),
            imp_count: req.imp.len(),
            media_types,
            test: req.test == Some(1),
        };

        let winners: Vec<WinningBid> = context
            .selected
            .lock()
            .iter()
            .filter(|r| r.rank == 1)
            .map(|r| WinningBid {
                imp_id: r.bid.bid.impid.clone(),
                bidder: r.bidder.clone(),
                price: r.bid.bid.price,
                media_type: r.bid.media_type,
                dealid: r.bid.bid.dealid.clone(),
            })
            .collect();

        AuctionObject {
            auction_id: context.auction_id.get().cloned().unwrap_or_default(),
            publisher_id: context
                .publisher
                .get()
                .map(|p| p.id.clone())
                .unwrap_or_default(),
            started_at: context.started_at,
            ended_at: Utc::now(),
            summary,
            bidders_selected: context
                .bidders
                .lock()
                .iter()
                .map(|b| b.entry.info.code.clone())
                .collect(),
            bidders_excluded: context.excluded.lock().clone(),
            results: context.results.lock().clone(),
            winners,
            target_currency: context.target_currency().to_string(),
            floors: context.floors.get().cloned().unwrap_or_default(),
        }
    }

    async fn run0(&self, context: &AuctionContext) -> Result<(), Error> {
        let object = Arc::new(Self::build_object(context));

        context.auction_object.set(Arc::clone(&object)).ok();

        let allowed = self.controls.evaluate(
            Activity::ReportAnalytics,
            self.modules.name(),
            ComponentType::Analytics,
            context.privacy.get().unwrap_or(&PrivacyContext::default()),
        );

        if !allowed {
            debug!("Analytics reporting denied by activity controls");
            return Ok(());
        }

        // fire and forget: the response writer is not waiting on us
        let modules = Arc::clone(&self.modules);
        tokio::spawn(async move {
            let _ = modules.log_auction_object(object).await;
        });

        Ok(())
    }
}

#[async_trait]
impl AsyncTask<AuctionContext, Error> for AnalyticsTask {
    async fn run(&self, context: &AuctionContext) -> Result<(), Error> {
        self.run0(context).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::auction::BidderResult;
    use crate::openrtb::{Banner, BidRequestBuilder, ImpBuilder, Site};
    use parking_lot::Mutex;

    struct CapturingSink {
        seen: Mutex<Vec<Arc<AuctionObject>>>,
    }

    #[async_trait]
    impl AnalyticsModule for CapturingSink {
        fn name(&self) -> &'static str {
            "capturing"
        }

        async fn log_auction_object(
            &self,
            auction: Arc<AuctionObject>,
        ) -> Result<(), anyhow::Error> {
            self.seen.lock().push(auction);
            Ok(())
        }

        async fn shutdown(&self) -> Result<(), anyhow::Error> {
            Ok(())
        }
    }

    fn context() -> AuctionContext {
        let req = BidRequestBuilder::default()
            .id("r1".to_string())
            .site(Some(Site::default()))
            .imp(vec![
                ImpBuilder::default()
                    .id("i1".to_string())
                    .banner(Some(Banner::default()))
                    .build()
                    .unwrap(),
            ])
            .build()
            .unwrap();

        let context = AuctionContext::new(req);
        context.auction_id.set("auction-1".to_string()).ok();
        context.target_currency.set("USD".to_string()).ok();

        *context.results.lock() = vec![BidderResult {
            bidder: "nexbid".to_string(),
            ..Default::default()
        }];

        context
    }

    #[tokio::test]
    async fn test_object_built_and_emitted() {
        let sink = Arc::new(CapturingSink {
            seen: Mutex::new(Vec::new()),
        });

        let task = AnalyticsTask::new(
            Arc::clone(&sink) as Arc<dyn AnalyticsModule>,
            ActivityControls::default(),
        );

        let context = context();
        task.run(&context).await.unwrap();

        tokio::task::yield_now().await;

        let seen = sink.seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].auction_id, "auction-1");
        assert_eq!(seen[0].summary.channel, Channel::Site);
        assert_eq!(seen[0].results.len(), 1);

        assert!(
            context.auction_object.get().is_some(),
            "Snapshot retained on context"
        );
    }

    #[tokio::test]
    async fn test_denied_analytics_not_emitted() {
        use crate::core::privacy::{ActivityPlan, ActivityRule, RuleEffect};

        let sink = Arc::new(CapturingSink {
            seen: Mutex::new(Vec::new()),
        });

        let controls = ActivityControls {
            activities: [(
                Activity::ReportAnalytics,
                ActivityPlan {
                    default: false,
                    rules: vec![ActivityRule {
                        priority: 1,
                        effect: RuleEffect::Deny,
                        ..Default::default()
                    }],
                },
            )]
            .into_iter()
            .collect(),
        };

        let task = AnalyticsTask::new(Arc::clone(&sink) as Arc<dyn AnalyticsModule>, controls);

        let context = context();
        task.run(&context).await.unwrap();

        tokio::task::yield_now().await;

        assert!(sink.seen.lock().is_empty());
        assert!(
            context.auction_object.get().is_some(),
            "Snapshot still built for the caller even when sinks are denied"
        );
    }
}
