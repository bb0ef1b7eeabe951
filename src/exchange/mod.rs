use crate::config::ExchangeConfig;
use crate::core::analytics::{AnalyticsModule, MultiModule, TracingSink};
use crate::core::breaker::CountingBreaker;
use crate::core::currency::{CurrencyConverter, CurrencyRates};
use crate::core::errors::ErrorKind;
use crate::core::registry::AdapterRegistry;
use crate::core::store::{ConfigStore, StaticConfigStore};
use crate::openrtb::{BidRequest, BidResponse};
use crate::pipeline::{Pipeline, PipelineBuilder};
use crate::sample_or_attach_root_span;
use anyhow::Error;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, debug, warn};

pub mod client;
pub mod context;
pub mod tasks;

use client::{BidderClient, ReqwestTransport, Transport};
use context::AuctionContext;

/// A per auction fatal error the caller should surface as a 4xx.
/// Everything else the exchange degrades into a valid response
#[derive(Debug, Clone)]
pub struct AuctionError {
    pub kind: ErrorKind,
    pub message: String,
}

impl AuctionError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for AuctionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for AuctionError {}

/// Externally supplied collaborators, swappable for tests and for
/// deployments that back these with something other than config
/// file state
pub struct ExchangeDeps {
    pub store: Arc<dyn ConfigStore>,
    pub transport: Arc<dyn Transport>,
    pub converter: Arc<CurrencyConverter>,
    pub analytics: Vec<Arc<dyn AnalyticsModule>>,
}

/// The auction engine. One instance serves the whole process; every
/// [`Exchange::run_auction`] call is independent and may run fully
/// in parallel with any other
pub struct Exchange {
    rtb_pipeline: Pipeline<AuctionContext, Error>,
    finalizers: Pipeline<AuctionContext, Error>,
    registry: Arc<AdapterRegistry>,
    converter: Arc<CurrencyConverter>,
    span_sample_rate: f32,
}

impl Exchange {
    /// Production wiring: config file state, reqwest transport, and
    /// the tracing analytics sink
    pub fn new(cfg: ExchangeConfig) -> Result<Self, Error> {
        let store = Arc::new(StaticConfigStore::new(
            cfg.bidders.clone(),
            cfg.publishers.clone(),
            cfg.caches.cache_pub_sz,
        ));

        let deps = ExchangeDeps {
            store,
            transport: Arc::new(ReqwestTransport::new(&cfg.client)?),
            converter: Arc::new(CurrencyConverter::new(&cfg.currency)),
            analytics: vec![Arc::new(TracingSink)],
        };

        Self::with_deps(cfg, deps)
    }

    pub fn with_deps(cfg: ExchangeConfig, deps: ExchangeDeps) -> Result<Self, Error> {
        cfg.validate()?;

        let registry = Arc::new(AdapterRegistry::new(&cfg.bidders)?);

        let breaker = Arc::new(CountingBreaker::new(
            cfg.breaker.failure_threshold,
            cfg.breaker.open_cooldown,
        ));

        let client = Arc::new(BidderClient::new(
            deps.transport,
            breaker,
            cfg.client.clone(),
            Duration::from_millis(cfg.auction.safety_margin_ms),
        ));

        let analytics = Arc::new(MultiModule::new(deps.analytics));

        let rtb_pipeline = PipelineBuilder::new()
            .with_blocking(Box::new(tasks::ValidateRequestTask))
            .with_blocking(Box::new(tasks::AuctionIdTask))
            .with_blocking(Box::new(tasks::ConfigResolveTask::new(
                Arc::clone(&deps.store),
                cfg.auction.clone(),
                cfg.currency.default_currency.clone(),
            )))
            .with_blocking(Box::new(tasks::FloorsTask))
            .with_blocking(Box::new(tasks::BidderSelectTask::new(
                Arc::clone(&registry),
                cfg.privacy.clone(),
                cfg.auction.clone(),
            )))
            .with_async(Box::new(tasks::DispatchTask::new(
                client,
                Arc::clone(&deps.store),
            )))
            .with_blocking(Box::new(tasks::ValidateBidsTask))
            .with_blocking(Box::new(tasks::ConvertCurrencyTask::new(
                Arc::clone(&deps.converter) as Arc<dyn CurrencyRates>,
            )))
            .with_blocking(Box::new(tasks::SelectTask::new(
                cfg.multibid.clone(),
                cfg.multiformat.clone(),
            )))
            .with_blocking(Box::new(tasks::RespondTask::new(
                cfg.auction.platform_seat.clone(),
            )))
            .build()
            .expect("Auction pipeline should have tasks");

        // finalizers always run, even for auctions that exited early
        let finalizers = PipelineBuilder::new()
            .with_async(Box::new(tasks::AnalyticsTask::new(
                analytics,
                cfg.privacy.clone(),
            )))
            .build()
            .expect("Finalizer pipeline should have tasks");

        Ok(Self {
            rtb_pipeline,
            finalizers,
            registry,
            converter: deps.converter,
            span_sample_rate: cfg.logging.span_sample_rate,
        })
    }

    pub fn registry(&self) -> &Arc<AdapterRegistry> {
        &self.registry
    }

    /// Kick off the background currency refresher. No-op when no
    /// refresh url is configured
    pub fn start_currency_refresher(&self) -> Option<tokio::task::JoinHandle<()>> {
        self.converter.spawn_refresher()
    }

    async fn run0(&self, context: &AuctionContext) -> Result<(), Error> {
        // the auction pipeline may exit early, e.g. no matching
        // bidders, with a response state already assigned
        let auction_res = self.rtb_pipeline.run(context).await;

        // analytics is best effort and must never mask the auction
        // outcome
        if let Err(e) = self.finalizers.run(context).await {
            warn!("Auction finalizers failed: {:#}", e);
        }

        auction_res
    }

    /// Run one auction to completion.
    ///
    /// # Behavior
    /// * Malformed requests and hard config failures return an
    ///   [`AuctionError`] for the transport layer to map to a 4xx
    /// * Everything else resolves to a valid response; an empty
    ///   seatbid with a no bid reason is a normal outcome
    pub async fn run_auction(&self, req: BidRequest) -> Result<BidResponse, AuctionError> {
        let context = AuctionContext::new(req);

        let span = sample_or_attach_root_span!(self.span_sample_rate, "auction_pipeline");
        let result = self.run0(&context).instrument(span).await;

        if let Err(e) = result {
            if let Some(auction_err) = e.downcast_ref::<AuctionError>() {
                return Err(auction_err.clone());
            }

            debug!("Auction resolved early: {:#}", e);
        }

        let state = context
            .res
            .get()
            .cloned()
            .unwrap_or_else(|| context.no_bid_fallback());

        Ok(state.into_response(context.target_currency()))
    }
}
