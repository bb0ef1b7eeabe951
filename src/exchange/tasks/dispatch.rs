use crate::adapters::RequestHints;
use crate::core::models::auction::BidderResult;
use crate::core::privacy::redact;
use crate::core::spec::dimensions::StatsDeviceType;
use crate::core::store::ConfigStore;
use crate::exchange::client::BidderClient;
use crate::exchange::context::AuctionContext;
use crate::openrtb::{BidRequest, ext};
use crate::pipeline::AsyncTask;
use crate::{child_span_info, core::registry::RegistryEntry};
use anyhow::Error;
use async_trait::async_trait;
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, debug, trace};

/// Fans the auction out to every selected bidder in parallel and
/// collects exactly one [`BidderResult`] per bidder, bid or not.
/// All callouts share the auction deadline; nothing a single
/// partner does can fail the auction from here
pub struct DispatchTask {
    client: Arc<BidderClient>,
    store: Arc<dyn ConfigStore>,
}

impl DispatchTask {
    pub fn new(client: Arc<BidderClient>, store: Arc<dyn ConfigStore>) -> Self {
        Self { client, store }
    }

    fn build_hints(
        &self,
        outbound: &BidRequest,
        publisher_id: &str,
        device_type: StatsDeviceType,
        code: &str,
    ) -> RequestHints {
        let mut hints = RequestHints {
            global_params: ext::global_bidder_params(outbound, code),
            ..Default::default()
        };

        if publisher_id.is_empty() {
            return hints;
        }

        for imp in &outbound.imp {
            let tagid = match imp.tagid.as_deref() {
                Some(tagid) => tagid,
                None => continue,
            };

            let mut configs =
                self.store
                    .get_slot_bidder_configs(publisher_id, tagid, device_type);

            if let Some(params) = configs.remove(code) {
                hints.slot_params.insert(imp.id.clone(), params);
            }
        }

        hints
    }

    async fn run_bidder(
        &self,
        entry: RegistryEntry,
        outbound: BidRequest,
        hints: RequestHints,
        deadline: tokio::time::Instant,
    ) -> BidderResult {
        let code = entry.info.code.clone();
        let bidder_tmax = Duration::from_millis(entry.info.default_tmax_ms);

        let (requests, mut errors) = entry.adapter.make_requests(&outbound, &hints);

        let mut result = BidderResult {
            bidder: code.clone(),
            errors: Vec::new(),
            ..Default::default()
        };

        if requests.is_empty() {
            debug!("Bidder {} produced no callouts, sitting out", code);
            result.errors = errors;

            return result;
        }

        let outcomes = join_all(
            requests
                .iter()
                .map(|data| self.client.send(&code, data, deadline, bidder_tmax)),
        )
        .await;

        let mut currency: Option<String> = None;

        for (data, outcome) in requests.iter().zip(outcomes) {
            result.latency = result.latency.max(outcome.latency);
            result.timed_out |= outcome.timed_out;
            result.http_status = result.http_status.or(outcome.http_status);

            if let Some(error) = outcome.error {
                errors.push(error);
            }

            let response = match outcome.response {
                Some(response) => response,
                None => continue,
            };

            let (parsed, parse_errors) = entry.adapter.make_bids(&outbound, data, &response);
            errors.extend(parse_errors);

            if let Some(parsed) = parsed {
                currency.get_or_insert(parsed.currency);
                result.bids.extend(parsed.bids);
            }
        }

        if let Some(currency) = currency {
            result.currency = currency;
        }

        // a timed out bidder never lands bids, even if another of
        // its callouts made it back in time
        if result.timed_out {
            result.bids.clear();
        }

        trace!(
            "Bidder {} done: {} bids, {} errors, timed_out={}",
            code,
            result.bids.len(),
            errors.len(),
            result.timed_out
        );

        result.errors = errors;

        result
    }

    async fn run0(&self, context: &AuctionContext) -> Result<(), Error> {
        let deadline = *context
            .deadline
            .get()
            .ok_or_else(|| anyhow::anyhow!("Deadline not resolved before dispatch"))?;

        let publisher_id = context
            .publisher
            .get()
            .map(|p| p.id.clone())
            .unwrap_or_default();

        let base_req = context.req.read().clone();

        let device_type = base_req
            .device
            .as_ref()
            .and_then(|d| d.devicetype)
            .map(StatsDeviceType::from_openrtb)
            .unwrap_or_default();

        let dispatches: Vec<_> = context
            .bidders
            .lock()
            .iter()
            .map(|bidder| (bidder.entry.clone(), bidder.redaction))
            .collect();

        let futures = dispatches.into_iter().map(|(entry, redaction)| {
            let mut outbound = base_req.clone();

            redact::apply(&mut outbound, &redaction);
            redact::clear_publisher_ids(&mut outbound);

            let hints =
                self.build_hints(&outbound, &publisher_id, device_type, &entry.info.code);

            self.run_bidder(entry, outbound, hints, deadline)
        });

        let mut results = join_all(futures).await;

        // collection order is completion order; pin it down for
        // reproducible analytics and selection input
        results.sort_by(|a, b| a.bidder.cmp(&b.bidder));

        *context.results.lock() = results;

        Ok(())
    }
}

#[async_trait]
impl AsyncTask<AuctionContext, Error> for DispatchTask {
    async fn run(&self, context: &AuctionContext) -> Result<(), Error> {
        let span = child_span_info!("dispatch_task");

        self.run0(context).instrument(span).await
    }
}
