use crate::config::AuctionConfig;
use crate::core::errors::ErrorKind;
use crate::core::models::auction::{ExcludedBidder, ExclusionReason};
use crate::core::privacy::{Activity, ActivityControls, ComponentType, RedactionPlan};
use crate::core::registry::AdapterRegistry;
use crate::core::spec::dimensions::Channel;
use crate::core::spec::nobidreasons;
use crate::exchange::AuctionError;
use crate::exchange::context::{AuctionContext, BidResponseState, BidderContext};
use crate::openrtb::{MediaType, ext};
use crate::pipeline::BlockingTask;
use anyhow::{Error, bail};
use std::sync::Arc;
use tracing::{Span, debug};

/// Selects the demand set for this auction: request hints
/// intersected with active registry entries, filtered by declared
/// channel/media capability and the privacy gate's fetchBids
/// decision. Everyone turned away is recorded with a reason
pub struct BidderSelectTask {
    registry: Arc<AdapterRegistry>,
    controls: ActivityControls,
    cfg: AuctionConfig,
}

impl BidderSelectTask {
    pub fn new(registry: Arc<AdapterRegistry>, controls: ActivityControls, cfg: AuctionConfig) -> Self {
        Self {
            registry,
            controls,
            cfg,
        }
    }
}

impl BlockingTask<AuctionContext, Error> for BidderSelectTask {
    fn run(&self, context: &AuctionContext) -> Result<(), Error> {
        let (hints, channel, media_types) = {
            let req = context.req.read();

            let media_types: Vec<MediaType> = {
                let mut types: Vec<MediaType> = req
                    .imp
                    .iter()
                    .flat_map(|imp| imp.media_types())
                    .collect();
                types.dedup();
                types
            };

            (ext::bidder_hints(&req), Channel::from_request(&req), media_types)
        };

        let privacy = context
            .privacy
            .get()
            .ok_or_else(|| anyhow::anyhow!("Privacy context not resolved before selection"))?;

        let mut selected = Vec::new();
        let mut excluded = Vec::new();

        for entry in self.registry.active() {
            let code = entry.info.code.clone();

            if let Some(hints) = &hints {
                if !hints.iter().any(|h| h == &code) {
                    excluded.push(ExcludedBidder {
                        code,
                        reason: ExclusionReason::NotRequested,
                    });
                    continue;
                }
            }

            if !entry.info.capabilities.supports_any(channel, &media_types) {
                excluded.push(ExcludedBidder {
                    code,
                    reason: ExclusionReason::NoCapability,
                });
                continue;
            }

            if !self
                .controls
                .evaluate(Activity::FetchBids, &code, ComponentType::Bidder, privacy)
            {
                debug!("Privacy gate denied fetchBids for {}", code);

                excluded.push(ExcludedBidder {
                    code,
                    reason: ExclusionReason::PrivacyDenied,
                });
                continue;
            }

            let redaction = RedactionPlan::for_bidder(&self.controls, &code, privacy);

            selected.push(BidderContext { entry, redaction });
        }

        // hinted codes that are not active deserve a trace too
        if let Some(hints) = &hints {
            for hint in hints {
                let known = selected.iter().any(|b| &b.entry.info.code == hint)
                    || excluded.iter().any(|e| &e.code == hint);

                if !known {
                    excluded.push(ExcludedBidder {
                        code: hint.clone(),
                        reason: ExclusionReason::Inactive,
                    });
                }
            }
        }

        let span = Span::current();
        if !span.is_disabled() {
            span.record("bidder_matches_count", selected.len());
        }

        let selected_empty = selected.is_empty();

        *context.bidders.lock() = selected;
        *context.excluded.lock() = excluded;

        if selected_empty {
            if self.cfg.require_bidders {
                return Err(Error::new(AuctionError::new(
                    ErrorKind::Config,
                    "no selectable bidders for this request",
                )));
            }

            context.set_response(BidResponseState::no_bid(
                context.request_id(),
                nobidreasons::NO_BUYERS_PREMATCHED,
                "No matching bidders",
            ));

            bail!("No matching bidders");
        }

        Ok(())
    }
}
