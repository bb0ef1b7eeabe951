use crate::config::{MultibidConfig, MultiformatConfig};
use crate::core::selection::multibid::{MultibidLimits, cap_bidder_bids};
use crate::core::selection::multiformat::select_imp_winner;
use crate::core::selection::{MultiformatStrategy, RankedBid};
use crate::exchange::context::AuctionContext;
use crate::openrtb::ext;
use crate::pipeline::BlockingTask;
use anyhow::Error;
use tracing::debug;

/// Applies the multibid caps per bidder, then picks one winner per
/// impression across all bidders with the configured multiformat
/// strategy. The winner's capped extras ride along for `_N`
/// suffixed targeting
pub struct SelectTask {
    multibid: MultibidConfig,
    multiformat: MultiformatConfig,
}

impl SelectTask {
    pub fn new(multibid: MultibidConfig, multiformat: MultiformatConfig) -> Self {
        Self {
            multibid,
            multiformat,
        }
    }
}

impl BlockingTask<AuctionContext, Error> for SelectTask {
    fn run(&self, context: &AuctionContext) -> Result<(), Error> {
        let req = context.req.read();

        let limits = MultibidLimits::resolve(&self.multibid, ext::multibid(&req));

        let strategy = ext::multiformat_strategy(&req)
            .and_then(|raw| raw.parse::<MultiformatStrategy>().ok())
            .unwrap_or(self.multiformat.strategy);

        // results arrive pre-sorted by bidder code, so ranked order
        // is deterministic for a fixed result set
        let mut ranked: Vec<RankedBid> = Vec::new();

        for result in context.results.lock().iter() {
            ranked.extend(cap_bidder_bids(
                &result.bidder,
                result.bids.clone(),
                &limits,
            ));
        }

        let mut selected: Vec<RankedBid> = Vec::new();

        for imp in &req.imp {
            let candidates: Vec<&RankedBid> = ranked
                .iter()
                .filter(|r| r.bid.bid.impid == imp.id && r.rank == 1)
                .collect();

            let winner = match select_imp_winner(imp, &candidates, strategy, None) {
                Some(winner) => winner.clone(),
                None => continue,
            };

            debug!(
                "Imp '{}' won by {} at {} ({})",
                imp.id, winner.bidder, winner.bid.bid.price, winner.bid.media_type
            );

            // the winning bidder's additional capped bids on this
            // imp go out with suffixed targeting
            let extras: Vec<RankedBid> = ranked
                .iter()
                .filter(|r| {
                    r.bid.bid.impid == imp.id && r.bidder == winner.bidder && r.rank > 1
                })
                .cloned()
                .collect();

            selected.push(winner);
            selected.extend(extras);
        }

        *context.ranked.lock() = ranked;
        *context.selected.lock() = selected;

        Ok(())
    }
}
