use crate::core::floors::{effective_floor, raise_deal_floor};
use crate::core::models::auction::FloorSnapshot;
use crate::exchange::context::AuctionContext;
use crate::pipeline::BlockingTask;
use anyhow::{Error, bail};
use tracing::debug;

/// Rewrites every imp floor to the effective value bidders must
/// clear, and snapshots the pre-adjustment floors for analytics so
/// the platform take stays computable after the fact
pub struct FloorsTask;

impl BlockingTask<AuctionContext, Error> for FloorsTask {
    fn run(&self, context: &AuctionContext) -> Result<(), Error> {
        let publisher = match context.publisher.get() {
            Some(publisher) => publisher,
            None => bail!("Publisher not resolved before floor markup"),
        };

        let target_currency = context.target_currency().to_string();
        let multiplier = publisher.bid_multiplier;

        let mut snapshots = Vec::new();
        let mut req = context.req.write();

        for imp in req.imp.iter_mut() {
            let slot_floor = imp
                .tagid
                .as_deref()
                .and_then(|tagid| publisher.slot_override(tagid))
                .and_then(|slot| slot.floor);

            let request_floor = imp.bidfloor;
            let effective = effective_floor(request_floor, slot_floor, multiplier);

            if effective != request_floor {
                debug!(
                    "Floor on imp '{}' marked up ${} -> ${}",
                    imp.id, request_floor, effective
                );
            }

            imp.bidfloor = effective;

            snapshots.push(FloorSnapshot {
                imp_id: imp.id.clone(),
                currency: imp
                    .bidfloorcur
                    .clone()
                    .unwrap_or_else(|| target_currency.clone()),
                request_floor,
                effective_floor: effective,
            });

            if let Some(pmp) = imp.pmp.as_mut() {
                for deal in pmp.deals.iter_mut() {
                    deal.bidfloor = raise_deal_floor(deal.bidfloor, multiplier, effective);
                }
            }
        }

        context
            .floors
            .set(snapshots)
            .map_err(|_| anyhow::anyhow!("Floors already resolved"))?;

        Ok(())
    }
}
