use crate::core::currency::{AuctionRates, CurrencyRates};
use crate::core::errors::BidderError;
use crate::core::validation::meets_floor;
use crate::exchange::context::AuctionContext;
use crate::openrtb::ext;
use crate::pipeline::BlockingTask;
use anyhow::Error;
use std::sync::Arc;
use tracing::{debug, warn};

/// Converts every surviving bid into the auction's target currency
/// and then enforces the effective floors, which only become
/// comparable once everything is priced in one currency. Bids that
/// cannot convert or land under floor are dropped with an error on
/// their bidder's result
pub struct ConvertCurrencyTask {
    converter: Arc<dyn CurrencyRates>,
}

impl ConvertCurrencyTask {
    pub fn new(converter: Arc<dyn CurrencyRates>) -> Self {
        Self { converter }
    }
}

impl BlockingTask<AuctionContext, Error> for ConvertCurrencyTask {
    fn run(&self, context: &AuctionContext) -> Result<(), Error> {
        let target = context.target_currency().to_string();

        let currency_ext = {
            let req = context.req.read();
            ext::currency(&req).unwrap_or_default()
        };

        let rates = AuctionRates::new(
            self.converter.as_ref(),
            currency_ext.rates,
            currency_ext.usepbsrates,
        );

        for result in context.results.lock().iter_mut() {
            let from = result.currency.clone();
            let bids = std::mem::take(&mut result.bids);
            let mut kept = Vec::with_capacity(bids.len());

            for mut typed in bids {
                if from != target {
                    match rates.convert(typed.bid.price, &from, &target) {
                        Ok(converted) => {
                            debug!(
                                "Converted bid {} {} {} -> {} {}",
                                typed.bid.id, typed.bid.price, from, converted, target
                            );
                            typed.bid.price = converted;
                        }
                        Err(e) => {
                            result.errors.push(BidderError::validation(format!(
                                "bid {} in {} cannot convert to {}: {}",
                                typed.bid.id, from, target, e
                            )));
                            continue;
                        }
                    }
                }

                let floor = match context.effective_floor(&typed.bid.impid) {
                    Some(floor) => floor,
                    None => {
                        kept.push(typed);
                        continue;
                    }
                };

                // floors live in their own currency, line them up
                let floor_in_target = if floor.currency == target {
                    floor.effective_floor
                } else {
                    match rates.convert(floor.effective_floor, &floor.currency, &target) {
                        Ok(converted) => converted,
                        Err(e) => {
                            warn!(
                                "Floor currency {} unconvertible, comparing raw: {}",
                                floor.currency, e
                            );
                            floor.effective_floor
                        }
                    }
                };

                if !meets_floor(typed.bid.price, floor_in_target) {
                    result.errors.push(BidderError::validation(format!(
                        "bid {} price {} below_floor {}",
                        typed.bid.id, typed.bid.price, floor_in_target
                    )));
                    continue;
                }

                kept.push(typed);
            }

            result.bids = kept;
        }

        Ok(())
    }
}
