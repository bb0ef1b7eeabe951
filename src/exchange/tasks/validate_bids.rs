use crate::core::validation::{ImpIndex, validate_bid};
use crate::exchange::context::AuctionContext;
use crate::pipeline::BlockingTask;
use anyhow::Error;
use tracing::debug;

/// Runs every surviving bid through structural validation and
/// normalization. Rejections become errors on the owning bidder's
/// result; the bid itself disappears
pub struct ValidateBidsTask;

impl BlockingTask<AuctionContext, Error> for ValidateBidsTask {
    fn run(&self, context: &AuctionContext) -> Result<(), Error> {
        let req = context.req.read();
        let imps = ImpIndex::new(&req);

        for result in context.results.lock().iter_mut() {
            let bids = std::mem::take(&mut result.bids);
            let mut kept = Vec::with_capacity(bids.len());

            for mut bid in bids {
                match validate_bid(&mut bid, &imps) {
                    Ok(()) => kept.push(bid),
                    Err(e) => {
                        debug!("Dropping bid from {}: {}", result.bidder, e);
                        result.errors.push(e);
                    }
                }
            }

            result.bids = kept;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::ErrorKind;
    use crate::core::models::auction::{BidderResult, TypedBidBuilder};
    use crate::openrtb::{Banner, BidBuilder, BidRequestBuilder, ImpBuilder, MediaType};

    #[tokio::test]
    async fn test_invalid_bids_removed_with_errors() {
        let req = BidRequestBuilder::default()
            .id("r1".to_string())
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

        let good = TypedBidBuilder::default()
            .bid(
                BidBuilder::default()
                    .id("good".to_string())
                    .impid("i1".to_string())
                    .price(1.0)
                    .adm(Some("<div/>".to_string()))
                    .build()
                    .unwrap(),
            )
            .media_type(MediaType::Banner)
            .build()
            .unwrap();

        let phantom = TypedBidBuilder::default()
            .bid(
                BidBuilder::default()
                    .id("phantom".to_string())
                    .impid("missing".to_string())
                    .price(1.0)
                    .adm(Some("<div/>".to_string()))
                    .build()
                    .unwrap(),
            )
            .media_type(MediaType::Banner)
            .build()
            .unwrap();

        *context.results.lock() = vec![BidderResult {
            bidder: "nexbid".to_string(),
            bids: vec![good, phantom],
            ..Default::default()
        }];

        ValidateBidsTask.run(&context).unwrap();

        let results = context.results.lock();
        assert_eq!(results[0].bids.len(), 1);
        assert_eq!(results[0].bids[0].bid.id, "good");
        assert_eq!(results[0].errors.len(), 1);
        assert_eq!(results[0].errors[0].kind, ErrorKind::Validation);
    }
}
