use crate::core::models::bidder::DemandType;
use crate::core::selection::RankedBid;
use crate::core::selection::pricebucket::bucket_price;
use crate::exchange::context::{AuctionContext, BidResponseState};
use crate::openrtb::{Bid, BidResponse, SeatBid};
use crate::pipeline::BlockingTask;
use ahash::AHashMap;
use anyhow::Error;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use tracing::debug;

/// Assembles the outbound OpenRTB response: one seat per winning
/// bidder, targeting keys under each bid's `ext.prebid.targeting`,
/// and deterministic seat/bid ordering so identical inputs yield
/// byte identical responses
pub struct RespondTask {
    platform_seat: String,
}

impl RespondTask {
    pub fn new(platform_seat: String) -> Self {
        Self { platform_seat }
    }

    fn targeting_keys(&self, ranked: &RankedBid, demand_type: DemandType) -> BTreeMap<String, String> {
        let suffix = if ranked.rank > 1 {
            format!("_{}", ranked.rank)
        } else {
            String::new()
        };

        // platform demand hides behind the shared identifier, the
        // real code stays on the seat
        let bidder_value = match demand_type {
            DemandType::Platform => self.platform_seat.clone(),
            DemandType::Publisher => ranked.bidder.clone(),
        };

        let bid = &ranked.bid.bid;
        let mut keys = BTreeMap::new();

        keys.insert(format!("hb_bidder{suffix}"), bidder_value);
        keys.insert(format!("hb_pb{suffix}"), bucket_price(bid.price));

        if let (Some(w), Some(h)) = (bid.w, bid.h) {
            keys.insert(format!("hb_size{suffix}"), format!("{w}x{h}"));
        }

        if let Some(dealid) = bid.dealid.as_deref() {
            if !dealid.is_empty() {
                keys.insert(format!("hb_deal{suffix}"), dealid.to_string());
            }
        }

        keys
    }

    fn decorate_bid(&self, ranked: &RankedBid, demand_type: DemandType) -> Bid {
        let mut bid = ranked.bid.bid.clone();

        let targeting = self.targeting_keys(ranked, demand_type);

        let mut prebid = Map::new();
        prebid.insert("type".to_string(), json!(ranked.bid.media_type));
        prebid.insert("targeting".to_string(), json!(targeting));

        let meta = &ranked.bid.meta;
        if meta.duration.is_some() || meta.primary_category.is_some() || meta.deal_priority.is_some()
        {
            prebid.insert("meta".to_string(), json!(meta));
        }

        let mut ext = match bid.ext.take() {
            Some(Value::Object(ext)) => ext,
            _ => Map::new(),
        };
        ext.insert("prebid".to_string(), Value::Object(prebid));

        bid.ext = Some(Value::Object(ext));

        bid
    }
}

fn sort_bids_by_price(bids: &mut [Bid]) {
    bids.sort_by(|a, b| b.price.total_cmp(&a.price));
}

fn sort_seats_by_highest_bid(seats: &mut [SeatBid]) {
    seats.sort_by(|a, b| {
        let a_price = a.bid.first().map(|bid| bid.price).unwrap_or(0.0);
        let b_price = b.bid.first().map(|bid| bid.price).unwrap_or(0.0);

        b_price
            .total_cmp(&a_price)
            .then(a.seat.cmp(&b.seat))
    });
}

impl BlockingTask<AuctionContext, Error> for RespondTask {
    fn run(&self, context: &AuctionContext) -> Result<(), Error> {
        if context.res.get().is_some() {
            return Ok(());
        }

        let selected = context.selected.lock();

        if selected.is_empty() {
            debug!("No winning bids, responding no bid");
            context.set_response(context.no_bid_fallback());

            return Ok(());
        }

        let demand_types: AHashMap<String, DemandType> = context
            .bidders
            .lock()
            .iter()
            .map(|b| (b.entry.info.code.clone(), b.entry.info.demand_type))
            .collect();

        let mut seat_bids: AHashMap<String, Vec<Bid>> = AHashMap::new();

        for ranked in selected.iter() {
            let demand_type = demand_types
                .get(&ranked.bidder)
                .copied()
                .unwrap_or_default();

            seat_bids
                .entry(ranked.bidder.clone())
                .or_default()
                .push(self.decorate_bid(ranked, demand_type));
        }

        let mut seats: Vec<SeatBid> = seat_bids
            .into_iter()
            .map(|(seat, mut bids)| {
                sort_bids_by_price(&mut bids);

                SeatBid {
                    bid: bids,
                    seat: Some(seat),
                    group: None,
                }
            })
            .collect();

        sort_seats_by_highest_bid(&mut seats);

        let response = BidResponse {
            id: context.request_id(),
            seatbid: seats,
            bidid: context.auction_id.get().cloned(),
            cur: Some(context.target_currency().to_string()),
            ..Default::default()
        };

        context.set_response(BidResponseState::Bid(response));

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::auction::TypedBidBuilder;
    use crate::core::models::bidder::BidderInfoBuilder;
    use crate::core::privacy::RedactionPlan;
    use crate::core::registry::AdapterRegistry;
    use crate::exchange::context::BidderContext;
    use crate::openrtb::{BidBuilder, BidRequestBuilder, MediaType};

    fn ranked(bidder: &str, id: &str, price: f64, rank: u32, dealid: Option<&str>) -> RankedBid {
        RankedBid {
            bid: TypedBidBuilder::default()
                .bid(
                    BidBuilder::default()
                        .id(id.to_string())
                        .impid("i1".to_string())
                        .price(price)
                        .adm(Some("<div/>".to_string()))
                        .w(Some(300u32))
                        .h(Some(250u32))
                        .dealid(dealid.map(str::to_string))
                        .build()
                        .unwrap(),
                )
                .media_type(MediaType::Banner)
                .build()
                .unwrap(),
            bidder: bidder.to_string(),
            bidder_return_index: 0,
            rank,
        }
    }

    fn context_with(selected: Vec<RankedBid>, platform: &[&str]) -> AuctionContext {
        let req = BidRequestBuilder::default().id("r1".to_string()).build().unwrap();
        let context = AuctionContext::new(req);

        context.target_currency.set("USD".to_string()).ok();
        context.auction_id.set("auction-1".to_string()).ok();

        let mut bidder_contexts = Vec::new();

        for ranked in &selected {
            if bidder_contexts
                .iter()
                .any(|b: &BidderContext| b.entry.info.code == ranked.bidder)
            {
                continue;
            }

            let info = BidderInfoBuilder::default()
                .code(ranked.bidder.clone())
                .endpoint(format!("https://{}.example/bid", ranked.bidder))
                .demand_type(if platform.contains(&ranked.bidder.as_str()) {
                    crate::core::models::bidder::DemandType::Platform
                } else {
                    crate::core::models::bidder::DemandType::Publisher
                })
                .default_tmax_ms(500u64)
                .build()
                .unwrap();

            let registry = AdapterRegistry::new(&[info]).unwrap();

            bidder_contexts.push(BidderContext {
                entry: registry.get(&ranked.bidder).unwrap(),
                redaction: RedactionPlan::default(),
            });
        }

        *context.bidders.lock() = bidder_contexts;
        *context.selected.lock() = selected;

        context
    }

    fn targeting(bid: &Bid) -> serde_json::Value {
        bid.ext.as_ref().unwrap()["prebid"]["targeting"].clone()
    }

    #[tokio::test]
    async fn test_response_shape_and_targeting() {
        let context = context_with(vec![ranked("beta", "b1", 2.0, 1, None)], &[]);

        RespondTask::new("platform".to_string()).run(&context).unwrap();

        let response = match context.res.get().unwrap() {
            BidResponseState::Bid(response) => response.clone(),
            _ => panic!("expected a bid response"),
        };

        assert_eq!(response.id, "r1");
        assert_eq!(response.cur.as_deref(), Some("USD"));
        assert_eq!(response.seatbid.len(), 1);
        assert_eq!(response.seatbid[0].seat.as_deref(), Some("beta"));

        let keys = targeting(&response.seatbid[0].bid[0]);
        assert_eq!(keys["hb_bidder"], "beta");
        assert_eq!(keys["hb_pb"], "2.00");
        assert_eq!(keys["hb_size"], "300x250");
        assert!(keys.get("hb_deal").is_none());
    }

    #[tokio::test]
    async fn test_platform_demand_masks_hb_bidder() {
        let context = context_with(vec![ranked("quietdsp", "b1", 2.0, 1, None)], &["quietdsp"]);

        RespondTask::new("platform".to_string()).run(&context).unwrap();

        let response = match context.res.get().unwrap() {
            BidResponseState::Bid(response) => response.clone(),
            _ => panic!("expected a bid response"),
        };

        assert_eq!(
            response.seatbid[0].seat.as_deref(),
            Some("quietdsp"),
            "Seat keeps the real code"
        );
        assert_eq!(
            targeting(&response.seatbid[0].bid[0])["hb_bidder"],
            "platform"
        );
    }

    #[tokio::test]
    async fn test_multibid_extras_suffixed() {
        let context = context_with(
            vec![
                ranked("beta", "first", 3.0, 1, None),
                ranked("beta", "second", 1.0, 2, Some("d9")),
            ],
            &[],
        );

        RespondTask::new("platform".to_string()).run(&context).unwrap();

        let response = match context.res.get().unwrap() {
            BidResponseState::Bid(response) => response.clone(),
            _ => panic!("expected a bid response"),
        };

        let bids = &response.seatbid[0].bid;
        assert_eq!(bids.len(), 2);

        let extras = targeting(&bids[1]);
        assert_eq!(extras["hb_bidder_2"], "beta");
        assert_eq!(extras["hb_pb_2"], "1.00");
        assert_eq!(extras["hb_deal_2"], "d9");
    }

    #[tokio::test]
    async fn test_empty_selection_is_no_bid() {
        let context = context_with(Vec::new(), &[]);

        RespondTask::new("platform".to_string()).run(&context).unwrap();

        assert!(matches!(
            context.res.get(),
            Some(BidResponseState::NoBidReason { .. })
        ));
    }

    #[tokio::test]
    async fn test_deterministic_serialization() {
        let build = || {
            let context = context_with(
                vec![
                    ranked("beta", "b1", 2.0, 1, None),
                    ranked("alpha", "a1", 2.0, 1, None),
                ],
                &[],
            );

            RespondTask::new("platform".to_string()).run(&context).unwrap();

            match context.res.get().unwrap() {
                BidResponseState::Bid(response) => serde_json::to_vec(response).unwrap(),
                _ => panic!("expected a bid response"),
            }
        };

        assert_eq!(build(), build(), "Same inputs must serialize identically");
    }
}
