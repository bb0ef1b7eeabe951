use crate::config::MultibidConfig;
use crate::core::models::auction::TypedBid;
use crate::openrtb::ext::MultiBidExt;
use ahash::AHashMap;

/// Effective multibid caps for one auction, config defaults with
/// the request ext override applied
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MultibidLimits {
    pub enabled: bool,
    pub max_per_bidder_total: u32,
    pub max_per_bidder_per_imp: u32,
}

impl MultibidLimits {
    pub fn resolve(cfg: &MultibidConfig, ext: Option<MultiBidExt>) -> Self {
        let mut limits = Self {
            enabled: cfg.enabled,
            max_per_bidder_total: cfg.max_per_bidder_total,
            max_per_bidder_per_imp: cfg.max_per_bidder_per_imp,
        };

        if let Some(ext) = ext {
            if let Some(maxbids) = ext.maxbids {
                limits.max_per_bidder_total = maxbids;
            }
            if let Some(maxbidsperimp) = ext.maxbidsperimp {
                limits.max_per_bidder_per_imp = maxbidsperimp;
            }
        }

        // zero caps make no sense, clamp to one
        limits.max_per_bidder_total = limits.max_per_bidder_total.max(1);
        limits.max_per_bidder_per_imp = limits.max_per_bidder_per_imp.max(1);

        limits
    }
}

/// A surviving bid annotated with everything the selectors and the
/// response builder need to stay deterministic: the bidder, the
/// order the adapter returned it in, and its price rank within its
/// (bidder, imp) group for targeting key suffixes
#[derive(Debug, Clone)]
pub struct RankedBid {
    pub bid: TypedBid,
    pub bidder: String,
    pub bidder_return_index: usize,
    /// 1 based, rank 1 carries unsuffixed targeting keys
    pub rank: u32,
}

/// Applies the per bidder multibid caps over one bidder's bids in
/// adapter return order, then ranks survivors per imp by descending
/// price for targeting suffixes.
///
/// With multibid disabled only the first returned bid per imp is
/// kept, everything else dropped silently
pub fn cap_bidder_bids(
    bidder: &str,
    bids: Vec<TypedBid>,
    limits: &MultibidLimits,
) -> Vec<RankedBid> {
    let (max_total, max_per_imp) = if limits.enabled {
        (
            limits.max_per_bidder_total as usize,
            limits.max_per_bidder_per_imp as usize,
        )
    } else {
        (usize::MAX, 1)
    };

    let mut per_imp: AHashMap<String, usize> = AHashMap::new();
    let mut kept: Vec<RankedBid> = Vec::with_capacity(bids.len().min(max_total));

    for (index, bid) in bids.into_iter().enumerate() {
        if kept.len() >= max_total {
            break;
        }

        let imp_count = per_imp.entry(bid.bid.impid.clone()).or_insert(0);

        if *imp_count >= max_per_imp {
            continue;
        }

        *imp_count += 1;

        kept.push(RankedBid {
            bid,
            bidder: bidder.to_string(),
            bidder_return_index: index,
            rank: 0,
        });
    }

    assign_ranks(&mut kept);

    kept
}

/// Rank survivors within each (bidder, imp) group by descending
/// price, return order breaking ties. Idempotent by construction
fn assign_ranks(bids: &mut [RankedBid]) {
    let mut by_imp: AHashMap<String, Vec<usize>> = AHashMap::new();

    for (index, ranked) in bids.iter().enumerate() {
        by_imp
            .entry(ranked.bid.bid.impid.clone())
            .or_default()
            .push(index);
    }

    for indices in by_imp.values_mut() {
        indices.sort_by(|a, b| {
            bids[*b]
                .bid
                .bid
                .price
                .total_cmp(&bids[*a].bid.bid.price)
                .then(bids[*a].bidder_return_index.cmp(&bids[*b].bidder_return_index))
        });

        for (position, index) in indices.iter().enumerate() {
            bids[*index].rank = position as u32 + 1;
        }
    }
}
