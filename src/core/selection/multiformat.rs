use crate::core::selection::multibid::RankedBid;
use crate::openrtb::{Imp, MediaType};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How the per impression winner is chosen when bids of different
/// media types compete for a multiformat slot
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum MultiformatStrategy {
    /// Deals outrank open bids; the slot's preferred media type wins
    /// when its best CPM lands within 5% of the top, else pure CPM
    #[default]
    Server,
    /// Deals outrank everything, media type ignored
    PreferDeal,
    /// Preferred media type outranks everything, CPM within the set
    PreferMediaType,
}

/// How close the preferred media type must come to the top CPM for
/// the `server` strategy to hand it the win
const PREFERRED_TYPE_TOLERANCE: f64 = 0.95;

/// The media type a multiformat slot would rather serve, derived
/// from its structure: video over native over banner over audio
pub fn preferred_media_type(imp: &Imp) -> Option<MediaType> {
    let types = imp.media_types();

    for preferred in [
        MediaType::Video,
        MediaType::Native,
        MediaType::Banner,
        MediaType::Audio,
    ] {
        if types.contains(&preferred) {
            return Some(preferred);
        }
    }

    None
}

fn is_deal(ranked: &RankedBid) -> bool {
    ranked
        .bid
        .bid
        .dealid
        .as_deref()
        .map(|d| !d.is_empty())
        .unwrap_or(false)
}

/// Deterministic candidate order: descending CPM, then bidder
/// return index, then bidder code. Every strategy starts from this
/// so a fixed result set always yields the same winner
fn sort_candidates(candidates: &mut [&RankedBid]) {
    candidates.sort_by(|a, b| {
        b.bid
            .bid
            .price
            .total_cmp(&a.bid.bid.price)
            .then(a.bidder_return_index.cmp(&b.bidder_return_index))
            .then(a.bidder.cmp(&b.bidder))
    });
}

fn pick_server<'a>(
    candidates: &[&'a RankedBid],
    preferred: Option<MediaType>,
) -> Option<&'a RankedBid> {
    let deals: Vec<&&RankedBid> = candidates.iter().filter(|c| is_deal(c)).collect();

    let pool: Vec<&RankedBid> = if deals.is_empty() {
        candidates.to_vec()
    } else {
        deals.into_iter().copied().collect()
    };

    let top = *pool.first()?;

    let preferred = match preferred {
        Some(preferred) => preferred,
        None => return Some(top),
    };

    let threshold = top.bid.bid.price * PREFERRED_TYPE_TOLERANCE;

    pool.iter()
        .find(|c| c.bid.media_type == preferred && c.bid.bid.price >= threshold)
        .copied()
        .or(Some(top))
}

fn pick_prefer_deal<'a>(candidates: &[&'a RankedBid]) -> Option<&'a RankedBid> {
    candidates
        .iter()
        .find(|c| is_deal(c))
        .copied()
        .or_else(|| candidates.first().copied())
}

fn pick_prefer_media_type<'a>(
    candidates: &[&'a RankedBid],
    preferred: Option<MediaType>,
) -> Option<&'a RankedBid> {
    let preferred = match preferred {
        Some(preferred) => preferred,
        None => return candidates.first().copied(),
    };

    candidates
        .iter()
        .find(|c| c.bid.media_type == preferred)
        .copied()
        .or_else(|| candidates.first().copied())
}

/// Picks the winner for one impression across all bidders'
/// surviving bids. `preferred_override` lets the request ext pin a
/// media type, otherwise the imp structure decides
pub fn select_imp_winner<'a>(
    imp: &Imp,
    candidates: &[&'a RankedBid],
    strategy: MultiformatStrategy,
    preferred_override: Option<MediaType>,
) -> Option<&'a RankedBid> {
    if candidates.is_empty() {
        return None;
    }

    let mut ordered: Vec<&RankedBid> = candidates.to_vec();
    sort_candidates(&mut ordered);

    let preferred = preferred_override.or_else(|| {
        // single format slots have nothing to prefer between
        if imp.media_types().len() > 1 {
            preferred_media_type(imp)
        } else {
            None
        }
    });

    match strategy {
        MultiformatStrategy::Server => pick_server(&ordered, preferred),
        MultiformatStrategy::PreferDeal => pick_prefer_deal(&ordered),
        MultiformatStrategy::PreferMediaType => pick_prefer_media_type(&ordered, preferred),
    }
}
