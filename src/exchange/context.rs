use crate::core::models::auction::{
    AuctionObject, BidderResult, ExcludedBidder, FloorSnapshot,
};
use crate::core::models::publisher::Publisher;
use crate::core::privacy::{PrivacyContext, RedactionPlan};
use crate::core::registry::RegistryEntry;
use crate::core::selection::RankedBid;
use crate::core::spec::nobidreasons;
use crate::openrtb::{BidRequest, BidResponse};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::sync::{Arc, OnceLock};

/// The final outcome of processing: either a response carrying
/// seats, or a detailed no bid
#[derive(Debug, Clone)]
pub enum BidResponseState {
    Bid(BidResponse),
    NoBidReason {
        reqid: String,
        nbr: u32,
        desc: Option<&'static str>,
    },
}

impl BidResponseState {
    /// Collapse to the wire response. No bids are a valid 200 with
    /// an empty seatbid and the reason code attached
    pub fn into_response(self, cur: &str) -> BidResponse {
        match self {
            BidResponseState::Bid(response) => response,
            BidResponseState::NoBidReason { reqid, nbr, .. } => BidResponse {
                id: reqid,
                cur: Some(cur.to_string()),
                nbr: Some(nbr),
                ..Default::default()
            },
        }
    }

    pub fn no_bid(reqid: impl Into<String>, nbr: u32, desc: &'static str) -> Self {
        BidResponseState::NoBidReason {
            reqid: reqid.into(),
            nbr,
            desc: Some(desc),
        }
    }
}

/// One selected bidder's slice of the auction: its registry entry
/// and the redaction its payload must receive before dispatch
pub struct BidderContext {
    pub entry: RegistryEntry,
    pub redaction: RedactionPlan,
}

/// Carries all state for one auction through the task pipeline.
/// Tasks communicate exclusively through interior mutability here;
/// nothing on this struct outlives the `run_auction` call except
/// the auction object handed to analytics
pub struct AuctionContext {
    pub req: RwLock<BidRequest>,
    pub auction_id: OnceLock<String>,
    pub started_at: DateTime<Utc>,
    pub started_mono: tokio::time::Instant,
    /// Absolute point the whole auction must resolve by
    pub deadline: OnceLock<tokio::time::Instant>,
    pub publisher: OnceLock<Publisher>,
    pub target_currency: OnceLock<String>,
    pub privacy: OnceLock<PrivacyContext>,
    pub floors: OnceLock<Vec<FloorSnapshot>>,
    pub bidders: Mutex<Vec<BidderContext>>,
    pub excluded: Mutex<Vec<ExcludedBidder>>,
    pub results: Mutex<Vec<BidderResult>>,
    /// Multibid survivors, input to per imp selection
    pub ranked: Mutex<Vec<RankedBid>>,
    /// Per imp winner plus its multibid extras
    pub selected: Mutex<Vec<RankedBid>>,
    pub res: OnceLock<BidResponseState>,
    pub auction_object: OnceLock<Arc<AuctionObject>>,
}

impl AuctionContext {
    pub fn new(req: BidRequest) -> Self {
        Self {
            req: RwLock::new(req),
            auction_id: OnceLock::new(),
            started_at: Utc::now(),
            started_mono: tokio::time::Instant::now(),
            deadline: OnceLock::new(),
            publisher: OnceLock::new(),
            target_currency: OnceLock::new(),
            privacy: OnceLock::new(),
            floors: OnceLock::new(),
            bidders: Mutex::new(Vec::new()),
            excluded: Mutex::new(Vec::new()),
            results: Mutex::new(Vec::new()),
            ranked: Mutex::new(Vec::new()),
            selected: Mutex::new(Vec::new()),
            res: OnceLock::new(),
            auction_object: OnceLock::new(),
        }
    }

    pub fn target_currency(&self) -> &str {
        self.target_currency
            .get()
            .map(String::as_str)
            .unwrap_or("USD")
    }

    pub fn request_id(&self) -> String {
        self.req.read().id.clone()
    }

    /// Assign the final response state; second writers indicate a
    /// pipeline wiring bug and lose
    pub fn set_response(&self, state: BidResponseState) {
        if self.res.set(state).is_err() {
            tracing::warn!("Response state already assigned, keeping the first");
        }
    }

    pub fn effective_floor(&self, imp_id: &str) -> Option<FloorSnapshot> {
        self.floors
            .get()?
            .iter()
            .find(|f| f.imp_id == imp_id)
            .cloned()
    }

    pub fn no_bid_fallback(&self) -> BidResponseState {
        BidResponseState::no_bid(
            self.request_id(),
            nobidreasons::NO_CAMPAIGNS_FOUND,
            "No bids received",
        )
    }
}
