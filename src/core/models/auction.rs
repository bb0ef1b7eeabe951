use crate::core::errors::BidderError;
use crate::core::spec::dimensions::{Channel, StatsDeviceType};
use crate::openrtb::{Bid, MediaType};
use chrono::{DateTime, Utc};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use strum::{Display, EnumString};

/// Non creative metadata a partner attached to a bid which
/// downstream targeting and reporting care about
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BidMeta {
    /// Creative duration in seconds for video/audio bids
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    /// First IAB category after truncation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_category: Option<String>,
    /// Partner declared deal priority, copied through untouched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deal_priority: Option<u32>,
}

/// A raw partner bid plus the resolved media type the adapter
/// committed to. Media type is decided at parse time and never
/// re-inferred downstream
#[derive(Debug, Clone, Serialize, Deserialize, Builder)]
pub struct TypedBid {
    pub bid: Bid,
    pub media_type: MediaType,
    /// True when the partner declared the type on its response ext,
    /// which overrides what the imp structure implies
    #[builder(default)]
    pub media_type_declared: bool,
    #[builder(default)]
    pub seat: Option<String>,
    #[builder(default)]
    pub meta: BidMeta,
}

/// Per bidder auction outcome. Exactly one exists for every bidder
/// that was dispatched, whether it bid, errored, or timed out
#[derive(Debug, Clone, Serialize, Deserialize, Builder)]
#[builder(default)]
pub struct BidderResult {
    pub bidder: String,
    pub bids: Vec<TypedBid>,
    pub latency: Duration,
    /// True when the shared auction deadline cancelled the callout.
    /// Implies `bids` is empty
    pub timed_out: bool,
    pub http_status: Option<u16>,
    pub errors: Vec<BidderError>,
    /// Currency the bidder declared on its response
    pub currency: String,
}

impl Default for BidderResult {
    fn default() -> Self {
        Self {
            bidder: String::new(),
            bids: Vec::new(),
            latency: Duration::ZERO,
            timed_out: false,
            http_status: None,
            errors: Vec::new(),
            currency: "USD".to_string(),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ExclusionReason {
    PrivacyDenied,
    /// Paused or disabled in the registry
    Inactive,
    /// No declared capability for the request channel/media types
    NoCapability,
    /// The request's bidder allow list did not include it
    NotRequested,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExcludedBidder {
    pub code: String,
    pub reason: ExclusionReason,
}

/// Per impression floor snapshot. `request_floor` is what the
/// publisher asked for, `effective_floor` is what bidders saw after
/// slot overrides and the publisher multiplier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FloorSnapshot {
    pub imp_id: String,
    pub currency: String,
    pub request_floor: f64,
    pub effective_floor: f64,
}

/// Compact request dimensions for analytics, never the full body
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RequestSummary {
    pub request_id: String,
    pub channel: Channel,
    pub device_type: StatsDeviceType,
    pub imp_count: usize,
    pub media_types: Vec<MediaType>,
    /// Test mode traffic is recorded but never billable
    pub test: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WinningBid {
    pub imp_id: String,
    pub bidder: String,
    pub price: f64,
    pub media_type: MediaType,
    pub dealid: Option<String>,
}

/// Immutable snapshot of a completed auction handed to the
/// analytics sinks. Built once in the final pipeline stage and
/// shared read only from there on
#[derive(Debug, Clone, Serialize, Deserialize, Builder)]
#[builder(default)]
pub struct AuctionObject {
    pub auction_id: String,
    pub publisher_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub summary: RequestSummary,
    pub bidders_selected: Vec<String>,
    pub bidders_excluded: Vec<ExcludedBidder>,
    pub results: Vec<BidderResult>,
    pub winners: Vec<WinningBid>,
    pub target_currency: String,
    pub floors: Vec<FloorSnapshot>,
}

impl Default for AuctionObject {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            auction_id: String::new(),
            publisher_id: String::new(),
            started_at: now,
            ended_at: now,
            summary: RequestSummary::default(),
            bidders_selected: Vec::new(),
            bidders_excluded: Vec::new(),
            results: Vec::new(),
            winners: Vec::new(),
            target_currency: "USD".to_string(),
            floors: Vec::new(),
        }
    }
}
