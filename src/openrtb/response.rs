use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Top level OpenRTB bid response, used both for what demand
/// partners return to us and for what we return upstream
#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[builder(default)]
#[serde(default)]
pub struct BidResponse {
    /// Mirrors the id of the bid request this responds to
    pub id: String,

    pub seatbid: Vec<SeatBid>,

    /// Bidder generated response id for logging/tracking
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bidid: Option<String>,

    /// Bid currency using ISO-4217 alpha codes, assumed USD if absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cur: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub customdata: Option<String>,

    /// Reason for not bidding, populated only on empty seatbid
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbr: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[builder(default)]
#[serde(default)]
pub struct SeatBid {
    pub bid: Vec<Bid>,

    /// ID of the buyer seat on whose behalf this bid is made
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seat: Option<String>,

    /// 1 = bids must be won or lost as a group
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[builder(default)]
#[serde(default)]
pub struct Bid {
    pub id: String,

    /// ID of the imp object in the related bid request
    pub impid: String,

    /// Bid price expressed as CPM in the response currency
    pub price: f64,

    /// Win notice URL, may carry the ad markup for some partners
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nurl: Option<String>,

    /// Billing notice URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub burl: Option<String>,

    /// Loss notice URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lurl: Option<String>,

    /// Ad markup (html, VAST xml, or native json)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adm: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub adid: Option<String>,

    /// Advertiser domains for block list checking
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adomain: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cid: Option<String>,

    /// Creative id for reporting and quality review
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crid: Option<String>,

    /// IAB content categories of the creative
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cat: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub attr: Option<Vec<i32>>,

    /// Reference to a deal from the request pmp object if this
    /// bid pertains to a private marketplace deal
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dealid: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub w: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub h: Option<u32>,

    /// Advisory seconds the bid is eligible to win after the auction
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<serde_json::Value>,
}
