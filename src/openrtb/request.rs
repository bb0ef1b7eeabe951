use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Top level OpenRTB 2.x bid request. Only the attributes the
/// exchange actually consumes are modeled; everything a partner or
/// publisher layers on top rides in the open `ext` bags which are
/// decoded lazily per sub path (see [`crate::openrtb::ext`])
#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[builder(default)]
#[serde(default)]
pub struct BidRequest {
    /// Unique ID of the bid request, provided by the supply side.
    /// REQUIRED by the OpenRTB specification
    pub id: String,

    /// The impressions offered. At least one is required
    pub imp: Vec<Imp>,

    /// Website context. Mutually exclusive with `app`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<Site>,

    /// Non browser application context. Mutually exclusive with `site`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app: Option<App>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<Device>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,

    /// Legal and governmental regulations in force for this request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regs: Option<Regs>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,

    /// Auction type, 1 = first price, 2 = second price plus
    #[serde(skip_serializing_if = "Option::is_none")]
    pub at: Option<i32>,

    /// Maximum time in milliseconds to submit a bid to avoid timeout
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tmax: Option<u64>,

    /// Allowed currencies for bids using ISO-4217 alpha codes,
    /// ordered by preference
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cur: Option<Vec<String>>,

    /// Blocked advertiser categories (IAB content categories)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bcat: Option<Vec<String>>,

    /// Blocked advertisers by domain
    #[serde(skip_serializing_if = "Option::is_none")]
    pub badv: Option<Vec<String>>,

    /// Indicator of test mode (non billable traffic), 1 = test
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<serde_json::Value>,
}

/// An ad opportunity within a request. Presence of the
/// banner/video/native/audio sub objects defines which media
/// types the slot supports
#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[builder(default)]
#[serde(default)]
pub struct Imp {
    /// Unique within the request
    pub id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub banner: Option<Banner>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<Video>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub native: Option<Native>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<Audio>,

    /// Identifier for the ad placement or slot as named by the publisher
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tagid: Option<String>,

    /// Minimum bid for this impression expressed in CPM
    pub bidfloor: f64,

    /// Currency of the floor using ISO-4217 alpha codes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bidfloorcur: Option<String>,

    /// Flag for secure (https) creative asset requirement
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secure: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pmp: Option<Pmp>,

    /// Open content bag. Bidder specific parameters live under
    /// `ext.prebid.bidder.<code>` (with a legacy `ext.<code>` fallback)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub struct Format {
    pub w: u32,
    pub h: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Banner {
    /// Exact width in device independent pixels
    #[serde(skip_serializing_if = "Option::is_none")]
    pub w: Option<u32>,

    /// Exact height in device independent pixels
    #[serde(skip_serializing_if = "Option::is_none")]
    pub h: Option<u32>,

    /// Permitted sizes. Takes precedence over w/h when present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<Vec<Format>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pos: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Video {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mimes: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub minduration: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub maxduration: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub w: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub h: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocols: Option<Vec<i32>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub placement: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Native {
    /// Request payload complying with the Native Ad Specification
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ver: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Audio {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mimes: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub minduration: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub maxduration: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Pmp {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_auction: Option<i32>,

    pub deals: Vec<Deal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Deal {
    pub id: String,

    pub bidfloor: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bidfloorcur: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub at: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub wseat: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Site {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cat: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<Publisher>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct App {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Platform specific application identifier, e.g. bundle
    /// or package name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundle: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<Publisher>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Publisher {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Device {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ua: Option<String>,

    /// IPv4 address closest to device
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv6: Option<String>,

    /// General device type per the AdCOM device type list
    #[serde(skip_serializing_if = "Option::is_none")]
    pub devicetype: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub geo: Option<Geo>,

    /// Standard do-not-track flag, 1 = tracking restricted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dnt: Option<i32>,

    /// Limit ad tracking signal (commercially endorsed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lmt: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    /// Platform device identifier, hashed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ifa: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Geo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,

    /// Country using ISO-3166-1-alpha-3
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct User {
    /// Exchange specific id for the user
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Buyer specific id for the user as mapped by the exchange
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buyeruid: Option<String>,

    /// Extended identifiers offered by the supply chain
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eids: Option<Vec<Eid>>,

    /// TCF consent string when gdpr applies rides in `ext.consent`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Eid {
    pub source: String,
    pub uids: Vec<Uid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Uid {
    pub id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub atype: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Regs {
    /// COPPA applicability, 1 = subject to COPPA
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coppa: Option<i32>,

    /// GDPR applicability, 1 = in scope (2.6 promoted from ext)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gdpr: Option<i32>,

    /// CCPA / US privacy string
    #[serde(skip_serializing_if = "Option::is_none")]
    pub us_privacy: Option<String>,

    /// Global Privacy Platform consent string
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpp: Option<String>,

    /// GPP section ids in force for this request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpp_sid: Option<Vec<i32>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Source {
    /// Transaction id common across all participants
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tid: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub fd: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pchain: Option<String>,
}
