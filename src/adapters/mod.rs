use crate::core::errors::BidderError;
use crate::core::models::auction::TypedBid;
use crate::core::models::bidder::BidderInfo;
use crate::openrtb::{BidRequest, MediaType, ext};
use ahash::AHashMap;
use anyhow::anyhow;
use bytes::Bytes;
use std::sync::Arc;

mod adverve;
mod codec;
mod nexbid;
mod ortb;
mod pulsebid;

pub use adverve::AdverveAdapter;
pub use codec::{gzip_compress, gzip_decompress};
pub use nexbid::NexbidAdapter;
pub use ortb::OrtbAdapter;
pub use pulsebid::PulsebidAdapter;

pub const CONTENT_TYPE_JSON: &str = "application/json;charset=utf-8";

pub struct Header {
    pub key: &'static str,
    pub value: String,
}

impl Header {
    pub fn new(key: &'static str, value: impl Into<String>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }
}

/// One outbound HTTP call an adapter wants made. Adapters own the
/// full wire shape; the client only executes
pub struct RequestData {
    pub method: reqwest::Method,
    pub uri: String,
    pub body: Vec<u8>,
    pub headers: Vec<Header>,
    /// Imp ids this callout covers, used to scope timeout errors
    pub imp_ids: Vec<String>,
}

impl RequestData {
    pub fn post_json(uri: impl Into<String>, body: Vec<u8>, imp_ids: Vec<String>) -> Self {
        Self {
            method: reqwest::Method::POST,
            uri: uri.into(),
            body,
            headers: vec![Header::new("content-type", CONTENT_TYPE_JSON)],
            imp_ids,
        }
    }

    pub fn has_header(&self, key: &str) -> bool {
        self.headers.iter().any(|h| h.key.eq_ignore_ascii_case(key))
    }
}

/// The raw result of executing one [`RequestData`]. The transfer
/// layer has already reversed any content encoding; `body` is the
/// partner's plain payload
pub struct ResponseData {
    pub status: u16,
    pub body: Bytes,
}

/// Request scoped context handed to `make_requests` alongside the
/// auction payload: publisher slot overrides and request global
/// params the adapter should merge under its own imp params
#[derive(Default)]
pub struct RequestHints {
    /// From `ext.prebid.bidderparams.<code>`
    pub global_params: Option<serde_json::Value>,
    /// Per imp id params resolved from the publisher slot chain
    pub slot_params: AHashMap<String, serde_json::Value>,
}

/// Parsed demand response: the currency the partner declared plus
/// its typed bids
pub struct AdapterResponse {
    pub currency: String,
    pub bids: Vec<TypedBid>,
}

/// The two operation contract every demand partner integration
/// implements. Adapters are stateless values; everything request
/// scoped arrives through the arguments
pub trait BidAdapter: Send + Sync {
    /// Transform the normalized auction request into partner wire
    /// requests. Invalid imps are dropped with an error; an empty
    /// request list with errors means this bidder sits the auction
    /// out, which is never auction fatal
    fn make_requests(
        &self,
        req: &BidRequest,
        hints: &RequestHints,
    ) -> (Vec<RequestData>, Vec<BidderError>);

    /// Parse one partner response into typed bids. 204 means no
    /// bids and no error
    fn make_bids(
        &self,
        req: &BidRequest,
        data: &RequestData,
        response: &ResponseData,
    ) -> (Option<AdapterResponse>, Vec<BidderError>);
}

/// Maps a bidder's configured adapter code to its implementation
pub fn build_adapter(info: &BidderInfo) -> Result<Arc<dyn BidAdapter>, anyhow::Error> {
    match info.adapter.as_str() {
        "" | "ortb" => Ok(Arc::new(OrtbAdapter::new(info))),
        "nexbid" => Ok(Arc::new(NexbidAdapter::new(info))),
        "adverve" => Ok(Arc::new(AdverveAdapter::new(info))),
        "pulsebid" => Ok(Arc::new(PulsebidAdapter::new(info))),
        other => Err(anyhow!(
            "Bidder '{}' references unknown adapter '{}'",
            info.code,
            other
        )),
    }
}

/// Shared status code semantics for partner responses
pub enum StatusOutcome {
    Bids,
    NoBids,
    Failed(BidderError),
}

pub fn classify_status(status: u16, body: &[u8]) -> StatusOutcome {
    match status {
        200 => StatusOutcome::Bids,
        204 => StatusOutcome::NoBids,
        400 => {
            let excerpt: String = String::from_utf8_lossy(body).chars().take(256).collect();

            StatusOutcome::Failed(BidderError::bad_input(format!(
                "partner rejected request with 400: {}",
                excerpt
            )))
        }
        other => StatusOutcome::Failed(BidderError::bad_server_response(format!(
            "unexpected status {}",
            other
        ))),
    }
}

/// Resolve a bid's media type. The partner's response ext wins when
/// present; otherwise the referenced imp must offer exactly one
/// type. Multiformat imps with an undeclared bid are unresolvable
/// and the bid is rejected rather than guessed
pub fn resolve_media_type(
    bid: &crate::openrtb::Bid,
    req: &BidRequest,
) -> Result<(MediaType, bool), BidderError> {
    if let Some(declared) = ext::bid_declared_media_type(bid) {
        return Ok((declared, true));
    }

    let imp = req
        .imp
        .iter()
        .find(|imp| imp.id == bid.impid)
        .ok_or_else(|| {
            BidderError::bad_server_response(format!(
                "bid {} references unknown imp '{}'",
                bid.id, bid.impid
            ))
        })?;

    imp.sole_media_type().map(|mt| (mt, false)).ok_or_else(|| {
        BidderError::bad_server_response(format!(
            "bid {} on multiformat imp '{}' did not declare a media type",
            bid.id, bid.impid
        ))
    })
}

/// Merge param layers for one imp: imp level params win over slot
/// overrides, which win over request global params
pub fn merged_imp_params(
    imp: &crate::openrtb::Imp,
    code: &str,
    hints: &RequestHints,
) -> Option<serde_json::Value> {
    let layers = [
        hints.global_params.clone(),
        hints.slot_params.get(&imp.id).cloned(),
        ext::imp_bidder_params(imp, code),
    ];

    let mut merged: Option<serde_json::Value> = None;

    for layer in layers.into_iter().flatten() {
        merged = Some(match (merged.take(), layer) {
            (Some(serde_json::Value::Object(mut base)), serde_json::Value::Object(over)) => {
                for (k, v) in over {
                    base.insert(k, v);
                }

                serde_json::Value::Object(base)
            }
            // non-object layers replace wholesale
            (_, layer) => layer,
        });
    }

    merged
}
