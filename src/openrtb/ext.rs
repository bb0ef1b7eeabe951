//! Typed readers over the open content `ext` bags.
//!
//! Extension objects are deliberately kept as raw [`serde_json::Value`]
//! on the wire structs. Each consumer decodes only the sub path it
//! knows about through these helpers, so unknown publisher or partner
//! extensions pass through the exchange untouched.

use crate::openrtb::{Bid, BidRequest, Imp, MediaType, User};
use serde::Deserialize;
use std::collections::HashMap;

fn path<'a>(value: &'a serde_json::Value, segments: &[&str]) -> Option<&'a serde_json::Value> {
    let mut current = value;

    for segment in segments {
        current = current.get(segment)?;
    }

    Some(current)
}

/// Request scoped currency overrides from `ext.prebid.currency`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CurrencyExt {
    /// Custom conversion rates, `from -> to -> rate`
    #[serde(default)]
    pub rates: HashMap<String, HashMap<String, f64>>,

    /// When true the server side rate table takes precedence over
    /// the custom rates above. Default false
    #[serde(default)]
    pub usepbsrates: bool,
}

pub fn currency(req: &BidRequest) -> Option<CurrencyExt> {
    let node = path(req.ext.as_ref()?, &["prebid", "currency"])?;

    serde_json::from_value(node.clone()).ok()
}

/// Explicit bidder allow list from `ext.prebid.bidders`. When present
/// only these codes participate, intersected with the active registry
pub fn bidder_hints(req: &BidRequest) -> Option<Vec<String>> {
    let node = path(req.ext.as_ref()?, &["prebid", "bidders"])?;

    let codes: Vec<String> = serde_json::from_value(node.clone()).ok()?;

    Some(codes.into_iter().map(|c| c.to_lowercase()).collect())
}

/// Request global bidder params from `ext.prebid.bidderparams.<code>`,
/// merged under each imp's own params by the adapters
pub fn global_bidder_params(req: &BidRequest, code: &str) -> Option<serde_json::Value> {
    path(req.ext.as_ref()?, &["prebid", "bidderparams", code]).cloned()
}

/// Multibid limits override from `ext.prebid.multibid`
#[derive(Debug, Clone, Deserialize)]
pub struct MultiBidExt {
    #[serde(default)]
    pub maxbids: Option<u32>,

    #[serde(default)]
    pub maxbidsperimp: Option<u32>,
}

pub fn multibid(req: &BidRequest) -> Option<MultiBidExt> {
    let node = path(req.ext.as_ref()?, &["prebid", "multibid"])?;

    serde_json::from_value(node.clone()).ok()
}

/// Multiformat selection strategy override from
/// `ext.prebid.multiformat.strategy`; parsed by the selector
pub fn multiformat_strategy(req: &BidRequest) -> Option<String> {
    path(req.ext.as_ref()?, &["prebid", "multiformat", "strategy"])?
        .as_str()
        .map(str::to_string)
}

/// Per impression bidder params. The canonical location is
/// `imp.ext.prebid.bidder.<code>`; older supply integrations still
/// send params directly under `imp.ext.<code>` so that is kept as
/// a fallback
pub fn imp_bidder_params(imp: &Imp, code: &str) -> Option<serde_json::Value> {
    let ext = imp.ext.as_ref()?;

    if let Some(params) = path(ext, &["prebid", "bidder", code]) {
        return Some(params.clone());
    }

    ext.get(code).cloned()
}

/// The media type a bidder authoritatively declared for its bid via
/// `bid.ext.prebid.type`. Absence means the imp structure decides
pub fn bid_declared_media_type(bid: &Bid) -> Option<MediaType> {
    path(bid.ext.as_ref()?, &["prebid", "type"])?
        .as_str()?
        .parse()
        .ok()
}

/// TCF consent string from `user.ext.consent`
pub fn user_consent(user: &User) -> Option<String> {
    user.ext.as_ref()?.get("consent")?.as_str().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openrtb::{BidBuilder, BidRequestBuilder, ImpBuilder};
    use serde_json::json;

    #[test]
    fn test_currency_ext_custom_rates() {
        let req = BidRequestBuilder::default()
            .ext(Some(json!({
                "prebid": {
                    "currency": {
                        "rates": { "USD": { "EUR": 0.92 } }
                    }
                }
            })))
            .build()
            .unwrap();

        let currency = currency(&req).expect("currency ext should parse");

        assert_eq!(currency.rates["USD"]["EUR"], 0.92);
        assert!(!currency.usepbsrates, "usepbsrates should default false");
    }

    #[test]
    fn test_bidder_hints_lowercased() {
        let req = BidRequestBuilder::default()
            .ext(Some(json!({ "prebid": { "bidders": ["NexBid", "adverve"] } })))
            .build()
            .unwrap();

        assert_eq!(
            bidder_hints(&req).unwrap(),
            vec!["nexbid".to_string(), "adverve".to_string()]
        );
    }

    #[test]
    fn test_imp_bidder_params_prebid_location_wins() {
        let imp = ImpBuilder::default()
            .ext(Some(json!({
                "prebid": { "bidder": { "nexbid": { "zone": "abc" } } },
                "nexbid": { "zone": "legacy" }
            })))
            .build()
            .unwrap();

        let params = imp_bidder_params(&imp, "nexbid").unwrap();

        assert_eq!(params["zone"], "abc");
    }

    #[test]
    fn test_imp_bidder_params_legacy_fallback() {
        let imp = ImpBuilder::default()
            .ext(Some(json!({ "nexbid": { "zone": "legacy" } })))
            .build()
            .unwrap();

        let params = imp_bidder_params(&imp, "nexbid").unwrap();

        assert_eq!(params["zone"], "legacy");
    }

    #[test]
    fn test_bid_declared_media_type() {
        let bid = BidBuilder::default()
            .ext(Some(json!({ "prebid": { "type": "video" } })))
            .build()
            .unwrap();

        assert_eq!(bid_declared_media_type(&bid), Some(MediaType::Video));

        let untyped = BidBuilder::default().build().unwrap();
        assert_eq!(bid_declared_media_type(&untyped), None);
    }
}
