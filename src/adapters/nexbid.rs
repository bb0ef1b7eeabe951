use crate::adapters::{
    AdapterResponse, BidAdapter, Header, RequestData, RequestHints, ResponseData, StatusOutcome,
    classify_status, gzip_compress, merged_imp_params, resolve_media_type,
};
use crate::core::errors::BidderError;
use crate::core::models::auction::{BidMeta, TypedBid};
use crate::core::models::bidder::BidderInfo;
use crate::openrtb::{Bid, BidRequest, BidResponse};
use serde::Deserialize;
use serde_json::json;

/// Nexbid wants its zone id as the tagid and always talks gzip.
/// Heaviest multibid partner on the exchange; they routinely return
/// several bids per imp expecting downstream caps to prune
pub struct NexbidAdapter {
    endpoint: String,
    code: String,
}

#[derive(Debug, Deserialize)]
struct NexbidParams {
    zone: String,
    #[serde(default)]
    network: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct NexbidBidExt {
    #[serde(default)]
    duration: Option<u32>,
    #[serde(default)]
    dealpriority: Option<u32>,
}

fn bid_ext(bid: &Bid) -> NexbidBidExt {
    bid.ext
        .as_ref()
        .and_then(|ext| ext.get("nexbid"))
        .and_then(|node| serde_json::from_value(node.clone()).ok())
        .unwrap_or_default()
}

impl NexbidAdapter {
    pub fn new(info: &BidderInfo) -> Self {
        Self {
            endpoint: info.endpoint.clone(),
            code: info.code.clone(),
        }
    }
}

impl BidAdapter for NexbidAdapter {
    fn make_requests(
        &self,
        req: &BidRequest,
        hints: &RequestHints,
    ) -> (Vec<RequestData>, Vec<BidderError>) {
        let mut errors = Vec::new();
        let mut outbound = req.clone();
        let mut kept = Vec::with_capacity(outbound.imp.len());

        for mut imp in std::mem::take(&mut outbound.imp) {
            let params_value = match merged_imp_params(&imp, &self.code, hints) {
                Some(params) => params,
                None => {
                    errors.push(BidderError::bad_input(format!(
                        "imp '{}' missing nexbid params",
                        imp.id
                    )));
                    continue;
                }
            };

            let params: NexbidParams = match serde_json::from_value(params_value) {
                Ok(params) => params,
                Err(e) => {
                    errors.push(BidderError::bad_input(format!(
                        "imp '{}' nexbid params invalid: {}",
                        imp.id, e
                    )));
                    continue;
                }
            };

            imp.tagid = Some(params.zone.clone());
            imp.ext = Some(json!({
                "bidder": {
                    "zone": params.zone,
                    "network": params.network,
                }
            }));

            kept.push(imp);
        }

        if kept.is_empty() {
            if errors.is_empty() {
                errors.push(BidderError::bad_input("no imps eligible for nexbid"));
            }

            return (Vec::new(), errors);
        }

        let imp_ids = kept.iter().map(|i| i.id.clone()).collect();
        outbound.imp = kept;

        let body = match serde_json::to_vec(&outbound) {
            Ok(body) => body,
            Err(e) => {
                errors.push(BidderError::bad_input(format!("request encode failed: {}", e)));
                return (Vec::new(), errors);
            }
        };

        let compressed = match gzip_compress(&body) {
            Ok(compressed) => compressed,
            Err(e) => {
                errors.push(BidderError::bad_input(format!("request gzip failed: {}", e)));
                return (Vec::new(), errors);
            }
        };

        let mut callout = RequestData::post_json(&self.endpoint, compressed, imp_ids);
        callout.headers.push(Header::new("content-encoding", "gzip"));
        callout.headers.push(Header::new("accept-encoding", "gzip"));

        (vec![callout], errors)
    }

    fn make_bids(
        &self,
        req: &BidRequest,
        _data: &RequestData,
        response: &ResponseData,
    ) -> (Option<AdapterResponse>, Vec<BidderError>) {
        match classify_status(response.status, &response.body) {
            StatusOutcome::Bids => {}
            StatusOutcome::NoBids => return (None, Vec::new()),
            StatusOutcome::Failed(err) => return (None, vec![err]),
        }

        let parsed: BidResponse = match serde_json::from_slice(&response.body) {
            Ok(parsed) => parsed,
            Err(e) => {
                return (
                    None,
                    vec![BidderError::bad_server_response(format!(
                        "response json did not parse: {}",
                        e
                    ))],
                );
            }
        };

        let currency = parsed.cur.clone().unwrap_or_else(|| "USD".to_string());
        let mut errors = Vec::new();
        let mut bids = Vec::new();

        for seatbid in parsed.seatbid {
            for bid in seatbid.bid {
                let (media_type, declared) = match resolve_media_type(&bid, req) {
                    Ok(resolved) => resolved,
                    Err(e) => {
                        errors.push(e);
                        continue;
                    }
                };

                let ext = bid_ext(&bid);

                bids.push(TypedBid {
                    bid,
                    media_type,
                    media_type_declared: declared,
                    seat: seatbid.seat.clone(),
                    meta: BidMeta {
                        duration: ext.duration,
                        deal_priority: ext.dealpriority,
                        primary_category: None,
                    },
                });
            }
        }

        (Some(AdapterResponse { currency, bids }), errors)
    }
}
