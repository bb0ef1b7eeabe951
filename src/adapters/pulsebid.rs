use crate::adapters::{
    AdapterResponse, BidAdapter, RequestData, RequestHints, ResponseData, StatusOutcome,
    classify_status, merged_imp_params, resolve_media_type,
};
use crate::core::errors::BidderError;
use crate::core::models::auction::{BidMeta, TypedBid};
use crate::core::models::bidder::BidderInfo;
use crate::openrtb::{Bid, BidRequest, BidResponse};
use serde::Deserialize;
use serde_json::json;

/// Pulsebid buys banner and native only. Their responses carry a
/// full IAB category list we must truncate before it leaves the
/// exchange, and deal priority rides on `bid.ext.dp`
pub struct PulsebidAdapter {
    endpoint: String,
    code: String,
}

#[derive(Debug, Deserialize)]
struct PulsebidParams {
    #[serde(rename = "pubId")]
    pub_id: String,
    #[serde(default)]
    slot: Option<String>,
}

fn deal_priority(bid: &Bid) -> Option<u32> {
    bid.ext
        .as_ref()
        .and_then(|ext| ext.get("dp"))
        .and_then(|dp| dp.as_u64())
        .map(|dp| dp as u32)
}

impl PulsebidAdapter {
    pub fn new(info: &BidderInfo) -> Self {
        Self {
            endpoint: info.endpoint.clone(),
            code: info.code.clone(),
        }
    }
}

impl BidAdapter for PulsebidAdapter {
    fn make_requests(
        &self,
        req: &BidRequest,
        hints: &RequestHints,
    ) -> (Vec<RequestData>, Vec<BidderError>) {
        let mut errors = Vec::new();
        let mut outbound = req.clone();
        let mut kept = Vec::with_capacity(outbound.imp.len());

        for mut imp in std::mem::take(&mut outbound.imp) {
            if imp.banner.is_none() && imp.native.is_none() {
                errors.push(BidderError::bad_input(format!(
                    "imp '{}' offers neither banner nor native",
                    imp.id
                )));
                continue;
            }

            // they only price display formats
            imp.video = None;
            imp.audio = None;

            let params_value = match merged_imp_params(&imp, &self.code, hints) {
                Some(params) => params,
                None => {
                    errors.push(BidderError::bad_input(format!(
                        "imp '{}' missing pulsebid params",
                        imp.id
                    )));
                    continue;
                }
            };

            let params: PulsebidParams = match serde_json::from_value(params_value) {
                Ok(params) => params,
                Err(e) => {
                    errors.push(BidderError::bad_input(format!(
                        "imp '{}' pulsebid params invalid: {}",
                        imp.id, e
                    )));
                    continue;
                }
            };

            if let Some(slot) = &params.slot {
                imp.tagid = Some(slot.clone());
            }

            imp.ext = Some(json!({ "bidder": { "pubId": params.pub_id } }));

            kept.push(imp);
        }

        if kept.is_empty() {
            if errors.is_empty() {
                errors.push(BidderError::bad_input("no imps eligible for pulsebid"));
            }

            return (Vec::new(), errors);
        }

        let imp_ids = kept.iter().map(|i| i.id.clone()).collect();
        outbound.imp = kept;

        match serde_json::to_vec(&outbound) {
            Ok(body) => (
                vec![RequestData::post_json(&self.endpoint, body, imp_ids)],
                errors,
            ),
            Err(e) => {
                errors.push(BidderError::bad_input(format!("request encode failed: {}", e)));
                (Vec::new(), errors)
            }
        }
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
            for mut bid in seatbid.bid {
                let (media_type, declared) = match resolve_media_type(&bid, req) {
                    Ok(resolved) => resolved,
                    Err(e) => {
                        errors.push(e);
                        continue;
                    }
                };

                let priority = deal_priority(&bid);

                // their category lists run long, keep the primary
                let primary_category = bid.cat.as_mut().and_then(|cat| {
                    cat.truncate(1);
                    cat.first().cloned()
                });

                bids.push(TypedBid {
                    bid,
                    media_type,
                    media_type_declared: declared,
                    seat: seatbid.seat.clone(),
                    meta: BidMeta {
                        duration: None,
                        deal_priority: priority,
                        primary_category,
                    },
                });
            }
        }

        (Some(AdapterResponse { currency, bids }), errors)
    }
}
