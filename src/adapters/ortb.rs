use crate::adapters::{
    AdapterResponse, BidAdapter, Header, RequestData, RequestHints, ResponseData, StatusOutcome,
    classify_status, gzip_compress, merged_imp_params, resolve_media_type,
};
use crate::core::errors::BidderError;
use crate::core::models::auction::{BidMeta, TypedBid};
use crate::core::models::bidder::BidderInfo;
use crate::openrtb::{BidRequest, BidResponse};
use serde_json::json;
use tracing::trace;

/// Generic OpenRTB pass-through adapter. Most partners on the
/// exchange speak plain OpenRTB with their params relocated under
/// `imp.ext.bidder`, so one implementation configured with the
/// partner's endpoint covers them all
pub struct OrtbAdapter {
    code: String,
    endpoint: String,
    gzip: bool,
    multi_imp: bool,
}

impl OrtbAdapter {
    pub fn new(info: &BidderInfo) -> Self {
        Self {
            code: info.code.clone(),
            endpoint: info.endpoint.clone(),
            gzip: info.gzip,
            multi_imp: info.multi_imp,
        }
    }

    fn build_callout(
        &self,
        outbound: &BidRequest,
        imp_ids: Vec<String>,
    ) -> Result<RequestData, BidderError> {
        let body = serde_json::to_vec(outbound)
            .map_err(|e| BidderError::bad_input(format!("request encode failed: {}", e)))?;

        let mut callout = RequestData::post_json(&self.endpoint, body, imp_ids);

        if self.gzip {
            callout.body = gzip_compress(&callout.body)
                .map_err(|e| BidderError::bad_input(format!("request gzip failed: {}", e)))?;
            callout.headers.push(Header::new("content-encoding", "gzip"));
            callout.headers.push(Header::new("accept-encoding", "gzip"));
        }

        Ok(callout)
    }
}

impl BidAdapter for OrtbAdapter {
    fn make_requests(
        &self,
        req: &BidRequest,
        hints: &RequestHints,
    ) -> (Vec<RequestData>, Vec<BidderError>) {
        let mut errors = Vec::new();
        let mut outbound = req.clone();

        // relocate our params to the shape partners expect and drop
        // every other bidder's params from the payload
        for imp in outbound.imp.iter_mut() {
            match merged_imp_params(imp, &self.code, hints) {
                Some(params) => imp.ext = Some(json!({ "bidder": params })),
                None => imp.ext = None,
            }
        }

        if outbound.imp.is_empty() {
            errors.push(BidderError::bad_input("request carried no imps"));
            return (Vec::new(), errors);
        }

        let callouts = if self.multi_imp || outbound.imp.len() == 1 {
            let imp_ids = outbound.imp.iter().map(|i| i.id.clone()).collect();

            match self.build_callout(&outbound, imp_ids) {
                Ok(callout) => vec![callout],
                Err(e) => {
                    errors.push(e);
                    Vec::new()
                }
            }
        } else {
            // partner cant handle multi imp bodies, one callout each
            let imps = std::mem::take(&mut outbound.imp);
            let mut callouts = Vec::with_capacity(imps.len());

            for imp in imps {
                let imp_id = imp.id.clone();
                outbound.imp = vec![imp];

                match self.build_callout(&outbound, vec![imp_id]) {
                    Ok(callout) => callouts.push(callout),
                    Err(e) => errors.push(e),
                }
            }

            callouts
        };

        (callouts, errors)
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
                match resolve_media_type(&bid, req) {
                    Ok((media_type, declared)) => {
                        trace!("Accepted {} bid {} on {}", media_type, bid.id, bid.impid);

                        bids.push(TypedBid {
                            bid,
                            media_type,
                            media_type_declared: declared,
                            seat: seatbid.seat.clone(),
                            meta: BidMeta::default(),
                        });
                    }
                    Err(e) => errors.push(e),
                }
            }
        }

        (Some(AdapterResponse { currency, bids }), errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::bidder::BidderInfoBuilder;
    use crate::openrtb::{
        Banner, BidBuilder, BidRequestBuilder, BidResponseBuilder, ImpBuilder, SeatBidBuilder,
    };
    use bytes::Bytes;

    fn adapter(multi_imp: bool, gzip: bool) -> OrtbAdapter {
        OrtbAdapter::new(
            &BidderInfoBuilder::default()
                .code("generic".to_string())
                .endpoint("https://rtb.partner.example/bid".to_string())
                .gzip(gzip)
                .multi_imp(multi_imp)
                .build()
                .unwrap(),
        )
    }

    fn two_imp_request() -> BidRequest {
        BidRequestBuilder::default()
            .id("req1".to_string())
            .imp(vec![
                ImpBuilder::default()
                    .id("i1".to_string())
                    .banner(Some(Banner {
                        w: Some(300),
                        h: Some(250),
                        ..Default::default()
                    }))
                    .ext(Some(serde_json::json!({ "generic": { "pid": "a" } })))
                    .build()
                    .unwrap(),
                ImpBuilder::default()
                    .id("i2".to_string())
                    .banner(Some(Banner::default()))
                    .build()
                    .unwrap(),
            ])
            .build()
            .unwrap()
    }

    #[test]
    fn test_single_callout_when_multi_imp() {
        let (callouts, errors) = adapter(true, false)
            .make_requests(&two_imp_request(), &RequestHints::default());

        assert!(errors.is_empty());
        assert_eq!(callouts.len(), 1);
        assert_eq!(callouts[0].imp_ids, vec!["i1", "i2"]);

        let body: BidRequest = serde_json::from_slice(&callouts[0].body).unwrap();
        assert_eq!(body.imp[0].ext.as_ref().unwrap()["bidder"]["pid"], "a");
        assert!(body.imp[1].ext.is_none(), "Imps without params send no ext");
    }

    #[test]
    fn test_breakout_when_single_imp_partner() {
        let (callouts, errors) = adapter(false, false)
            .make_requests(&two_imp_request(), &RequestHints::default());

        assert!(errors.is_empty());
        assert_eq!(callouts.len(), 2);

        for callout in &callouts {
            let body: BidRequest = serde_json::from_slice(&callout.body).unwrap();
            assert_eq!(body.imp.len(), 1, "Each callout carries exactly one imp");
            assert_eq!(body.id, "req1", "Request id preserved across breakout");
        }
    }

    #[test]
    fn test_gzip_sets_headers() {
        let (callouts, _) = adapter(true, true)
            .make_requests(&two_imp_request(), &RequestHints::default());

        assert!(callouts[0].has_header("content-encoding"));
        assert!(callouts[0].has_header("accept-encoding"));

        let restored =
            crate::adapters::gzip_decompress(&callouts[0].body, 1024 * 1024).unwrap();
        let body: BidRequest = serde_json::from_slice(&restored).unwrap();
        assert_eq!(body.id, "req1");
    }

    #[test]
    fn test_make_bids_round_trip_preserves_imp_identity() {
        let adapter = adapter(true, false);
        let req = two_imp_request();

        let (callouts, _) = adapter.make_requests(&req, &RequestHints::default());

        // echo style response bidding on the first imp of our own request
        let echoed: BidRequest = serde_json::from_slice(&callouts[0].body).unwrap();
        let response = BidResponseBuilder::default()
            .id(echoed.id.clone())
            .cur(Some("USD".to_string()))
            .seatbid(vec![
                SeatBidBuilder::default()
                    .seat(Some("s1".to_string()))
                    .bid(vec![
                        BidBuilder::default()
                            .id("b1".to_string())
                            .impid(echoed.imp[0].id.clone())
                            .price(1.25)
                            .adm(Some("<div/>".to_string()))
                            .w(echoed.imp[0].banner.as_ref().unwrap().w)
                            .h(echoed.imp[0].banner.as_ref().unwrap().h)
                            .build()
                            .unwrap(),
                    ])
                    .build()
                    .unwrap(),
            ])
            .build()
            .unwrap();

        let (parsed, errors) = adapter.make_bids(
            &req,
            &callouts[0],
            &ResponseData {
                status: 200,
                body: Bytes::from(serde_json::to_vec(&response).unwrap()),
            },
        );

        assert!(errors.is_empty());
        let parsed = parsed.unwrap();

        assert_eq!(parsed.bids.len(), 1);
        assert_eq!(parsed.bids[0].bid.impid, "i1");
        assert_eq!(parsed.bids[0].bid.w, Some(300));
        assert_eq!(parsed.bids[0].bid.h, Some(250));
        assert_eq!(parsed.bids[0].media_type, crate::openrtb::MediaType::Banner);
        assert_eq!(parsed.bids[0].seat.as_deref(), Some("s1"));
    }

    #[test]
    fn test_204_is_no_bids_no_error() {
        let adapter = adapter(true, false);
        let req = two_imp_request();
        let (callouts, _) = adapter.make_requests(&req, &RequestHints::default());

        let (parsed, errors) = adapter.make_bids(
            &req,
            &callouts[0],
            &ResponseData {
                status: 204,
                body: Bytes::new(),
            },
        );

        assert!(parsed.is_none());
        assert!(errors.is_empty());
    }

    #[test]
    fn test_garbage_body_is_bad_server_response() {
        let adapter = adapter(true, false);
        let req = two_imp_request();
        let (callouts, _) = adapter.make_requests(&req, &RequestHints::default());

        let (parsed, errors) = adapter.make_bids(
            &req,
            &callouts[0],
            &ResponseData {
                status: 200,
                body: Bytes::from_static(b"<html>oops</html>"),
            },
        );

        assert!(parsed.is_none());
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].kind,
            crate::core::errors::ErrorKind::BadServerResponse
        );
    }
}
