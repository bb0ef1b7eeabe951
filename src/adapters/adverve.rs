use crate::adapters::{
    AdapterResponse, BidAdapter, RequestData, RequestHints, ResponseData, StatusOutcome,
    classify_status, merged_imp_params, resolve_media_type,
};
use crate::core::errors::BidderError;
use crate::core::models::auction::{BidMeta, TypedBid};
use crate::core::models::bidder::BidderInfo;
use crate::openrtb::{BidRequest, BidResponse};
use serde::Deserialize;
use serde_json::json;

/// Adverve's bidder only accepts one imp per request and keys
/// everything off a placement id. They also insist on receiving no
/// site identity beyond the page url, so site/app ids are cleared
/// here on top of the exchange wide publisher id scrub
pub struct AdverveAdapter {
    endpoint: String,
    code: String,
}

#[derive(Debug, Deserialize)]
struct AdverveParams {
    placement: String,
}

impl AdverveAdapter {
    pub fn new(info: &BidderInfo) -> Self {
        Self {
            endpoint: info.endpoint.clone(),
            code: info.code.clone(),
        }
    }
}

fn clear_identity(req: &mut BidRequest) {
    if let Some(site) = req.site.as_mut() {
        site.id = None;
        site.name = None;
        site.publisher = None;
    }

    if let Some(app) = req.app.as_mut() {
        app.id = None;
        app.publisher = None;
    }
}

impl BidAdapter for AdverveAdapter {
    fn make_requests(
        &self,
        req: &BidRequest,
        hints: &RequestHints,
    ) -> (Vec<RequestData>, Vec<BidderError>) {
        let mut errors = Vec::new();
        let mut callouts = Vec::with_capacity(req.imp.len());

        let mut template = req.clone();
        clear_identity(&mut template);
        template.imp = Vec::new();

        for imp in &req.imp {
            let params_value = match merged_imp_params(imp, &self.code, hints) {
                Some(params) => params,
                None => {
                    errors.push(BidderError::bad_input(format!(
                        "imp '{}' missing adverve params",
                        imp.id
                    )));
                    continue;
                }
            };

            let params: AdverveParams = match serde_json::from_value(params_value) {
                Ok(params) => params,
                Err(e) => {
                    errors.push(BidderError::bad_input(format!(
                        "imp '{}' adverve params invalid: {}",
                        imp.id, e
                    )));
                    continue;
                }
            };

            let mut outbound_imp = imp.clone();
            outbound_imp.tagid = Some(params.placement.clone());
            outbound_imp.ext = Some(json!({ "placement": params.placement }));

            let mut outbound = template.clone();
            outbound.imp = vec![outbound_imp];

            match serde_json::to_vec(&outbound) {
                Ok(body) => {
                    callouts.push(RequestData::post_json(&self.endpoint, body, vec![imp.id.clone()]));
                }
                Err(e) => {
                    errors.push(BidderError::bad_input(format!(
                        "imp '{}' encode failed: {}",
                        imp.id, e
                    )));
                }
            }
        }

        if callouts.is_empty() && errors.is_empty() {
            errors.push(BidderError::bad_input("no imps eligible for adverve"));
        }

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
                    Ok((media_type, declared)) => bids.push(TypedBid {
                        bid,
                        media_type,
                        media_type_declared: declared,
                        seat: seatbid.seat.clone(),
                        meta: BidMeta::default(),
                    }),
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
    use crate::openrtb::{Banner, BidRequestBuilder, ImpBuilder, Publisher, Site};
    use serde_json::json;

    fn adapter() -> AdverveAdapter {
        AdverveAdapter::new(
            &BidderInfoBuilder::default()
                .code("adverve".to_string())
                .endpoint("https://bid.adverve.example/rtb".to_string())
                .build()
                .unwrap(),
        )
    }

    fn request() -> BidRequest {
        BidRequestBuilder::default()
            .id("req1".to_string())
            .site(Some(Site {
                id: Some("site-9".to_string()),
                name: Some("News".to_string()),
                page: Some("https://news.example/a".to_string()),
                publisher: Some(Publisher {
                    id: Some("pub-1".to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            }))
            .imp(vec![
                ImpBuilder::default()
                    .id("i1".to_string())
                    .banner(Some(Banner::default()))
                    .ext(Some(json!({ "adverve": { "placement": "p-100" } })))
                    .build()
                    .unwrap(),
                ImpBuilder::default()
                    .id("i2".to_string())
                    .banner(Some(Banner::default()))
                    .ext(Some(json!({ "adverve": { "placement": "p-200" } })))
                    .build()
                    .unwrap(),
            ])
            .build()
            .unwrap()
    }

    #[test]
    fn test_one_callout_per_imp() {
        let (callouts, errors) = adapter().make_requests(&request(), &RequestHints::default());

        assert!(errors.is_empty());
        assert_eq!(callouts.len(), 2);

        let first: BidRequest = serde_json::from_slice(&callouts[0].body).unwrap();
        assert_eq!(first.imp.len(), 1);
        assert_eq!(first.imp[0].tagid.as_deref(), Some("p-100"));

        let second: BidRequest = serde_json::from_slice(&callouts[1].body).unwrap();
        assert_eq!(second.imp[0].tagid.as_deref(), Some("p-200"));
    }

    #[test]
    fn test_site_identity_cleared() {
        let (callouts, _) = adapter().make_requests(&request(), &RequestHints::default());

        let outbound: BidRequest = serde_json::from_slice(&callouts[0].body).unwrap();
        let site = outbound.site.as_ref().unwrap();

        assert!(site.id.is_none());
        assert!(site.name.is_none());
        assert!(site.publisher.is_none());
        assert_eq!(
            site.page.as_deref(),
            Some("https://news.example/a"),
            "Page url stays, they bid on context"
        );
    }

    #[test]
    fn test_missing_placement_drops_imp() {
        let mut req = request();
        req.imp[1].ext = None;

        let (callouts, errors) = adapter().make_requests(&req, &RequestHints::default());

        assert_eq!(callouts.len(), 1);
        assert_eq!(errors.len(), 1);
    }
}
