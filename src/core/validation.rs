use crate::core::errors::BidderError;
use crate::core::models::auction::TypedBid;
use crate::openrtb::{BidRequest, Imp, MediaType};
use ahash::AHashMap;

/// Impression lookup built once per auction and shared by every
/// validation pass
pub struct ImpIndex<'a> {
    imps: AHashMap<&'a str, &'a Imp>,
}

impl<'a> ImpIndex<'a> {
    pub fn new(req: &'a BidRequest) -> Self {
        Self {
            imps: req.imp.iter().map(|imp| (imp.id.as_str(), imp)).collect(),
        }
    }

    pub fn get(&self, imp_id: &str) -> Option<&'a Imp> {
        self.imps.get(imp_id).copied()
    }
}

fn declared_sizes(imp: &Imp, media_type: MediaType) -> Vec<(u32, u32)> {
    match media_type {
        MediaType::Banner => {
            let banner = match imp.banner.as_ref() {
                Some(banner) => banner,
                None => return Vec::new(),
            };

            if let Some(formats) = banner.format.as_ref() {
                if !formats.is_empty() {
                    return formats.iter().map(|f| (f.w, f.h)).collect();
                }
            }

            match (banner.w, banner.h) {
                (Some(w), Some(h)) => vec![(w, h)],
                _ => Vec::new(),
            }
        }
        MediaType::Video => {
            let video = match imp.video.as_ref() {
                Some(video) => video,
                None => return Vec::new(),
            };

            match (video.w, video.h) {
                (Some(w), Some(h)) => vec![(w, h)],
                _ => Vec::new(),
            }
        }
        MediaType::Native | MediaType::Audio => Vec::new(),
    }
}

/// Structural validation and normalization of one typed bid.
///
/// # Behavior
/// Mutates the bid in place for normalization (category truncation,
/// size fill-in) and returns the reason when the bid must be
/// dropped. Floor enforcement happens separately after currency
/// conversion since floors live in the target currency
pub fn validate_bid(typed: &mut TypedBid, imps: &ImpIndex<'_>) -> Result<(), BidderError> {
    let bid = &mut typed.bid;

    let imp = imps.get(&bid.impid).ok_or_else(|| {
        BidderError::validation(format!("bid {} references unknown imp '{}'", bid.id, bid.impid))
    })?;

    if !bid.price.is_finite() || bid.price < 0.0 {
        return Err(BidderError::validation(format!(
            "bid {} has invalid price {}",
            bid.id, bid.price
        )));
    }

    // adapters may only commit to a type the slot offers, unless the
    // partner declared it authoritatively on the response ext
    if !typed.media_type_declared && !imp.media_types().contains(&typed.media_type) {
        return Err(BidderError::validation(format!(
            "bid {} is {} but imp '{}' does not offer it",
            bid.id, typed.media_type, imp.id
        )));
    }

    let creative_present = bid.adm.as_deref().map(|adm| !adm.is_empty()).unwrap_or(false)
        || bid.nurl.as_deref().map(|nurl| !nurl.is_empty()).unwrap_or(false);

    if !creative_present {
        return Err(BidderError::validation(format!(
            "bid {} carries neither adm nor nurl",
            bid.id
        )));
    }

    let sizes = declared_sizes(imp, typed.media_type);

    if !sizes.is_empty() {
        match (bid.w, bid.h) {
            (Some(w), Some(h)) => {
                if !sizes.contains(&(w, h)) {
                    return Err(BidderError::validation(format!(
                        "bid {} size {}x{} not offered by imp '{}'",
                        bid.id, w, h, imp.id
                    )));
                }
            }
            // unambiguous slot, adopt its size for targeting
            _ if sizes.len() == 1 => {
                bid.w = Some(sizes[0].0);
                bid.h = Some(sizes[0].1);
            }
            _ => {}
        }
    }

    if let Some(cat) = bid.cat.as_mut() {
        cat.truncate(1);
        typed.meta.primary_category = cat.first().cloned();
    }

    Ok(())
}

/// Post conversion floor gate. Zero priced bids pass through; they
/// carry deals or house fill and are priced elsewhere
pub fn meets_floor(price: f64, effective_floor: f64) -> bool {
    if price == 0.0 {
        return true;
    }

    // guard against float dust right at the boundary
    price >= effective_floor - 1e-9
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::auction::TypedBidBuilder;
    use crate::openrtb::{Banner, BidBuilder, BidRequestBuilder, Format, ImpBuilder, Video};

    fn request() -> BidRequest {
        BidRequestBuilder::default()
            .imp(vec![
                ImpBuilder::default()
                    .id("i1".to_string())
                    .banner(Some(Banner {
                        format: Some(vec![
                            Format { w: 300, h: 250 },
                            Format { w: 728, h: 90 },
                        ]),
                        ..Default::default()
                    }))
                    .build()
                    .unwrap(),
                ImpBuilder::default()
                    .id("i2".to_string())
                    .video(Some(Video {
                        w: Some(640),
                        h: Some(480),
                        ..Default::default()
                    }))
                    .build()
                    .unwrap(),
            ])
            .build()
            .unwrap()
    }

    fn banner_bid(impid: &str, price: f64) -> TypedBid {
        TypedBidBuilder::default()
            .bid(
                BidBuilder::default()
                    .id("b1".to_string())
                    .impid(impid.to_string())
                    .price(price)
                    .adm(Some("<div></div>".to_string()))
                    .w(Some(300u32))
                    .h(Some(250u32))
                    .build()
                    .unwrap(),
            )
            .media_type(crate::openrtb::MediaType::Banner)
            .build()
            .unwrap()
    }

    #[test]
    fn test_valid_bid_passes() {
        let req = request();
        let imps = ImpIndex::new(&req);
        let mut bid = banner_bid("i1", 1.5);

        assert!(validate_bid(&mut bid, &imps).is_ok());
    }

    #[test]
    fn test_unknown_impid_rejected() {
        let req = request();
        let imps = ImpIndex::new(&req);
        let mut bid = banner_bid("nope", 1.5);

        let err = validate_bid(&mut bid, &imps).unwrap_err();
        assert!(err.message.contains("unknown imp"));
    }

    #[test]
    fn test_negative_and_nan_price_rejected() {
        let req = request();
        let imps = ImpIndex::new(&req);

        let mut negative = banner_bid("i1", -0.5);
        assert!(validate_bid(&mut negative, &imps).is_err());

        let mut nan = banner_bid("i1", f64::NAN);
        assert!(validate_bid(&mut nan, &imps).is_err());
    }

    #[test]
    fn test_undeclared_media_type_rejected() {
        let req = request();
        let imps = ImpIndex::new(&req);

        // video bid into the banner-only imp
        let mut bid = banner_bid("i1", 1.0);
        bid.media_type = crate::openrtb::MediaType::Video;

        assert!(validate_bid(&mut bid, &imps).is_err());

        // unless the partner declared it authoritatively
        bid.media_type_declared = true;
        assert!(validate_bid(&mut bid, &imps).is_ok());
    }

    #[test]
    fn test_size_mismatch_rejected() {
        let req = request();
        let imps = ImpIndex::new(&req);

        let mut bid = banner_bid("i1", 1.0);
        bid.bid.w = Some(160);
        bid.bid.h = Some(600);

        assert!(validate_bid(&mut bid, &imps).is_err());
    }

    #[test]
    fn test_missing_size_filled_from_sole_declared() {
        let req = request();
        let imps = ImpIndex::new(&req);

        let mut bid = TypedBidBuilder::default()
            .bid(
                BidBuilder::default()
                    .id("v1".to_string())
                    .impid("i2".to_string())
                    .price(2.0)
                    .adm(Some("<VAST/>".to_string()))
                    .build()
                    .unwrap(),
            )
            .media_type(crate::openrtb::MediaType::Video)
            .build()
            .unwrap();

        validate_bid(&mut bid, &imps).unwrap();

        assert_eq!(bid.bid.w, Some(640));
        assert_eq!(bid.bid.h, Some(480));
    }

    #[test]
    fn test_no_creative_rejected() {
        let req = request();
        let imps = ImpIndex::new(&req);

        let mut bid = banner_bid("i1", 1.0);
        bid.bid.adm = None;
        bid.bid.nurl = None;

        assert!(validate_bid(&mut bid, &imps).is_err());

        bid.bid.nurl = Some("https://win.example/n".to_string());
        assert!(validate_bid(&mut bid, &imps).is_ok());
    }

    #[test]
    fn test_category_truncated_to_primary() {
        let req = request();
        let imps = ImpIndex::new(&req);

        let mut bid = banner_bid("i1", 1.0);
        bid.bid.cat = Some(vec!["IAB1".to_string(), "IAB2".to_string()]);

        validate_bid(&mut bid, &imps).unwrap();

        assert_eq!(bid.bid.cat.as_ref().unwrap().len(), 1);
        assert_eq!(bid.meta.primary_category.as_deref(), Some("IAB1"));
    }

    #[test]
    fn test_meets_floor_boundaries() {
        assert!(meets_floor(1.10, 1.10));
        assert!(meets_floor(1.2, 1.1));
        assert!(!meets_floor(1.05, 1.10));
        assert!(meets_floor(0.0, 1.10), "Zero priced bids bypass the floor");
    }
}
