use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

pub mod ext;
mod request;
mod response;

pub use request::{
    App, Audio, Banner, BidRequest, BidRequestBuilder, Deal, Device, Eid, Format, Geo, Imp,
    ImpBuilder, Native, Pmp, Publisher, Regs, Site, Source, Uid, User, Video,
};
pub use response::{
    Bid, BidBuilder, BidResponse, BidResponseBuilder, SeatBid, SeatBidBuilder,
};

/// The resolved creative media type of an impression slot or bid.
/// Wire values follow the ortb ext convention ("banner", "video", ...)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Banner,
    Video,
    Native,
    Audio,
}

impl Imp {
    /// All media types this impression declares support for via
    /// its presence sub objects
    pub fn media_types(&self) -> Vec<MediaType> {
        let mut types = Vec::with_capacity(1);

        if self.banner.is_some() {
            types.push(MediaType::Banner);
        }
        if self.video.is_some() {
            types.push(MediaType::Video);
        }
        if self.native.is_some() {
            types.push(MediaType::Native);
        }
        if self.audio.is_some() {
            types.push(MediaType::Audio);
        }

        types
    }

    /// The single declared media type, or `None` when the imp is
    /// multiformat (or declares nothing at all)
    pub fn sole_media_type(&self) -> Option<MediaType> {
        let types = self.media_types();

        match types.as_slice() {
            [only] => Some(*only),
            _ => None,
        }
    }
}
