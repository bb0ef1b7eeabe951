use crate::openrtb::BidRequest;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, EnumString, Display,
)]
#[strum(ascii_case_insensitive)]
pub enum Channel {
    Site,
    App,
    #[default]
    Unknown,
}

impl Channel {
    pub fn from_request(req: &BidRequest) -> Self {
        if req.site.is_some() {
            Channel::Site
        } else if req.app.is_some() {
            Channel::App
        } else {
            Channel::Unknown
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, EnumString, Display,
)]
#[strum(ascii_case_insensitive)]
pub enum StatsDeviceType {
    Mobile,
    Desktop,
    Connected, // CTV + Connected Device + Set-Top Box
    Dooh,
    Tablet,
    #[default]
    Unknown,
}

impl StatsDeviceType {
    pub fn from_openrtb(device_type: i32) -> Self {
        use crate::core::spec::devicetype;
        match device_type as u32 {
            devicetype::PHONE => StatsDeviceType::Mobile,
            devicetype::MOBILE_TABLET_GENERAL => StatsDeviceType::Mobile,
            devicetype::TABLET => StatsDeviceType::Tablet,
            devicetype::PERSONAL_COMPUTER => StatsDeviceType::Desktop,
            devicetype::CONNECTED_TV | devicetype::CONNECTED_DEVICE | devicetype::SET_TOP_BOX => {
                StatsDeviceType::Connected
            }
            devicetype::DOOH => StatsDeviceType::Dooh,
            _ => StatsDeviceType::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openrtb::{BidRequestBuilder, Site};

    #[test]
    fn test_channel_from_request() {
        let site_req = BidRequestBuilder::default()
            .site(Some(Site::default()))
            .build()
            .unwrap();

        assert_eq!(Channel::from_request(&site_req), Channel::Site);
        assert_eq!(
            Channel::from_request(&BidRequest::default()),
            Channel::Unknown
        );
    }

    #[test]
    fn test_device_type_buckets() {
        assert_eq!(StatsDeviceType::from_openrtb(4), StatsDeviceType::Mobile);
        assert_eq!(StatsDeviceType::from_openrtb(2), StatsDeviceType::Desktop);
        assert_eq!(StatsDeviceType::from_openrtb(7), StatsDeviceType::Connected);
        assert_eq!(StatsDeviceType::from_openrtb(42), StatsDeviceType::Unknown);
    }
}
