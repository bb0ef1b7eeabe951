use crate::core::spec::dimensions::Channel;
use crate::openrtb::MediaType;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use url::Url;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, EnumString, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BidderStatus {
    #[default]
    Active,
    /// Temporarily out of rotation, config retained
    Paused,
    Disabled,
}

/// Whether a bidder represents demand a publisher brought directly
/// or demand the platform sourced. Platform demand is masked behind
/// a shared targeting identifier downstream
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, EnumString, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DemandType {
    #[default]
    Publisher,
    Platform,
}

#[derive(Debug, Clone, Serialize, Deserialize, Builder)]
#[serde(default)]
pub struct MediaTypeCaps {
    pub banner: bool,
    pub video: bool,
    pub native: bool,
    pub audio: bool,
}

impl Default for MediaTypeCaps {
    fn default() -> Self {
        Self {
            banner: true,
            video: true,
            native: true,
            audio: true,
        }
    }
}

impl MediaTypeCaps {
    pub fn supports(&self, media_type: MediaType) -> bool {
        match media_type {
            MediaType::Banner => self.banner,
            MediaType::Video => self.video,
            MediaType::Native => self.native,
            MediaType::Audio => self.audio,
        }
    }
}

/// Declared media type support per distribution channel. A channel
/// left unset means the bidder does not buy that channel at all
#[derive(Debug, Clone, Serialize, Deserialize, Builder)]
#[builder(default)]
#[serde(default)]
pub struct Capabilities {
    pub site: Option<MediaTypeCaps>,
    pub app: Option<MediaTypeCaps>,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            site: Some(MediaTypeCaps::default()),
            app: Some(MediaTypeCaps::default()),
        }
    }
}

impl Capabilities {
    /// True when the bidder can buy at least one of the given media
    /// types on the given channel
    pub fn supports_any(&self, channel: Channel, media_types: &[MediaType]) -> bool {
        let caps = match channel {
            Channel::Site => self.site.as_ref(),
            Channel::App => self.app.as_ref(),
            Channel::Unknown => None,
        };

        match caps {
            Some(caps) => media_types.iter().any(|mt| caps.supports(*mt)),
            None => false,
        }
    }
}

/// Static demand partner configuration. Loaded at startup and on
/// explicit reload, never mutated during an auction
#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[builder(default)]
#[serde(default)]
pub struct BidderInfo {
    /// Lowercase identifier, unique across the registry
    pub code: String,
    pub name: String,
    pub status: BidderStatus,
    /// Which adapter implementation handles this partner's wire
    /// shape. Defaults to the generic openrtb adapter
    pub adapter: String,
    pub endpoint: String,
    #[serde(default)]
    pub maintainer: Option<String>,
    /// IAB Global Vendor List id, required for TCF evaluation
    #[serde(default)]
    pub gvl_vendor_id: Option<u32>,
    pub capabilities: Capabilities,
    pub demand_type: DemandType,
    /// Per bidder callout budget, further clamped by the request tmax
    pub default_tmax_ms: u64,
    pub gzip: bool,
    pub multi_imp: bool,
    /// Optional json schema the partner publishes for its imp params
    #[serde(default)]
    pub param_schema: Option<serde_json::Value>,
}

impl BidderInfo {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.code.is_empty() {
            anyhow::bail!("Bidder code must not be empty");
        }

        if self.code != self.code.to_lowercase() {
            anyhow::bail!("Bidder code '{}' must be lowercase", self.code);
        }

        Url::parse(&self.endpoint)
            .map_err(|e| anyhow::anyhow!("Bidder '{}' endpoint invalid: {}", self.code, e))?;

        if self.default_tmax_ms == 0 {
            anyhow::bail!("Bidder '{}' default_tmax_ms must be positive", self.code);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bidder(code: &str, endpoint: &str) -> BidderInfo {
        BidderInfoBuilder::default()
            .code(code.to_string())
            .endpoint(endpoint.to_string())
            .default_tmax_ms(500u64)
            .build()
            .unwrap()
    }

    #[test]
    fn test_validate_accepts_wellformed() {
        assert!(
            bidder("nexbid", "https://rtb.nexbid.example/openrtb2")
                .validate()
                .is_ok()
        );
    }

    #[test]
    fn test_validate_rejects_uppercase_code() {
        assert!(
            bidder("NexBid", "https://rtb.nexbid.example/openrtb2")
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_validate_rejects_bad_endpoint() {
        assert!(bidder("nexbid", "not a url").validate().is_err());
    }

    #[test]
    fn test_capabilities_channel_gating() {
        let caps = Capabilities {
            site: Some(MediaTypeCaps {
                banner: true,
                video: false,
                native: false,
                audio: false,
            }),
            app: None,
        };

        assert!(caps.supports_any(Channel::Site, &[MediaType::Banner, MediaType::Video]));
        assert!(!caps.supports_any(Channel::Site, &[MediaType::Video]));
        assert!(
            !caps.supports_any(Channel::App, &[MediaType::Banner]),
            "Unset channel should support nothing"
        );
    }
}
