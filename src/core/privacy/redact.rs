use crate::core::privacy::{Activity, ActivityControls, ComponentType, PrivacyContext};
use crate::openrtb::BidRequest;
use tracing::trace;

/// What must be stripped from the payload one specific bidder sees.
/// Computed per bidder just before dispatch; the callout owns a
/// cloned request so redaction never touches the inbound body
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RedactionPlan {
    pub remove_ufpd: bool,
    pub remove_eids: bool,
    pub truncate_geo: bool,
    pub remove_tids: bool,
}

impl RedactionPlan {
    pub fn for_bidder(
        controls: &ActivityControls,
        bidder: &str,
        ctx: &PrivacyContext,
    ) -> Self {
        let denied = |activity: Activity| {
            !controls.evaluate(activity, bidder, ComponentType::Bidder, ctx)
        };

        let mut plan = Self {
            remove_ufpd: denied(Activity::TransmitUfpd),
            remove_eids: denied(Activity::TransmitEids),
            truncate_geo: denied(Activity::TransmitPreciseGeo),
            remove_tids: denied(Activity::TransmitTids),
        };

        // COPPA traffic is scrubbed no matter what the rules say
        if ctx.coppa {
            plan.remove_ufpd = true;
            plan.remove_eids = true;
            plan.truncate_geo = true;
        }

        plan
    }

    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }
}

fn truncate_ipv4(ip: &str) -> String {
    let mut octets: Vec<&str> = ip.split('.').collect();

    if octets.len() == 4 {
        octets[3] = "0";
        return octets.join(".");
    }

    ip.to_string()
}

fn truncate_ipv6(ip: &str) -> String {
    let groups: Vec<&str> = ip.split(':').take(4).collect();

    format!("{}::", groups.join(":"))
}

fn round_coord(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Applies a redaction plan to a callout's cloned request
pub fn apply(req: &mut BidRequest, plan: &RedactionPlan) {
    if plan.is_noop() {
        return;
    }

    trace!("Applying payload redaction: {:?}", plan);

    if plan.remove_ufpd {
        if let Some(user) = req.user.as_mut() {
            user.id = None;
            user.buyeruid = None;
        }

        if let Some(device) = req.device.as_mut() {
            device.ifa = None;
        }
    }

    if plan.remove_eids {
        if let Some(user) = req.user.as_mut() {
            user.eids = None;
        }
    }

    if plan.truncate_geo {
        if let Some(device) = req.device.as_mut() {
            if let Some(geo) = device.geo.as_mut() {
                geo.lat = geo.lat.map(round_coord);
                geo.lon = geo.lon.map(round_coord);
            }

            device.ip = device.ip.as_deref().map(truncate_ipv4);
            device.ipv6 = device.ipv6.as_deref().map(truncate_ipv6);
        }
    }

    if plan.remove_tids {
        if let Some(source) = req.source.as_mut() {
            source.tid = None;
        }
    }
}

/// Internal publisher ids are meaningful only to us and leak the
/// supply graph, so they are cleared from every outbound payload
/// regardless of privacy rules
pub fn clear_publisher_ids(req: &mut BidRequest) {
    if let Some(site) = req.site.as_mut() {
        if let Some(publisher) = site.publisher.as_mut() {
            publisher.id = None;
        }
    }

    if let Some(app) = req.app.as_mut() {
        if let Some(publisher) = app.publisher.as_mut() {
            publisher.id = None;
        }
    }
}
