use crate::openrtb::{BidRequest, ext};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum::{Display, EnumString};

pub mod redact;

pub use redact::RedactionPlan;

/// GPP section ids the gate understands
pub const GPP_SECTION_TCF_EU: i32 = 2;
pub const GPP_SECTION_USP: i32 = 6;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Activity {
    FetchBids,
    SyncUser,
    TransmitUfpd,
    TransmitPreciseGeo,
    TransmitEids,
    TransmitTids,
    EnrichUfpd,
    ReportAnalytics,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Regulation {
    Gdpr,
    Ccpa,
    Coppa,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ComponentType {
    Bidder,
    Analytics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleEffect {
    Allow,
    Deny,
}

/// One activity control rule. Empty condition sets match anything,
/// so a rule with no conditions is a catch-all at its priority
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityRule {
    /// Higher evaluates first
    pub priority: u32,
    pub effect: RuleEffect,
    /// Bidder codes this rule applies to, empty = all
    pub bidders: Vec<String>,
    /// Regulations that must be in force, empty = always
    pub regulations: Vec<Regulation>,
    /// GPP section ids that must be present, empty = always
    pub gpp_sids: Vec<i32>,
    pub component: Option<ComponentType>,
}

impl Default for ActivityRule {
    fn default() -> Self {
        Self {
            priority: 0,
            effect: RuleEffect::Allow,
            bidders: Vec::new(),
            regulations: Vec::new(),
            gpp_sids: Vec::new(),
            component: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityPlan {
    /// Applied when no rule matches
    pub default: bool,
    pub rules: Vec<ActivityRule>,
}

impl Default for ActivityPlan {
    fn default() -> Self {
        Self {
            default: true,
            rules: Vec::new(),
        }
    }
}

/// The full activity control configuration. Activities without a
/// plan default to allowed
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ActivityControls {
    pub activities: HashMap<Activity, ActivityPlan>,
}

/// Regulation flags resolved once per auction from `regs`, the GPP
/// string sections, and the user consent payload
#[derive(Debug, Clone, Default)]
pub struct PrivacyContext {
    pub gdpr: bool,
    pub ccpa: bool,
    pub coppa: bool,
    pub gpp_sids: Vec<i32>,
    pub consent: Option<String>,
    pub dnt: bool,
}

impl PrivacyContext {
    pub fn from_request(req: &BidRequest) -> Self {
        let regs = req.regs.as_ref();
        let gpp_sids = regs
            .and_then(|r| r.gpp_sid.clone())
            .unwrap_or_default();

        let gdpr = regs.and_then(|r| r.gdpr) == Some(1)
            || gpp_sids.contains(&GPP_SECTION_TCF_EU);

        let ccpa = regs.and_then(|r| r.us_privacy.as_deref()).is_some()
            || gpp_sids.contains(&GPP_SECTION_USP);

        let coppa = regs.and_then(|r| r.coppa) == Some(1);

        let consent = req.user.as_ref().and_then(ext::user_consent);

        let dnt = req
            .device
            .as_ref()
            .map(|d| d.dnt == Some(1) || d.lmt == Some(1))
            .unwrap_or(false);

        Self {
            gdpr,
            ccpa,
            coppa,
            gpp_sids,
            consent,
            dnt,
        }
    }

    fn regulation_in_force(&self, regulation: Regulation) -> bool {
        match regulation {
            Regulation::Gdpr => self.gdpr,
            Regulation::Ccpa => self.ccpa,
            Regulation::Coppa => self.coppa,
        }
    }
}

impl ActivityRule {
    fn matches(&self, bidder: &str, component: ComponentType, ctx: &PrivacyContext) -> bool {
        if !self.bidders.is_empty() && !self.bidders.iter().any(|b| b == bidder) {
            return false;
        }

        if !self.regulations.is_empty()
            && !self.regulations.iter().any(|r| ctx.regulation_in_force(*r))
        {
            return false;
        }

        if !self.gpp_sids.is_empty() && !self.gpp_sids.iter().any(|s| ctx.gpp_sids.contains(s)) {
            return false;
        }

        if let Some(rule_component) = self.component {
            if rule_component != component {
                return false;
            }
        }

        true
    }
}

impl ActivityControls {
    /// First matching rule in descending priority wins; ties keep
    /// config order. No match falls back to the activity default
    pub fn evaluate(
        &self,
        activity: Activity,
        bidder: &str,
        component: ComponentType,
        ctx: &PrivacyContext,
    ) -> bool {
        let plan = match self.activities.get(&activity) {
            Some(plan) => plan,
            None => return true,
        };

        let mut rules: Vec<&ActivityRule> = plan.rules.iter().collect();
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));

        for rule in rules {
            if rule.matches(bidder, component, ctx) {
                return rule.effect == RuleEffect::Allow;
            }
        }

        plan.default
    }
}
