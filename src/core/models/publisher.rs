use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per ad unit overrides resolved through the publisher -> domain ->
/// ad unit chain. The store hands the core the flattened result
#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[builder(default)]
#[serde(default)]
pub struct SlotOverride {
    /// Slot identifier, matched against `imp.tagid`
    pub slot: String,
    /// Floor override in the request currency, compared against the
    /// request floor with max() semantics
    pub floor: Option<f64>,
    /// Bidder params merged over the imp level params, keyed by code
    pub bidder_params: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Builder)]
#[builder(default)]
#[serde(default)]
pub struct Publisher {
    pub id: String,
    pub enabled: bool,
    pub name: String,
    /// Domains this publisher may send inventory for
    pub domains: Vec<String>,
    /// Scales every imp floor before bidders see it. Values above
    /// 1.0 fund the platform take, values below subsidize fill
    pub bid_multiplier: f64,
    pub slots: Vec<SlotOverride>,
}

impl Default for Publisher {
    fn default() -> Self {
        Self {
            id: String::new(),
            enabled: true,
            name: String::new(),
            domains: Vec::new(),
            bid_multiplier: 1.0,
            slots: Vec::new(),
        }
    }
}

impl Publisher {
    pub fn slot_override(&self, tagid: &str) -> Option<&SlotOverride> {
        self.slots.iter().find(|s| s.slot == tagid)
    }
}
