use crate::core::models::bidder::{BidderInfo, BidderStatus};
use crate::core::models::publisher::Publisher;
use crate::core::spec::dimensions::StatsDeviceType;
use ahash::AHashMap;
use std::collections::HashMap;

/// Read side of the publisher/slot/bidder configuration the
/// exchange consumes. Implementations are expected to answer in
/// single digit milliseconds; the auction resolves everything it
/// needs exactly once at start
pub trait ConfigStore: Send + Sync {
    fn get_bidder(&self, code: &str) -> Option<BidderInfo>;

    fn list_active_bidders(&self) -> Vec<BidderInfo>;

    fn get_publisher_by_domain(&self, domain: &str) -> Option<Publisher>;

    /// Flattened publisher -> domain -> ad unit bidder param chain
    /// for one slot, keyed by bidder code
    fn get_slot_bidder_configs(
        &self,
        publisher_id: &str,
        slot: &str,
        device_type: StatsDeviceType,
    ) -> HashMap<String, serde_json::Value>;
}

/// In memory store over config file contents. Domain lookups are
/// memoized since the same handful of domains dominates traffic
pub struct StaticConfigStore {
    bidders: AHashMap<String, BidderInfo>,
    publishers: Vec<Publisher>,
    domain_cache: moka::sync::Cache<String, Option<Publisher>>,
}

impl StaticConfigStore {
    pub fn new(bidders: Vec<BidderInfo>, publishers: Vec<Publisher>, cache_sz: u64) -> Self {
        let bidders = bidders
            .into_iter()
            .map(|b| (b.code.clone(), b))
            .collect();

        Self {
            bidders,
            publishers,
            domain_cache: moka::sync::Cache::new(cache_sz),
        }
    }

    fn lookup_domain(&self, domain: &str) -> Option<Publisher> {
        self.publishers
            .iter()
            .find(|p| p.domains.iter().any(|d| d == domain))
            .cloned()
    }
}

impl ConfigStore for StaticConfigStore {
    fn get_bidder(&self, code: &str) -> Option<BidderInfo> {
        self.bidders.get(code).cloned()
    }

    fn list_active_bidders(&self) -> Vec<BidderInfo> {
        let mut active: Vec<BidderInfo> = self
            .bidders
            .values()
            .filter(|b| b.status == BidderStatus::Active)
            .cloned()
            .collect();

        // stable order regardless of map iteration
        active.sort_by(|a, b| a.code.cmp(&b.code));

        active
    }

    fn get_publisher_by_domain(&self, domain: &str) -> Option<Publisher> {
        self.domain_cache
            .get_with(domain.to_string(), || self.lookup_domain(domain))
    }

    fn get_slot_bidder_configs(
        &self,
        publisher_id: &str,
        slot: &str,
        _device_type: StatsDeviceType,
    ) -> HashMap<String, serde_json::Value> {
        let publisher = match self.publishers.iter().find(|p| p.id == publisher_id) {
            Some(publisher) => publisher,
            None => return HashMap::new(),
        };

        match publisher.slot_override(slot) {
            Some(slot_override) => slot_override.bidder_params.clone(),
            None => HashMap::new(),
        }
    }
}
