use crate::adapters::{self, BidAdapter};
use crate::core::models::bidder::{BidderInfo, BidderStatus};
use ahash::AHashMap;
use arc_swap::ArcSwap;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct RegistryEntry {
    pub adapter: Arc<dyn BidAdapter>,
    pub info: Arc<BidderInfo>,
}

/// Process wide map of demand partners to their adapter instance
/// and static info. Read on every auction, written only on startup
/// and explicit reload, so the whole map swaps atomically and
/// in-flight auctions keep whatever snapshot they started with
pub struct AdapterRegistry {
    entries: ArcSwap<AHashMap<String, RegistryEntry>>,
}

impl AdapterRegistry {
    fn build_entries(
        bidders: &[BidderInfo],
    ) -> Result<AHashMap<String, RegistryEntry>, anyhow::Error> {
        let mut entries = AHashMap::with_capacity(bidders.len());

        for info in bidders {
            info.validate()?;

            if entries.contains_key(&info.code) {
                anyhow::bail!("Duplicate bidder code '{}' in registry config", info.code);
            }

            let adapter = adapters::build_adapter(info)?;

            entries.insert(
                info.code.clone(),
                RegistryEntry {
                    adapter,
                    info: Arc::new(info.clone()),
                },
            );
        }

        Ok(entries)
    }

    pub fn new(bidders: &[BidderInfo]) -> Result<Self, anyhow::Error> {
        let entries = Self::build_entries(bidders)?;

        info!("Adapter registry loaded with {} bidders", entries.len());

        Ok(Self {
            entries: ArcSwap::from_pointee(entries),
        })
    }

    /// Atomic whole-map swap. A failed build leaves the previous
    /// registry untouched
    pub fn reload(&self, bidders: &[BidderInfo]) -> Result<(), anyhow::Error> {
        let entries = Self::build_entries(bidders)?;

        info!("Adapter registry reloaded with {} bidders", entries.len());
        self.entries.store(Arc::new(entries));

        Ok(())
    }

    pub fn get(&self, code: &str) -> Option<RegistryEntry> {
        self.entries.load().get(code).cloned()
    }

    /// Active entries in stable code order
    pub fn active(&self) -> Vec<RegistryEntry> {
        let snapshot = self.entries.load();

        let mut active: Vec<RegistryEntry> = snapshot
            .values()
            .filter(|e| e.info.status == BidderStatus::Active)
            .cloned()
            .collect();

        active.sort_by(|a, b| a.info.code.cmp(&b.info.code));

        active
    }

    pub fn len(&self) -> usize {
        self.entries.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.load().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::bidder::BidderInfoBuilder;

    fn bidder(code: &str, status: BidderStatus) -> BidderInfo {
        BidderInfoBuilder::default()
            .code(code.to_string())
            .endpoint(format!("https://rtb.{code}.example/bid"))
            .status(status)
            .default_tmax_ms(500u64)
            .build()
            .unwrap()
    }

    #[test]
    fn test_active_filters_and_orders() {
        let registry = AdapterRegistry::new(&[
            bidder("zeta", BidderStatus::Active),
            bidder("alpha", BidderStatus::Active),
            bidder("mid", BidderStatus::Disabled),
        ])
        .unwrap();

        let active: Vec<String> = registry
            .active()
            .iter()
            .map(|e| e.info.code.clone())
            .collect();

        assert_eq!(active, vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_duplicate_code_rejected() {
        let res = AdapterRegistry::new(&[
            bidder("dup", BidderStatus::Active),
            bidder("dup", BidderStatus::Active),
        ]);

        assert!(res.is_err());
    }

    #[test]
    fn test_reload_swaps_map() {
        let registry = AdapterRegistry::new(&[bidder("one", BidderStatus::Active)]).unwrap();
        assert!(registry.get("two").is_none());

        registry
            .reload(&[bidder("two", BidderStatus::Active)])
            .unwrap();

        assert!(registry.get("one").is_none());
        assert!(registry.get("two").is_some());
    }

    #[test]
    fn test_failed_reload_keeps_previous() {
        let registry = AdapterRegistry::new(&[bidder("one", BidderStatus::Active)]).unwrap();

        let mut bad = bidder("two", BidderStatus::Active);
        bad.endpoint = "::so broken::".to_string();

        assert!(registry.reload(&[bad]).is_err());
        assert!(registry.get("one").is_some(), "Old registry should survive");
    }
}
