use crate::core::models::auction::AuctionObject;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// A destination for completed auction snapshots. Sinks run after
/// the response is written; they may fail freely without touching
/// the auction outcome, and anything doing real I/O must buffer
/// internally rather than stall the caller
#[async_trait]
pub trait AnalyticsModule: Send + Sync {
    fn name(&self) -> &'static str;

    async fn log_auction_object(&self, auction: Arc<AuctionObject>) -> Result<(), anyhow::Error>;

    async fn shutdown(&self) -> Result<(), anyhow::Error>;
}

/// Broadcasts each auction object to an ordered list of sinks.
/// A failing sink is logged and skipped, the rest still receive
/// the object
pub struct MultiModule {
    modules: Vec<Arc<dyn AnalyticsModule>>,
}

impl MultiModule {
    pub fn new(modules: Vec<Arc<dyn AnalyticsModule>>) -> Self {
        Self { modules }
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

#[async_trait]
impl AnalyticsModule for MultiModule {
    fn name(&self) -> &'static str {
        "multi"
    }

    async fn log_auction_object(&self, auction: Arc<AuctionObject>) -> Result<(), anyhow::Error> {
        for module in &self.modules {
            if let Err(e) = module.log_auction_object(Arc::clone(&auction)).await {
                warn!("Analytics sink '{}' rejected auction object: {:#}", module.name(), e);
            }
        }

        Ok(())
    }

    async fn shutdown(&self) -> Result<(), anyhow::Error> {
        for module in &self.modules {
            if let Err(e) = module.shutdown().await {
                warn!("Analytics sink '{}' failed to shut down: {:#}", module.name(), e);
            }
        }

        Ok(())
    }
}

/// Writes a structured one liner per auction into the log stream.
/// Useful on its own in dev and as a liveness signal in prod
pub struct TracingSink;

#[async_trait]
impl AnalyticsModule for TracingSink {
    fn name(&self) -> &'static str {
        "tracing"
    }

    async fn log_auction_object(&self, auction: Arc<AuctionObject>) -> Result<(), anyhow::Error> {
        info!(
            auction_id = %auction.auction_id,
            publisher = %auction.publisher_id,
            bidders = auction.bidders_selected.len(),
            excluded = auction.bidders_excluded.len(),
            winners = auction.winners.len(),
            cur = %auction.target_currency,
            "auction complete"
        );

        Ok(())
    }

    async fn shutdown(&self) -> Result<(), anyhow::Error> {
        Ok(())
    }
}

/// Decouples a slow delegate from the auction path with a bounded
/// channel. When the channel is full the object is dropped with a
/// warning; analytics never applies backpressure to bidding
pub struct BufferedSink {
    tx: mpsc::Sender<Arc<AuctionObject>>,
    worker: parking_lot::Mutex<Option<tokio::task::JoinHandle<()>>>,
    delegate_name: &'static str,
}

impl BufferedSink {
    pub fn spawn(delegate: Arc<dyn AnalyticsModule>, buffer_size: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<Arc<AuctionObject>>(buffer_size);
        let delegate_name = delegate.name();

        let worker = tokio::spawn(async move {
            while let Some(auction) = rx.recv().await {
                if let Err(e) = delegate.log_auction_object(auction).await {
                    warn!("Buffered sink '{}' delegate error: {:#}", delegate.name(), e);
                }
            }

            if let Err(e) = delegate.shutdown().await {
                warn!("Buffered sink '{}' shutdown error: {:#}", delegate.name(), e);
            }

            debug!("Buffered sink '{}' drained and stopped", delegate.name());
        });

        Self {
            tx,
            worker: parking_lot::Mutex::new(Some(worker)),
            delegate_name,
        }
    }
}

#[async_trait]
impl AnalyticsModule for BufferedSink {
    fn name(&self) -> &'static str {
        self.delegate_name
    }

    async fn log_auction_object(&self, auction: Arc<AuctionObject>) -> Result<(), anyhow::Error> {
        if let Err(e) = self.tx.try_send(auction) {
            warn!("Analytics buffer for '{}' full, dropping auction: {}", self.delegate_name, e);
        }

        Ok(())
    }

    async fn shutdown(&self) -> Result<(), anyhow::Error> {
        if let Some(worker) = self.worker.lock().take() {
            worker.abort();
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSink {
        seen: AtomicUsize,
    }

    #[async_trait]
    impl AnalyticsModule for CountingSink {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn log_auction_object(
            &self,
            _auction: Arc<AuctionObject>,
        ) -> Result<(), anyhow::Error> {
            self.seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn shutdown(&self) -> Result<(), anyhow::Error> {
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl AnalyticsModule for FailingSink {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn log_auction_object(
            &self,
            _auction: Arc<AuctionObject>,
        ) -> Result<(), anyhow::Error> {
            anyhow::bail!("sink offline")
        }

        async fn shutdown(&self) -> Result<(), anyhow::Error> {
            anyhow::bail!("still offline")
        }
    }

    #[tokio::test]
    async fn test_failing_sink_isolated() {
        let counting = Arc::new(CountingSink {
            seen: AtomicUsize::new(0),
        });

        let multi = MultiModule::new(vec![
            Arc::new(FailingSink),
            Arc::clone(&counting) as Arc<dyn AnalyticsModule>,
        ]);

        multi
            .log_auction_object(Arc::new(AuctionObject::default()))
            .await
            .unwrap();

        assert_eq!(
            counting.seen.load(Ordering::SeqCst),
            1,
            "Sink after the failing one should still be called"
        );
    }

    #[tokio::test]
    async fn test_buffered_sink_delivers() {
        let counting = Arc::new(CountingSink {
            seen: AtomicUsize::new(0),
        });

        let buffered = BufferedSink::spawn(Arc::clone(&counting) as Arc<dyn AnalyticsModule>, 16);

        for _ in 0..3 {
            buffered
                .log_auction_object(Arc::new(AuctionObject::default()))
                .await
                .unwrap();
        }

        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        assert_eq!(counting.seen.load(Ordering::SeqCst), 3);
    }
}
