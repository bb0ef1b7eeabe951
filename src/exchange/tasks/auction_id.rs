use crate::exchange::context::AuctionContext;
use crate::pipeline::BlockingTask;
use anyhow::Error;
use tracing::Span;

/// Assigns the exchange side auction id. The request id belongs to
/// the caller and goes back on the response; everything internal
/// (analytics, logs, notices) keys on ours
pub struct AuctionIdTask;

impl BlockingTask<AuctionContext, Error> for AuctionIdTask {
    fn run(&self, context: &AuctionContext) -> Result<(), Error> {
        let auction_id = uuid::Uuid::new_v4().to_string();

        let span = Span::current();
        if !span.is_disabled() {
            span.record("auction_id", auction_id.as_str());
        }

        context
            .auction_id
            .set(auction_id)
            .map_err(|_| anyhow::anyhow!("Auction id already assigned"))?;

        Ok(())
    }
}
