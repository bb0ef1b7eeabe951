use crate::core::errors::ErrorKind;
use crate::exchange::AuctionError;
use crate::exchange::context::AuctionContext;
use crate::pipeline::BlockingTask;
use ahash::AHashSet;
use anyhow::Error;

/// Basic request validation. Anything failing here is a caller
/// error surfaced as a 4xx, the only stage with that power
pub struct ValidateRequestTask;

fn bad_request(message: impl Into<String>) -> Error {
    Error::new(AuctionError::new(ErrorKind::BadInput, message))
}

impl BlockingTask<AuctionContext, Error> for ValidateRequestTask {
    fn run(&self, context: &AuctionContext) -> Result<(), Error> {
        let req = context.req.read();

        if req.id.is_empty() {
            return Err(bad_request("request missing id"));
        }

        if req.imp.is_empty() {
            return Err(bad_request("request carried no imps"));
        }

        if req.site.is_some() && req.app.is_some() {
            return Err(bad_request("site and app are mutually exclusive"));
        }

        let mut seen = AHashSet::with_capacity(req.imp.len());

        for imp in &req.imp {
            if imp.id.is_empty() {
                return Err(bad_request("imp with empty id"));
            }

            if !seen.insert(imp.id.as_str()) {
                return Err(bad_request(format!("duplicate imp id '{}'", imp.id)));
            }

            if imp.media_types().is_empty() {
                return Err(bad_request(format!(
                    "imp '{}' declares no media type object",
                    imp.id
                )));
            }

            if !imp.bidfloor.is_finite() || imp.bidfloor < 0.0 {
                return Err(bad_request(format!(
                    "imp '{}' has invalid bidfloor {}",
                    imp.id, imp.bidfloor
                )));
            }
        }

        Ok(())
    }
}
