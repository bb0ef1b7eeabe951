pub mod adapters;
pub mod config;
pub mod core;
pub mod exchange;
pub mod openrtb;
pub mod pipeline;

pub use crate::config::ExchangeConfig;
pub use crate::exchange::Exchange;
pub use crate::openrtb::{BidRequest, BidResponse};
