pub mod multibid;
pub mod multiformat;
pub mod pricebucket;

pub use multibid::{MultibidLimits, RankedBid};
pub use multiformat::MultiformatStrategy;
