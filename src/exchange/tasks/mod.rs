mod validate;
pub use validate::ValidateRequestTask;

mod auction_id;
pub use auction_id::AuctionIdTask;

mod config_resolve;
pub use config_resolve::ConfigResolveTask;

mod floors;
pub use floors::FloorsTask;

mod bidder_select;
pub use bidder_select::BidderSelectTask;

mod dispatch;
pub use dispatch::DispatchTask;

mod validate_bids;
pub use validate_bids::ValidateBidsTask;

mod convert;
pub use convert::ConvertCurrencyTask;

mod select;
pub use select::SelectTask;

mod respond;
pub use respond::RespondTask;

mod analytics;
pub use analytics::AnalyticsTask;
