use crate::spec_list;

spec_list! {
    /// Catch all technical failure while assembling the response
    TECHNICAL_ERROR = 1 => "Technical Error",
    /// The request failed basic validation
    INVALID_REQUEST = 2 => "Invalid Request",

    /// No buyers matched prefiltering
    NO_BUYERS_PREMATCHED = 500 => "No Buyers Prematched",
    /// No campaigns found and no bids received
    NO_CAMPAIGNS_FOUND = 501 => "No Campaigns Found",
    /// The publisher id is unrecognized
    UNKNOWN_SELLER = 502 => "Unknown Seller",
    SELLER_DISABLED = 503 => "Disabled Seller",
    /// Target currency unsupported by every available bidder
    UNSUPPORTED_CURRENCY = 505 => "Unsupported Currency",
}
