//! Price bucketing for the `hb_pb` targeting key.
//!
//! Granularity widens with price: nickel steps to $5, dimes to $10,
//! half dollars to $20, whole dollars above that. Values floor to
//! their bucket so the ad server never over-represents a bid.

fn increment_for(price: f64) -> f64 {
    if price <= 5.0 {
        0.05
    } else if price <= 10.0 {
        0.10
    } else if price <= 20.0 {
        0.50
    } else {
        1.00
    }
}

pub fn bucket_price(price: f64) -> String {
    if !price.is_finite() || price <= 0.0 {
        return "0.00".to_string();
    }

    let increment = increment_for(price);

    // nudge before flooring so 2.00/0.05 style exact quotients dont
    // fall a bucket short on binary float division
    let bucketed = ((price / increment) + 1e-9).floor() * increment;

    format!("{:.2}", bucketed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nickel_band() {
        assert_eq!(bucket_price(2.00), "2.00");
        assert_eq!(bucket_price(1.23), "1.20");
        assert_eq!(bucket_price(4.99), "4.95");
        assert_eq!(bucket_price(5.00), "5.00");
    }

    #[test]
    fn test_dime_band() {
        assert_eq!(bucket_price(5.01), "5.00");
        assert_eq!(bucket_price(7.77), "7.70");
        assert_eq!(bucket_price(10.00), "10.00");
    }

    #[test]
    fn test_half_dollar_band() {
        assert_eq!(bucket_price(10.49), "10.00");
        assert_eq!(bucket_price(15.75), "15.50");
        assert_eq!(bucket_price(20.00), "20.00");
    }

    #[test]
    fn test_dollar_band() {
        assert_eq!(bucket_price(20.99), "20.00");
        assert_eq!(bucket_price(33.33), "33.00");
    }

    #[test]
    fn test_degenerate_prices() {
        assert_eq!(bucket_price(0.0), "0.00");
        assert_eq!(bucket_price(-1.0), "0.00");
        assert_eq!(bucket_price(f64::NAN), "0.00");
    }
}
