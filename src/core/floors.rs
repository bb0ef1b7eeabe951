//! Per impression floor math.
//!
//! The effective floor a bidder sees is
//! `max(request_floor, slot_override) * publisher_bid_multiplier`,
//! computed in the request's floor currency before any callout goes
//! out, so partners always bid against the adjusted number. The raw
//! request floor is retained on the auction object for revenue
//! reporting.

/// Apply the slot override and publisher multiplier to a request
/// floor. A non positive multiplier is treated as neutral since a
/// zero multiplier would let every bid through for free
pub fn effective_floor(request_floor: f64, slot_override: Option<f64>, multiplier: f64) -> f64 {
    let base = match slot_override {
        Some(slot_floor) => request_floor.max(slot_floor),
        None => request_floor,
    };

    let multiplier = if multiplier > 0.0 { multiplier } else { 1.0 };

    base * multiplier
}

/// The platform's take on a bid priced against a marked up floor.
///
/// # Example
/// With a 1.10 multiplier a $1.10 bid clears a $1.00 request floor;
/// the take is 1.10 * (1 - 1/1.10) = $0.10
pub fn platform_take(adjusted_price: f64, multiplier: f64) -> f64 {
    if multiplier <= 1.0 {
        return 0.0;
    }

    adjusted_price * (1.0 - 1.0 / multiplier)
}

/// Deal floors may never undercut the imp floor they ride on
pub fn raise_deal_floor(deal_floor: f64, multiplier: f64, effective_imp_floor: f64) -> f64 {
    let multiplier = if multiplier > 0.0 { multiplier } else { 1.0 };

    (deal_floor * multiplier).max(effective_imp_floor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_floor_plain() {
        assert_eq!(effective_floor(1.0, None, 1.0), 1.0);
    }

    #[test]
    fn test_effective_floor_multiplier() {
        let floor = effective_floor(1.0, None, 1.10);
        assert!((floor - 1.10).abs() < 1e-12);
    }

    #[test]
    fn test_slot_override_takes_max() {
        assert_eq!(effective_floor(1.0, Some(2.0), 1.0), 2.0);
        assert_eq!(effective_floor(3.0, Some(2.0), 1.0), 3.0);
    }

    #[test]
    fn test_zero_multiplier_neutralized() {
        assert_eq!(effective_floor(1.5, None, 0.0), 1.5);
    }

    #[test]
    fn test_platform_take() {
        let take = platform_take(1.10, 1.10);
        assert!((take - 0.10).abs() < 1e-9);

        assert_eq!(platform_take(2.0, 1.0), 0.0);
        assert_eq!(platform_take(2.0, 0.9), 0.0);
    }

    #[test]
    fn test_deal_floor_never_below_imp_floor() {
        assert_eq!(raise_deal_floor(0.5, 1.0, 1.2), 1.2);
        assert_eq!(raise_deal_floor(2.0, 1.0, 1.2), 2.0);
    }
}
