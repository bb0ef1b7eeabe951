use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Consulted before every bidder callout, fed after. State is
/// process lifetime and shared across auctions; each bidder's
/// state mutates under its own map entry, never under any
/// auction wide lock
pub trait CircuitBreaker: Send + Sync {
    fn allow(&self, bidder: &str) -> bool;

    fn record_result(&self, bidder: &str, success: bool);
}

#[derive(Debug, Default)]
struct BreakerState {
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    probing: bool,
}

/// Consecutive failure counter with a cooldown and a single half
/// open probe. Open circuits reject callouts until the cooldown
/// elapses, then let exactly one request through; its outcome
/// closes or reopens the circuit
pub struct CountingBreaker {
    states: DashMap<String, BreakerState>,
    failure_threshold: u32,
    open_cooldown: Duration,
}

impl CountingBreaker {
    pub fn new(failure_threshold: u32, open_cooldown: Duration) -> Self {
        Self {
            states: DashMap::new(),
            failure_threshold,
            open_cooldown,
        }
    }
}

impl CircuitBreaker for CountingBreaker {
    fn allow(&self, bidder: &str) -> bool {
        let mut state = self.states.entry(bidder.to_string()).or_default();

        let opened_at = match state.opened_at {
            Some(opened_at) => opened_at,
            None => return true,
        };

        if state.probing {
            // one probe in flight already, hold the rest
            return false;
        }

        if opened_at.elapsed() >= self.open_cooldown {
            debug!("Circuit for {} entering half open probe", bidder);
            state.probing = true;

            return true;
        }

        false
    }

    fn record_result(&self, bidder: &str, success: bool) {
        let mut state = self.states.entry(bidder.to_string()).or_default();

        if success {
            if state.opened_at.is_some() {
                debug!("Circuit for {} closed after successful probe", bidder);
            }

            *state = BreakerState::default();
            return;
        }

        state.consecutive_failures += 1;
        state.probing = false;

        if state.consecutive_failures >= self.failure_threshold {
            if state.opened_at.is_none() {
                warn!(
                    "Circuit for {} opened after {} consecutive failures",
                    bidder, state.consecutive_failures
                );
            }

            // failed probe restarts the cooldown, too
            state.opened_at = Some(Instant::now());
        }
    }
}
