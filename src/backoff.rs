use crate::config::PeerConfig;

/// Exponential retry delay, in ticks, between rounds of relay probing.
///
/// Carried by value from `inactive` into `trying` and back, so a peer that
/// keeps failing waits longer each round without any shared mutable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickBackoff {
    current: u32,
    max: u32,
}

impl TickBackoff {
    pub fn new(initial: u32, max: u32) -> Self {
        Self {
            current: initial,
            max: max.max(initial),
        }
    }

    pub fn from_config(config: &PeerConfig) -> Self {
        Self::new(config.retry_backoff_initial, config.retry_backoff_max)
    }

    /// The delay for this round, and the backoff to use for the next one.
    pub fn schedule(self) -> (u32, Self) {
        let delay = self.current;
        let next = Self {
            current: self.current.saturating_mul(2).min(self.max),
            max: self.max,
        };
        (delay, next)
    }

    pub fn current(&self) -> u32 {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    const INITIAL: u32 = 1;
    const MAX: u32 = 60;

    proptest! {
        #[test]
        fn first_schedule_returns_initial(initial in 1u32..100, extra in 0u32..1000) {
            let (delay, _) = TickBackoff::new(initial, initial + extra).schedule();
            prop_assert_eq!(delay, initial);
        }

        #[test]
        fn exponential_growth_sequence(n in 0u32..10) {
            let mut backoff = TickBackoff::new(INITIAL, MAX);
            for k in 0..=n {
                let (delay, next) = backoff.schedule();
                let expected = INITIAL
                    .saturating_mul(1u32.checked_shl(k).unwrap_or(u32::MAX))
                    .min(MAX);
                prop_assert_eq!(delay, expected, "mismatch at step {}", k);
                backoff = next;
            }
        }

        #[test]
        fn delay_never_exceeds_max(n in 1usize..40) {
            let mut backoff = TickBackoff::new(INITIAL, MAX);
            for _ in 0..n {
                let (delay, next) = backoff.schedule();
                prop_assert!(delay <= MAX, "delay {} exceeded max {}", delay, MAX);
                backoff = next;
            }
        }
    }

    #[test]
    fn cap_is_stable() {
        let mut backoff = TickBackoff::new(INITIAL, MAX);
        for _ in 0..10 {
            backoff = backoff.schedule().1;
        }
        for _ in 0..5 {
            let (delay, next) = backoff.schedule();
            assert_eq!(delay, MAX);
            backoff = next;
        }
    }

    #[test]
    fn max_below_initial_is_clamped() {
        let backoff = TickBackoff::new(10, 2);
        let (first, next) = backoff.schedule();
        let (second, _) = next.schedule();
        assert_eq!(first, 10);
        assert_eq!(second, 10);
    }
}
