//! Human-like pacing for browser interactions.
//!
//! Short, bounded, randomized pauses before interactions and between typed
//! characters. These are plain sleeps, not cancellation points; the only
//! deadline that interrupts a wait lives in the completion engine.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::config::PacingConfig;

/// Paces interactions with randomized delays.
pub struct Pacer {
    config: PacingConfig,
    last_action: Mutex<Option<Instant>>,
}

impl Pacer {
    /// Create a pacer from configuration.
    pub fn new(config: &PacingConfig) -> Self {
        Self {
            config: config.clone(),
            last_action: Mutex::new(None),
        }
    }

    /// Pause briefly before the next interaction.
    pub async fn before_action(&self) {
        let delay = self.action_delay();
        if delay > Duration::ZERO {
            tokio::time::sleep(delay).await;
        }
        *self.last_action.lock() = Some(Instant::now());
    }

    /// Delay to apply after typing one character.
    pub fn type_delay(&self) -> Duration {
        if !self.config.humanize {
            return Duration::ZERO;
        }
        let (min, max) = (self.config.type_min_ms, self.config.type_max_ms.max(self.config.type_min_ms + 1));
        Duration::from_millis(fastrand::u64(min..max))
    }

    fn action_delay(&self) -> Duration {
        if !self.config.humanize {
            return Duration::ZERO;
        }
        let min = self.config.min_action_delay.as_millis() as u64;
        let max = self.config.max_action_delay.as_millis() as u64;
        let base = Duration::from_millis(if max > min { fastrand::u64(min..=max) } else { min });

        // Time already spent since the previous action counts toward the
        // pause.
        match *self.last_action.lock() {
            Some(last) => {
                let next_allowed = last + base;
                let now = Instant::now();
                if next_allowed > now {
                    next_allowed - now
                } else {
                    Duration::ZERO
                }
            }
            None => base,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn humanized() -> PacingConfig {
        PacingConfig {
            min_action_delay: Duration::from_millis(100),
            max_action_delay: Duration::from_millis(300),
            type_min_ms: 25,
            type_max_ms: 75,
            humanize: true,
        }
    }

    #[test]
    fn machine_speed_means_zero_delays() {
        let pacer = Pacer::new(&PacingConfig {
            humanize: false,
            ..humanized()
        });
        assert_eq!(pacer.type_delay(), Duration::ZERO);
        assert_eq!(pacer.action_delay(), Duration::ZERO);
    }

    #[test]
    fn delays_stay_within_configured_bounds() {
        let pacer = Pacer::new(&humanized());
        for _ in 0..100 {
            let d = pacer.type_delay().as_millis() as u64;
            assert!((25..75).contains(&d), "type delay {d}ms out of bounds");
        }
        let action = pacer.action_delay().as_millis() as u64;
        assert!(action <= 300, "action delay {action}ms out of bounds");
    }
}
