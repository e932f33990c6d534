//! Delay jitter shared by both session kinds
//!
//! Fixed cadences fire like a metronome; both sessions spread their waits
//! inside a ±jitter band around the configured delay.

use std::time::Duration;

use super::constants::DELAY_JITTER_RATIO;

/// Configured delay with random jitter applied in both directions.
pub(crate) fn jittered(base_ms: u64) -> Duration {
    let band = (base_ms as f64 * DELAY_JITTER_RATIO) as i64;
    let offset = if band > 0 {
        fastrand::i64(-band..=band)
    } else {
        0
    };
    Duration::from_millis((base_ms as i64 + offset).max(0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jitter_stays_inside_the_band() {
        for _ in 0..200 {
            let delay = jittered(1_000).as_millis() as i64;
            assert!((750..=1_250).contains(&delay), "delay {delay} out of band");
        }
    }

    #[test]
    fn zero_base_never_goes_negative() {
        assert_eq!(jittered(0), Duration::from_millis(0));
    }
}
