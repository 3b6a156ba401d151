//! # Jitter for reconnect delays.
//!
//! A campaign holds one connection per target, so a status server restart
//! drops every connection at once. [`Jitter`] spreads the resulting reconnects.
//!
//! - [`Jitter::None`]  exact delay (default)
//! - [`Jitter::Full`]  random delay in `[0, delay]`
//! - [`Jitter::Equal`] `delay/2 + random[0, delay/2]`

use std::time::Duration;

use rand::Rng;

/// Randomisation applied to a reconnect delay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Jitter {
    /// Use the delay unchanged.
    #[default]
    None,
    /// Uniform in `[0, delay]`.
    Full,
    /// Uniform in `[delay/2, delay]`.
    Equal,
}

impl Jitter {
    /// Applies the jitter to `delay`.
    pub fn apply(self, delay: Duration) -> Duration {
        let ms = delay.as_millis().min(u128::from(u64::MAX)) as u64;
        if ms == 0 {
            return delay;
        }
        match self {
            Jitter::None => delay,
            Jitter::Full => Duration::from_millis(rand::rng().random_range(0..=ms)),
            Jitter::Equal => {
                let half = ms / 2;
                Duration::from_millis(half + rand::rng().random_range(0..=ms - half))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_is_identity() {
        let d = Duration::from_millis(3000);
        assert_eq!(Jitter::None.apply(d), d);
    }

    #[test]
    fn full_stays_below_delay() {
        for _ in 0..200 {
            assert!(Jitter::Full.apply(Duration::from_millis(3000)) <= Duration::from_millis(3000));
        }
    }

    #[test]
    fn equal_stays_in_upper_half() {
        for _ in 0..200 {
            let d = Jitter::Equal.apply(Duration::from_millis(3001));
            assert!(d >= Duration::from_millis(1500));
            assert!(d <= Duration::from_millis(3001));
        }
    }

    #[test]
    fn zero_delay_is_untouched() {
        assert_eq!(Jitter::Full.apply(Duration::ZERO), Duration::ZERO);
        assert_eq!(Jitter::Equal.apply(Duration::ZERO), Duration::ZERO);
    }
}
