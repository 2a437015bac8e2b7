//! # Jitter for cooldown delays.
//!
//! When the hub restarts, every slot of every worker process loses its
//! connection at the same instant. Without jitter they all come back at the
//! same instant too. [`JitterPolicy`] spreads those reconnects out.
//!
//! - [`JitterPolicy::None`]: exact delay
//! - [`JitterPolicy::Full`]: random in `[0, delay]`
//! - [`JitterPolicy::Equal`]: `delay/2 + random[0, delay/2]`
//! - [`JitterPolicy::Decorrelated`]: random in `[floor, delay * 3]`, capped

use std::str::FromStr;
use std::time::Duration;

use rand::Rng;

/// Randomization applied on top of a computed cooldown.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JitterPolicy {
    /// Use the delay as computed.
    #[default]
    None,
    /// Uniform in `[0, delay]`.
    Full,
    /// Half fixed, half random: `delay/2 + [0, delay/2]`.
    Equal,
    /// Uniform in `[floor, min(delay * 3, ceiling)]`.
    Decorrelated,
}

impl JitterPolicy {
    /// Applies the jitter to `delay`.
    ///
    /// `floor` and `ceiling` only matter for [`JitterPolicy::Decorrelated`];
    /// the other variants never exceed `delay`.
    pub fn apply(&self, delay: Duration, floor: Duration, ceiling: Duration) -> Duration {
        let ms = delay.as_millis().min(u128::from(u64::MAX)) as u64;
        match self {
            JitterPolicy::None => delay,
            JitterPolicy::Full => {
                if ms == 0 {
                    return Duration::ZERO;
                }
                Duration::from_millis(rand::rng().random_range(0..=ms))
            }
            JitterPolicy::Equal => {
                let half = ms / 2;
                if half == 0 {
                    return delay;
                }
                Duration::from_millis(half + rand::rng().random_range(0..=half))
            }
            JitterPolicy::Decorrelated => {
                let lo = floor.as_millis() as u64;
                let hi = ms
                    .saturating_mul(3)
                    .min(ceiling.as_millis() as u64)
                    .max(lo);
                if lo >= hi {
                    return Duration::from_millis(lo);
                }
                Duration::from_millis(rand::rng().random_range(lo..=hi))
            }
        }
    }
}

impl FromStr for JitterPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "full" => Ok(Self::Full),
            "equal" => Ok(Self::Equal),
            "decorrelated" => Ok(Self::Decorrelated),
            other => Err(format!(
                "unknown jitter {other:?}; expected none, full, equal or decorrelated"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEC: Duration = Duration::from_secs(1);

    #[test]
    fn test_none_is_identity() {
        assert_eq!(JitterPolicy::None.apply(SEC, SEC, SEC), SEC);
    }

    #[test]
    fn test_full_within_bounds() {
        for _ in 0..100 {
            assert!(JitterPolicy::Full.apply(SEC, Duration::ZERO, SEC) <= SEC);
        }
        assert_eq!(
            JitterPolicy::Full.apply(Duration::ZERO, Duration::ZERO, SEC),
            Duration::ZERO
        );
    }

    #[test]
    fn test_equal_keeps_half() {
        for _ in 0..100 {
            let d = JitterPolicy::Equal.apply(SEC, Duration::ZERO, SEC);
            assert!(d >= SEC / 2 && d <= SEC, "{d:?}");
        }
    }

    #[test]
    fn test_decorrelated_respects_floor_and_ceiling() {
        let floor = Duration::from_millis(200);
        let ceiling = Duration::from_secs(2);
        for _ in 0..100 {
            let d = JitterPolicy::Decorrelated.apply(SEC, floor, ceiling);
            assert!(d >= floor && d <= ceiling, "{d:?}");
        }
    }

    #[test]
    fn test_parse() {
        assert_eq!("Equal".parse::<JitterPolicy>(), Ok(JitterPolicy::Equal));
        assert!("sometimes".parse::<JitterPolicy>().is_err());
    }
}
