//! Bounded random signal.
//!
//! Despite the name this does not walk from the previous value: every tick a
//! fresh value is drawn uniformly from `[min, max]` and rounded to two
//! decimals. The draw happens after the write, so what is published on tick
//! `n` was drawn on tick `n - 1` and the first tick publishes `init`.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::EngineError;
use crate::generators::Generator;
use crate::store::VariableValue;

#[derive(Debug, Clone)]
pub struct RandomWalk {
    value: f64,
    min: f64,
    max: f64,
    period: Duration,
    rng: StdRng,
}

impl RandomWalk {
    pub fn new(init: f64, min: f64, max: f64, period: Duration) -> Result<Self, EngineError> {
        Self::with_rng(init, min, max, period, StdRng::from_os_rng())
    }

    /// Same as [`RandomWalk::new`] with a reproducible sequence.
    pub fn seeded(
        init: f64,
        min: f64,
        max: f64,
        period: Duration,
        seed: u64,
    ) -> Result<Self, EngineError> {
        Self::with_rng(init, min, max, period, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        init: f64,
        min: f64,
        max: f64,
        period: Duration,
        rng: StdRng,
    ) -> Result<Self, EngineError> {
        if !(min.is_finite() && max.is_finite()) || min > max {
            return Err(EngineError::InvalidConfig(format!(
                "random range [{min}, {max}] is empty"
            )));
        }
        Ok(Self {
            value: init,
            min,
            max,
            period,
            rng,
        })
    }
}

/// Rounds to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl Generator for RandomWalk {
    fn kind(&self) -> &'static str {
        "random"
    }

    fn current(&self) -> VariableValue {
        VariableValue::Double(self.value)
    }

    fn advance(&mut self) {
        self.value = round2(self.rng.random_range(self.min..=self.max));
    }

    fn period(&self) -> Duration {
        self.period
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_stay_in_range_with_two_decimals() {
        let mut walk = RandomWalk::seeded(18.5, 15.0, 22.0, Duration::from_secs(10), 7).unwrap();
        for _ in 0..5000 {
            walk.advance();
            let v = walk.current().as_f64().unwrap();
            assert!((15.0..=22.0).contains(&v), "{v} out of range");
            assert!((v * 100.0 - (v * 100.0).round()).abs() < 1e-6, "{v} has more than 2 decimals");
        }
    }

    #[test]
    fn test_published_value_lags_draw_by_one_tick() {
        let seed = 42;
        let mut walk = RandomWalk::seeded(18.5, 15.0, 22.0, Duration::from_secs(10), seed).unwrap();
        let mut reference = StdRng::seed_from_u64(seed);

        // Tick 0 shows init, nothing drawn yet
        assert_eq!(walk.current(), VariableValue::Double(18.5));
        for _ in 0..20 {
            let drawn = round2(reference.random_range(15.0..=22.0));
            walk.advance();
            assert_eq!(walk.current(), VariableValue::Double(drawn));
        }
    }

    #[test]
    fn test_empty_range_is_rejected() {
        assert!(matches!(
            RandomWalk::new(0.0, 10.0, 5.0, Duration::from_secs(1)),
            Err(EngineError::InvalidConfig(_))
        ));
    }
}
