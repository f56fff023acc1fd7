//! Bounded triangular wave.
//!
//! One full sweep from `min` to `max` takes `cycle_time`, so the per-step
//! interval is `cycle_time / ((max - min) / step)`. The direction is checked
//! with `>=` / `<=` after each write; a value that does not land exactly on a
//! bound overshoots it by less than one step and is not clamped.

use std::time::Duration;

use crate::error::EngineError;
use crate::generators::Generator;
use crate::store::VariableValue;

#[derive(Debug, Clone)]
pub struct Triangle {
    value: f64,
    step: f64,
    min: f64,
    max: f64,
    ascending: bool,
    interval: Duration,
}

impl Triangle {
    pub fn new(
        init: f64,
        step: f64,
        min: f64,
        max: f64,
        cycle_time: Duration,
    ) -> Result<Self, EngineError> {
        if !(step > 0.0 && step.is_finite()) {
            return Err(EngineError::InvalidConfig(format!(
                "triangle step must be positive, got {step}"
            )));
        }
        if !(max > min) {
            return Err(EngineError::InvalidConfig(format!(
                "triangle range [{min}, {max}] is empty"
            )));
        }
        if cycle_time.is_zero() {
            return Err(EngineError::InvalidConfig(
                "triangle cycle time must be non-zero".to_string(),
            ));
        }

        let steps_per_sweep = (max - min) / step;
        let interval = Duration::try_from_secs_f64(cycle_time.as_secs_f64() / steps_per_sweep)
            .ok()
            .filter(|interval| !interval.is_zero())
            .ok_or_else(|| {
                EngineError::InvalidConfig(format!(
                    "triangle step {step} over [{min}, {max}] gives no usable interval for a {cycle_time:?} cycle"
                ))
            })?;
        Ok(Self {
            value: init,
            step,
            min,
            max,
            ascending: true,
            interval,
        })
    }
}

impl Generator for Triangle {
    fn kind(&self) -> &'static str {
        "triangle"
    }

    fn current(&self) -> VariableValue {
        VariableValue::Double(self.value)
    }

    fn advance(&mut self) {
        if self.value >= self.max {
            self.ascending = false;
        }
        if self.value <= self.min {
            self.ascending = true;
        }
        self.value = if self.ascending {
            self.value + self.step
        } else {
            self.value - self.step
        };
    }

    fn period(&self) -> Duration {
        self.interval
    }
}
