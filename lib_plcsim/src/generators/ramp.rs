use std::time::Duration;

use crate::generators::Generator;
use crate::store::VariableValue;

/// Linear trend. Adds `increment` each period with no upper or lower bound.
#[derive(Debug, Clone)]
pub struct Ramp {
    value: f64,
    increment: f64,
    period: Duration,
}

impl Ramp {
    pub fn new(init: f64, increment: f64, period: Duration) -> Self {
        Self {
            value: init,
            increment,
            period,
        }
    }
}

impl Generator for Ramp {
    fn kind(&self) -> &'static str {
        "ramp"
    }

    fn current(&self) -> VariableValue {
        VariableValue::Double(self.value)
    }

    fn advance(&mut self) {
        self.value += self.increment;
    }

    fn period(&self) -> Duration {
        self.period
    }
}
