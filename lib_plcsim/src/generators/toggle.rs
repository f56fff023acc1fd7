use std::time::Duration;

use crate::generators::Generator;
use crate::store::VariableValue;

/// Boolean square wave: `init, !init, init, ...`
#[derive(Debug, Clone)]
pub struct Toggle {
    value: bool,
    period: Duration,
}

impl Toggle {
    pub fn new(init: bool, period: Duration) -> Self {
        Self { value: init, period }
    }
}

impl Generator for Toggle {
    fn kind(&self) -> &'static str {
        "toggle"
    }

    fn current(&self) -> VariableValue {
        VariableValue::Boolean(self.value)
    }

    fn advance(&mut self) {
        self.value = !self.value;
    }

    fn period(&self) -> Duration {
        self.period
    }
}
