//! Carrying a running total from one invocation into the next

use serde_json::{Map, Value};

use super::Invocation;
use super::decode::{StructuredResult, TOTAL_PRICE};
use crate::tools::APPLY_DISCOUNT;

/// Per-turn memory of the last decoded result. Never outlives a turn.
#[derive(Debug, Default)]
pub struct ChainState {
    last: Option<StructuredResult>,
}

impl ChainState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<&StructuredResult> {
        self.last.as_ref()
    }

    pub fn record(&mut self, result: StructuredResult) {
        self.last = Some(result);
    }

    pub fn clear(&mut self) {
        self.last = None;
    }

    /// Overwrite `total_price` on an `apply_discount` invocation with the
    /// previous result's numeric total. Any value the translator supplied is
    /// replaced. Returns the injected total.
    pub fn propagate(&self, invocation: &mut Invocation) -> Option<f64> {
        if invocation.tool_name != APPLY_DISCOUNT {
            return None;
        }
        let total = self.last.as_ref()?.total_price()?;

        if invocation.arguments.is_null() {
            invocation.arguments = Value::Object(Map::new());
        }
        let args = invocation.arguments.as_object_mut()?;
        if let Some(previous) = args.get(TOTAL_PRICE) {
            log::debug!("Replacing total_price {} with chained {}", previous, total);
        }
        args.insert(TOTAL_PRICE.to_string(), Value::from(total));
        Some(total)
    }
}
