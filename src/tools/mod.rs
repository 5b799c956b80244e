//! Tool System - product tools, argument helpers and the catalog
//!
//! Handlers are pure functions over their arguments and the product table.
//! Business-rule violations come back as error-shaped [`CallResult`]s; only a
//! wrong value kind for a typed argument is a [`ToolError`].

mod apply_discount;
mod calculate_total;
mod catalog;
mod get_price;
mod help;
mod products;

pub use apply_discount::ApplyDiscountTool;
pub use calculate_total::CalculateTotalTool;
pub use catalog::ToolCatalog;
pub use get_price::GetPriceTool;
pub use help::HelpTool;
pub use products::{Product, ProductTable};

use serde_json::{Map, Value, json};

use crate::config::CatalogConfig;
use crate::protocol::CallResult;

/// Name of the tool whose `total_price` argument is fed from the previous step.
pub const APPLY_DISCOUNT: &str = "apply_discount";
pub const CALCULATE_TOTAL: &str = "calculate_total";
pub const GET_PRICE: &str = "get_price";
pub const HELP: &str = "help";

/// A tool the server can advertise and invoke
pub trait Tool: Send + Sync {
    /// Tool name (matches `params.name` of `tools/call`)
    fn name(&self) -> &'static str;

    /// Human-readable description; may mention catalog contents
    fn description(&self, ctx: &ToolContext) -> String;

    /// JSON Schema for input parameters (advertised only, not enforced)
    fn input_schema(&self) -> Value;

    /// Execute the tool
    fn call(&self, args: &Map<String, Value>, ctx: &ToolContext) -> Result<CallResult, ToolError>;
}

/// Limits enforced by the handlers themselves.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogLimits {
    pub max_quantity: u64,
    pub min_retain_percentage: f64,
    pub max_retain_percentage: f64,
}

impl Default for CatalogLimits {
    fn default() -> Self {
        Self {
            max_quantity: 1000,
            min_retain_percentage: 0.0,
            max_retain_percentage: 100.0,
        }
    }
}

/// Read-only state every handler sees.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub products: ProductTable,
    pub limits: CatalogLimits,
}

impl ToolContext {
    pub fn new(products: ProductTable, limits: CatalogLimits) -> Self {
        Self { products, limits }
    }

    pub fn from_config(config: &CatalogConfig) -> Self {
        Self {
            products: ProductTable::new(config.products.clone()),
            limits: CatalogLimits {
                max_quantity: config.max_quantity,
                min_retain_percentage: config.min_retain_percentage,
                max_retain_percentage: config.max_retain_percentage,
            },
        }
    }
}

impl Default for ToolContext {
    fn default() -> Self {
        Self::new(ProductTable::default(), CatalogLimits::default())
    }
}

/// Malformed input: a typed argument carried the wrong kind of value.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ToolError {
    #[error("{field} must be {expected}")]
    WrongKind { field: String, expected: &'static str },

    #[error("arguments must be an object")]
    NotAnObject,
}

/// Fetch a string argument. `Ok(None)` when absent or null.
pub(crate) fn opt_str<'a>(args: &'a Map<String, Value>, field: &str) -> Result<Option<&'a str>, ToolError> {
    match args.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(wrong_kind(field, "a string")),
    }
}

/// Fetch a numeric argument. `Ok(None)` when absent or null.
pub(crate) fn opt_number(args: &Map<String, Value>, field: &str) -> Result<Option<f64>, ToolError> {
    match args.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v.as_f64().map(Some).ok_or_else(|| wrong_kind(field, "a number")),
    }
}

/// Fetch an array argument. `Ok(None)` when absent or null.
pub(crate) fn opt_array<'a>(args: &'a Map<String, Value>, field: &str) -> Result<Option<&'a Vec<Value>>, ToolError> {
    match args.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => Ok(Some(items)),
        Some(_) => Err(wrong_kind(field, "an array")),
    }
}

fn wrong_kind(field: &str, expected: &'static str) -> ToolError {
    ToolError::WrongKind {
        field: field.to_string(),
        expected,
    }
}

/// Error-shaped result naming a missing argument.
pub(crate) fn missing_argument(field: &str) -> CallResult {
    rejected(format!("Missing required argument: {}", field), json!({ "field": field }))
}

/// Error-shaped result: `{success:false, error, message, ..extra}`.
pub(crate) fn rejected(message: String, extra: Value) -> CallResult {
    let mut record = json!({
        "success": false,
        "error": message,
        "message": message,
    });
    if let (Some(record), Value::Object(extra)) = (record.as_object_mut(), extra) {
        record.extend(extra);
    }
    CallResult::structured_error(&record)
}

/// Round a money amount to cents.
pub(crate) fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_opt_str() {
        let a = args(json!({"id": "1", "n": 5, "nil": null}));
        assert_eq!(opt_str(&a, "id").unwrap(), Some("1"));
        assert_eq!(opt_str(&a, "absent").unwrap(), None);
        assert_eq!(opt_str(&a, "nil").unwrap(), None);
        assert_eq!(
            opt_str(&a, "n").unwrap_err().to_string(),
            "n must be a string"
        );
    }

    #[test]
    fn test_opt_number_accepts_integers_and_floats() {
        let a = args(json!({"i": 2000, "f": 12.5, "s": "80"}));
        assert_eq!(opt_number(&a, "i").unwrap(), Some(2000.0));
        assert_eq!(opt_number(&a, "f").unwrap(), Some(12.5));
        assert!(opt_number(&a, "s").is_err());
    }

    #[test]
    fn test_opt_array() {
        let a = args(json!({"items": [], "bad": {}}));
        assert_eq!(opt_array(&a, "items").unwrap().map(Vec::len), Some(0));
        assert!(opt_array(&a, "bad").is_err());
    }

    #[test]
    fn test_missing_argument_names_field() {
        let result = missing_argument("product_id");
        assert!(result.is_error);
        let record: Value = serde_json::from_str(result.first_text().unwrap()).unwrap();
        assert_eq!(record["success"], false);
        assert_eq!(record["field"], "product_id");
        assert_eq!(record["message"], "Missing required argument: product_id");
    }

    #[test]
    fn test_round_cents() {
        assert_eq!(round_cents(1599.999), 1600.0);
        assert_eq!(round_cents(0.125), 0.13);
        assert_eq!(round_cents(6000.0), 6000.0);
    }

    #[test]
    fn test_context_from_config() {
        let mut config = CatalogConfig::default();
        config.max_quantity = 10;
        let ctx = ToolContext::from_config(&config);
        assert_eq!(ctx.limits.max_quantity, 10);
        assert_eq!(ctx.products.len(), 3);
    }
}
