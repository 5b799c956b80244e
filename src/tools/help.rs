//! help tool - plain-text listing of the other tools

use serde_json::{Map, Value, json};

use super::{HELP, Tool, ToolContext, ToolError};
use crate::protocol::CallResult;

pub struct HelpTool;

impl Tool for HelpTool {
    fn name(&self) -> &'static str {
        HELP
    }

    fn description(&self, _ctx: &ToolContext) -> String {
        "Show all supported operations and examples".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {}
        })
    }

    fn call(&self, _args: &Map<String, Value>, ctx: &ToolContext) -> Result<CallResult, ToolError> {
        let products: Vec<String> = ctx
            .products
            .iter()
            .map(|p| format!("- \"{}\": {} (${})", p.id, p.name, p.price))
            .collect();

        let text = format!(
            r#"Available tools:

1. get_price - Get the price of a product by ID
   Parameters: product_id (string)
   Example: {{"product_id": "1"}}

2. calculate_total - Calculate total price for multiple items
   Parameters: items (array of {{product_id, quantity}}), quantity 1..{max}
   Example: {{"items": [{{"product_id": "1", "quantity": 2}}]}}

3. apply_discount - Apply discount to a total price
   Parameters: total_price (number), discount_percentage (number)
   Example: {{"total_price": 1000, "discount_percentage": 30}}

Product IDs:
{products}

Note: discount_percentage represents the percentage to keep (e.g., 30 for 30% of original price)"#,
            max = ctx.limits.max_quantity,
            products = products.join("\n"),
        );

        Ok(CallResult::text(text))
    }
}
