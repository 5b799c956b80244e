//! calculate_total tool - sum price × quantity over a list of items

use serde_json::{Map, Value, json};

use super::{CALCULATE_TOTAL, Tool, ToolContext, ToolError, missing_argument, opt_array, rejected, round_cents};
use crate::protocol::CallResult;

pub struct CalculateTotalTool;

/// One validated line of the order.
struct Line<'a> {
    product: &'a super::Product,
    quantity: u64,
}

impl CalculateTotalTool {
    /// Validate a single item; the error message becomes the rejection text.
    fn check_item<'a>(item: &Value, ctx: &'a ToolContext) -> Result<Line<'a>, String> {
        let item = item.as_object().ok_or("Invalid item format")?;

        let product_id = item
            .get("product_id")
            .and_then(Value::as_str)
            .ok_or("Invalid product ID format")?;

        let product = ctx
            .products
            .find(product_id)
            .ok_or_else(|| format!("Product with ID {} not found", product_id))?;

        let quantity = item
            .get("quantity")
            .and_then(Value::as_f64)
            .ok_or("Invalid quantity format")?;

        if quantity.fract() != 0.0 {
            return Err("Quantity must be an integer".to_string());
        }
        if quantity <= 0.0 {
            return Err("Quantity must be greater than 0".to_string());
        }
        if quantity > ctx.limits.max_quantity as f64 {
            return Err(format!("Quantity cannot exceed {}", ctx.limits.max_quantity));
        }

        Ok(Line {
            product,
            quantity: quantity as u64,
        })
    }
}

impl Tool for CalculateTotalTool {
    fn name(&self) -> &'static str {
        CALCULATE_TOTAL
    }

    fn description(&self, ctx: &ToolContext) -> String {
        format!(
            "Calculate the total price for multiple items.\nProduct mapping:\n{}",
            ctx.products.mapping_lines()
        )
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "items": {
                    "type": "array",
                    "description": "Array of items with product_id and quantity",
                    "items": {
                        "type": "object",
                        "properties": {
                            "product_id": {
                                "type": "string",
                                "description": "The ID of the product"
                            },
                            "quantity": {
                                "type": "integer",
                                "description": "The quantity of the product"
                            }
                        },
                        "required": ["product_id", "quantity"]
                    }
                }
            },
            "required": ["items"]
        })
    }

    fn call(&self, args: &Map<String, Value>, ctx: &ToolContext) -> Result<CallResult, ToolError> {
        let Some(items) = opt_array(args, "items")? else {
            return Ok(missing_argument("items"));
        };
        if items.is_empty() {
            return Ok(rejected("items must not be empty".to_string(), json!({})));
        }

        // All items are validated before anything is summed
        let mut lines = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            match Self::check_item(item, ctx) {
                Ok(line) => lines.push(line),
                Err(message) => return Ok(rejected(message, json!({ "item_index": index }))),
            }
        }

        let mut total = 0.0;
        let details: Vec<Value> = lines
            .iter()
            .map(|line| {
                let item_total = line.product.price * line.quantity as f64;
                total += item_total;
                json!({
                    "product_id": line.product.id,
                    "product_name": line.product.name,
                    "price": line.product.price,
                    "quantity": line.quantity,
                    "item_total": round_cents(item_total),
                })
            })
            .collect();
        let total = round_cents(total);

        Ok(CallResult::structured(&json!({
            "success": true,
            "total_price": total,
            "item_count": details.len(),
            "items": details,
            "message": format!("Total price is ${:.2}", total),
        })))
    }
}
