//! get_price tool - look up one product's price

use serde_json::{Map, Value, json};

use super::{GET_PRICE, Tool, ToolContext, ToolError, missing_argument, opt_str, rejected};
use crate::protocol::CallResult;

pub struct GetPriceTool;

impl Tool for GetPriceTool {
    fn name(&self) -> &'static str {
        GET_PRICE
    }

    fn description(&self, ctx: &ToolContext) -> String {
        format!(
            "Get the price of a product by its ID.\nProduct mapping:\n{}",
            ctx.products.mapping_lines()
        )
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "product_id": {
                    "type": "string",
                    "description": "The ID of the product to get the price of"
                }
            },
            "required": ["product_id"]
        })
    }

    fn call(&self, args: &Map<String, Value>, ctx: &ToolContext) -> Result<CallResult, ToolError> {
        let Some(product_id) = opt_str(args, "product_id")? else {
            return Ok(missing_argument("product_id"));
        };

        let Some(product) = ctx.products.find(product_id) else {
            return Ok(rejected(
                format!("Product not found: {}", product_id),
                json!({ "product_id": product_id }),
            ));
        };

        Ok(CallResult::structured(&json!({
            "success": true,
            "product_id": product.id,
            "product_name": product.name,
            "price": product.price,
            "message": format!("The price of {} is ${:.2}", product.name, product.price),
        })))
    }
}
