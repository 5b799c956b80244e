//! apply_discount tool - price after a discount expressed as a retained percentage
//!
//! `discount_percentage` is the share of the original price still paid, the
//! "打X折" convention: 80 means the customer pays 80% and saves 20%.
//!
//! discounted_price = total_price * discount_percentage / 100
//! saved_amount     = total_price - discounted_price
//!
//! Reading the percentage as the share removed is a known bug in an older
//! handler and is not supported.

use serde_json::{Map, Value, json};

use super::{APPLY_DISCOUNT, Tool, ToolContext, ToolError, missing_argument, opt_number, rejected, round_cents};
use crate::protocol::CallResult;

pub struct ApplyDiscountTool;

/// `80` rather than `80.0`, `12.5` stays as is.
fn format_percentage(pct: f64) -> String {
    if pct.fract() == 0.0 {
        format!("{:.0}", pct)
    } else {
        format!("{}", pct)
    }
}

impl Tool for ApplyDiscountTool {
    fn name(&self) -> &'static str {
        APPLY_DISCOUNT
    }

    fn description(&self, _ctx: &ToolContext) -> String {
        [
            "Apply a discount to the total price.",
            "In Chinese context, \"打X折\" means paying X% of the original price.",
            "For example:",
            "- \"打3折\" (30% discount) means paying 30% of original price, saving 70%",
            "- \"打8折\" (80% discount) means paying 80% of original price, saving 20%",
        ]
        .join("\n")
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "total_price": {
                    "type": "number",
                    "description": "The total price to apply the discount to"
                },
                "discount_percentage": {
                    "type": "number",
                    "description": "The percentage to keep (e.g., 30 for 打3折, 80 for 打8折)"
                }
            },
            "required": ["total_price", "discount_percentage"]
        })
    }

    fn call(&self, args: &Map<String, Value>, ctx: &ToolContext) -> Result<CallResult, ToolError> {
        let Some(total_price) = opt_number(args, "total_price")? else {
            return Ok(missing_argument("total_price"));
        };
        let Some(retain) = opt_number(args, "discount_percentage")? else {
            return Ok(missing_argument("discount_percentage"));
        };

        if total_price <= 0.0 {
            return Ok(rejected(
                "Total price must be greater than 0".to_string(),
                json!({ "total_price": total_price }),
            ));
        }

        let limits = &ctx.limits;
        if retain <= limits.min_retain_percentage || retain >= limits.max_retain_percentage {
            return Ok(rejected(
                format!(
                    "Discount percentage must be between {} and {} (exclusive)",
                    format_percentage(limits.min_retain_percentage),
                    format_percentage(limits.max_retain_percentage)
                ),
                json!({ "discount_percentage": retain }),
            ));
        }

        let discounted_price = round_cents(total_price * retain / 100.0);
        let saved_amount = round_cents(total_price - discounted_price);

        Ok(CallResult::structured(&json!({
            "success": true,
            "original_price": total_price,
            "discount_percentage": retain,
            "discounted_price": discounted_price,
            "saved_amount": saved_amount,
            "message": format!(
                "Original price: ${:.2}, After {}% discount: ${:.2} (You save: ${:.2})",
                total_price,
                format_percentage(retain),
                discounted_price,
                saved_amount
            ),
        })))
    }
}
