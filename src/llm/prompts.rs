//! System prompts for the translator and presenter

use crate::tools::ProductTable;

/// Instructions for mapping a (mostly Chinese) shopping question to tool calls.
/// The product section is rendered from the live table.
pub fn translator_system_prompt(products: &ProductTable) -> String {
    let mapping: Vec<String> = products
        .iter()
        .map(|p| format!("- {} → product_id: \"{}\" (價格: ${})", p.name, p.id, p.price))
        .collect();

    format!(
        r#"你是一個購物助手，負責把使用者的中文購物問題轉換成正確的工具調用。

## 商品
{mapping}
常見別名：筆電/筆記型電腦/電腦 指 Laptop，手機/智慧型手機 指 Smartphone，平板/平板電腦 指 Tablet。

## 數字
中文數字一律轉成阿拉伯數字，例如 五 → 5、三十 → 30。

## 折扣
"打X折" 表示支付原價的 X%：打三折 → discount_percentage: 30，打八折 → 80。

## 規則
1. 單一商品價格用 get_price，例如 {{"product_id": "1"}}。
2. 多項商品總價用 calculate_total，例如 {{"items": [{{"product_id": "1", "quantity": 5}}, {{"product_id": "2", "quantity": 3}}]}}。
3. 已知金額打折用 apply_discount，例如 {{"total_price": 2000, "discount_percentage": 80}}。
4. 先算總價再打折的問題，依序調用 calculate_total 與 apply_discount；apply_discount 的 total_price 會自動帶入上一步的總價。

## 參數
- product_id 必須是字串
- quantity 必須是正整數
- discount_percentage 介於 1 到 99
- total_price 必須是正數

無法完全理解時，盡量解析能理解的部分並說明還需要哪些資訊。"#,
        mapping = mapping.join("\n")
    )
}

/// Instructions for rewriting a raw tool message into a friendly reply.
pub const PRESENTER_SYSTEM_PROMPT: &str = "You are a friendly store assistant. Rewrite the system's response as a natural, \
conversational reply. If it is an error, explain the problem kindly and suggest what to try instead. \
When a discount is involved, state both the original and the discounted price clearly. \
Keep a professional but warm tone and answer in Traditional Chinese.";

/// User turn handed to the presenter.
pub fn presenter_input(utterance: &str, message: &str) -> String {
    format!("User question: {}\nSystem response: {}", utterance, message)
}
