// End-to-end pipeline tests against a canned model response, mirroring a
// real Wolt delivery receipt.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::Value;

use receipt_scanner::llm::{
    ChatChoice, ChatMessage, ChatResponse, CompletionChoice, CompletionResponse,
};
use receipt_scanner::{
    Currency, EmbeddedTemplates, LlmClient, ModelName, ReceiptScanner, Result, ScanError,
};

const SAMPLE_JSON: &str = include_str!("samples/wolt-pizza-norwegian.json");
const SAMPLE_TEXT: &str = include_str!("samples/wolt-pizza-norwegian.txt");

/// Replays a canned body through whichever call shape the dispatcher picks.
struct CannedLlm {
    body: String,
}

#[async_trait]
impl LlmClient for CannedLlm {
    async fn chat(&self, _model: &str, _messages: Vec<ChatMessage>) -> Result<ChatResponse> {
        Ok(ChatResponse {
            choices: vec![ChatChoice {
                message: ChatMessage {
                    role: "assistant".to_string(),
                    content: self.body.clone(),
                },
            }],
        })
    }

    async fn complete(&self, _model: &str, _prompt: &str) -> Result<CompletionResponse> {
        Ok(CompletionResponse {
            choices: vec![CompletionChoice {
                text: self.body.clone(),
            }],
        })
    }
}

struct FailingLlm;

#[async_trait]
impl LlmClient for FailingLlm {
    async fn chat(&self, _model: &str, _messages: Vec<ChatMessage>) -> Result<ChatResponse> {
        Err(ScanError::UpstreamCallFailed("connection refused".into()))
    }

    async fn complete(&self, _model: &str, _prompt: &str) -> Result<CompletionResponse> {
        Err(ScanError::UpstreamCallFailed("connection refused".into()))
    }
}

fn scanner_with_body(body: &str) -> ReceiptScanner {
    ReceiptScanner::new(
        Arc::new(EmbeddedTemplates),
        Arc::new(CannedLlm {
            body: body.to_string(),
        }),
    )
}

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

#[tokio::test]
async fn test_scan_parses_receipt_into_record() {
    let scanner = scanner_with_body(SAMPLE_JSON);
    let receipt = scanner.scan(SAMPLE_TEXT, Some(ModelName::Turbo)).await.unwrap();

    assert_eq!(receipt.total_amount, Some(dec("568.00")));
    assert_eq!(receipt.tax_amount, Some(dec("74.08")));
    assert_eq!(receipt.currency, Currency::Nok);
    assert_eq!(receipt.order_ref.as_deref(), Some("61e4fb2646c424c5cbc9bc88"));
    assert_eq!(receipt.date, NaiveDate::from_ymd_opt(2023, 7, 21));
    assert_eq!(receipt.merchant.name, "Minde Pizzeria");
    assert_eq!(receipt.merchant.vat_id.as_deref(), Some("921670362MVA"));
    assert_eq!(
        receipt.merchant.address.as_deref(),
        Some("Conrad Mohrs veg 5, 5068 Bergen, NOR")
    );
}

#[tokio::test]
async fn test_line_items_match_source_order() {
    let scanner = scanner_with_body(SAMPLE_JSON);
    let receipt = scanner.scan(SAMPLE_TEXT, Some(ModelName::Turbo)).await.unwrap();

    let expected: Value = serde_json::from_str(SAMPLE_JSON).unwrap();
    let expected_items = expected["lineItems"].as_array().unwrap();

    assert_eq!(receipt.line_items.len(), expected_items.len());
    for (index, item) in receipt.line_items.iter().enumerate() {
        let want = &expected_items[index];
        assert_eq!(item.text, want["text"].as_str().unwrap(), "item {index}");
        assert_eq!(item.qty, dec(&want["qty"].to_string()), "item {index}");
        assert_eq!(item.price, dec(&want["price"].to_string()), "item {index}");
        assert_eq!(item.sku, None, "item {index}");
    }
}

#[tokio::test]
async fn test_completion_style_model_yields_same_receipt() {
    let scanner = scanner_with_body(SAMPLE_JSON);
    let via_chat = scanner.scan(SAMPLE_TEXT, Some(ModelName::Gpt4Turbo)).await.unwrap();
    let via_completion = scanner
        .scan(SAMPLE_TEXT, Some(ModelName::TurboInstruct))
        .await
        .unwrap();

    assert_eq!(via_chat, via_completion);
}

#[tokio::test]
async fn test_default_model_is_used_when_unspecified() {
    let scanner = scanner_with_body(SAMPLE_JSON).with_default_model(ModelName::Gpt4Preview1106);
    let receipt = scanner.scan(SAMPLE_TEXT, None).await.unwrap();
    assert_eq!(receipt.merchant.name, "Minde Pizzeria");
}

#[tokio::test]
async fn test_scan_as_map_projection() {
    let scanner = scanner_with_body(SAMPLE_JSON);
    let map = scanner
        .scan_as_map(SAMPLE_TEXT, Some(ModelName::TurboInstruct))
        .await
        .unwrap();

    assert_eq!(map["totalAmount"], serde_json::json!(568.0));
    assert_eq!(map["taxAmount"], serde_json::json!(74.08));
    assert_eq!(map["currency"], "NOK");
    assert_eq!(map["orderRef"], "61e4fb2646c424c5cbc9bc88");
    assert_eq!(map["date"], "2023-07-21");
    assert_eq!(map["merchant"]["name"], "Minde Pizzeria");
    assert_eq!(map["merchant"]["vatId"], "921670362MVA");
    assert_eq!(
        map["merchant"]["address"],
        "Conrad Mohrs veg 5, 5068 Bergen, NOR"
    );
    assert_eq!(map["lineItems"].as_array().unwrap().len(), 5);
    assert_eq!(map["lineItems"][0]["sku"], Value::Null);
}

#[tokio::test]
async fn test_json_wrapped_in_prose_still_scans() {
    let body = format!("Sure! Here is the extracted data:\n{SAMPLE_JSON}\nHope that helps.");
    let scanner = scanner_with_body(&body);
    let receipt = scanner.scan(SAMPLE_TEXT, Some(ModelName::Turbo)).await.unwrap();
    assert_eq!(receipt.total_amount, Some(dec("568.00")));
}

#[tokio::test]
async fn test_upstream_failure_propagates_unchanged() {
    let scanner = ReceiptScanner::new(Arc::new(EmbeddedTemplates), Arc::new(FailingLlm));
    let err = scanner.scan(SAMPLE_TEXT, Some(ModelName::Turbo)).await.unwrap_err();
    assert!(matches!(err, ScanError::UpstreamCallFailed(_)));
}

#[tokio::test]
async fn test_missing_merchant_name_never_yields_partial_receipt() {
    let scanner = scanner_with_body(r#"{"totalAmount": 568.0, "currency": "NOK"}"#);
    let err = scanner.scan(SAMPLE_TEXT, Some(ModelName::Turbo)).await.unwrap_err();
    assert!(matches!(err, ScanError::MissingRequiredField(f) if f == "merchant.name"));
}

#[tokio::test]
async fn test_unusable_model_output_is_a_distinct_failure() {
    let scanner = scanner_with_body("I'm sorry, the receipt is unreadable.");
    let err = scanner.scan(SAMPLE_TEXT, Some(ModelName::Turbo)).await.unwrap_err();
    assert!(matches!(err, ScanError::UnparsableResponse(_)));
}

#[tokio::test]
async fn test_prompt_contains_receipt_text() {
    // The rendered prompt must carry the receipt text to the model; a
    // template/context mismatch fails loudly instead.
    let prompt = receipt_scanner::prompt::render(
        &EmbeddedTemplates,
        "receipt",
        &HashMap::from([("context".to_string(), SAMPLE_TEXT.to_string())]),
    )
    .unwrap();
    assert!(prompt.contains("Minde Pizzeria"));
    assert!(prompt.contains("61e4fb2646c424c5cbc9bc88"));
}
