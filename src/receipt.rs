// src/receipt.rs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{Map, Value};

/// Recognized ISO-4217 currency codes.
///
/// An unmatched or absent code becomes [`Currency::Unknown`] — never a
/// default real currency, so a misread code cannot silently misreport
/// money values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Nok,
    Sek,
    Dkk,
    Isk,
    Eur,
    Usd,
    Gbp,
    Chf,
    Jpy,
    Cny,
    Cad,
    Aud,
    Nzd,
    Pln,
    Czk,
    Huf,
    Thb,
    Sgd,
    Inr,
    Brl,
    Zar,
    #[serde(rename = "unknown")]
    Unknown,
}

impl Currency {
    /// Match a code case-insensitively against the known set.
    pub fn parse(code: &str) -> Currency {
        match code.trim().to_uppercase().as_str() {
            "NOK" => Currency::Nok,
            "SEK" => Currency::Sek,
            "DKK" => Currency::Dkk,
            "ISK" => Currency::Isk,
            "EUR" => Currency::Eur,
            "USD" | "US$" => Currency::Usd,
            "GBP" => Currency::Gbp,
            "CHF" => Currency::Chf,
            "JPY" => Currency::Jpy,
            "CNY" => Currency::Cny,
            "CAD" => Currency::Cad,
            "AUD" => Currency::Aud,
            "NZD" => Currency::Nzd,
            "PLN" => Currency::Pln,
            "CZK" => Currency::Czk,
            "HUF" => Currency::Huf,
            "THB" => Currency::Thb,
            "SGD" => Currency::Sgd,
            "INR" => Currency::Inr,
            "BRL" => Currency::Brl,
            "ZAR" => Currency::Zar,
            _ => Currency::Unknown,
        }
    }

    /// The code string as it appears in the mapping projection.
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Nok => "NOK",
            Currency::Sek => "SEK",
            Currency::Dkk => "DKK",
            Currency::Isk => "ISK",
            Currency::Eur => "EUR",
            Currency::Usd => "USD",
            Currency::Gbp => "GBP",
            Currency::Chf => "CHF",
            Currency::Jpy => "JPY",
            Currency::Cny => "CNY",
            Currency::Cad => "CAD",
            Currency::Aud => "AUD",
            Currency::Nzd => "NZD",
            Currency::Pln => "PLN",
            Currency::Czk => "CZK",
            Currency::Huf => "HUF",
            Currency::Thb => "THB",
            Currency::Sgd => "SGD",
            Currency::Inr => "INR",
            Currency::Brl => "BRL",
            Currency::Zar => "ZAR",
            Currency::Unknown => "unknown",
        }
    }
}

/// The merchant that issued the receipt.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Merchant {
    pub name: String,
    pub vat_id: Option<String>,
    pub address: Option<String>,
}

/// A single receipt line item. Order is preserved from the source text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub text: String,
    pub qty: Decimal,
    pub price: Decimal,
    pub sku: Option<String>,
}

/// The top-level extracted record.
///
/// Constructed exactly once, at the end of the pipeline, from fully
/// validated data. Read-only afterwards; there is no partially-populated
/// form.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub total_amount: Option<Decimal>,
    pub tax_amount: Option<Decimal>,
    pub currency: Currency,
    pub order_ref: Option<String>,
    pub date: Option<NaiveDate>,
    pub merchant: Merchant,
    pub line_items: Vec<LineItem>,
}

impl Receipt {
    /// Project the receipt into a plain nested JSON mapping.
    ///
    /// This is a structural projection of the already-validated record —
    /// the same field names and values the typed form carries, with absent
    /// optionals (including line-item `sku`) rendered as explicit nulls.
    /// There is no second validation path behind this.
    pub fn to_map(&self) -> Map<String, Value> {
        let Ok(Value::Object(map)) = serde_json::to_value(self) else {
            unreachable!("receipt serialization yields a JSON object")
        };
        map
    }
}
