// src/normalize.rs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::{Map, Value};

use crate::error::{Result, ScanError};
use crate::receipt::{Currency, LineItem, Merchant, Receipt};

/// Date formats accepted for the `date` field, tried in order. ISO first,
/// then day-first forms (European receipts), then month-first and long
/// forms.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d.%m.%Y",
    "%d-%m-%Y",
    "%d/%m/%Y",
    "%m/%d/%Y",
    "%B %d, %Y",
    "%d %B %Y",
];

/// Convert the intermediate mapping into a validated [`Receipt`].
///
/// Model output is inconsistent in type, so every field goes through
/// coercion: numbers may arrive as strings with currency noise, dates in
/// several formats, currency codes in any case. A present-but-malformed
/// value always fails; absent optional values stay absent. A failure on
/// any line item fails the whole normalization — partial financial data
/// is worse than an explicit error.
pub fn normalize(data: &Map<String, Value>) -> Result<Receipt> {
    let total_amount = opt_amount(data, "totalAmount")?;
    let tax_amount = opt_amount(data, "taxAmount")?;

    let currency = match data.get("currency") {
        None | Some(Value::Null) => Currency::Unknown,
        Some(Value::String(code)) => Currency::parse(code),
        Some(other) => return Err(ScanError::invalid_field("currency", other)),
    };

    let order_ref = opt_ref_string(data.get("orderRef"), "orderRef")?;

    let date = match data.get("date") {
        None | Some(Value::Null) => None,
        Some(Value::String(raw)) => Some(coerce_date(raw)?),
        Some(other) => return Err(ScanError::invalid_field("date", other)),
    };

    let merchant = coerce_merchant(data.get("merchant"))?;

    let line_items = match data.get("lineItems") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| coerce_line_item(i, item))
            .collect::<Result<Vec<_>>>()?,
        Some(other) => return Err(ScanError::invalid_field("lineItems", other)),
    };

    Ok(Receipt {
        total_amount,
        tax_amount,
        currency,
        order_ref,
        date,
        merchant,
        line_items,
    })
}

fn coerce_merchant(value: Option<&Value>) -> Result<Merchant> {
    let fields = match value {
        Some(Value::Object(m)) => m,
        None | Some(Value::Null) => {
            return Err(ScanError::MissingRequiredField("merchant.name".to_string()));
        }
        Some(other) => return Err(ScanError::invalid_field("merchant", other)),
    };

    let name = match fields.get("name") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        None | Some(Value::Null) | Some(Value::String(_)) => {
            return Err(ScanError::MissingRequiredField("merchant.name".to_string()));
        }
        Some(other) => return Err(ScanError::invalid_field("merchant.name", other)),
    };

    Ok(Merchant {
        name,
        vat_id: opt_ref_string(fields.get("vatId"), "merchant.vatId")?,
        address: opt_ref_string(fields.get("address"), "merchant.address")?,
    })
}

fn coerce_line_item(index: usize, value: &Value) -> Result<LineItem> {
    let Value::Object(fields) = value else {
        return Err(ScanError::invalid_field(format!("lineItems[{index}]"), value));
    };

    let text = match fields.get("text") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        None | Some(Value::Null) | Some(Value::String(_)) => {
            return Err(ScanError::MissingRequiredField(format!(
                "lineItems[{index}].text"
            )));
        }
        Some(other) => {
            return Err(ScanError::invalid_field(
                format!("lineItems[{index}].text"),
                other,
            ));
        }
    };

    let qty = match fields.get("qty") {
        None | Some(Value::Null) => {
            return Err(ScanError::MissingRequiredField(format!(
                "lineItems[{index}].qty"
            )));
        }
        Some(v) => coerce_amount(&format!("lineItems[{index}].qty"), v)?,
    };

    let price = match fields.get("price") {
        None | Some(Value::Null) => {
            return Err(ScanError::MissingRequiredField(format!(
                "lineItems[{index}].price"
            )));
        }
        Some(v) => coerce_amount(&format!("lineItems[{index}].price"), v)?,
    };

    Ok(LineItem {
        text,
        qty,
        price,
        sku: opt_ref_string(fields.get("sku"), &format!("lineItems[{index}].sku"))?,
    })
}

/// Optional non-negative money amount. Absent stays absent; a present
/// value that cannot be coerced, or a negative one, fails.
fn opt_amount(data: &Map<String, Value>, field: &str) -> Result<Option<Decimal>> {
    let amount = match data.get(field) {
        None | Some(Value::Null) => return Ok(None),
        Some(v) => coerce_amount(field, v)?,
    };
    if amount < Decimal::ZERO {
        return Err(ScanError::invalid_field(field, amount));
    }
    Ok(Some(amount))
}

/// Coerce a native JSON number or a numeric string to a [`Decimal`].
///
/// Numeric strings tolerate currency symbols and codes, spaces, thousand
/// separators, and comma decimals: `"568.00"`, `568.0` and `"NOK 568,00"`
/// all coerce to the same value.
fn coerce_amount(field: &str, value: &Value) -> Result<Decimal> {
    match value {
        // serde_json prints the shortest round-trip form, which Decimal
        // parses exactly; no binary-float expansion sneaks in.
        Value::Number(n) => parse_decimal(&n.to_string())
            .ok_or_else(|| ScanError::invalid_field(field, n)),
        Value::String(raw) => clean_amount(raw)
            .and_then(|cleaned| parse_decimal(&cleaned))
            .ok_or_else(|| ScanError::invalid_field(field, raw)),
        other => Err(ScanError::invalid_field(field, other)),
    }
}

fn parse_decimal(s: &str) -> Option<Decimal> {
    s.parse::<Decimal>()
        .ok()
        .or_else(|| Decimal::from_scientific(s).ok())
}

/// Reduce a noisy amount string to something `Decimal` can parse.
fn clean_amount(raw: &str) -> Option<String> {
    let stripped: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-'))
        .collect();
    if stripped.chars().all(|c| !c.is_ascii_digit()) {
        return None;
    }

    let cleaned = match (stripped.rfind('.'), stripped.rfind(',')) {
        // Both present: the rightmost one is the decimal separator.
        (Some(dot), Some(comma)) if dot > comma => stripped.replace(',', ""),
        (Some(_), Some(_)) => stripped.replace('.', "").replace(',', "."),
        // Comma only: two trailing digits read as decimals ("568,00"),
        // anything else as thousand separators.
        (None, Some(_)) => {
            let parts: Vec<&str> = stripped.split(',').collect();
            if parts.len() == 2 && parts[1].len() == 2 {
                stripped.replace(',', ".")
            } else {
                stripped.replace(',', "")
            }
        }
        // Several dots can only be thousand separators ("1.234.567").
        (Some(_), None) if stripped.matches('.').count() > 1 => stripped.replace('.', ""),
        _ => stripped,
    };
    Some(cleaned)
}

/// Parse a date from ISO-8601 or a small set of common human formats.
fn coerce_date(raw: &str) -> Result<NaiveDate> {
    let trimmed = raw.trim();
    // Tolerate a trailing time component on otherwise-ISO input.
    let candidate = match trimmed.split_once('T') {
        Some((day, _)) => day,
        None => trimmed,
    };

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(candidate, format) {
            return Ok(date);
        }
    }
    Err(ScanError::InvalidDateFormat(raw.to_string()))
}

/// Optional opaque reference: a string, or a bare number rendered to its
/// string form. Anything else fails.
fn opt_ref_string(value: Option<&Value>, field: &str) -> Result<Option<String>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(ScanError::invalid_field(field, other)),
    }
}
