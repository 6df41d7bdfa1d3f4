use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Sentinel merchant name used when the analysis result resolves nothing.
pub const UNKNOWN_MERCHANT: &str = "Unknown";

const TRANSACTION_DATE_FORMAT: &str = "%Y-%m-%d";
const TRANSACTION_TIME_FORMAT: &str = "%H:%M:%S";
const RECEIPT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    #[serde(rename = "totalPrice")]
    pub total_price: f64,
}

/// Typed result of picking the recognized receipt fields out of the
/// analysis payload. Every field is independently optional in the source
/// document and defaults per field when unresolved.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExtractedReceipt {
    pub merchant: String,
    pub total_amount: f64,
    pub receipt_date: String,
    pub transaction_date: String,
    pub transaction_time: String,
    pub tax: f64,
    pub discounts: f64,
    pub items: Vec<LineItem>,
}

/// The analysis document did not have the expected structure. Field-level
/// absence is defaulted; structural absence is fatal.
#[derive(Debug, Eq, PartialEq)]
pub struct ExtractError {
    pub missing_node: &'static str,
}

impl ExtractError {
    fn missing(node: &'static str) -> Self {
        Self { missing_node: node }
    }
}

impl std::error::Error for ExtractError {}

impl fmt::Display for ExtractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Analysis payload is missing expected node '{}'",
            self.missing_node
        )
    }
}

#[derive(Debug, Eq, PartialEq)]
pub enum TransactionTimestampError {
    InvalidDate(String),
    InvalidTime(String),
}

impl std::error::Error for TransactionTimestampError {}

impl fmt::Display for TransactionTimestampError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionTimestampError::InvalidDate(d) => {
                write!(f, "Transaction date '{d}' is not a valid YYYY-MM-DD date")
            }
            TransactionTimestampError::InvalidTime(t) => {
                write!(f, "Transaction time '{t}' is not a valid HH:MM:SS time")
            }
        }
    }
}

/// Picks the recognized fields out of an analysis payload.
///
/// The payload must contain `analyzeResult -> documentResults[0] -> fields`;
/// anything else about its shape is tolerated field-by-field. `now` feeds
/// the receipt-date default so callers control the clock.
pub fn extract_receipt_fields(
    payload: &Value,
    now: NaiveDateTime,
) -> Result<ExtractedReceipt, ExtractError> {
    let fields = payload
        .get("analyzeResult")
        .ok_or(ExtractError::missing("analyzeResult"))?
        .get("documentResults")
        .and_then(Value::as_array)
        .and_then(|results| results.first())
        .ok_or(ExtractError::missing("documentResults"))?
        .get("fields")
        .and_then(Value::as_object)
        .ok_or(ExtractError::missing("fields"))?;

    let merchant = fields
        .get("MerchantName")
        .and_then(|field| {
            non_empty_str(field, "valueString").or_else(|| non_empty_str(field, "text"))
        })
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .map_or_else(|| String::from(UNKNOWN_MERCHANT), String::from);

    let total_amount = fields
        .get("Total")
        .and_then(|field| field.get("valueNumber"))
        .and_then(Value::as_f64)
        .filter(|total| *total > 0.0)
        .unwrap_or(0.0);

    let receipt_date = fields
        .get("ReceiptDate")
        .and_then(|field| non_empty_str(field, "valueString"))
        .map_or_else(
            || now.format(RECEIPT_DATE_FORMAT).to_string(),
            String::from,
        );

    let transaction_date = fields
        .get("TransactionDate")
        .and_then(|field| {
            non_empty_str(field, "valueDate").or_else(|| non_empty_str(field, "valueString"))
        })
        .map_or_else(String::new, String::from);

    let transaction_time = fields
        .get("TransactionTime")
        .and_then(|field| {
            non_empty_str(field, "valueTime").or_else(|| non_empty_str(field, "valueString"))
        })
        .map_or_else(String::new, String::from);

    let tax = fields
        .get("Tax")
        .and_then(|field| amount_value(field, "valueString"))
        .unwrap_or(0.0);

    let discounts = fields
        .get("Discounts")
        .and_then(|field| amount_value(field, "valueString"))
        .unwrap_or(0.0);

    let items = match fields.get("Items") {
        Some(items_field) => {
            let value_array = items_field
                .get("valueArray")
                .and_then(Value::as_array)
                .ok_or(ExtractError::missing("Items.valueArray"))?;

            clean_items(value_array)
        }
        None => Vec::new(),
    };

    Ok(ExtractedReceipt {
        merchant,
        total_amount,
        receipt_date,
        transaction_date,
        transaction_time,
        tax,
        discounts,
        items,
    })
}

/// Combines the extracted transaction date and time into the single instant
/// recorded on the derived expense.
///
/// Neither present yields `now`. A date without a time is anchored at
/// midnight. A time without a date cannot be anchored to a day and also
/// yields `now`. Parse failures are user-facing validation errors.
pub fn combine_transaction_timestamp(
    date: &str,
    time: &str,
    now: NaiveDateTime,
) -> Result<NaiveDateTime, TransactionTimestampError> {
    if date.is_empty() {
        return Ok(now);
    }

    let date = NaiveDate::parse_from_str(date, TRANSACTION_DATE_FORMAT)
        .map_err(|_| TransactionTimestampError::InvalidDate(String::from(date)))?;

    if time.is_empty() {
        return Ok(date.and_time(NaiveTime::MIN));
    }

    let time = NaiveTime::parse_from_str(time, TRANSACTION_TIME_FORMAT)
        .map_err(|_| TransactionTimestampError::InvalidTime(String::from(time)))?;

    Ok(date.and_time(time))
}

// An item is kept only if both a name and a total price resolve; anything
// else is dropped without error. Source order is preserved.
fn clean_items(raw_items: &[Value]) -> Vec<LineItem> {
    let mut items = Vec::new();

    for raw_item in raw_items {
        let Some(value_object) = raw_item.get("valueObject") else {
            continue;
        };

        let name = value_object.get("Name").and_then(|field| {
            non_empty_str(field, "valueString").or_else(|| non_empty_str(field, "text"))
        });

        let total_price = value_object
            .get("TotalPrice")
            .and_then(|field| amount_value(field, "text"));

        if let (Some(name), Some(total_price)) = (name, total_price) {
            items.push(LineItem {
                name: String::from(name),
                total_price,
            });
        }
    }

    items
}

fn non_empty_str<'a>(field: &'a Value, key: &str) -> Option<&'a str> {
    field
        .get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
}

// Numeric variant first, then the given string variant parsed as a float
fn amount_value(field: &Value, string_key: &str) -> Option<f64> {
    if let Some(amount) = field.get("valueNumber").and_then(Value::as_f64) {
        return Some(amount);
    }

    field
        .get(string_key)
        .and_then(Value::as_str)
        .and_then(|raw| raw.parse::<f64>().ok())
}
