use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use receipt_common::models::category::Category;
use receipt_common::models::receipt::Receipt;

/// Receipt as returned to clients. Carries everything except the raw image
/// bytes; timestamps are Unix seconds.
#[derive(Debug, Serialize)]
pub struct ReceiptResponse {
    pub id: Uuid,
    pub category_id: Uuid,
    pub status: String,
    pub merchant: String,
    pub total_amount: f64,
    pub tax: f64,
    pub discounts: f64,
    pub transaction_date: String,
    pub transaction_time: String,
    pub items: serde_json::Value,
    pub scanned_at: u64,
    pub created_at: u64,
}

impl From<&Receipt> for ReceiptResponse {
    fn from(receipt: &Receipt) -> Self {
        Self {
            id: receipt.id,
            category_id: receipt.category_id,
            status: receipt.status.clone(),
            merchant: receipt.merchant.clone(),
            total_amount: receipt.total_amount,
            tax: receipt.tax,
            discounts: receipt.discounts,
            transaction_date: receipt.transaction_date.clone(),
            transaction_time: receipt.transaction_time.clone(),
            items: receipt.items.clone(),
            scanned_at: unix_secs(receipt.scanned_at),
            created_at: unix_secs(receipt.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CategoryResponse {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub color_code: String,
    pub is_default: bool,
}

impl From<&Category> for CategoryResponse {
    fn from(category: &Category) -> Self {
        Self {
            id: category.id,
            name: category.name.clone(),
            description: category.description.clone(),
            color_code: category.color_code.clone(),
            is_default: category.is_default,
        }
    }
}

fn unix_secs(timestamp: SystemTime) -> u64 {
    timestamp
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}
