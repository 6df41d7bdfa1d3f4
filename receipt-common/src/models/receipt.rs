use diesel::{Insertable, Queryable};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;
use uuid::Uuid;

use crate::schema::receipts;

/// Lifecycle tag stored in `receipts.status`.
///
/// The ingestion pipeline is synchronous, so a row is only ever written once
/// the upload has fully cleared extraction; failed uploads never reach the
/// table. The remaining variants exist for offline processing flows.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum ReceiptStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ReceiptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReceiptStatus::Pending => "pending",
            ReceiptStatus::Processing => "processing",
            ReceiptStatus::Completed => "completed",
            ReceiptStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ReceiptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Identifiable, Queryable)]
#[diesel(table_name = receipts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Receipt {
    pub id: Uuid,
    pub user_id: Uuid,
    pub category_id: Uuid,
    pub image: Vec<u8>,
    pub content_hash: String,
    pub status: String,
    pub merchant: String,
    pub total_amount: f64,
    pub tax: f64,
    pub discounts: f64,
    pub transaction_date: String,
    pub transaction_time: String,
    pub items: serde_json::Value,
    pub scanned_at: SystemTime,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
    pub deleted_at: Option<SystemTime>,
}

#[derive(Clone, Debug, Insertable)]
#[diesel(table_name = receipts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewReceipt<'a> {
    pub id: Uuid,
    pub user_id: Uuid,
    pub category_id: Uuid,
    pub image: &'a [u8],
    pub content_hash: &'a str,
    pub status: &'a str,
    pub merchant: &'a str,
    pub total_amount: f64,
    pub tax: f64,
    pub discounts: f64,
    pub transaction_date: &'a str,
    pub transaction_time: &'a str,
    pub items: &'a serde_json::Value,
    pub scanned_at: SystemTime,
}
