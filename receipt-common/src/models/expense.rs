use chrono::NaiveDateTime;
use diesel::{Insertable, Queryable};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

use crate::models::category::Category;
use crate::models::receipt::Receipt;

use crate::schema::expenses;

#[derive(Clone, Debug, Serialize, Deserialize, Associations, Identifiable, Queryable)]
#[diesel(belongs_to(Receipt, foreign_key = receipt_id))]
#[diesel(belongs_to(Category, foreign_key = category_id))]
#[diesel(table_name = expenses)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Expense {
    pub id: Uuid,
    pub user_id: Uuid,
    pub category_id: Uuid,
    pub amount: f64,

    /// Combined transaction instant derived from the receipt's transaction
    /// date and time, not the moment the row was written.
    pub date: NaiveDateTime,

    pub description: String,

    // Nullable; expenses can exist without a receipt, though receipt
    // ingestion always sets it.
    pub receipt_id: Option<Uuid>,

    pub created_at: SystemTime,
    pub updated_at: SystemTime,
}

#[derive(Clone, Debug, Insertable)]
#[diesel(table_name = expenses)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewExpense<'a> {
    pub id: Uuid,
    pub user_id: Uuid,
    pub category_id: Uuid,
    pub amount: f64,
    pub date: NaiveDateTime,
    pub description: &'a str,
    pub receipt_id: Option<Uuid>,
}
