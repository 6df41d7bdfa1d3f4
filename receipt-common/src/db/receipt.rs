use chrono::NaiveDateTime;
use diesel::{dsl, ExpressionMethods, QueryDsl, RunQueryDsl};
use std::time::SystemTime;
use uuid::Uuid;

use crate::db::{DaoError, DbThreadPool};
use crate::extract::ExtractedReceipt;
use crate::models::expense::NewExpense;
use crate::models::receipt::{NewReceipt, Receipt, ReceiptStatus};
use crate::schema::expenses::dsl::expenses;
use crate::schema::receipts as receipt_fields;
use crate::schema::receipts::dsl::receipts;

/// Everything the ingestion pipeline has resolved about an upload by the
/// time it is ready to be persisted. The receipt row and its derived
/// expense row are written from this in a single transaction.
#[derive(Clone, Debug)]
pub struct ReceiptDraft {
    pub user_id: Uuid,
    pub category_id: Uuid,
    pub image: Vec<u8>,
    pub content_hash: String,
    pub status: ReceiptStatus,
    pub fields: ExtractedReceipt,
    pub expense_timestamp: NaiveDateTime,
    pub expense_description: String,
}

pub struct Dao {
    db_thread_pool: DbThreadPool,
}

impl Dao {
    pub fn new(db_thread_pool: &DbThreadPool) -> Self {
        Self {
            db_thread_pool: db_thread_pool.clone(),
        }
    }

    /// Advisory duplicate check. The partial unique index on
    /// `receipts.content_hash` is the authoritative guard; this query only
    /// lets the pipeline skip the external service calls for known
    /// duplicates.
    pub fn content_hash_exists(&self, hash: &str) -> Result<bool, DaoError> {
        Ok(dsl::select(dsl::exists(
            receipts
                .filter(receipt_fields::content_hash.eq(hash))
                .filter(receipt_fields::deleted_at.is_null()),
        ))
        .get_result(&mut self.db_thread_pool.get()?)?)
    }

    pub fn create_receipt_with_expense(&self, draft: &ReceiptDraft) -> Result<Receipt, DaoError> {
        let items = serde_json::to_value(&draft.fields.items)
            .map_err(|_| DaoError::CannotRunQuery("Line items could not be serialized"))?;

        let new_receipt = NewReceipt {
            id: Uuid::now_v7(),
            user_id: draft.user_id,
            category_id: draft.category_id,
            image: &draft.image,
            content_hash: &draft.content_hash,
            status: draft.status.as_str(),
            merchant: &draft.fields.merchant,
            total_amount: draft.fields.total_amount,
            tax: draft.fields.tax,
            discounts: draft.fields.discounts,
            transaction_date: &draft.fields.transaction_date,
            transaction_time: &draft.fields.transaction_time,
            items: &items,
            scanned_at: SystemTime::now(),
        };

        let mut db_connection = self.db_thread_pool.get()?;

        let receipt = db_connection
            .build_transaction()
            .run::<Receipt, DaoError, _>(|conn| {
                let receipt = dsl::insert_into(receipts)
                    .values(&new_receipt)
                    .get_result::<Receipt>(conn)?;

                let new_expense = NewExpense {
                    id: Uuid::now_v7(),
                    user_id: receipt.user_id,
                    category_id: receipt.category_id,
                    amount: receipt.total_amount,
                    date: draft.expense_timestamp,
                    description: &draft.expense_description,
                    receipt_id: Some(receipt.id),
                };

                dsl::insert_into(expenses)
                    .values(&new_expense)
                    .execute(conn)?;

                Ok(receipt)
            })?;

        Ok(receipt)
    }

    pub fn get_receipts_for_user(&self, user_id: Uuid) -> Result<Vec<Receipt>, DaoError> {
        Ok(receipts
            .filter(receipt_fields::user_id.eq(user_id))
            .filter(receipt_fields::deleted_at.is_null())
            .order(receipt_fields::scanned_at.desc())
            .get_results::<Receipt>(&mut self.db_thread_pool.get()?)?)
    }

    pub fn get_receipt(&self, receipt_id: Uuid, user_id: Uuid) -> Result<Receipt, DaoError> {
        Ok(receipts
            .find(receipt_id)
            .filter(receipt_fields::user_id.eq(user_id))
            .filter(receipt_fields::deleted_at.is_null())
            .get_result::<Receipt>(&mut self.db_thread_pool.get()?)?)
    }
}
