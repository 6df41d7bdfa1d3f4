use actix_web::web;
use async_trait::async_trait;
use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use receipt_common::db::category::Dao as CategoryDao;
use receipt_common::db::receipt::{Dao as ReceiptDao, ReceiptDraft};
use receipt_common::db::{DaoError, DbThreadPool};
use receipt_common::extract::{self, TransactionTimestampError};
use receipt_common::hash;
use receipt_common::models::receipt::{Receipt, ReceiptStatus};
use receipt_common::vision::{AnalysisClient, ClassifyImage, VisionError};

use crate::handlers::error::{DoesNotExistType, HttpErrorResponse};

/// Persistence boundary for the ingestion pipeline. The live implementation
/// wraps the DAOs; tests substitute an in-memory store. The store, not the
/// pipeline, is responsible for surfacing a concurrent duplicate insert as
/// [`StoreError::DuplicateContentHash`].
#[async_trait]
pub trait ReceiptStore: Send + Sync {
    async fn content_hash_exists(&self, content_hash: &str) -> Result<bool, StoreError>;

    async fn category_exists(&self, category_id: Uuid) -> Result<bool, StoreError>;

    async fn create_receipt_with_expense(
        &self,
        draft: ReceiptDraft,
    ) -> Result<Receipt, StoreError>;
}

#[derive(Debug)]
pub enum StoreError {
    DuplicateContentHash,
    Unavailable(String),
}

impl std::error::Error for StoreError {}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::DuplicateContentHash => {
                write!(f, "StoreError: Content hash already exists")
            }
            StoreError::Unavailable(e) => write!(f, "StoreError: Store is unavailable: {e}"),
        }
    }
}

/// `ReceiptStore` over the database thread pool. DAO calls run on the actix
/// blocking pool.
pub struct DbReceiptStore {
    db_thread_pool: DbThreadPool,
}

impl DbReceiptStore {
    pub fn new(db_thread_pool: DbThreadPool) -> Self {
        Self { db_thread_pool }
    }
}

#[async_trait]
impl ReceiptStore for DbReceiptStore {
    async fn content_hash_exists(&self, content_hash: &str) -> Result<bool, StoreError> {
        let dao = ReceiptDao::new(&self.db_thread_pool);
        let content_hash = String::from(content_hash);

        web::block(move || dao.content_hash_exists(&content_hash))
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?
            .map_err(store_error)
    }

    async fn category_exists(&self, category_id: Uuid) -> Result<bool, StoreError> {
        let dao = CategoryDao::new(&self.db_thread_pool);

        web::block(move || dao.category_exists(category_id))
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?
            .map_err(store_error)
    }

    async fn create_receipt_with_expense(
        &self,
        draft: ReceiptDraft,
    ) -> Result<Receipt, StoreError> {
        let dao = ReceiptDao::new(&self.db_thread_pool);

        web::block(move || dao.create_receipt_with_expense(&draft))
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?
            .map_err(store_error)
    }
}

fn store_error(error: DaoError) -> StoreError {
    if error.is_unique_violation() {
        StoreError::DuplicateContentHash
    } else {
        StoreError::Unavailable(error.to_string())
    }
}

/// Classified abort reasons for an upload. Every failure path through the
/// pipeline lands on exactly one of these; none of them leaves a partially
/// persisted receipt behind.
#[derive(Debug)]
pub enum IngestError {
    EmptyFile,
    DuplicateReceipt,
    NotAReceipt { confidence: f64 },
    InvalidCategory(Uuid),
    MalformedAnalysis(String),
    InvalidTransactionTimestamp(TransactionTimestampError),
    External(VisionError),
    Store(String),
}

impl std::error::Error for IngestError {}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestError::EmptyFile => write!(f, "No receipt image was uploaded"),
            IngestError::DuplicateReceipt => {
                write!(f, "A receipt with identical content already exists")
            }
            IngestError::NotAReceipt { confidence } => {
                write!(
                    f,
                    "The uploaded image was not recognized as a receipt (confidence {confidence})"
                )
            }
            IngestError::InvalidCategory(category_id) => {
                write!(f, "Category {category_id} does not exist")
            }
            IngestError::MalformedAnalysis(detail) => {
                write!(f, "Receipt analysis returned an unexpected result: {detail}")
            }
            IngestError::InvalidTransactionTimestamp(e) => write!(f, "{e}"),
            IngestError::External(e) => write!(f, "{e}"),
            IngestError::Store(e) => write!(f, "Receipt storage failed: {e}"),
        }
    }
}

impl From<IngestError> for HttpErrorResponse {
    fn from(error: IngestError) -> Self {
        match error {
            IngestError::EmptyFile => {
                HttpErrorResponse::IncorrectlyFormed(String::from("No receipt image was uploaded"))
            }
            IngestError::DuplicateReceipt => HttpErrorResponse::ConflictWithExisting(String::from(
                "A receipt with identical content already exists",
            )),
            IngestError::NotAReceipt { confidence } => {
                HttpErrorResponse::IncorrectlyFormed(format!(
                    "The uploaded image was not recognized as a receipt (confidence {confidence})"
                ))
            }
            IngestError::InvalidCategory(category_id) => HttpErrorResponse::DoesNotExist(
                format!("Category {category_id} does not exist"),
                DoesNotExistType::Category,
            ),
            IngestError::MalformedAnalysis(_) => HttpErrorResponse::ExternalServiceError(
                String::from("Receipt analysis returned an unexpected result"),
            ),
            IngestError::InvalidTransactionTimestamp(e) => {
                HttpErrorResponse::IncorrectlyFormed(e.to_string())
            }
            IngestError::External(_) => HttpErrorResponse::ExternalServiceError(String::from(
                "A receipt processing service was unavailable",
            )),
            IngestError::Store(_) => {
                HttpErrorResponse::InternalError(String::from("Failed to save receipt"))
            }
        }
    }
}

/// Runs an upload from raw bytes to a persisted receipt: hash, duplicate
/// check, classification, analysis submit/poll, field extraction, category
/// validation, then one transactional write of the receipt and its derived
/// expense. Short-circuits at the first failure.
pub struct IngestionPipeline {
    store: Arc<dyn ReceiptStore>,
    classifier: Arc<dyn ClassifyImage>,
    analysis: Arc<AnalysisClient>,
}

impl IngestionPipeline {
    pub fn new(
        store: Arc<dyn ReceiptStore>,
        classifier: Arc<dyn ClassifyImage>,
        analysis: Arc<AnalysisClient>,
    ) -> Self {
        Self {
            store,
            classifier,
            analysis,
        }
    }

    pub async fn ingest(
        &self,
        user_id: Uuid,
        category_id: Uuid,
        image: Vec<u8>,
    ) -> Result<Receipt, IngestError> {
        if image.is_empty() {
            return Err(IngestError::EmptyFile);
        }

        let content_hash = hash::content_hash(&image);

        // Advisory fast path; the unique index still guards the insert.
        // Fails closed: only an explicit "not found" proceeds.
        match self.store.content_hash_exists(&content_hash).await {
            Ok(true) => return Err(IngestError::DuplicateReceipt),
            Ok(false) => (),
            Err(e) => {
                log::error!("Duplicate check failed for content hash {content_hash}: {e}");
                return Err(IngestError::Store(e.to_string()));
            }
        }

        let verdict = self.classifier.classify(&image).await.map_err(|e| {
            log::error!("Receipt classification failed: {e}");
            IngestError::External(e)
        })?;

        if !verdict.is_receipt {
            return Err(IngestError::NotAReceipt {
                confidence: verdict.confidence,
            });
        }

        let analysis_payload = self.analysis.analyze(&image).await.map_err(|e| {
            log::error!("Receipt analysis failed: {e}");
            IngestError::External(e)
        })?;

        let now = Utc::now().naive_utc();

        let fields = extract::extract_receipt_fields(&analysis_payload, now).map_err(|e| {
            log::error!("Unexpected analysis payload shape ({e}): {analysis_payload}");
            IngestError::MalformedAnalysis(e.to_string())
        })?;

        match self.store.category_exists(category_id).await {
            Ok(true) => (),
            Ok(false) => return Err(IngestError::InvalidCategory(category_id)),
            Err(e) => {
                log::error!("Category lookup failed for {category_id}: {e}");
                return Err(IngestError::Store(e.to_string()));
            }
        }

        let expense_timestamp = extract::combine_transaction_timestamp(
            &fields.transaction_date,
            &fields.transaction_time,
            now,
        )
        .map_err(IngestError::InvalidTransactionTimestamp)?;

        let expense_description = format!("Receipt from {}", fields.merchant);

        let draft = ReceiptDraft {
            user_id,
            category_id,
            image,
            content_hash,
            status: ReceiptStatus::Completed,
            fields,
            expense_timestamp,
            expense_description,
        };

        match self.store.create_receipt_with_expense(draft).await {
            Ok(receipt) => Ok(receipt),
            // Lost the race against a concurrent upload of the same bytes
            Err(StoreError::DuplicateContentHash) => Err(IngestError::DuplicateReceipt),
            Err(e) => {
                log::error!("Failed to persist receipt: {e}");
                Err(IngestError::Store(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
pub mod test_store {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::time::SystemTime;

    /// In-memory `ReceiptStore` with the same duplicate semantics as the
    /// database: the advisory check reads the set of stored hashes, and
    /// inserting a stored hash again fails with `DuplicateContentHash`.
    #[derive(Default)]
    pub struct MemoryStore {
        hashes: Mutex<HashSet<String>>,
        categories: Mutex<HashSet<Uuid>>,
        drafts: Mutex<Vec<ReceiptDraft>>,
        fail_hash_lookups: bool,
        advisory_always_misses: bool,
    }

    impl MemoryStore {
        pub fn with_category(category_id: Uuid) -> Self {
            let store = Self::default();
            store
                .categories
                .lock()
                .unwrap()
                .insert(category_id);
            store
        }

        /// Every advisory duplicate check fails, as if the database were
        /// unreachable.
        pub fn failing_hash_lookups(category_id: Uuid) -> Self {
            let mut store = Self::with_category(category_id);
            store.fail_hash_lookups = true;
            store
        }

        /// The advisory check never sees stored hashes, simulating a
        /// concurrent upload that passed the check before this one inserted.
        pub fn with_racing_advisory_check(category_id: Uuid) -> Self {
            let mut store = Self::with_category(category_id);
            store.advisory_always_misses = true;
            store
        }

        pub fn seed_hash(&self, content_hash: &str) {
            self.hashes.lock().unwrap().insert(String::from(content_hash));
        }

        pub fn created_drafts(&self) -> Vec<ReceiptDraft> {
            self.drafts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ReceiptStore for MemoryStore {
        async fn content_hash_exists(&self, content_hash: &str) -> Result<bool, StoreError> {
            if self.fail_hash_lookups {
                return Err(StoreError::Unavailable(String::from(
                    "simulated query failure",
                )));
            }

            if self.advisory_always_misses {
                return Ok(false);
            }

            Ok(self.hashes.lock().unwrap().contains(content_hash))
        }

        async fn category_exists(&self, category_id: Uuid) -> Result<bool, StoreError> {
            Ok(self.categories.lock().unwrap().contains(&category_id))
        }

        async fn create_receipt_with_expense(
            &self,
            draft: ReceiptDraft,
        ) -> Result<Receipt, StoreError> {
            if !self
                .hashes
                .lock()
                .unwrap()
                .insert(draft.content_hash.clone())
            {
                return Err(StoreError::DuplicateContentHash);
            }

            let receipt = Receipt {
                id: Uuid::now_v7(),
                user_id: draft.user_id,
                category_id: draft.category_id,
                image: draft.image.clone(),
                content_hash: draft.content_hash.clone(),
                status: draft.status.to_string(),
                merchant: draft.fields.merchant.clone(),
                total_amount: draft.fields.total_amount,
                tax: draft.fields.tax,
                discounts: draft.fields.discounts,
                transaction_date: draft.fields.transaction_date.clone(),
                transaction_time: draft.fields.transaction_time.clone(),
                items: serde_json::to_value(&draft.fields.items).unwrap_or_else(|_| json!([])),
                scanned_at: SystemTime::now(),
                created_at: SystemTime::now(),
                updated_at: SystemTime::now(),
                deleted_at: None,
            };

            self.drafts.lock().unwrap().push(draft);

            Ok(receipt)
        }
    }
}
