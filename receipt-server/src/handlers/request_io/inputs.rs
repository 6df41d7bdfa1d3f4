use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct UploadReceiptQuery {
    pub category_id: Uuid,
}
