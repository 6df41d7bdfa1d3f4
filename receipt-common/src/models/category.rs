use diesel::Queryable;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

use crate::schema::categories;

/// A user-defined or default spending category. Read-only from this
/// service's perspective; the ingestion pipeline only checks existence.
#[derive(Clone, Debug, Serialize, Deserialize, Identifiable, Queryable)]
#[diesel(table_name = categories)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Category {
    pub id: Uuid,

    // Null for the built-in default categories
    pub user_id: Option<Uuid>,

    pub name: String,
    pub description: String,
    pub color_code: String,
    pub is_default: bool,

    pub created_at: SystemTime,
    pub updated_at: SystemTime,
    pub deleted_at: Option<SystemTime>,
}
