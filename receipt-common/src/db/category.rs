use diesel::{dsl, BoolExpressionMethods, ExpressionMethods, QueryDsl, RunQueryDsl};
use uuid::Uuid;

use crate::db::{DaoError, DbThreadPool};
use crate::models::category::Category;
use crate::schema::categories as category_fields;
use crate::schema::categories::dsl::categories;

pub struct Dao {
    db_thread_pool: DbThreadPool,
}

impl Dao {
    pub fn new(db_thread_pool: &DbThreadPool) -> Self {
        Self {
            db_thread_pool: db_thread_pool.clone(),
        }
    }

    pub fn category_exists(&self, category_id: Uuid) -> Result<bool, DaoError> {
        Ok(dsl::select(dsl::exists(
            categories
                .find(category_id)
                .filter(category_fields::deleted_at.is_null()),
        ))
        .get_result(&mut self.db_thread_pool.get()?)?)
    }

    pub fn get_categories_for_user(&self, user_id: Uuid) -> Result<Vec<Category>, DaoError> {
        Ok(categories
            .filter(
                category_fields::user_id
                    .eq(user_id)
                    .or(category_fields::is_default.eq(true)),
            )
            .filter(category_fields::deleted_at.is_null())
            .order(category_fields::name.asc())
            .get_results::<Category>(&mut self.db_thread_pool.get()?)?)
    }
}
