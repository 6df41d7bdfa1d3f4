use actix_web::{web, HttpResponse};

use receipt_common::db;
use receipt_common::db::DbThreadPool;

use crate::handlers::error::HttpErrorResponse;
use crate::handlers::request_io::CategoryResponse;
use crate::middleware::auth::AuthorizedUser;

pub async fn get_all(
    db_thread_pool: web::Data<DbThreadPool>,
    user: AuthorizedUser,
) -> Result<HttpResponse, HttpErrorResponse> {
    let category_dao = db::category::Dao::new(&db_thread_pool);

    let categories =
        match web::block(move || category_dao.get_categories_for_user(user.user_id)).await? {
            Ok(categories) => categories,
            Err(e) => {
                log::error!("{e}");
                return Err(HttpErrorResponse::InternalError(String::from(
                    "Failed to get categories",
                )));
            }
        };

    let categories: Vec<CategoryResponse> =
        categories.iter().map(CategoryResponse::from).collect();

    Ok(HttpResponse::Ok().json(categories))
}
