use actix_web::{web, HttpResponse};
use uuid::Uuid;

use receipt_common::db;
use receipt_common::db::{DaoError, DbThreadPool};

use crate::handlers::error::{DoesNotExistType, HttpErrorResponse};
use crate::handlers::request_io::{ReceiptResponse, UploadReceiptQuery};
use crate::ingest::IngestionPipeline;
use crate::middleware::auth::AuthorizedUser;

pub async fn upload(
    pipeline: web::Data<IngestionPipeline>,
    user: AuthorizedUser,
    query: web::Query<UploadReceiptQuery>,
    image: web::Bytes,
) -> Result<HttpResponse, HttpErrorResponse> {
    let receipt = pipeline
        .ingest(user.user_id, query.category_id, image.to_vec())
        .await?;

    Ok(HttpResponse::Created().json(ReceiptResponse::from(&receipt)))
}

pub async fn get_all(
    db_thread_pool: web::Data<DbThreadPool>,
    user: AuthorizedUser,
) -> Result<HttpResponse, HttpErrorResponse> {
    let receipt_dao = db::receipt::Dao::new(&db_thread_pool);

    let receipts = match web::block(move || receipt_dao.get_receipts_for_user(user.user_id)).await?
    {
        Ok(receipts) => receipts,
        Err(e) => {
            log::error!("{e}");
            return Err(HttpErrorResponse::InternalError(String::from(
                "Failed to get receipts",
            )));
        }
    };

    let receipts: Vec<ReceiptResponse> = receipts.iter().map(ReceiptResponse::from).collect();

    Ok(HttpResponse::Ok().json(receipts))
}

pub async fn get_one(
    db_thread_pool: web::Data<DbThreadPool>,
    user: AuthorizedUser,
    receipt_id: web::Path<Uuid>,
) -> Result<HttpResponse, HttpErrorResponse> {
    let receipt_dao = db::receipt::Dao::new(&db_thread_pool);
    let receipt_id = receipt_id.into_inner();

    let receipt = match web::block(move || receipt_dao.get_receipt(receipt_id, user.user_id))
        .await?
    {
        Ok(receipt) => receipt,
        Err(DaoError::QueryFailure(diesel::result::Error::NotFound)) => {
            return Err(HttpErrorResponse::DoesNotExist(
                String::from("Receipt not found"),
                DoesNotExistType::Receipt,
            ));
        }
        Err(e) => {
            log::error!("{e}");
            return Err(HttpErrorResponse::InternalError(String::from(
                "Failed to get receipt",
            )));
        }
    };

    Ok(HttpResponse::Ok().json(ReceiptResponse::from(&receipt)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::test::{self, TestRequest};
    use actix_web::web::Data;
    use actix_web::App;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::{Duration, SystemTime};

    use receipt_common::token::{AuthToken, TokenSigningKey, TOKEN_SIGNING_KEY_SIZE};
    use receipt_common::vision::mock::{
        succeeded_analysis_payload, MockAnalysisTransport, MockClassifier,
    };
    use receipt_common::vision::{AnalysisClient, PollSettings};

    use crate::ingest::test_store::MemoryStore;
    use crate::services;

    fn signing_key() -> TokenSigningKey {
        TokenSigningKey::new([4; TOKEN_SIGNING_KEY_SIZE])
    }

    fn access_token(user_id: Uuid) -> String {
        AuthToken::sign_new(
            user_id,
            SystemTime::now() + Duration::from_secs(60),
            &signing_key(),
        )
    }

    fn test_pipeline(category_id: Uuid) -> Data<IngestionPipeline> {
        let fields = json!({
            "MerchantName": { "valueString": "Contoso Market" },
            "Total": { "valueNumber": 42.17 },
            "TransactionDate": { "valueDate": "2024-03-15" },
            "TransactionTime": { "valueTime": "14:30:00" }
        });

        let analysis = AnalysisClient::new(
            Box::new(MockAnalysisTransport::scripted(vec![
                succeeded_analysis_payload(fields),
            ])),
            PollSettings {
                initial_interval: Duration::from_millis(1),
                max_interval: Duration::from_millis(2),
                deadline: Duration::from_secs(5),
            },
        );

        Data::new(IngestionPipeline::new(
            Arc::new(MemoryStore::with_category(category_id)),
            Arc::new(MockClassifier::accepting()),
            Arc::new(analysis),
        ))
    }

    #[actix_web::test]
    async fn upload_returns_the_created_receipt() {
        let category_id = Uuid::now_v7();

        let app = test::init_service(
            App::new()
                .app_data(test_pipeline(category_id))
                .app_data(Data::new(signing_key()))
                .configure(services::api::configure),
        )
        .await;

        let req = TestRequest::post()
            .uri(&format!("/api/receipts?category_id={category_id}"))
            .insert_header(("AccessToken", access_token(Uuid::now_v7())))
            .set_payload(&b"fake receipt image"[..])
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::CREATED);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["merchant"], "Contoso Market");
        assert_eq!(body["total_amount"], 42.17);
        assert_eq!(body["status"], "completed");
        assert!(body.get("image").is_none());
    }

    #[actix_web::test]
    async fn upload_without_token_is_unauthorized() {
        let category_id = Uuid::now_v7();

        let app = test::init_service(
            App::new()
                .app_data(test_pipeline(category_id))
                .app_data(Data::new(signing_key()))
                .configure(services::api::configure),
        )
        .await;

        let req = TestRequest::post()
            .uri(&format!("/api/receipts?category_id={category_id}"))
            .set_payload(&b"fake receipt image"[..])
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn duplicate_upload_conflicts() {
        let category_id = Uuid::now_v7();

        let app = test::init_service(
            App::new()
                .app_data(test_pipeline(category_id))
                .app_data(Data::new(signing_key()))
                .configure(services::api::configure),
        )
        .await;

        let token = access_token(Uuid::now_v7());

        let req = TestRequest::post()
            .uri(&format!("/api/receipts?category_id={category_id}"))
            .insert_header(("AccessToken", token.clone()))
            .set_payload(&b"fake receipt image"[..])
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let req = TestRequest::post()
            .uri(&format!("/api/receipts?category_id={category_id}"))
            .insert_header(("AccessToken", token))
            .set_payload(&b"fake receipt image"[..])
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[actix_web::test]
    async fn upload_with_unknown_category_is_not_found() {
        let app = test::init_service(
            App::new()
                .app_data(test_pipeline(Uuid::now_v7()))
                .app_data(Data::new(signing_key()))
                .configure(services::api::configure),
        )
        .await;

        let req = TestRequest::post()
            .uri(&format!("/api/receipts?category_id={}", Uuid::now_v7()))
            .insert_header(("AccessToken", access_token(Uuid::now_v7())))
            .set_payload(&b"fake receipt image"[..])
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn empty_upload_is_a_bad_request() {
        let category_id = Uuid::now_v7();

        let app = test::init_service(
            App::new()
                .app_data(test_pipeline(category_id))
                .app_data(Data::new(signing_key()))
                .configure(services::api::configure),
        )
        .await;

        let req = TestRequest::post()
            .uri(&format!("/api/receipts?category_id={category_id}"))
            .insert_header(("AccessToken", access_token(Uuid::now_v7())))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
