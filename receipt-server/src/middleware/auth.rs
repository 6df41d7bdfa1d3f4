use actix_web::dev::Payload;
use actix_web::web::Data;
use actix_web::{FromRequest, HttpRequest};
use futures::future;
use uuid::Uuid;

use receipt_common::token::{AuthToken, TokenError, TokenSigningKey};

use crate::handlers::error::HttpErrorResponse;

const ACCESS_TOKEN_HEADER: &str = "AccessToken";

/// Authenticated owner of the request, established from the signed access
/// token. The rest of the pipeline treats the id as an opaque required
/// input; it never derives identity itself.
#[derive(Clone, Copy, Debug)]
pub struct AuthorizedUser {
    pub user_id: Uuid,
}

impl FromRequest for AuthorizedUser {
    type Error = HttpErrorResponse;
    type Future = future::Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        future::ready(authorize(req))
    }
}

fn authorize(req: &HttpRequest) -> Result<AuthorizedUser, HttpErrorResponse> {
    let Some(signing_key) = req.app_data::<Data<TokenSigningKey>>() else {
        log::error!("Token signing key is missing from app data");
        return Err(HttpErrorResponse::InternalError(String::from(
            "Server is misconfigured",
        )));
    };

    let token = req
        .headers()
        .get(ACCESS_TOKEN_HEADER)
        .and_then(|header| header.to_str().ok())
        .ok_or_else(|| {
            HttpErrorResponse::TokenMissing(String::from("AccessToken header is missing"))
        })?;

    let claims = AuthToken::verify(token, signing_key).map_err(|e| match e {
        TokenError::TokenExpired => {
            HttpErrorResponse::TokenExpired(String::from("Access token has expired"))
        }
        TokenError::TokenInvalid => {
            HttpErrorResponse::BadToken(String::from("Access token is invalid"))
        }
    })?;

    Ok(AuthorizedUser {
        user_id: claims.user_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::test::{self, TestRequest};
    use actix_web::{web, App, HttpResponse};
    use std::time::{Duration, SystemTime};

    use receipt_common::token::TOKEN_SIGNING_KEY_SIZE;

    async fn whoami(user: AuthorizedUser) -> HttpResponse {
        HttpResponse::Ok().body(user.user_id.to_string())
    }

    fn signing_key() -> TokenSigningKey {
        TokenSigningKey::new([11; TOKEN_SIGNING_KEY_SIZE])
    }

    #[actix_web::test]
    async fn extracts_the_user_from_a_valid_token() {
        let app = test::init_service(
            App::new()
                .app_data(Data::new(signing_key()))
                .route("/whoami", web::get().to(whoami)),
        )
        .await;

        let user_id = Uuid::now_v7();
        let token = AuthToken::sign_new(
            user_id,
            SystemTime::now() + Duration::from_secs(60),
            &signing_key(),
        );

        let req = TestRequest::get()
            .uri("/whoami")
            .insert_header((ACCESS_TOKEN_HEADER, token))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);

        let body = test::read_body(resp).await;
        assert_eq!(body, user_id.to_string().as_bytes());
    }

    #[actix_web::test]
    async fn missing_token_is_unauthorized() {
        let app = test::init_service(
            App::new()
                .app_data(Data::new(signing_key()))
                .route("/whoami", web::get().to(whoami)),
        )
        .await;

        let req = TestRequest::get().uri("/whoami").to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn garbage_token_is_unauthorized() {
        let app = test::init_service(
            App::new()
                .app_data(Data::new(signing_key()))
                .route("/whoami", web::get().to(whoami)),
        )
        .await;

        let req = TestRequest::get()
            .uri("/whoami")
            .insert_header((ACCESS_TOKEN_HEADER, "not-a-token"))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
