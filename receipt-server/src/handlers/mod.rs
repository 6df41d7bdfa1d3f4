pub mod category;
pub mod health;
pub mod receipt;
pub mod request_io;

pub mod error {
    use actix_web::http::{header, StatusCode};
    use actix_web::{HttpResponse, HttpResponseBuilder};
    use serde::Serialize;
    use std::fmt;

    #[derive(Debug)]
    pub enum DoesNotExistType {
        Receipt,
        Category,
    }

    #[derive(Debug)]
    pub enum HttpErrorResponse {
        // 400
        IncorrectlyFormed(String),

        // 401
        BadToken(String),
        TokenExpired(String),
        TokenMissing(String),

        // 404
        DoesNotExist(String, DoesNotExistType),

        // 409
        ConflictWithExisting(String),

        // 502
        ExternalServiceError(String),

        // 500
        InternalError(String),
    }

    impl std::error::Error for HttpErrorResponse {}

    impl fmt::Display for HttpErrorResponse {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let server_error: ServerErrorResponse = self.into();
            write!(f, "{:?}", server_error)
        }
    }

    #[derive(Debug, Serialize)]
    pub struct ServerErrorResponse {
        pub err_type: &'static str,
        pub err_message: String,
    }

    impl From<&HttpErrorResponse> for ServerErrorResponse {
        fn from(resp: &HttpErrorResponse) -> Self {
            match resp {
                // 400
                HttpErrorResponse::IncorrectlyFormed(msg) => ServerErrorResponse {
                    err_type: "INCORRECTLY_FORMED",
                    err_message: format!("Incorrectly formed request: {msg}"),
                },

                // 401
                HttpErrorResponse::BadToken(msg) => ServerErrorResponse {
                    err_type: "BAD_TOKEN",
                    err_message: format!("Bad token: {msg}"),
                },
                HttpErrorResponse::TokenExpired(msg) => ServerErrorResponse {
                    err_type: "TOKEN_EXPIRED",
                    err_message: format!("Token expired: {msg}"),
                },
                HttpErrorResponse::TokenMissing(msg) => ServerErrorResponse {
                    err_type: "TOKEN_MISSING",
                    err_message: format!("Token missing: {msg}"),
                },

                // 404
                HttpErrorResponse::DoesNotExist(msg, dne_type) => ServerErrorResponse {
                    err_type: match dne_type {
                        DoesNotExistType::Receipt => "RECEIPT_DOES_NOT_EXIST",
                        DoesNotExistType::Category => "CATEGORY_DOES_NOT_EXIST",
                    },
                    err_message: format!("Does not exist: {msg}"),
                },

                // 409
                HttpErrorResponse::ConflictWithExisting(msg) => ServerErrorResponse {
                    err_type: "CONFLICT_WITH_EXISTING",
                    err_message: format!("Conflict with existing data: {msg}"),
                },

                // 502
                HttpErrorResponse::ExternalServiceError(msg) => ServerErrorResponse {
                    err_type: "EXTERNAL_SERVICE_ERROR",
                    err_message: format!("External service error: {msg}"),
                },

                // 500
                HttpErrorResponse::InternalError(msg) => ServerErrorResponse {
                    err_type: "INTERNAL_ERROR",
                    err_message: format!("Internal error: {msg}"),
                },
            }
        }
    }

    impl actix_web::error::ResponseError for HttpErrorResponse {
        fn error_response(&self) -> HttpResponse {
            HttpResponseBuilder::new(self.status_code())
                .insert_header((header::CONTENT_TYPE, "application/json"))
                .json(ServerErrorResponse::from(self))
        }

        fn status_code(&self) -> StatusCode {
            match *self {
                HttpErrorResponse::IncorrectlyFormed(_) => StatusCode::BAD_REQUEST,
                HttpErrorResponse::BadToken(_)
                | HttpErrorResponse::TokenExpired(_)
                | HttpErrorResponse::TokenMissing(_) => StatusCode::UNAUTHORIZED,
                HttpErrorResponse::DoesNotExist(_, _) => StatusCode::NOT_FOUND,
                HttpErrorResponse::ConflictWithExisting(_) => StatusCode::CONFLICT,
                HttpErrorResponse::ExternalServiceError(_) => StatusCode::BAD_GATEWAY,
                HttpErrorResponse::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            }
        }
    }

    impl From<actix_web::error::BlockingError> for HttpErrorResponse {
        fn from(_: actix_web::error::BlockingError) -> Self {
            HttpErrorResponse::InternalError(String::from("Blocking task failed"))
        }
    }
}
