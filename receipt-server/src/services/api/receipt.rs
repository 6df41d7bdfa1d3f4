use actix_web::web::*;

use crate::handlers::receipt;

pub fn configure(cfg: &mut ServiceConfig) {
    cfg.service(
        scope("/receipts")
            .service(
                resource("")
                    .route(post().to(receipt::upload))
                    .route(get().to(receipt::get_all)),
            )
            .service(resource("/{receipt_id}").route(get().to(receipt::get_one))),
    );
}
