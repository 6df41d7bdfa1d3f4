use actix_web::web::*;

mod category;
mod health;
mod receipt;

pub fn configure(cfg: &mut ServiceConfig) {
    cfg.service(
        scope("/api")
            .configure(category::configure)
            .configure(health::configure)
            .configure(receipt::configure),
    );
}
