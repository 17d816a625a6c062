use actix_web::web;

use crate::error::{json_config, path_config, query_config};
use crate::middleware::ApiKeyAuth;

pub mod bugs;
pub mod developers;
pub mod health;
pub mod keys;
pub mod predict;
pub mod stats;

/// Registers every route. Key management stays outside the API key gate so
/// a client can obtain its first key.
pub fn config(cfg: &mut web::ServiceConfig, auth: ApiKeyAuth) {
    cfg.app_data(json_config())
        .app_data(query_config())
        .app_data(path_config())
        .service(web::resource("/").route(web::get().to(health::root)))
        .service(web::resource("/health").route(web::get().to(health::health)))
        .service(
            web::scope("/api/keys")
                .service(web::resource("").route(web::post().to(keys::create)))
                .service(web::resource("/my-keys").route(web::get().to(keys::list_mine)))
                .service(web::resource("/validate").route(web::post().to(keys::validate)))
                .service(
                    web::resource("/{id}")
                        .route(web::get().to(keys::get))
                        .route(web::put().to(keys::update))
                        .route(web::delete().to(keys::delete)),
                )
                .service(web::resource("/{id}/stats").route(web::get().to(keys::stats)))
                .service(web::resource("/{id}/deactivate").route(web::post().to(keys::deactivate))),
        )
        .service(
            web::scope("/api")
                .wrap(auth)
                .service(
                    web::resource("/bugs")
                        .route(web::get().to(bugs::list))
                        .route(web::post().to(bugs::create)),
                )
                .service(web::resource("/bugs/search/{term}").route(web::get().to(bugs::search)))
                .service(
                    web::resource("/bugs/{id}")
                        .route(web::get().to(bugs::get))
                        .route(web::put().to(bugs::update))
                        .route(web::delete().to(bugs::delete)),
                )
                .service(web::resource("/bugs/{id}/predictions").route(web::get().to(bugs::predictions)))
                .service(web::resource("/predict").route(web::post().to(predict::predict)))
                .service(
                    web::resource("/developers")
                        .route(web::get().to(developers::list))
                        .route(web::post().to(developers::create)),
                )
                .service(
                    web::resource("/developers/{id}")
                        .route(web::get().to(developers::get))
                        .route(web::put().to(developers::update))
                        .route(web::delete().to(developers::delete)),
                )
                .service(
                    web::resource("/developers/{id}/workload").route(web::get().to(developers::workload)),
                )
                .service(web::resource("/stats").route(web::get().to(stats::stats))),
        );
}
