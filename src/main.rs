use actix_cors::Cors;
use actix_web::web::Data;
use actix_web::{App, HttpServer, middleware::Logger};
use anyhow::Context;
use dotenvy::dotenv;
use std::time::Duration;

use bugtriage::classify::Triage;
use bugtriage::config::Config;
use bugtriage::db;
use bugtriage::handlers;
use bugtriage::middleware::ApiKeyAuth;

const SCHEMA_RETRY: Duration = Duration::from_secs(5);

fn cors(origins: &[String]) -> Cors {
    let cors = if origins.iter().any(|o| o == "*") {
        Cors::default().allow_any_origin()
    } else {
        origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            .supports_credentials()
    };
    cors.allow_any_method().allow_any_header().max_age(3600)
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env().context("invalid configuration")?;

    let db_pool = db::connect_lazy(&config.database_url)
        .with_context(|| format!("invalid DATABASE_URL '{}'", config.database_url))?;
    // the service still starts without a database; /health reports it until
    // the background retry has created the schema
    match db::ensure_schema(&db_pool).await {
        Ok(()) => log::info!("database ready at {}", config.database_url),
        Err(e) => {
            log::error!("database unavailable at startup, retrying in the background: {e}");
            actix_web::rt::spawn(db::ensure_schema_with_retry(db_pool.clone(), SCHEMA_RETRY));
        }
    }

    let triage = Data::new(Triage::from_config(config.llm.as_ref()));
    log::info!("classifier: {}", triage.classifier().model_version());

    let auth = ApiKeyAuth::new(config.require_api_key);
    if auth.required {
        log::info!("X-API-Key required on /api routes");
    }

    let origins = config.cors_origins.clone();
    let pool = Data::new(db_pool);
    log::info!("listening on {}:{}", config.host, config.port);

    HttpServer::new(move || {
        App::new()
            .app_data(pool.clone())
            .app_data(triage.clone())
            .wrap(cors(&origins))
            .wrap(Logger::default())
            .configure(|cfg| handlers::config(cfg, auth))
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;
    Ok(())
}
