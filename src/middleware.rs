use actix_web::{
    Error, HttpMessage, ResponseError,
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    web,
};
use chrono::Utc;
use futures_util::future::{LocalBoxFuture, Ready, ready};
use sqlx::SqlitePool;
use std::rc::Rc;

use crate::auth::{API_KEY_HEADER, authorize};
use crate::error::ApiError;

/// Gates a scope on the `X-API-Key` header.
///
/// When `required` is false a request without the header passes through,
/// but a header that is present is still validated and counted. The
/// authorized [`crate::models::ApiKey`] is left in the request extensions.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiKeyAuth {
    pub required: bool,
}

impl ApiKeyAuth {
    pub fn new(required: bool) -> Self {
        Self { required }
    }
}

impl<S, B> Transform<S, ServiceRequest> for ApiKeyAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = ApiKeyAuthMW<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ApiKeyAuthMW {
            service: Rc::new(service),
            required: self.required,
        }))
    }
}

pub struct ApiKeyAuthMW<S> {
    service: Rc<S>,
    required: bool,
}

impl<S, B> Service<ServiceRequest> for ApiKeyAuthMW<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &self,
        ctx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let required = self.required;

        Box::pin(async move {
            let key = req
                .headers()
                .get(API_KEY_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_owned);

            let Some(key) = key else {
                if required {
                    let err = ApiError::Unauthorized("API key required".into());
                    return Ok(req.into_response(err.error_response()).map_into_right_body());
                }
                return service.call(req).await.map(ServiceResponse::map_into_left_body);
            };

            let Some(pool) = req.app_data::<web::Data<SqlitePool>>().cloned() else {
                log::error!("api key check without a database pool");
                let err = ApiError::Database(sqlx::Error::PoolClosed);
                return Ok(req.into_response(err.error_response()).map_into_right_body());
            };

            match authorize(pool.get_ref(), &key, Utc::now()).await {
                Ok(record) => {
                    log::debug!("request authorized for api key {}", record.id);
                    req.extensions_mut().insert(record);
                    service.call(req).await.map(ServiceResponse::map_into_left_body)
                }
                Err(err) => {
                    log::info!("api key rejected: {err}");
                    Ok(req.into_response(err.error_response()).map_into_right_body())
                }
            }
        })
    }
}
