use axum::{
    Router,
    extract::Request,
    http::StatusCode,
    middleware::{self, Next},
    response::Response,
    routing::{get, patch, post, put},
};
use axum_extra::{
    TypedHeader,
    headers::{Error as AxumError, Header},
};

use std::sync::Arc;

use crate::{fx, invoices, items, references, statistics};
use engine::{Engine, RateProvider};

static USER_HEADER: axum::http::HeaderName = axum::http::HeaderName::from_static("x-user-id");

#[derive(Clone)]
pub struct ServerState {
    pub engine: Arc<Engine>,
    /// Rate provider behind `GET /fx/rate`, cached longer than the engine's.
    pub lookup_rates: Arc<RateProvider>,
}

/// Owner id of the current request.
#[derive(Clone, Debug)]
pub struct Owner(pub String);

/// `TypedHeader` for the owner header
///
/// Requests must contain a non-empty "x-user-id" entry in the header; the
/// identity itself is established upstream.
#[derive(Debug)]
struct UserHeader(String);

impl Header for UserHeader {
    fn name() -> &'static axum::http::HeaderName {
        &USER_HEADER
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, AxumError>
    where
        Self: Sized,
        I: Iterator<Item = &'i axum::http::HeaderValue>,
    {
        let value = values.next().ok_or_else(AxumError::invalid)?;
        let Ok(value) = value.to_str() else {
            return Err(AxumError::invalid());
        };
        let value = value.trim();
        if value.is_empty() {
            return Err(AxumError::invalid());
        }

        Ok(UserHeader(value.to_string()))
    }

    fn encode<E: Extend<axum::http::HeaderValue>>(&self, values: &mut E) {
        match axum::http::HeaderValue::from_str(&self.0) {
            Ok(value) => values.extend(std::iter::once(value)),
            Err(_) => tracing::error!("failed to encode x-user-id header"),
        }
    }
}

async fn auth(
    user_header: Option<TypedHeader<UserHeader>>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(TypedHeader(UserHeader(user_id))) = user_header else {
        return Err(StatusCode::UNAUTHORIZED);
    };

    request.extensions_mut().insert(Owner(user_id));
    Ok(next.run(request).await)
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/invoices", post(invoices::create).get(invoices::list))
        .route(
            "/invoices/{id}",
            get(invoices::get)
                .patch(invoices::update)
                .delete(invoices::delete),
        )
        .route("/invoices/{id}/currency", put(invoices::update_currency))
        .route("/invoices/{id}/tags", put(invoices::set_tags))
        .route("/invoices/{id}/recalculate", post(invoices::recalculate))
        .route("/invoices/{id}/items", post(items::add))
        .route("/items/{id}", patch(items::update).delete(items::delete))
        .route("/statistics", get(statistics::get_statistics))
        .route("/statistics/summary", get(statistics::get_summary))
        .route("/statistics/by-category", get(statistics::get_by_category))
        .route("/statistics/by-company", get(statistics::get_by_company))
        .route("/statistics/by-receiver", get(statistics::get_by_receiver))
        .route("/fx/rate", get(fx::get_rate))
        .route(
            "/categories",
            post(references::category_new).get(references::category_list),
        )
        .route(
            "/companies",
            post(references::company_new).get(references::company_list),
        )
        .route(
            "/receivers",
            post(references::receiver_new).get(references::receiver_list),
        )
        .route("/tags", post(references::tag_new).get(references::tag_list))
        .route_layer(middleware::from_fn(auth))
        .with_state(state)
}

pub async fn run_with_listener(
    engine: Engine,
    lookup_rates: Arc<RateProvider>,
    listener: tokio::net::TcpListener,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    let state = ServerState {
        engine: Arc::new(engine),
        lookup_rates,
    };

    axum::serve(listener, router(state)).await
}
