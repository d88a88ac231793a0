pub mod access_log;
pub mod config;
pub mod error;
pub mod store;
mod v1;

use std::{sync::Arc, time::Duration};

use axum::{
    error_handling::HandleErrorLayer, http::StatusCode, middleware, BoxError, Router,
};
use tower::{timeout::error::Elapsed, ServiceBuilder};
use tracing::error;

use crate::store::TodoStore;

pub const API_PREFIX: &str = "/api";

#[derive(Debug)]
pub struct AppState {
    pub store: TodoStore,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(store: TodoStore, request_timeout: Duration) -> Self {
        Self {
            store,
            request_timeout,
        }
    }
}

/// Builds the full service: access logging, request timeout, and the v1
/// routes mounted under [`API_PREFIX`].
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .nest(API_PREFIX, v1::router())
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(access_log::access_log))
                .layer(HandleErrorLayer::new(handle_timeout))
                .timeout(state.request_timeout),
        )
        .with_state(state)
}

async fn handle_timeout(err: BoxError) -> (StatusCode, &'static str) {
    if err.is::<Elapsed>() {
        (StatusCode::REQUEST_TIMEOUT, "request timeout")
    } else {
        error!(error = %err, "unhandled service error");
        (StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
    }
}
