use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request},
    middleware::Next,
    response::Response,
};
use tracing::info;

/// Logs method, URI and peer address of every request before routing it.
///
/// The peer address is only known when the app is served with
/// `into_make_service_with_connect_info::<SocketAddr>()`.
pub async fn access_log(request: Request, next: Next) -> Response {
    let remote_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    info!(
        method = %request.method(),
        uri = %request.uri(),
        remote_addr = ?remote_addr,
        "request"
    );

    next.run(request).await
}
