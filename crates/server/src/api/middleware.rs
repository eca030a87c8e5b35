//! Authentication and metrics middleware for API routes.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use qform_core::{AuthError, AuthRequest, Identity};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

use crate::metrics::{
    normalize_path, AUTH_FAILURES_TOTAL, AUTH_RATE_LIMITED_TOTAL, HTTP_REQUESTS_IN_FLIGHT,
    HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION,
};
use crate::state::AppState;

/// Challenge sent with every 401 so browsers prompt for credentials.
pub const BASIC_CHALLENGE: &str = "Basic realm=\"qform\", charset=\"UTF-8\"";

/// Metrics middleware that tracks HTTP request duration and counts.
pub async fn metrics_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = normalize_path(request.uri().path(), state.artifacts().route());

    HTTP_REQUESTS_IN_FLIGHT.inc();

    let response = next.run(request).await;

    HTTP_REQUESTS_IN_FLIGHT.dec();

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    HTTP_REQUEST_DURATION
        .with_label_values(&[&method, &path, &status])
        .observe(duration);
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();

    response
}

/// Authentication middleware that validates requests using the configured authenticator.
///
/// Rejects with 401 when credentials are missing or wrong, and with 429 once
/// a client has failed too many times.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let authenticator = state.authenticator();

    if authenticator.method_name() == "none" {
        request.extensions_mut().insert(Identity::anonymous());
        return next.run(request).await;
    }

    let client = client_key(&request);
    let limiter = state.login_limiter();
    if let Err(retry_after) = limiter.check(&client).await {
        AUTH_RATE_LIMITED_TOTAL.inc();
        warn!("Refusing {}: too many failed logins", client);
        return too_many_attempts(retry_after);
    }

    let headers: HashMap<String, String> = request
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_lowercase(), v.to_string()))
        })
        .collect();

    match authenticator.authenticate(&AuthRequest { headers }).await {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(AuthError::NotAuthenticated) => {
            AUTH_FAILURES_TOTAL
                .with_label_values(&["not_authenticated"])
                .inc();
            unauthorized()
        }
        Err(AuthError::InvalidCredentials(_)) => {
            AUTH_FAILURES_TOTAL
                .with_label_values(&["invalid_credentials"])
                .inc();
            limiter.record_failure(&client).await;
            unauthorized()
        }
        Err(AuthError::ConfigurationError(_)) => {
            AUTH_FAILURES_TOTAL.with_label_values(&["internal_error"]).inc();
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Remote address the request came from, when the server records it.
fn client_key(request: &Request<Body>) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, BASIC_CHALLENGE)],
    )
        .into_response()
}

fn too_many_attempts(retry_after: Duration) -> Response {
    // Round up so clients never retry early
    let secs = retry_after
        .as_secs()
        .saturating_add(u64::from(retry_after.subsec_nanos() > 0));
    let mut response = StatusCode::TOO_MANY_REQUESTS.into_response();
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(secs));
    response
}
