//! Authentication middleware.
//!
//! Every failure, whatever its internal kind, produces the same 401 with
//! the same body. The kind is logged, never returned.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use ordergate_authn::RequestContext;

use crate::state::AppState;

/// Body of every 401 response.
pub const UNAUTHORIZED_BODY: &str = "Unauthorized";

/// Authenticates the request and stores the `Arc<Identity>` in its
/// extensions for downstream handlers.
///
/// If the client goes away, axum drops this future and the drop guard
/// cancels the [`RequestContext`], so no verification result is cached.
pub async fn require_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let ctx = RequestContext::new();
    let _guard = ctx.drop_guard();

    match state.authenticator().authenticate(&ctx, req.headers()).await {
        Ok(identity) => {
            tracing::debug!(subject = identity.subject(), "Request authenticated");
            req.extensions_mut().insert(identity);
            next.run(req).await
        },
        Err(e) => {
            tracing::info!(
                error.kind = e.kind(),
                method = %req.method(),
                path = req.uri().path(),
                "Authentication rejected"
            );
            unauthorized()
        },
    }
}

pub(crate) fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, UNAUTHORIZED_BODY).into_response()
}
