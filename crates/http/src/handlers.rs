//! Auth route handlers.

use std::{fmt, sync::Arc};

use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use ordergate_authn::Identity;
use ordergate_storage::{CredentialRecord, StorageError};
use serde::Deserialize;

use crate::{middleware::unauthorized, state::AppState};

/// `POST /auth/signup` body.
#[derive(Deserialize)]
pub struct SignupRequest {
    /// Login name.
    pub username: String,
    /// Plaintext password, hashed before storage.
    pub password: String,
}

impl fmt::Debug for SignupRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignupRequest")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// `POST /auth/token`: issues a token for the authenticated subject.
///
/// The token is appended to the bearer cache so its first use skips
/// verification. Responds with the raw token as `text/plain`.
pub async fn issue_token(
    State(state): State<AppState>,
    Extension(identity): Extension<Arc<Identity>>,
) -> Response {
    let codec = state.codec();
    let issued = codec.issue_default(identity.subject()).and_then(|token| {
        let bearer_identity = codec.verify(&token)?;
        Ok((token, bearer_identity))
    });

    match issued {
        Ok((token, bearer_identity)) => {
            state.bearer().append(&token, Arc::new(bearer_identity));
            tracing::info!(
                audit.action = "issue_token",
                audit.resource = identity.subject(),
                audit.result = "success",
                "audit_event"
            );
            (StatusCode::OK, [(CONTENT_TYPE, "text/plain; charset=utf-8")], token).into_response()
        },
        Err(e) => {
            tracing::error!(error = %e, "Failed to issue token");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        },
    }
}

/// `POST /auth/signup`: hashes the password and creates the credential.
///
/// 201 on success, 400 for a bad or incomplete body, 409 if the username is
/// taken, 503 if the store is unreachable.
pub async fn signup(
    State(state): State<AppState>,
    body: Result<Json<SignupRequest>, JsonRejection>,
) -> StatusCode {
    let Ok(Json(request)) = body else {
        return StatusCode::BAD_REQUEST;
    };
    if request.username.is_empty() || request.password.is_empty() {
        return StatusCode::BAD_REQUEST;
    }

    let hash = match state.hasher().hash(&request.password).await {
        Ok(hash) => hash,
        Err(e) => {
            tracing::error!(error = %e, "Password hashing failed");
            return StatusCode::INTERNAL_SERVER_ERROR;
        },
    };

    let record = CredentialRecord::new(request.username, hash);
    let username = record.username.clone();
    match state.store().create_credential(record).await {
        Ok(()) => {
            tracing::info!(
                audit.action = "signup",
                audit.resource = %username,
                audit.result = "success",
                "audit_event"
            );
            StatusCode::CREATED
        },
        Err(StorageError::Conflict { .. }) => StatusCode::CONFLICT,
        Err(e) => {
            tracing::error!(error = %e, transient = e.is_transient(), "Credential store write failed");
            StatusCode::SERVICE_UNAVAILABLE
        },
    }
}

/// `POST /auth/logout`: drops the cached decision for the presented
/// credential. Its next use is verified again.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    match state.authenticator().revoke(&headers) {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            tracing::debug!(error.kind = e.kind(), "Logout without usable credentials");
            unauthorized()
        },
    }
}
