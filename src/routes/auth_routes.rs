use axum::{
    Router,
    extract::State,
    routing::{get, post},
};
use serde::Serialize;

use crate::{
    error::ApiError,
    middleware::auth_context::{AuthContext, Identity},
    models::{role_name, AppState, Empty},
    routes::{ApiResult, ok},
};

#[derive(Debug, Serialize)]
pub struct MeData {
    pub role: &'static str,
    pub email: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/me", get(me))
        .route("/logout", post(logout))
}

/* =========================
   GET /api/auth/me
   ========================= */

pub async fn me(who: Identity) -> ApiResult<MeData> {
    ok(
        "Identity resolved",
        MeData {
            role: who.role(),
            email: who.auth().email.clone(),
        },
    )
}

/* =========================
   POST /api/auth/logout
   ========================= */

pub async fn logout(State(state): State<AppState>, auth: AuthContext) -> ApiResult<Empty> {
    let revoked = state
        .tokens
        .revoke(state.store.as_ref(), auth.session_token_id)
        .await?;
    if !revoked {
        // raced with another logout of the same session
        return Err(ApiError::session_expired());
    }
    tracing::info!(email = %auth.email, role = role_name(auth.role), "logged out");
    ok("Logged out", Empty {})
}
