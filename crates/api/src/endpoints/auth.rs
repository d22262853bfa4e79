//! Authentication endpoints.

use axum::{Router, extract::State, routing::post};
use civic_common::AppResult;
use civic_core::{SigninInput, SignupInput};
use civic_db::entities::user::{self, UserRole};
use serde::Serialize;

use crate::{
    extractors::{ApiJson, AuthUser},
    middleware::AppState,
    response::ApiResponse,
};

/// Public account fields.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    pub id: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub mobile: Option<String>,
    pub role: UserRole,
}

impl From<&user::Model> for AccountResponse {
    fn from(u: &user::Model) -> Self {
        Self {
            id: u.id.clone(),
            email: u.email.clone(),
            first_name: u.first_name.clone(),
            last_name: u.last_name.clone(),
            mobile: u.mobile.clone(),
            role: u.role,
        }
    }
}

/// Session response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user: AccountResponse,
    pub token: String,
}

impl From<user::Model> for SessionResponse {
    fn from(u: user::Model) -> Self {
        Self {
            user: AccountResponse::from(&u),
            token: u.token.unwrap_or_default(),
        }
    }
}

/// Create a new resident account.
async fn signup(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SignupInput>,
) -> AppResult<ApiResponse<SessionResponse>> {
    let user = state.user_service.signup(req).await?;
    Ok(ApiResponse::ok(SessionResponse::from(user)).with_message("Account created"))
}

/// Sign in to an existing account.
async fn signin(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SigninInput>,
) -> AppResult<ApiResponse<SessionResponse>> {
    let user = state.user_service.signin(req).await?;
    Ok(ApiResponse::ok(SessionResponse::from(user)))
}

/// Sign out (invalidate current token by regenerating).
async fn signout(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<()>> {
    state.user_service.signout(&user.id).await?;
    Ok(ApiResponse::message("Signed out"))
}

/// Get the current account.
async fn me(AuthUser(user): AuthUser) -> ApiResponse<AccountResponse> {
    ApiResponse::ok(AccountResponse::from(&user))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/signin", post(signin))
        .route("/signout", post(signout))
        .route("/i", post(me))
}
