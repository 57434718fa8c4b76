//! Authentication API Endpoints
//! Mission: Registration, login, token refresh, and user administration

use crate::auth::{
    jwt::JwtHandler,
    models::{
        Claims, LoginRequest, RefreshRequest, RefreshResponse, RegisterRequest,
        TokenPairResponse, UserResponse,
    },
    user_store::{DuplicateUserField, UserStore},
};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use axum_extra::extract::WithRejection;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Shared auth state
#[derive(Clone)]
pub struct AuthState {
    pub user_store: Arc<UserStore>,
    pub jwt_handler: Arc<JwtHandler>,
}

impl AuthState {
    pub fn new(user_store: Arc<UserStore>, jwt_handler: Arc<JwtHandler>) -> Self {
        Self {
            user_store,
            jwt_handler,
        }
    }
}

/// Register endpoint - POST /api/register/
///
/// Creates the account and immediately issues a token pair (auto-login).
pub async fn register(
    State(state): State<AuthState>,
    WithRejection(Json(payload), _): WithRejection<Json<RegisterRequest>, AuthApiError>,
) -> Result<(StatusCode, Json<TokenPairResponse>), AuthApiError> {
    info!("📝 Registration attempt: {}", payload.username);

    if payload.username.trim().is_empty() {
        return Err(AuthApiError::BlankUsername);
    }
    if payload.email.trim().is_empty() {
        return Err(AuthApiError::BlankEmail);
    }
    if payload.password.len() < 8 {
        return Err(AuthApiError::WeakPassword);
    }

    let email_taken = state
        .user_store
        .email_taken(&payload.email)
        .await
        .map_err(|_| AuthApiError::InternalError)?;
    if email_taken {
        warn!("❌ Registration rejected (email in use): {}", payload.username);
        return Err(AuthApiError::EmailTaken);
    }

    let username_taken = state
        .user_store
        .username_taken(&payload.username)
        .await
        .map_err(|_| AuthApiError::InternalError)?;
    if username_taken {
        warn!(
            "❌ Registration rejected (username in use): {}",
            payload.username
        );
        return Err(AuthApiError::UsernameTaken);
    }

    let user = state
        .user_store
        .create_user(
            &payload.username,
            &payload.email,
            &payload.password,
            &payload.first_name,
            &payload.last_name,
        )
        .await
        .map_err(|e| match e.downcast_ref::<DuplicateUserField>() {
            // A concurrent registration can slip between the pre-checks
            // above and the insert; the constraint still names the field
            Some(DuplicateUserField::Email) => AuthApiError::EmailTaken,
            Some(DuplicateUserField::Username) => AuthApiError::UsernameTaken,
            None => {
                warn!("Failed to create user: {}", e);
                AuthApiError::InternalError
            }
        })?;

    let pair = state
        .jwt_handler
        .generate_pair(&user)
        .map_err(|_| AuthApiError::InternalError)?;

    info!("✅ Registered user: {}", user.username);

    Ok((StatusCode::CREATED, Json(pair)))
}

/// Login endpoint - POST /api/token/
pub async fn login(
    State(state): State<AuthState>,
    WithRejection(Json(payload), _): WithRejection<Json<LoginRequest>, AuthApiError>,
) -> Result<Json<TokenPairResponse>, AuthApiError> {
    info!("🔐 Login attempt: {}", payload.username);

    // Verify credentials
    let valid = state
        .user_store
        .verify_password(&payload.username, &payload.password)
        .await
        .map_err(|_| AuthApiError::InternalError)?;

    if !valid {
        warn!("❌ Failed login attempt: {}", payload.username);
        return Err(AuthApiError::InvalidCredentials);
    }

    // Get user details
    let user = state
        .user_store
        .get_user_by_username(&payload.username)
        .await
        .map_err(|_| AuthApiError::InternalError)?
        .ok_or(AuthApiError::InvalidCredentials)?;

    // Generate the token pair
    let pair = state
        .jwt_handler
        .generate_pair(&user)
        .map_err(|_| AuthApiError::InternalError)?;

    info!("✅ Login successful: {}", user.username);

    Ok(Json(pair))
}

/// Token refresh endpoint - POST /api/token/refresh/
///
/// Stateless: the new access token is minted from the refresh token's own
/// claims, with no user lookup.
pub async fn refresh(
    State(state): State<AuthState>,
    WithRejection(Json(payload), _): WithRejection<Json<RefreshRequest>, AuthApiError>,
) -> Result<Json<RefreshResponse>, AuthApiError> {
    let access = state
        .jwt_handler
        .refresh_access(&payload.refresh)
        .map_err(|_| AuthApiError::InvalidRefreshToken)?;

    Ok(Json(RefreshResponse { access }))
}

/// List all users - GET /api/users/ (admin only)
pub async fn list_users(
    State(state): State<AuthState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<UserResponse>>, AuthApiError> {
    if !claims.is_admin {
        return Err(AuthApiError::Forbidden);
    }

    let users = state
        .user_store
        .list_users()
        .await
        .map_err(|_| AuthApiError::InternalError)?;

    let response: Vec<UserResponse> = users.iter().map(UserResponse::from_user).collect();

    Ok(Json(response))
}

/// Delete user - DELETE /api/users/:id/ (admin only)
pub async fn delete_user(
    State(state): State<AuthState>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<String>,
) -> Result<StatusCode, AuthApiError> {
    if !claims.is_admin {
        return Err(AuthApiError::Forbidden);
    }

    let uuid = Uuid::parse_str(&user_id).map_err(|_| AuthApiError::InvalidUserId)?;

    // Don't allow deleting yourself
    if uuid.to_string() == claims.sub {
        return Err(AuthApiError::CannotDeleteSelf);
    }

    // Owned todos go with the user (FK cascade)
    let deleted = state
        .user_store
        .delete_user(&uuid)
        .await
        .map_err(|_| AuthApiError::InternalError)?;

    if !deleted {
        return Err(AuthApiError::UserNotFound);
    }

    info!("🗑️  User deleted: {}", user_id);

    Ok(StatusCode::NO_CONTENT)
}

/// Auth API errors
#[derive(Debug)]
pub enum AuthApiError {
    InvalidCredentials,
    InvalidRefreshToken,
    Forbidden,
    BlankUsername,
    BlankEmail,
    WeakPassword,
    EmailTaken,
    UsernameTaken,
    MalformedBody(String),
    UserNotFound,
    InvalidUserId,
    CannotDeleteSelf,
    InternalError,
}

/// Bodies that fail to parse (missing fields, bad JSON, wrong content type)
/// are validation failures like any other: 400 with a detail message.
impl From<JsonRejection> for AuthApiError {
    fn from(rejection: JsonRejection) -> Self {
        AuthApiError::MalformedBody(rejection.body_text())
    }
}

impl IntoResponse for AuthApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthApiError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "Invalid username or password".to_string(),
            ),
            AuthApiError::InvalidRefreshToken => (
                StatusCode::UNAUTHORIZED,
                "Invalid or expired refresh token".to_string(),
            ),
            AuthApiError::Forbidden => {
                (StatusCode::FORBIDDEN, "Insufficient permissions".to_string())
            }
            AuthApiError::BlankUsername => (
                StatusCode::BAD_REQUEST,
                "Username may not be blank".to_string(),
            ),
            AuthApiError::BlankEmail => {
                (StatusCode::BAD_REQUEST, "Email may not be blank".to_string())
            }
            AuthApiError::WeakPassword => (
                StatusCode::BAD_REQUEST,
                "Password must be at least 8 characters".to_string(),
            ),
            AuthApiError::EmailTaken => (
                StatusCode::BAD_REQUEST,
                "A user with this email already exists".to_string(),
            ),
            AuthApiError::UsernameTaken => (
                StatusCode::BAD_REQUEST,
                "A user with this username already exists".to_string(),
            ),
            AuthApiError::MalformedBody(detail) => (StatusCode::BAD_REQUEST, detail),
            AuthApiError::UserNotFound => (StatusCode::NOT_FOUND, "User not found".to_string()),
            AuthApiError::InvalidUserId => {
                (StatusCode::BAD_REQUEST, "Invalid user ID format".to_string())
            }
            AuthApiError::CannotDeleteSelf => (
                StatusCode::BAD_REQUEST,
                "Cannot delete your own account".to_string(),
            ),
            AuthApiError::InternalError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        (status, Json(json!({ "detail": message }))).into_response()
    }
}
