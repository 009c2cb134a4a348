/// Authentication Routes
///
/// Handles user registration, login, access-token refresh and current user
/// information.

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::{Claims, CredentialVerifier, TokenAuthority, TokenPair, TokenType};
use crate::error::{AppError, DatabaseError, ErrorContext, RequestError};
use crate::users::{NewUser, UserRecord, UserStore};
use crate::validators::{is_valid_email, is_valid_name, is_valid_password};

/// User registration request
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// User login request
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Token refresh request
#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Token pair returned by login and refresh
#[derive(Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

impl AuthResponse {
    fn bearer(access_token: String, refresh_token: String, expires_in: i64) -> Self {
        Self {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in,
        }
    }
}

/// Public view of a user; never carries the password hash
#[derive(Serialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub created_at: String,
}

impl From<UserRecord> for UserResponse {
    fn from(user: UserRecord) -> Self {
        Self {
            id: user.id.to_string(),
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

/// POST /auth/register
///
/// Create an account. The password policy (8 characters to 72 bytes) is
/// enforced here before hashing.
///
/// # Errors
/// - 400: invalid email, password or name
/// - 409: email already registered
/// - 500: hashing or storage failure
pub async fn register(
    form: web::Json<RegisterRequest>,
    store: web::Data<dyn UserStore>,
    verifier: web::Data<CredentialVerifier>,
) -> Result<HttpResponse, RequestError> {
    let context = ErrorContext::new("user_registration");

    let user = register_user(form.into_inner(), store.get_ref(), *verifier.get_ref())
        .await
        .map_err(|e| context.wrap(e))?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %user.id,
        "User registered successfully"
    );

    Ok(HttpResponse::Created().json(UserResponse::from(user)))
}

async fn register_user(
    form: RegisterRequest,
    store: &dyn UserStore,
    verifier: CredentialVerifier,
) -> Result<UserRecord, AppError> {
    let email = is_valid_email(&form.email)?;
    is_valid_password(&form.password)?;
    let first_name = is_valid_name("first_name", form.first_name.as_deref())?;
    let last_name = is_valid_name("last_name", form.last_name.as_deref())?;

    // bcrypt is deliberately slow; keep it off the async workers
    let password = form.password;
    let password_hash = web::block(move || verifier.hash(&password)).await??;

    let user = store
        .insert(NewUser {
            email,
            password_hash,
            first_name,
            last_name,
        })
        .await?;

    Ok(user)
}

/// POST /auth/login
///
/// Verify email and password and return a fresh token pair.
///
/// # Errors
/// - 400: malformed email or password length
/// - 401: unknown email or wrong password (same response and bcrypt work for both)
/// - 500: signing or storage failure
pub async fn login(
    form: web::Json<LoginRequest>,
    store: web::Data<dyn UserStore>,
    verifier: web::Data<CredentialVerifier>,
    authority: web::Data<TokenAuthority>,
) -> Result<HttpResponse, RequestError> {
    let context = ErrorContext::new("user_login");

    let (user, pair) = login_user(
        form.into_inner(),
        store.get_ref(),
        *verifier.get_ref(),
        authority.get_ref(),
    )
    .await
    .map_err(|e| context.wrap(e))?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %user.id,
        "User logged in successfully"
    );

    Ok(HttpResponse::Ok().json(AuthResponse::bearer(
        pair.access_token,
        pair.refresh_token,
        authority.access_token_expiry(),
    )))
}

async fn login_user(
    form: LoginRequest,
    store: &dyn UserStore,
    verifier: CredentialVerifier,
    authority: &TokenAuthority,
) -> Result<(UserRecord, TokenPair), AppError> {
    let email = is_valid_email(&form.email)?;
    is_valid_password(&form.password)?;

    let candidate = form.password;
    let user = match store.find_by_email(&email).await? {
        Some(user) => user,
        None => {
            let error = web::block(move || verifier.reject_unknown(&candidate)).await?;
            return Err(error.into());
        }
    };

    let stored_hash = user.password_hash.clone();
    web::block(move || verifier.verify(&stored_hash, &candidate)).await??;

    let pair = authority.issue_pair(user.id, &user.email)?;
    Ok((user, pair))
}

/// POST /auth/refresh
///
/// Exchange a valid refresh token for a new access token. The refresh token
/// itself is not rotated; the same one is returned and stays usable until it
/// expires.
///
/// # Errors
/// - 401: invalid, expired or non-refresh token
/// - 500: signing failure
pub async fn refresh(
    form: web::Json<RefreshRequest>,
    authority: web::Data<TokenAuthority>,
) -> Result<HttpResponse, RequestError> {
    let context = ErrorContext::new("token_refresh");
    let form = form.into_inner();

    let claims = authority
        .validate(&form.refresh_token, TokenType::Refresh)
        .map_err(|e| context.wrap(e))?;
    let access_token = authority
        .refresh_access(&claims)
        .map_err(|e| context.wrap(e))?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %claims.sub,
        "Access token refreshed"
    );

    Ok(HttpResponse::Ok().json(AuthResponse::bearer(
        access_token,
        form.refresh_token,
        authority.access_token_expiry(),
    )))
}

/// GET /api/me
///
/// Current user, resolved from the claims the bearer middleware injected.
///
/// # Errors
/// - 401: missing or invalid token (handled by middleware)
/// - 404: the account no longer exists
pub async fn get_current_user(
    claims: web::ReqData<Claims>,
    store: web::Data<dyn UserStore>,
) -> Result<HttpResponse, AppError> {
    let user = store
        .find_by_id(claims.user_id())
        .await?
        .ok_or_else(|| DatabaseError::NotFound("User not found".to_string()))?;

    Ok(HttpResponse::Ok().json(UserResponse::from(user)))
}
