use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header, encode};
use uuid::Uuid;

use piazza_db::models::UserRow;
use piazza_types::api::{
    Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse,
};

use crate::error::ApiError;
use crate::state::AppState;

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Validate input
    if req.username.len() < 3 || req.username.len() > 32 {
        return Err(ApiError::Validation(
            "Username must be between 3 and 32 characters".into(),
        ));
    }
    if req.password.len() < 8 {
        return Err(ApiError::Validation(
            "Password must be at least 8 characters".into(),
        ));
    }

    let user_id = Uuid::new_v4();
    let db = state.db.clone();
    let username = req.username.clone();
    let name = req.name.unwrap_or_else(|| req.username.clone());
    let password = req.password;

    // Argon2 hashing is CPU-heavy; keep it off the async runtime along
    // with the store calls.
    tokio::task::spawn_blocking(move || -> Result<(), ApiError> {
        if db.get_user_by_username(&username)?.is_some() {
            return Err(ApiError::Conflict("Username already taken".into()));
        }

        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("password hash failed: {e}")))?
            .to_string();

        db.create_user(
            &user_id.to_string(),
            &username,
            &password_hash,
            &name,
            &Utc::now().to_rfc3339(),
        )?;
        Ok(())
    })
    .await
    .map_err(ApiError::join)??;

    let token = create_token(&state.jwt_secret, user_id, &req.username)?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse { user_id, token }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let username = req.username;
    let password = req.password;

    let user = tokio::task::spawn_blocking(move || -> Result<UserRow, ApiError> {
        let user = db
            .get_user_by_username(&username)?
            .ok_or_else(|| ApiError::Unauthorized("Invalid credentials".into()))?;

        let parsed_hash = PasswordHash::new(&user.password)
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("corrupt password hash: {e}")))?;

        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .map_err(|_| ApiError::Unauthorized("Invalid credentials".into()))?;

        Ok(user)
    })
    .await
    .map_err(ApiError::join)??;

    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("corrupt user id: {e}")))?;

    let token = create_token(&state.jwt_secret, user_id, &user.username)?;

    Ok(Json(LoginResponse {
        user_id,
        username: user.username,
        token,
    }))
}

fn create_token(secret: &str, user_id: Uuid, username: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}
