use argon2::password_hash::{SaltString, rand_core::OsRng};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::{info, warn};
use uuid::Uuid;

use agora_db::Database;
use agora_db::models::EmailVerification;
use agora_types::api::{
    LoginRequest, LoginResponse, RegisterRequest, RegisterResponse, VerifyEmailQuery,
    VerifyEmailResponse,
};

use crate::blocking;
use crate::config::Config;
use crate::dto::to_user_dto;
use crate::error::ApiError;
use crate::session::{Claims, ROLE_ADMIN};
use crate::state::AppState;
use crate::token;
use crate::validate::{sanitize_input, validate_login, validate_registration};

const TOKEN_TTL_DAYS: i64 = 30;

pub fn create_token(secret: &str, user_id: Uuid, name: Option<&str>, role: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        name: name.map(str::to_string),
        role: role.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(TOKEN_TTL_DAYS)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            tracing::error!("password hashing failed: {}", e);
            ApiError::Internal
        })
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = sanitize_input(&req.name);
    let input = validate_registration(&name, &req.email, &req.password, &req.confirm_password)
        .map_err(ApiError::validation)?;

    let response = blocking(move || {
        if state
            .db
            .get_user_by_email(&input.email)
            .map_err(ApiError::from)?
            .is_some()
        {
            return Err(ApiError::Conflict(
                "this email address is already registered".into(),
            ));
        }

        let password_hash = hash_password(&input.password)?;
        let user_id = Uuid::new_v4().to_string();

        state
            .db
            .create_user(&user_id, &input.name, &input.email, Some(&password_hash), "user")
            .map_err(ApiError::from)?;

        let verification = token::create_verification_token(&state.db, &input.email)
            .map_err(ApiError::from)?;

        // A mail failure is logged but does not fail registration; the
        // token can be re-issued later.
        if let Err(e) = state
            .mailer
            .send_verification_email(&input.email, &verification)
        {
            warn!("could not send verification mail to {}: {:#}", input.email, e);
        }

        let user = state
            .db
            .get_user_by_id(&user_id)
            .map_err(ApiError::from)?
            .ok_or(ApiError::Internal)?;

        Ok(RegisterResponse {
            user: to_user_dto(user),
            message: "account created; check your inbox to verify your email address".into(),
        })
    })
    .await?;

    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    const BAD_CREDENTIALS: &str = "invalid email address or password";

    let input = validate_login(&req.email, &req.password).map_err(ApiError::validation)?;

    let response = blocking(move || {
        let user = state
            .db
            .get_user_by_email(&input.email)
            .map_err(ApiError::from)?
            .ok_or_else(|| ApiError::Unauthorized(BAD_CREDENTIALS.into()))?;

        // Accounts provisioned without credentials cannot log in this way.
        let stored_hash = user
            .password
            .as_deref()
            .ok_or_else(|| ApiError::Unauthorized(BAD_CREDENTIALS.into()))?;

        let parsed_hash = PasswordHash::new(stored_hash).map_err(|e| {
            tracing::error!("corrupt password hash for {}: {}", user.id, e);
            ApiError::Internal
        })?;

        Argon2::default()
            .verify_password(input.password.as_bytes(), &parsed_hash)
            .map_err(|_| ApiError::Unauthorized(BAD_CREDENTIALS.into()))?;

        let user_id: Uuid = user.id.parse().map_err(|_| ApiError::Internal)?;
        let token = create_token(
            &state.config.session_secret,
            user_id,
            user.name.as_deref(),
            &user.role,
        )
        .map_err(ApiError::from)?;

        Ok(LoginResponse {
            user_id,
            name: user.name,
            token,
        })
    })
    .await?;

    Ok(Json(response))
}

pub async fn verify_email(
    State(state): State<AppState>,
    Query(query): Query<VerifyEmailQuery>,
) -> Result<Json<VerifyEmailResponse>, ApiError> {
    let response = blocking(move || {
        match token::redeem_verification(&state.db, &query.token).map_err(ApiError::from)? {
            EmailVerification::Verified { email } => {
                info!("email address verified: {}", email);
                Ok(VerifyEmailResponse {
                    success: true,
                    message: "email address confirmed".into(),
                })
            }
            EmailVerification::InvalidToken => {
                Err(ApiError::BadRequest("token is invalid or expired".into()))
            }
            EmailVerification::UnknownUser => Err(ApiError::NotFound("user not found".into())),
        }
    })
    .await?;

    Ok(Json(response))
}

/// Make sure the configured admin account exists; called once at startup.
pub fn ensure_admin(db: &Database, config: &Config) -> anyhow::Result<()> {
    let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) else {
        return Ok(());
    };

    if db.get_user_by_email(email)?.is_some() {
        return Ok(());
    }

    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("admin password hashing failed: {}", e))?
        .to_string();

    let id = Uuid::new_v4().to_string();
    db.create_user(&id, "Administrator", email, Some(&hash), ROLE_ADMIN)?;
    info!("created admin account {}", email);
    Ok(())
}
