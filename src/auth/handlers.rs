use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{
            AuthResponse, EmailRequest, LoginRequest, MessageResponse, PublicUser, SignupRequest,
            VerifyOtpRequest,
        },
        jwt::{AuthUser, JwtKeys},
        otp::{generate_otp, otp_expiry, otp_matches},
        password::{hash_password, verify_password},
        repo::User,
    },
    error::ApiError,
    mailer::otp_email_body,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/verify-otp", post(verify_otp))
        .route("/resend-otp", post(resend_otp))
        .route("/email-verification", post(email_verification))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/check", get(check))
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    Json(mut payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    if payload.name.trim().is_empty() {
        return Err(ApiError::Validation("name is required".into()));
    }
    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::Validation("invalid email".into()));
    }
    if payload.password.len() < 6 {
        warn!("password too short");
        return Err(ApiError::Validation(
            "password should be at least 6 characters long".into(),
        ));
    }

    if User::find_by_email(&state.db, &payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(ApiError::Validation("email already registered".into()));
    }

    let hash = hash_password(&payload.password)?;
    let otp = generate_otp();
    let expiry = otp_expiry(OffsetDateTime::now_utc(), state.config.otp_ttl_minutes);

    let user = User::create(
        &state.db,
        payload.name.trim(),
        &payload.email,
        &hash,
        &otp,
        expiry,
    )
    .await?;

    state
        .mailer
        .send(
            &user.email,
            "Your OTP Code",
            &otp_email_body(&otp, state.config.otp_ttl_minutes),
        )
        .await
        .map_err(|e| {
            warn!(error = %e, "otp mail dispatch failed");
            ApiError::Dependency("could not send verification email")
        })?;

    info!(user_id = %user.id, email = %user.email, "user signed up, otp sent");
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "verification code sent",
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn verify_otp(
    State(state): State<AppState>,
    Json(mut payload): Json<VerifyOtpRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    let user = User::find_by_email(&state.db, &payload.email)
        .await?
        .ok_or(ApiError::NotFound("user not found"))?;

    if !otp_matches(
        user.otp.as_deref(),
        user.otp_expiry,
        &payload.otp,
        OffsetDateTime::now_utc(),
    ) {
        warn!(user_id = %user.id, "otp rejected");
        return Err(ApiError::Auth("invalid otp"));
    }

    User::mark_verified(&state.db, user.id).await?;

    let token = JwtKeys::from_ref(&state).sign(user.id)?;
    info!(user_id = %user.id, "otp verified");
    Ok(Json(AuthResponse {
        token,
        user: user.into(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn resend_otp(
    State(state): State<AppState>,
    Json(payload): Json<EmailRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    issue_otp(&state, &payload.email, "Your OTP Code").await
}

#[instrument(skip(state, payload))]
pub async fn email_verification(
    State(state): State<AppState>,
    Json(payload): Json<EmailRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    issue_otp(&state, &payload.email, "Your OTP Code for Email Verification").await
}

/// Regenerates the pending OTP unconditionally and mails it. No throttling;
/// callers resend manually after a failed dispatch.
async fn issue_otp(
    state: &AppState,
    email: &str,
    subject: &str,
) -> Result<Json<MessageResponse>, ApiError> {
    let email = email.trim().to_lowercase();
    let user = User::find_by_email(&state.db, &email)
        .await?
        .ok_or(ApiError::NotFound("user not found"))?;

    let otp = generate_otp();
    let expiry = otp_expiry(OffsetDateTime::now_utc(), state.config.otp_ttl_minutes);
    User::set_otp(&state.db, user.id, &otp, expiry).await?;

    state
        .mailer
        .send(
            &user.email,
            subject,
            &otp_email_body(&otp, state.config.otp_ttl_minutes),
        )
        .await
        .map_err(|e| {
            warn!(error = %e, user_id = %user.id, "otp mail dispatch failed");
            ApiError::Dependency("could not send verification email")
        })?;

    info!(user_id = %user.id, "otp issued");
    Ok(Json(MessageResponse {
        message: "otp sent successfully",
    }))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    // One generic failure for unknown email, unverified account and bad
    // credentials, so responses cannot be used to enumerate accounts.
    const REJECT: ApiError = ApiError::Auth("invalid credentials");

    let user = User::find_by_email(&state.db, &payload.email)
        .await?
        .ok_or(REJECT)?;

    if !user.verified {
        warn!(user_id = %user.id, "login attempt on unverified account");
        return Err(REJECT);
    }

    if payload.use_otp {
        let otp = payload
            .otp
            .as_deref()
            .ok_or_else(|| ApiError::Validation("otp is required".into()))?;
        if !otp_matches(
            user.otp.as_deref(),
            user.otp_expiry,
            otp,
            OffsetDateTime::now_utc(),
        ) {
            warn!(user_id = %user.id, "otp login rejected");
            return Err(REJECT);
        }
        User::clear_otp(&state.db, user.id).await?;
    } else {
        let password = payload
            .password
            .as_deref()
            .ok_or_else(|| ApiError::Validation("password is required".into()))?;
        let hash = user.password_hash.as_deref().ok_or(REJECT)?;
        if !verify_password(password, hash)? {
            warn!(user_id = %user.id, "password login rejected");
            return Err(REJECT);
        }
    }

    let token = JwtKeys::from_ref(&state).sign(user.id)?;
    info!(user_id = %user.id, "user logged in");
    Ok(Json(AuthResponse {
        token,
        user: user.into(),
    }))
}

/// Stateless: the token is bearer-style and the client discards it.
#[instrument]
pub async fn logout() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "logged out successfully",
    })
}

#[instrument(skip(state))]
pub async fn check(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PublicUser>, ApiError> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or(ApiError::Auth("user not found"))?;
    Ok(Json(user.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation() {
        assert!(is_valid_email("alice@x.com"));
        assert!(is_valid_email("a.b+tag@sub.example.org"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("spaces in@x.com"));
        assert!(!is_valid_email("missing@tld"));
    }
}
