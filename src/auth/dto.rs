use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::repo::User;

/// Request body for signup.
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Request body for login. Password by default; when `use_otp` is set the
/// `otp` field is checked against the pending code instead.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub otp: Option<String>,
    #[serde(default)]
    pub use_otp: bool,
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub otp: String,
}

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

/// Session payload returned after verify/login.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: PublicUser,
}

/// Public part of the user returned to clients and joined into post listings.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub profile_pic: Option<String>,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            name: u.name,
            email: u.email,
            profile_pic: u.profile_pic,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_request_defaults_to_password_mode() {
        let req: LoginRequest =
            serde_json::from_str(r#"{"email":"a@x.com","password":"secret1"}"#).unwrap();
        assert!(!req.use_otp);
        assert_eq!(req.password.as_deref(), Some("secret1"));
        assert!(req.otp.is_none());
    }

    #[test]
    fn public_user_never_exposes_credentials() {
        let user = PublicUser {
            id: Uuid::new_v4(),
            name: "Alice".into(),
            email: "alice@x.com".into(),
            profile_pic: None,
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(json.contains("alice@x.com"));
        assert!(!json.contains("password"));
        assert!(!json.contains("otp"));
    }
}
