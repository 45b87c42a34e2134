use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub ttl_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    pub api_url: String,
    pub api_key: String,
    pub sender: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub mail: MailConfig,
    pub storage: StorageConfig,
    pub otp_ttl_minutes: i64,
    /// Posts older than this many days are swept; 0 disables the sweep.
    pub post_retention_days: i32,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            ttl_days: std::env::var("JWT_TTL_DAYS")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(7),
        };
        let mail = MailConfig {
            api_url: std::env::var("MAIL_API_URL")?,
            api_key: std::env::var("MAIL_API_KEY")?,
            sender: std::env::var("MAIL_SENDER")
                .unwrap_or_else(|_| "OT-Housing <no-reply@othousing.app>".into()),
        };
        let storage = StorageConfig {
            endpoint: std::env::var("S3_ENDPOINT")?,
            bucket: std::env::var("S3_BUCKET")?,
            access_key: std::env::var("S3_ACCESS_KEY")?,
            secret_key: std::env::var("S3_SECRET_KEY")?,
            region: std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".into()),
        };
        let otp_ttl_minutes = std::env::var("OTP_TTL_MINUTES")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(20);
        let post_retention_days = std::env::var("POST_RETENTION_DAYS")
            .ok()
            .and_then(|v| v.parse::<i32>().ok())
            .unwrap_or(30);
        Ok(Self {
            database_url,
            jwt,
            mail,
            storage,
            otp_ttl_minutes,
            post_retention_days,
        })
    }
}
