use anyhow::Context;
use async_trait::async_trait;
use serde_json::json;

use crate::config::MailConfig;

/// Capability interface for the transactional-mail provider so the auth
/// flow can be exercised with an in-memory fake.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html: &str) -> anyhow::Result<()>;
}

pub struct HttpMailer {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    sender: String,
}

impl HttpMailer {
    pub fn new(cfg: &MailConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: cfg.api_url.clone(),
            api_key: cfg.api_key.clone(),
            sender: cfg.sender.clone(),
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, to: &str, subject: &str, html: &str) -> anyhow::Result<()> {
        let resp = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "from": self.sender,
                "to": to,
                "subject": subject,
                "html": html,
            }))
            .send()
            .await
            .context("mail provider request")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("mail provider returned {}: {}", status, body);
        }
        tracing::debug!(%to, %subject, "mail dispatched");
        Ok(())
    }
}

/// HTML body for the OTP mail. Kept deliberately small; the provider is
/// responsible for any further templating.
pub fn otp_email_body(otp: &str, valid_minutes: i64) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<body style="font-family: Verdana, sans-serif; background-color: #09090b; color: #ffffff;">
  <div style="max-width: 600px; margin: 0 auto; padding: 20px; text-align: center;">
    <h1>VERIFICATION CODE</h1>
    <p>Your One-Time Password (OTP) for verification:</p>
    <div style="font-size: 24px; font-weight: bold;">{otp}</div>
    <p>This OTP is valid for {valid_minutes} minutes.</p>
  </div>
</body>
</html>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn otp_body_embeds_code_and_window() {
        let body = otp_email_body("042137", 20);
        assert!(body.contains("042137"));
        assert!(body.contains("valid for 20 minutes"));
    }
}
