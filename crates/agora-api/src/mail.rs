use anyhow::{Context, Result};
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tracing::info;

use crate::config::Config;

/// Outbound mail. Without a configured SMTP host (local development) the
/// verification link is logged instead of sent, so registration still
/// completes end to end.
pub struct Mailer {
    smtp_host: Option<String>,
    smtp_port: u16,
    username: String,
    password: String,
    from: String,
    public_url: String,
}

impl Mailer {
    pub fn from_config(config: &Config) -> Self {
        Self {
            smtp_host: config.smtp_host.clone(),
            smtp_port: config.smtp_port,
            username: config.smtp_username.clone(),
            password: config.smtp_password.clone(),
            from: config.mail_from.clone(),
            public_url: config.public_url.clone(),
        }
    }

    /// Blocking; call from the blocking pool.
    pub fn send_verification_email(&self, to: &str, token: &str) -> Result<()> {
        let verification_url = format!("{}/auth/verify?token={}", self.public_url, token);

        let Some(host) = &self.smtp_host else {
            info!("SMTP not configured; verification link for {}: {}", to, verification_url);
            return Ok(());
        };

        let message = Message::builder()
            .from(self.from.parse().context("invalid from address")?)
            .to(to.parse().context("invalid recipient address")?)
            .subject("Confirm your email address")
            .header(ContentType::TEXT_HTML)
            .body(verification_body(&verification_url))?;

        let mailer = SmtpTransport::starttls_relay(host)?
            .port(self.smtp_port)
            .credentials(Credentials::new(self.username.clone(), self.password.clone()))
            .build();

        let response = mailer.send(&message)?;
        info!("verification mail sent to {}: {:?}", to, response.code());
        Ok(())
    }
}

fn verification_body(url: &str) -> String {
    format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
  <h2>Confirm your email address</h2>
  <p>Click the link below to finish setting up your account.</p>
  <p><a href="{url}">Confirm email address</a></p>
  <p>The link is valid for 24 hours. If you did not create an account,
  you can ignore this message.</p>
</div>"#
    )
}
