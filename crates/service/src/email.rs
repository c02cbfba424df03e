//! Password-reset email delivery.
//!
//! Uses SMTP via lettre for delivery with Askama HTML templates. When SMTP is
//! not configured, [`LogNotifier`] logs the reset link instead.

use askama::Template;
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;
use url::Url;

use blood_for_nepal_core::Email;

use crate::config::EmailConfig;

/// Validity of a reset link, shown in the email.
pub const RESET_LINK_VALID_MINUTES: i64 = 60;

/// HTML template for password reset email.
#[derive(Template)]
#[template(path = "email/password_reset.html")]
struct PasswordResetEmailHtml<'a> {
    reset_url: &'a str,
    valid_minutes: i64,
}

/// Plain text template for password reset email.
#[derive(Template)]
#[template(path = "email/password_reset.txt")]
struct PasswordResetEmailText<'a> {
    reset_url: &'a str,
    valid_minutes: i64,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Reset link could not be built from the base URL.
    #[error("Invalid reset link: {0}")]
    InvalidLink(#[from] url::ParseError),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// Delivers password-reset tokens to users.
#[async_trait]
pub trait ResetNotifier: Send + Sync {
    /// Send `token` to `to`.
    async fn send_reset(&self, to: &Email, token: &str) -> Result<(), EmailError>;
}

/// Build `{base}/reset-password?token=...`.
///
/// # Errors
///
/// Returns `url::ParseError` if `base` cannot be joined.
pub fn reset_link(base: &Url, token: &str) -> Result<Url, url::ParseError> {
    let mut link = base.join("reset-password")?;
    link.query_pairs_mut().clear().append_pair("token", token);
    Ok(link)
}

/// Email service for sending transactional emails.
#[derive(Clone)]
pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
    base_url: Url,
}

impl EmailService {
    /// Create a new email service from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: &EmailConfig, base_url: Url) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
            base_url,
        })
    }

    /// Send a multipart email with both plain text and HTML versions.
    async fn send_multipart_email(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), EmailError> {
        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        self.mailer.send(email).await?;
        Ok(())
    }
}

#[async_trait]
impl ResetNotifier for EmailService {
    #[tracing::instrument(skip(self, token), fields(to = %to))]
    async fn send_reset(&self, to: &Email, token: &str) -> Result<(), EmailError> {
        let link = reset_link(&self.base_url, token)?;
        let reset_url = link.as_str();
        let html = PasswordResetEmailHtml {
            reset_url,
            valid_minutes: RESET_LINK_VALID_MINUTES,
        }
        .render()?;
        let text = PasswordResetEmailText {
            reset_url,
            valid_minutes: RESET_LINK_VALID_MINUTES,
        }
        .render()?;

        self.send_multipart_email(to.as_str(), "Reset your Blood for Nepal password", &text, &html)
            .await?;
        tracing::info!("Password reset email sent");
        Ok(())
    }
}

/// Notifier used when SMTP is not configured: logs the reset link.
#[derive(Debug, Clone)]
pub struct LogNotifier {
    base_url: Url,
}

impl LogNotifier {
    #[must_use]
    pub const fn new(base_url: Url) -> Self {
        Self { base_url }
    }
}

#[async_trait]
impl ResetNotifier for LogNotifier {
    async fn send_reset(&self, to: &Email, token: &str) -> Result<(), EmailError> {
        let link = reset_link(&self.base_url, token)?;
        tracing::warn!(
            to = %to,
            link = %link,
            "SMTP not configured; password reset link not emailed"
        );
        Ok(())
    }
}
