//! Transactional email over SMTP.

use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::config::SmtpConfig;

#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    #[error("Invalid email address: {0}")]
    InvalidAddress(String),
}

#[derive(Clone)]
pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl EmailService {
    /// # Errors
    ///
    /// Returns error if the relay host cannot be resolved into a transport.
    pub fn new(config: &SmtpConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.username.clone(),
            config.password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from.clone(),
        })
    }

    /// # Errors
    ///
    /// Returns error if the message cannot be built or sent.
    pub async fn send_registration_code(
        &self,
        to: &str,
        username: &str,
        code: &str,
        valid_minutes: i64,
    ) -> Result<(), EmailError> {
        let (text, html) = registration_code_bodies(username, code, valid_minutes);
        self.send_multipart_email(to, "Your Texos verification code", &text, &html)
            .await
    }

    /// # Errors
    ///
    /// Returns error if the message cannot be built or sent.
    pub async fn send_password_reset_code(
        &self,
        to: &str,
        username: &str,
        code: &str,
        valid_minutes: i64,
    ) -> Result<(), EmailError> {
        let (text, html) = password_reset_bodies(username, code, valid_minutes);
        self.send_multipart_email(to, "Reset your Texos password", &text, &html)
            .await
    }

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

        tracing::info!(to = %to, subject = %subject, "Email sent");
        Ok(())
    }
}

fn registration_code_bodies(username: &str, code: &str, valid_minutes: i64) -> (String, String) {
    let text = format!(
        "Hi {username},\n\nYour Texos verification code is {code}.\n\
         It expires in {valid_minutes} minutes.\n\n\
         If you did not try to create an account, ignore this email.\n"
    );
    let username = html_escape(username);
    let html = format!(
        "<p>Hi {username},</p>\
         <p>Your Texos verification code is <strong>{code}</strong>.</p>\
         <p>It expires in {valid_minutes} minutes.</p>\
         <p>If you did not try to create an account, ignore this email.</p>"
    );
    (text, html)
}

fn password_reset_bodies(username: &str, code: &str, valid_minutes: i64) -> (String, String) {
    let text = format!(
        "Hi {username},\n\nYour Texos password reset code is {code}.\n\
         It expires in {valid_minutes} minutes.\n\n\
         If you did not ask to reset your password, ignore this email. \
         Your password has not been changed.\n"
    );
    let username = html_escape(username);
    let html = format!(
        "<p>Hi {username},</p>\
         <p>Your Texos password reset code is <strong>{code}</strong>.</p>\
         <p>It expires in {valid_minutes} minutes.</p>\
         <p>If you did not ask to reset your password, ignore this email. \
         Your password has not been changed.</p>"
    );
    (text, html)
}

fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_code_bodies() {
        let (text, html) = registration_code_bodies("<ada>", "482913", 10);
        assert!(text.contains("482913"));
        assert!(text.contains("10 minutes"));
        assert!(html.contains("<strong>482913</strong>"));
        assert!(html.contains("&lt;ada&gt;"));
        assert!(!html.contains("<ada>"));
    }

    #[test]
    fn test_password_reset_bodies() {
        let (text, html) = password_reset_bodies("Ada & co", "105772", 10);
        assert!(text.contains("password reset code is 105772"));
        assert!(text.contains("has not been changed"));
        assert!(html.contains("<strong>105772</strong>"));
        assert!(html.contains("Ada &amp; co"));
    }
}
