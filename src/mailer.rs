use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::EmailConfig;

/// A rendered message, ready for whatever delivers it.
#[derive(Debug, Clone, Serialize)]
pub struct Email {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: Email) -> anyhow::Result<()>;
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

pub fn verification_email(from: &str, to: &str, username: &str, link: &str) -> Email {
    let username = escape_html(username);
    let link = escape_html(link);
    let html = format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
  <h2>Welcome to Productivity Portfolio!</h2>
  <p>Hello {username},</p>
  <p>Thank you for registering. Please verify your email by opening the link below:</p>
  <p><a href="{link}">Verify Email</a></p>
  <p>{link}</p>
  <p>If you didn't create an account with us, please ignore this email.</p>
</div>"#
    );
    Email {
        from: format!("Productivity Portfolio <{from}>"),
        to: to.to_string(),
        subject: "Verify Your Email".into(),
        html,
    }
}

/// Writes messages to the log instead of delivering them.
#[derive(Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: Email) -> anyhow::Result<()> {
        info!(to = %email.to, subject = %email.subject, body = %email.html, "email not delivered (no provider configured)");
        Ok(())
    }
}

/// Hands messages to an HTTP email provider as a JSON POST.
#[derive(Clone)]
pub struct WebhookMailer {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl WebhookMailer {
    pub fn new(url: &str, token: Option<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("build email http client")?;
        Ok(Self {
            client,
            url: url.to_string(),
            token,
        })
    }
}

#[async_trait]
impl Mailer for WebhookMailer {
    async fn send(&self, email: Email) -> anyhow::Result<()> {
        let mut req = self.client.post(&self.url).json(&email);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        req.send()
            .await
            .context("email provider request")?
            .error_for_status()
            .context("email provider rejected message")?;
        info!(to = %email.to, subject = %email.subject, "email sent");
        Ok(())
    }
}

pub fn from_config(cfg: &EmailConfig) -> anyhow::Result<Arc<dyn Mailer>> {
    let mailer: Arc<dyn Mailer> = match &cfg.webhook_url {
        Some(url) => Arc::new(WebhookMailer::new(url, cfg.webhook_token.clone())?),
        None => {
            warn!("EMAIL_WEBHOOK_URL not set; verification emails will only be logged");
            Arc::new(LogMailer)
        }
    };
    Ok(mailer)
}
