//! `send_email`: outbound mail through the Resend HTTP API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::{self, AgentError};
use crate::tool::{
    ParamType, Tool, ToolArgs, ToolCategory, ToolError, ToolOutput, ToolParameter, ToolResult,
    ToolSpec,
};

pub const SEND_EMAIL: &str = "send_email";

/// Resend's message endpoint.
pub const RESEND_API_URL: &str = "https://api.resend.com/emails";
/// Sender used when none is configured.
pub const DEFAULT_FROM_EMAIL: &str = "noreply@koma-ai.app";

const SEND_TIMEOUT_SECS: u64 = 10;

/// One outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Delivers an [`EmailMessage`]. Returns the provider's message id.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> error::Result<String>;
}

// ---------------------------------------------------------------------------
// Resend
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ResendMailer {
    api_key: String,
    from: String,
    endpoint: String,
    http: reqwest::Client,
}

impl ResendMailer {
    /// Build a mailer. Fails when the API key is empty; an empty `from`
    /// falls back to [`DEFAULT_FROM_EMAIL`].
    pub fn new(api_key: impl Into<String>, from: impl Into<String>) -> error::Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(AgentError::MissingApiKey {
                provider: "resend".into(),
            });
        }
        let from = from.into();
        let from = if from.trim().is_empty() {
            DEFAULT_FROM_EMAIL.to_owned()
        } else {
            from
        };

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(SEND_TIMEOUT_SECS))
            .build()
            .map_err(|e| AgentError::EmailDeliveryFailed {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            api_key,
            from,
            endpoint: RESEND_API_URL.into(),
            http,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn from_address(&self) -> &str {
        &self.from
    }
}

#[async_trait]
impl EmailSender for ResendMailer {
    async fn send(&self, message: &EmailMessage) -> error::Result<String> {
        let body = json!({
            "from": self.from,
            "to": [message.to],
            "subject": message.subject,
            "html": message.html,
            "text": message.text,
        });

        tracing::debug!(to = %message.to, from = %self.from, "sending email via resend");

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AgentError::EmailDeliveryFailed {
                reason: format!("resend request error: {e}"),
            })?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| AgentError::EmailDeliveryFailed {
                reason: format!("failed to read response body: {e}"),
            })?;

        if !status.is_success() {
            return Err(AgentError::EmailDeliveryFailed {
                reason: format!("resend returned {status}: {text}"),
            });
        }

        let id = serde_json::from_str::<Value>(&text)
            .ok()
            .and_then(|v| v["id"].as_str().map(str::to_owned))
            .unwrap_or_default();
        tracing::info!(to = %message.to, id = %id, "email sent");
        Ok(id)
    }
}

// ---------------------------------------------------------------------------
// Tool
// ---------------------------------------------------------------------------

/// Sends a plain-text body wrapped in the branded HTML template.
pub struct EmailTool {
    spec: ToolSpec,
    sender: Option<Arc<dyn EmailSender>>,
}

impl EmailTool {
    pub fn new(sender: Option<Arc<dyn EmailSender>>) -> Self {
        let spec = ToolSpec::new(
            SEND_EMAIL,
            "Send an email to a specified recipient. Use ONLY when the user explicitly asks \
             to send an email. Requires email address and content.",
            ToolCategory::Communication,
        )
        .param(ToolParameter::required(
            "to_email",
            ParamType::String,
            "Recipient email address",
        ))
        .param(ToolParameter::required(
            "subject",
            ParamType::String,
            "Email subject line",
        ))
        .param(ToolParameter::required(
            "body",
            ParamType::String,
            "Email body content (plain text)",
        ))
        .confirmation_required();

        Self { spec, sender }
    }
}

/// `local@domain.tld`, with no whitespace and a dot inside the domain.
fn is_plausible_address(address: &str) -> bool {
    if address.chars().any(char::is_whitespace) {
        return false;
    }
    match address.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .split_once('.')
                    .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
        }
        None => false,
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
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

fn render_html(body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"></head>
<body style="margin:0;padding:0;background:#0a0a0f;font-family:'Segoe UI',Roboto,sans-serif;">
  <div style="max-width:560px;margin:40px auto;padding:32px;background:linear-gradient(145deg,#13131a,#1a1a2e);border-radius:16px;border:1px solid rgba(99,102,241,0.2);">
    <div style="text-align:center;margin-bottom:24px;">
      <h1 style="color:#e2e8f0;font-size:20px;margin:0;">minimal.ai</h1>
    </div>
    <div style="color:#cbd5e1;font-size:15px;line-height:1.7;white-space:pre-wrap;">{}</div>
    <p style="color:#64748b;font-size:12px;text-align:center;margin:24px 0 0;">Sent by minimal.ai agent</p>
  </div>
</body>
</html>"#,
        escape_html(body)
    )
}

#[async_trait]
impl Tool for EmailTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, args: &ToolArgs) -> Result<ToolOutput, ToolError> {
        let to = args.require_text("to_email")?.trim();
        let subject = args.require_text("subject")?.trim();
        let body = args.require_text("body")?;

        if !is_plausible_address(to) {
            return Err(ToolError::InvalidArgument {
                name: "to_email".into(),
                reason: format!("`{to}` is not a valid email address"),
            });
        }
        if subject.contains(['\r', '\n']) {
            return Err(ToolError::InvalidArgument {
                name: "subject".into(),
                reason: "must be a single line".into(),
            });
        }

        let sender = self.sender.as_ref().ok_or_else(|| ToolError::NotConfigured {
            what: "email delivery".into(),
        })?;

        let message = EmailMessage {
            to: to.to_owned(),
            subject: subject.to_owned(),
            html: render_html(body),
            text: body.to_owned(),
        };

        let result = match sender.send(&message).await {
            Ok(_) => ToolResult::ok(format!("Email sent to {to} with subject: {subject}"))
                .with_meta("to", to)
                .with_meta("subject", subject),
            Err(e) => ToolResult::failure(format!("Email sending failed: {e}")),
        };
        Ok(result.into())
    }
}
