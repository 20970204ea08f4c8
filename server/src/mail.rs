use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{info, warn};

use taskdeck_core::config::{MailConfig, MailProvider};

const RESEND_EMAILS_URL: &str = "https://api.resend.com/emails";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvitationMail {
    pub to: String,
    pub inviter_name: String,
    pub workspace_name: String,
    pub link: String,
}

impl InvitationMail {
    pub fn subject(&self) -> String {
        format!(
            "{} invited you to join {}",
            self.inviter_name, self.workspace_name
        )
    }

    /// The link with its token masked, for logs.
    pub fn redacted_link(&self) -> String {
        match self.link.split_once("token=") {
            Some((prefix, _)) => format!("{prefix}token=<redacted>"),
            None => self.link.clone(),
        }
    }

    pub fn text_body(&self) -> String {
        format!(
            "{inviter} has invited you to collaborate in the workspace \"{workspace}\".\n\n\
             Accept the invitation: {link}\n\n\
             If you were not expecting this invitation, you can ignore this email.",
            inviter = self.inviter_name,
            workspace = self.workspace_name,
            link = self.link,
        )
    }

    pub fn html_body(&self) -> String {
        format!(
            "<p><strong>{inviter}</strong> has invited you to collaborate in the workspace \
             <strong>{workspace}</strong>.</p>\
             <p><a href=\"{link}\">Accept invitation</a></p>\
             <p>If you were not expecting this invitation, you can ignore this email.</p>",
            inviter = escape_html(&self.inviter_name),
            workspace = escape_html(&self.workspace_name),
            link = escape_html(&self.link),
        )
    }
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_invitation(&self, mail: &InvitationMail) -> Result<()>;
}

pub type MailerRef = Arc<dyn Mailer>;

/// Writes the invitation to the log instead of delivering it.
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_invitation(&self, mail: &InvitationMail) -> Result<()> {
        info!(
            to = %mail.to,
            subject = %mail.subject(),
            link = %mail.redacted_link(),
            "invitation mail (log provider)"
        );
        Ok(())
    }
}

pub struct ResendMailer {
    client: Client,
    api_key: String,
    from: String,
}

impl ResendMailer {
    pub fn new(client: Client, api_key: String, from: String) -> Self {
        Self {
            client,
            api_key,
            from,
        }
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send_invitation(&self, mail: &InvitationMail) -> Result<()> {
        let response = self
            .client
            .post(RESEND_EMAILS_URL)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "from": self.from,
                "to": [mail.to],
                "subject": mail.subject(),
                "html": mail.html_body(),
                "text": mail.text_body(),
            }))
            .send()
            .await
            .context("send invitation mail")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("mail provider responded with {status}: {body}"));
        }

        Ok(())
    }
}

pub fn build_mailer(config: &MailConfig) -> MailerRef {
    match config.provider {
        MailProvider::Log => Arc::new(LogMailer),
        MailProvider::Resend => match config.api_key.as_deref() {
            Some(api_key) => {
                let client = Client::builder()
                    .user_agent(format!("taskdeck-server/{}", env!("CARGO_PKG_VERSION")))
                    .timeout(config.timeout())
                    .build();
                match client {
                    Ok(client) => Arc::new(ResendMailer::new(
                        client,
                        api_key.to_owned(),
                        config.from.clone(),
                    )),
                    Err(error) => {
                        warn!(?error, "failed to build mail http client; invitations will only be logged");
                        Arc::new(LogMailer)
                    }
                }
            }
            None => {
                warn!("resend mail provider selected without an api key; invitations will only be logged");
                Arc::new(LogMailer)
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> InvitationMail {
        InvitationMail {
            to: "bob@example.com".into(),
            inviter_name: "Alice".into(),
            workspace_name: "R&D <core>".into(),
            link: "http://localhost:3000/invite?token=abc".into(),
        }
    }

    #[test]
    fn subject_names_inviter_and_workspace() {
        assert_eq!(sample().subject(), "Alice invited you to join R&D <core>");
    }

    #[test]
    fn html_body_escapes_user_supplied_names() {
        let html = sample().html_body();
        assert!(html.contains("R&amp;D &lt;core&gt;"));
        assert!(html.contains("href=\"http://localhost:3000/invite?token=abc\""));
        assert!(sample().text_body().contains("invite?token=abc"));
    }

    #[test]
    fn redacted_link_hides_the_token() {
        let redacted = sample().redacted_link();
        assert_eq!(redacted, "http://localhost:3000/invite?token=<redacted>");
        assert!(!redacted.contains("abc"));
    }

    #[tokio::test]
    async fn log_mailer_always_succeeds() {
        LogMailer.send_invitation(&sample()).await.unwrap();
    }
}
