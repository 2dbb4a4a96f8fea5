//! Email transport adapters.
//!
//! The transport itself lives outside this service. `HttpEmailSender` hands
//! each message to a mail relay over HTTP; `LogEmailSender` is used when no
//! relay is configured and only logs what would have been sent.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{error, info};

use super::BaseEmailSender;

pub const VERIFICATION_SUBJECT: &str = "Please confirm your company phone numbers";

/// Mail relay client (JSON POST, optional bearer API key)
pub struct HttpEmailSender {
    client: Client,
    relay_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct RelayMessage<'a> {
    to: &'a str,
    subject: &'a str,
    text: String,
}

impl HttpEmailSender {
    pub fn new(relay_url: String, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            relay_url,
            api_key,
        }
    }
}

#[async_trait]
impl BaseEmailSender for HttpEmailSender {
    async fn send_verification_email(
        &self,
        to_address: &str,
        employee_name: &str,
        verification_link: &str,
    ) -> Result<()> {
        let message = RelayMessage {
            to: to_address,
            subject: VERIFICATION_SUBJECT,
            text: render_body(employee_name, verification_link),
        };

        let mut request = self.client.post(&self.relay_url).json(&message);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(to = %to_address, status = %status, "mail relay rejected message");
            anyhow::bail!("mail relay error {}: {}", status, body);
        }

        info!(to = %to_address, "verification email handed to relay");
        Ok(())
    }
}

/// Development sender: logs instead of delivering.
#[derive(Default)]
pub struct LogEmailSender;

#[async_trait]
impl BaseEmailSender for LogEmailSender {
    async fn send_verification_email(
        &self,
        to_address: &str,
        employee_name: &str,
        verification_link: &str,
    ) -> Result<()> {
        info!(
            to = %to_address,
            employee = %employee_name,
            link = %verification_link,
            "email relay not configured; verification email logged only"
        );
        Ok(())
    }
}

fn render_body(employee_name: &str, verification_link: &str) -> String {
    format!(
        "Hello {},\n\n\
         Please review the company phone numbers currently registered to you and \
         confirm or report any problems:\n\n{}\n\n\
         You can reopen the link to change your answers until it expires.\n",
        employee_name, verification_link
    )
}
