use std::time::Duration;

use anyhow::Context;

use reqwest::{Client, StatusCode};

use serde::{Deserialize, Serialize};

use secrecy::Secret;

use url::Url;

use crate::domain::EmailAddress;

const POSTMARK_TOKEN_HEADER: &str = "X-Postmark-Server-Token";
/// Postmark metadata key carrying the notification's idempotency key
const IDEMPOTENCY_METADATA_KEY: &str = "idempotency_key";

/// Which Postmark message stream an email goes out on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageStream {
    /// Booking emails to customers
    Customer,
    /// Alerts that need a person to act
    Operator,
}

impl MessageStream {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "outbound",
            Self::Operator => "operator-alerts",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error(transparent)]
    Request(#[from] reqwest::Error),
    /// Postmark refused the message itself, e.g. an inactive recipient
    #[error("Postmark rejected the email ({code}): {message}")]
    Rejected { code: i64, message: String },
}

impl EmailError {
    /// Resending will not change the outcome
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}

/// Booking notification emails over the Postmark REST API
#[derive(Debug)]
pub struct EmailClient {
    client: Client,
    sender: EmailAddress,

    api_send_email_url: Url,
    api_auth_token: Secret<String>,
}

impl EmailClient {
    pub fn new(
        sender: EmailAddress,
        api_timeout: Duration,
        api_base_url: Url,
        api_auth_token: Secret<String>,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(api_timeout)
            .build()
            .context("Failed to build http client")?;

        let api_send_email_url = api_base_url
            .join("email")
            .context("Failed to create send email endpoint URL")?;

        Ok(Self {
            client,
            sender,
            api_send_email_url,
            api_auth_token,
        })
    }

    /// Send `email`. Postmark answers 422 with an error code for messages it will never
    /// accept; those come back as [`EmailError::Rejected`].
    #[tracing::instrument(
        name = "Send an email via API",
        skip(self, email),
        fields(recipient = %email.recipient, tag = %email.tag, stream = email.stream.as_str())
    )]
    pub async fn send(&self, email: &Email) -> Result<(), EmailError> {
        use secrecy::ExposeSecret;

        let body = email.as_request(&self.sender);

        let response = self
            .client
            .post(self.api_send_email_url.clone())
            .header(POSTMARK_TOKEN_HEADER, self.api_auth_token.expose_secret())
            .json(&body)
            .send()
            .await?;

        if response.status() == StatusCode::UNPROCESSABLE_ENTITY {
            let rejection: PostmarkRejection = response.json().await?;
            return Err(EmailError::Rejected {
                code: rejection.error_code,
                message: rejection.message,
            });
        }
        response.error_for_status()?;
        Ok(())
    }
}

/// One notification email
#[derive(Debug, Clone, PartialEq)]
pub struct Email {
    pub recipient: EmailAddress,
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
    /// Groups messages by notification kind in Postmark's activity views
    pub tag: String,
    pub stream: MessageStream,
    /// Lets a redelivered notification be traced back to the first send
    pub idempotency_key: String,
}

impl Email {
    fn as_request<'e>(&'e self, sender: &'e EmailAddress) -> SendEmailRequest<'e> {
        SendEmailRequest {
            to: self.recipient.as_ref(),
            from: sender.as_ref(),
            subject: &self.subject,
            html_body: &self.html_body,
            text_body: &self.text_body,
            tag: &self.tag,
            message_stream: self.stream.as_str(),
            metadata: [(IDEMPOTENCY_METADATA_KEY, self.idempotency_key.as_str())]
                .into_iter()
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct SendEmailRequest<'a> {
    to: &'a str,
    from: &'a str,
    subject: &'a str,
    html_body: &'a str,
    text_body: &'a str,
    tag: &'a str,
    message_stream: &'a str,
    metadata: std::collections::BTreeMap<&'a str, &'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PostmarkRejection {
    error_code: i64,
    message: String,
}
