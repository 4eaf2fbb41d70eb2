use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::Deserialize;

use super::{Notifier, NotifyError, Receipt};
use crate::config::AlertConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

struct Credentials {
    account_sid: String,
    auth_token: String,
}

#[derive(Debug, Deserialize)]
struct MessageResource {
    sid: String,
}

/// SMS delivery through the Twilio Messages REST API.
pub struct TwilioNotifier {
    http: HttpClient,
    credentials: Option<Credentials>,
    from: String,
    api_base: String,
}

impl TwilioNotifier {
    /// Builds a notifier from the alert config. Blank or missing credentials
    /// produce an unconfigured notifier rather than an error.
    pub fn from_config(config: &AlertConfig) -> Result<Self, NotifyError> {
        let http = HttpClient::builder().timeout(REQUEST_TIMEOUT).build()?;

        let credentials = match (config.account_sid.as_deref(), config.auth_token.as_deref()) {
            (Some(sid), Some(token)) if !sid.trim().is_empty() && !token.trim().is_empty() => {
                Some(Credentials {
                    account_sid: sid.trim().to_string(),
                    auth_token: token.trim().to_string(),
                })
            }
            _ => None,
        };

        Ok(Self {
            http,
            credentials,
            from: config.from.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Notifier for TwilioNotifier {
    fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }

    async fn send(&self, to: &str, body: &str) -> Result<Receipt, NotifyError> {
        let credentials = self.credentials.as_ref().ok_or(NotifyError::NotConfigured)?;

        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.api_base, credentials.account_sid
        );

        let response = self
            .http
            .post(&url)
            .basic_auth(&credentials.account_sid, Some(&credentials.auth_token))
            .form(&[("To", to), ("From", self.from.as_str()), ("Body", body)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| status.to_string());
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let message: MessageResource = response.json().await?;
        Ok(Receipt { id: message.sid })
    }
}
