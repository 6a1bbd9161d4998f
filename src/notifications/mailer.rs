// src/notifications/mailer.rs

//! The outbound mail seam (SPEC_FULL §4.13). `Mailer` is the trait
//! boundary; `SmtpMailer` is the one real implementation, built only
//! with the `smtp` feature; `NullMailer` is the degraded mode used
//! whenever SMTP is unconfigured, mirroring the teacher's pattern of a
//! null collaborator standing in for an unconfigured external system.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::SmtpConfig;
use crate::error::{Error, Result};

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

/// Logs and returns `Ok` — delivery failures here are swallowed per the
/// `NotificationDeliveryFailure` category (spec §7), so not sending at
/// all is itself a valid degraded mode.
pub struct NullMailer;

#[async_trait]
impl Mailer for NullMailer {
    async fn send(&self, to: &str, subject: &str, _body: &str) -> Result<()> {
        info!(to, subject, "smtp not configured, dropping notification email");
        Ok(())
    }
}

#[cfg(feature = "smtp")]
pub struct SmtpMailer {
    transport: lettre::AsyncSmtpTransport<lettre::Tokio1Executor>,
    from_address: String,
}

#[cfg(feature = "smtp")]
impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let relay = config
            .relay
            .as_deref()
            .ok_or_else(|| Error::precondition("smtp relay not configured"))?;
        let from_address = config
            .from_address
            .clone()
            .ok_or_else(|| Error::precondition("smtp from_address not configured"))?;

        let mut builder = lettre::AsyncSmtpTransport::<lettre::Tokio1Executor>::relay(relay)
            .map_err(|e| Error::worker_external(format!("smtp relay setup failed: {e}")))?;

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(lettre::transport::smtp::authentication::Credentials::new(
                username.clone(),
                password.clone(),
            ));
        }

        Ok(Self { transport: builder.build(), from_address })
    }
}

#[cfg(feature = "smtp")]
#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        use lettre::AsyncTransport;

        let message = lettre::Message::builder()
            .from(self.from_address.parse().map_err(|e| Error::worker_external(format!("invalid from address: {e}")))?)
            .to(to.parse().map_err(|e| Error::worker_external(format!("invalid recipient address: {e}")))?)
            .subject(subject)
            .body(body.to_string())
            .map_err(|e| Error::worker_external(format!("failed to build message: {e}")))?;

        match self.transport.send(message).await {
            Ok(_) => Ok(()),
            Err(e) => {
                warn!(to, error = %e, "smtp delivery failed");
                Err(Error::worker_external(e))
            }
        }
    }
}

/// Build the configured mailer: `SmtpMailer` when the `smtp` feature is
/// compiled in and a relay is configured, `NullMailer` otherwise.
pub fn build(_config: &SmtpConfig) -> std::sync::Arc<dyn Mailer> {
    #[cfg(feature = "smtp")]
    {
        if _config.relay.is_some() {
            match SmtpMailer::new(_config) {
                Ok(mailer) => return std::sync::Arc::new(mailer),
                Err(e) => warn!(error = %e, "failed to build smtp mailer, falling back to null mailer"),
            }
        }
    }
    std::sync::Arc::new(NullMailer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_mailer_always_succeeds() {
        let mailer = NullMailer;
        mailer.send("a@studio.example", "subject", "body").await.unwrap();
    }
}
