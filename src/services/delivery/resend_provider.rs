//! Resend HTTP API provider.
//!
//! Sends `POST {base_url}/emails` with a Bearer key. Any 2xx counts as
//! accepted; other statuses and transport errors are reported as a refused
//! send so the queue schedules a retry. The `Idempotency-Key` header lets
//! Resend drop the duplicate when an earlier attempt did go through.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Serialize;

use super::provider::{EmailMessage, EmailProvider};
use crate::config::ResendConfig;
use crate::error::{AppError, AppResult};
use crate::external::client::{DEFAULT_CONNECT_TIMEOUT, HTTP_CLIENT, build_client};

#[derive(Debug, Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

pub struct ResendProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    request_timeout: Duration,
}

impl ResendProvider {
    /// Creates the provider; the shared client is reused unless a custom
    /// connect timeout is configured.
    pub fn new(config: &ResendConfig) -> AppResult<Self> {
        if !config.is_configured() {
            return Err(AppError::Validation {
                field: "resend.api_key".to_string(),
                reason: "Resend API key is not configured".to_string(),
            });
        }

        let connect_timeout = Duration::from_secs(config.connect_timeout_secs);
        let request_timeout = Duration::from_secs(config.request_timeout_secs);
        let client = if connect_timeout == DEFAULT_CONNECT_TIMEOUT {
            HTTP_CLIENT.clone()
        } else {
            build_client(connect_timeout, request_timeout).map_err(|e| AppError::Configuration {
                key: "resend".to_string(),
                source: anyhow::Error::from(e),
            })?
        };

        Ok(Self {
            client,
            endpoint: format!("{}/emails", config.base_url.trim_end_matches('/')),
            api_key: config.api_key.trim().to_string(),
            request_timeout,
        })
    }
}

#[async_trait]
impl EmailProvider for ResendProvider {
    async fn send(&self, message: &EmailMessage) -> AppResult<bool> {
        if message.to.trim().is_empty() || message.from.trim().is_empty() {
            tracing::warn!("Resend: sender or recipient is empty, send skipped");
            return Ok(false);
        }

        let body = SendEmailRequest {
            from: &message.from,
            to: [message.to.trim()],
            subject: &message.subject,
            html: &message.html,
        };

        let mut request = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .timeout(self.request_timeout)
            .json(&body);
        if let Some(key) = message.idempotency_key.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
            request = request.header("Idempotency-Key", key);
        }

        let started = Instant::now();
        match request.send().await {
            Ok(response) => {
                let status = response.status();
                let duration_ms = started.elapsed().as_millis() as u64;
                if status.is_success() {
                    tracing::debug!(status = status.as_u16(), duration_ms, "Resend accepted email");
                    Ok(true)
                } else {
                    let detail = response.text().await.unwrap_or_default();
                    tracing::warn!(
                        status = status.as_u16(),
                        duration_ms,
                        response = %detail.chars().take(500).collect::<String>(),
                        "Resend rejected email"
                    );
                    Ok(false)
                }
            }
            Err(e) => {
                let duration_ms = started.elapsed().as_millis() as u64;
                tracing::warn!(
                    duration_ms,
                    timeout = e.is_timeout(),
                    connect = e.is_connect(),
                    error = %e,
                    "Resend request failed"
                );
                Ok(false)
            }
        }
    }

    fn name(&self) -> &'static str {
        "resend"
    }

    /// Opens TCP/TLS to the API. A GET on `/emails` is not a valid call and
    /// its status is ignored; only transport errors are reported.
    async fn warm_up(&self) -> AppResult<()> {
        let started = Instant::now();
        let response = self
            .client
            .get(&self.endpoint)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| AppError::delivery("resend", format!("warm-up failed: {}", e)))?;

        tracing::info!(
            status = response.status().as_u16(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Resend connection warmed up"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves one canned HTTP response and hands back the raw request.
    async fn one_shot_server(status_line: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                raw.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&raw);
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text[..header_end]
                        .lines()
                        .find_map(|l| {
                            let (name, value) = l.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if raw.len() >= header_end + 4 + content_length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            let response = format!("{status_line}\r\nContent-Length: 2\r\nConnection: close\r\n\r\n{{}}");
            socket.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&raw).into_owned()
        });

        (base_url, handle)
    }

    fn config(base_url: String) -> ResendConfig {
        ResendConfig {
            api_key: "re_test_key".to_string(),
            base_url,
            ..ResendConfig::default()
        }
    }

    fn message() -> EmailMessage {
        EmailMessage {
            from: "Portfolio <onboarding@resend.dev>".to_string(),
            to: "owner@example.com".to_string(),
            subject: "Hello".to_string(),
            html: "<p>Hi</p>".to_string(),
            idempotency_key: Some("contact-notify/c-1".to_string()),
        }
    }

    #[test]
    fn test_requires_api_key() {
        assert!(ResendProvider::new(&ResendConfig::default()).is_err());
    }

    #[tokio::test]
    async fn test_send_success_posts_json() {
        let (base_url, server) = one_shot_server("HTTP/1.1 200 OK").await;
        let provider = ResendProvider::new(&config(base_url)).unwrap();

        assert!(provider.send(&message()).await.unwrap());

        let request = server.await.unwrap();
        let lower = request.to_lowercase();
        assert!(request.starts_with("POST /emails HTTP/1.1"));
        assert!(lower.contains("authorization: bearer re_test_key"));
        assert!(lower.contains("idempotency-key: contact-notify/c-1"));
        assert!(request.contains(r#""to":["owner@example.com"]"#));
        assert!(request.contains(r#""subject":"Hello""#));
    }

    #[tokio::test]
    async fn test_send_non_success_status_is_false() {
        let (base_url, server) = one_shot_server("HTTP/1.1 422 Unprocessable Entity").await;
        let provider = ResendProvider::new(&config(base_url)).unwrap();

        assert!(!provider.send(&message()).await.unwrap());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_send_transport_error_is_false() {
        // Bind then drop to get a port with nothing listening
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let provider = ResendProvider::new(&config(base_url)).unwrap();
        assert!(!provider.send(&message()).await.unwrap());
        assert!(provider.warm_up().await.is_err());
    }

    #[tokio::test]
    async fn test_empty_recipient_is_not_sent() {
        let provider = ResendProvider::new(&config("http://127.0.0.1:9".to_string())).unwrap();
        let mut message = message();
        message.to = "  ".to_string();
        assert!(!provider.send(&message).await.unwrap());
    }
}
