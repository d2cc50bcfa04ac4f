//! WhatsApp Business Cloud API gateway.
//!
//! Sends pre-approved template messages through the Graph API.
//! Requires: Access Token + Phone Number ID from Meta Business Suite.

use std::time::Duration;

use async_trait::async_trait;
use reminder_core::config::WhatsAppConfig;
use reminder_core::error::{ReminderError, Result};
use reminder_core::traits::MessageGateway;
use reminder_core::types::{SendOutcome, TemplateMessage, WhatsAppCredentials};
use serde_json::{Value, json};

/// Template-message sender for the WhatsApp Cloud API.
pub struct WhatsAppGateway {
    client: reqwest::Client,
    api_base_url: String,
    graph_version: String,
}

impl WhatsAppGateway {
    pub fn new(config: &WhatsAppConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs.max(1)))
            .build()
            .map_err(|e| ReminderError::Gateway(format!("HTTP client init failed: {e}")))?;
        Ok(Self {
            client,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            graph_version: config.graph_version.clone(),
        })
    }

    fn messages_url(&self, phone_number_id: &str) -> String {
        format!(
            "{}/{}/{}/messages",
            self.api_base_url, self.graph_version, phone_number_id
        )
    }
}

/// Graph API request body for a template message.
pub fn build_payload(message: &TemplateMessage) -> Value {
    let mut template = json!({
        "name": message.template_name,
        "language": { "code": message.template_language },
    });

    if !message.body_params.is_empty() {
        let parameters: Vec<Value> = message
            .body_params
            .iter()
            .map(|text| json!({ "type": "text", "text": text }))
            .collect();
        template["components"] = json!([{ "type": "body", "parameters": parameters }]);
    }

    json!({
        "messaging_product": "whatsapp",
        "to": message.phone,
        "type": "template",
        "template": template,
    })
}

/// Turn an HTTP status and body into a send outcome.
///
/// Non-2xx bodies are kept as JSON when they parse, else as raw text.
pub fn parse_response(success: bool, body: &str) -> SendOutcome {
    let parsed: Option<Value> = serde_json::from_str(body).ok();

    if !success {
        let error = match parsed {
            Some(v) => v.get("error").cloned().unwrap_or(v),
            None => Value::String(body.to_string()),
        };
        return SendOutcome::Failed { error };
    }

    let message_id = parsed
        .as_ref()
        .and_then(|v| v["messages"][0]["id"].as_str())
        .map(str::to_string);
    SendOutcome::Sent { message_id }
}

#[async_trait]
impl MessageGateway for WhatsAppGateway {
    fn name(&self) -> &str {
        "whatsapp"
    }

    async fn send_template(
        &self,
        credentials: &WhatsAppCredentials,
        message: &TemplateMessage,
    ) -> SendOutcome {
        if credentials.access_token.trim().is_empty() {
            return SendOutcome::failed("WhatsApp access_token not configured");
        }
        if credentials.phone_number_id.trim().is_empty() {
            return SendOutcome::failed("WhatsApp phone_number_id not configured");
        }

        let url = self.messages_url(&credentials.phone_number_id);
        let response = match self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", credentials.access_token))
            .json(&build_payload(message))
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("WhatsApp API request failed: {e}");
                return SendOutcome::failed(format!("WhatsApp API request failed: {e}"));
            }
        };

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let outcome = parse_response(status.is_success(), &body);

        match &outcome {
            SendOutcome::Sent { message_id } => tracing::debug!(
                "WhatsApp template sent: {} → {}",
                message_id.as_deref().unwrap_or("unknown"),
                message.phone
            ),
            SendOutcome::Failed { error } => {
                tracing::warn!("WhatsApp API error {status}: {error}")
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn message(params: &[&str]) -> TemplateMessage {
        TemplateMessage {
            phone: "905551112233".into(),
            template_name: "muayene_hatirlatma".into(),
            template_language: "tr".into(),
            body_params: params.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn creds() -> WhatsAppCredentials {
        WhatsAppCredentials {
            access_token: "EAAG-test".into(),
            phone_number_id: "10987".into(),
            ..Default::default()
        }
    }

    fn gateway(base: &str) -> WhatsAppGateway {
        WhatsAppGateway::new(&WhatsAppConfig {
            api_base_url: base.into(),
            request_timeout_secs: 5,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_payload_with_params() {
        let payload = build_payload(&message(&["Ali", "34 ABC 123", "17.10.2026"]));
        assert_eq!(payload["messaging_product"], "whatsapp");
        assert_eq!(payload["to"], "905551112233");
        assert_eq!(payload["type"], "template");
        assert_eq!(payload["template"]["name"], "muayene_hatirlatma");
        assert_eq!(payload["template"]["language"]["code"], "tr");
        let params = &payload["template"]["components"][0]["parameters"];
        assert_eq!(payload["template"]["components"][0]["type"], "body");
        assert_eq!(params[0]["text"], "Ali");
        assert_eq!(params[1]["text"], "34 ABC 123");
        assert_eq!(params[2]["text"], "17.10.2026");
        assert_eq!(params[2]["type"], "text");
    }

    #[test]
    fn test_payload_without_params_omits_components() {
        let payload = build_payload(&message(&[]));
        assert!(payload["template"].get("components").is_none());
    }

    #[test]
    fn test_parse_success_and_errors() {
        let ok = parse_response(true, r#"{"messages":[{"id":"wamid.ABC"}]}"#);
        assert_eq!(
            ok,
            SendOutcome::Sent {
                message_id: Some("wamid.ABC".into())
            }
        );

        let api_err = parse_response(
            false,
            r#"{"error":{"message":"Invalid parameter","code":100}}"#,
        );
        match api_err {
            SendOutcome::Failed { error } => assert_eq!(error["code"], 100),
            other => panic!("expected failure, got {other:?}"),
        }

        let raw = parse_response(false, "Bad Gateway");
        assert_eq!(raw, SendOutcome::failed("Bad Gateway"));
    }

    #[test]
    fn test_messages_url() {
        let gw = gateway("https://graph.facebook.com/");
        assert_eq!(
            gw.messages_url("10987"),
            "https://graph.facebook.com/v24.0/10987/messages"
        );
    }

    #[tokio::test]
    async fn test_missing_credentials_fail_without_request() {
        // Nothing listens here; a request would surface as a transport error string instead.
        let gw = gateway("http://127.0.0.1:9");
        let outcome = gw
            .send_template(&WhatsAppCredentials::default(), &message(&["Ali"]))
            .await;
        assert_eq!(
            outcome,
            SendOutcome::failed("WhatsApp access_token not configured")
        );
    }

    #[tokio::test]
    async fn test_transport_error_is_failed_outcome() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let outcome = gateway(&format!("http://{addr}"))
            .send_template(&creds(), &message(&["Ali"]))
            .await;
        assert!(!outcome.is_sent());
    }

    /// Serve one canned HTTP response after reading the full request.
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = sock.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&buf).to_string();
                if let Some(end) = text.find("\r\n\r\n") {
                    let len = text[..end]
                        .lines()
                        .find_map(|l| {
                            l.to_ascii_lowercase()
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap_or(0))
                        })
                        .unwrap_or(0);
                    if buf.len() >= end + 4 + len {
                        break;
                    }
                }
            }
            let response = format!(
                "{status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            sock.write_all(response.as_bytes()).await.unwrap();
            sock.shutdown().await.ok();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_send_success_over_http() {
        let base = serve_once("HTTP/1.1 200 OK", r#"{"messages":[{"id":"wamid.OK1"}]}"#).await;
        let outcome = gateway(&base)
            .send_template(&creds(), &message(&["Ali", "34 ABC 1", "17.10.2026"]))
            .await;
        assert_eq!(
            outcome,
            SendOutcome::Sent {
                message_id: Some("wamid.OK1".into())
            }
        );
    }

    #[tokio::test]
    async fn test_send_provider_error_over_http() {
        let base = serve_once(
            "HTTP/1.1 400 Bad Request",
            r#"{"error":{"message":"Template not found","code":132001}}"#,
        )
        .await;
        let outcome = gateway(&base)
            .send_template(&creds(), &message(&["Ali"]))
            .await;
        match outcome {
            SendOutcome::Failed { error } => assert_eq!(error["code"], 132001),
            other => panic!("expected failure, got {other:?}"),
        }
    }
}
