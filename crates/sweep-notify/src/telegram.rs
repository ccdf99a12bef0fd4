use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sweep_core::{Notifier, NotifyError};
use tracing::{debug, info};

use crate::config::TelegramConfig;

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

#[derive(Deserialize)]
struct ApiResponse {
    #[serde(default = "default_ok")]
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

fn default_ok() -> bool {
    true
}

/// Sends run summaries to a Telegram chat through the Bot API.
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    cfg: TelegramConfig,
    client: reqwest::Client,
}

impl TelegramNotifier {
    pub fn new(cfg: TelegramConfig) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(cfg.timeout)
            .build()
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        Ok(Self { cfg, client })
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, message: &str) -> Result<(), NotifyError> {
        debug!(chat_id = %self.cfg.chat_id, "sending telegram notification");

        let response = self
            .client
            .post(self.cfg.send_message_url())
            .json(&SendMessage {
                chat_id: &self.cfg.chat_id,
                text: message,
            })
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status.as_u16()));
        }

        // A 2xx body that does not parse is treated as delivered.
        let body = response.text().await.unwrap_or_default();
        if let Ok(api) = serde_json::from_str::<ApiResponse>(&body)
            && !api.ok
        {
            return Err(NotifyError::Rejected(
                api.description.unwrap_or_else(|| "ok=false".to_string()),
            ));
        }

        info!(chat_id = %self.cfg.chat_id, "sent telegram notification");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, extract::Path, http::StatusCode, routing::post};
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tokio::sync::Mutex;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn notifier(url: String) -> TelegramNotifier {
        TelegramNotifier::new(TelegramConfig::new("123:abc", "-1001").with_api_url(url)).unwrap()
    }

    #[tokio::test]
    async fn posts_chat_id_and_text() {
        let seen: Arc<Mutex<Option<(String, Value)>>> = Arc::default();
        let sink = seen.clone();
        let app = Router::new().route(
            "/{bot}/sendMessage",
            post(move |Path(bot): Path<String>, Json(body): Json<Value>| {
                let sink = sink.clone();
                async move {
                    *sink.lock().await = Some((bot, body));
                    Json(json!({"ok": true, "result": {}}))
                }
            }),
        );

        notifier(serve(app).await).send("hello").await.unwrap();

        let (bot, body) = seen.lock().await.clone().unwrap();
        assert_eq!(bot, "bot123:abc");
        assert_eq!(body, json!({"chat_id": "-1001", "text": "hello"}));
    }

    #[tokio::test]
    async fn non_2xx_is_status_error() {
        let app = Router::new().route(
            "/{bot}/sendMessage",
            post(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }),
        );

        let err = notifier(serve(app).await).send("x").await.unwrap_err();
        assert!(matches!(err, NotifyError::Status(502)));
    }

    #[tokio::test]
    async fn ok_false_is_rejected() {
        let app = Router::new().route(
            "/{bot}/sendMessage",
            post(|| async { Json(json!({"ok": false, "description": "chat not found"})) }),
        );

        let err = notifier(serve(app).await).send("x").await.unwrap_err();
        assert!(matches!(err, NotifyError::Rejected(d) if d == "chat not found"));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_transport_error() {
        let err = notifier("http://127.0.0.1:1".into()).send("x").await.unwrap_err();
        assert!(matches!(err, NotifyError::Transport(_)));
    }

    #[test]
    fn debug_redacts_token() {
        let cfg = TelegramConfig::new("secret-token", "1");
        assert!(!format!("{cfg:?}").contains("secret-token"));
    }
}
