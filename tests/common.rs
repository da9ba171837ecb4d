#![allow(dead_code)]

use appmo_relay::api::{MgmtState, app_router, mgmt_router};
use appmo_relay::config::{
    AuthConfig, Config, LogFormat, RateLimitConfig, ServerConfig, TelemetryConfig, WsConfig,
};
use appmo_relay::domain::{ClientEvent, ServerEvent};
use appmo_relay::services::auth::issue_jwt;
use appmo_relay::services::message_service::MessageService;
use appmo_relay::services::relay::RelayService;
use appmo_relay::storage::MemoryStore;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::{Arc, Once};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

static INIT: Once = Once::new();

pub fn setup_tracing() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "warn".into())
            .add_directive("appmo_relay=debug".parse().unwrap())
            .add_directive("tower=warn".parse().unwrap())
            .add_directive("hyper=warn".parse().unwrap())
            .add_directive("reqwest=warn".parse().unwrap())
            .add_directive("tungstenite=warn".parse().unwrap());

        tracing_subscriber::fmt().with_env_filter(filter).init();
    });
}

pub fn get_test_config() -> Config {
    Config {
        database_url: "postgres://unused-in-tests".to_string(),
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            mgmt_port: 0,
            request_timeout_secs: 30,
            shutdown_timeout_secs: 5,
        },
        auth: AuthConfig { jwt_secret: "test_secret".to_string(), access_token_ttl_secs: 900 },
        rate_limit: RateLimitConfig { per_second: 10000, burst: 10000 },
        websocket: WsConfig {
            outbound_buffer_size: 32,
            room_channel_capacity: 64,
            room_gc_interval_secs: 60,
        },
        telemetry: TelemetryConfig { log_format: LogFormat::Text },
    }
}

pub struct TestApp {
    pub server_url: String,
    pub ws_url: String,
    pub mgmt_url: String,
    pub client: reqwest::Client,
    pub config: Config,
    pub shutdown_tx: watch::Sender<bool>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with_config(get_test_config()).await
    }

    pub async fn spawn_with_config(config: Config) -> Self {
        setup_tracing();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let message_service = MessageService::new(Arc::new(MemoryStore::new()));
        let relay = RelayService::new(&config.websocket);
        relay.spawn_gc(config.websocket.room_gc_interval_secs, shutdown_rx.clone());

        let router = app_router(config.clone(), message_service.clone(), relay, shutdown_rx.clone());
        let mgmt = mgmt_router(MgmtState { message_service });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind api listener");
        let addr = listener.local_addr().expect("api addr");

        let mgmt_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind mgmt listener");
        let mgmt_addr = mgmt_listener.local_addr().expect("mgmt addr");

        let mut api_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
                .with_graceful_shutdown(async move {
                    let _ = api_rx.wait_for(|&s| s).await;
                })
                .await
                .expect("api server");
        });

        let mut mgmt_rx = shutdown_rx;
        tokio::spawn(async move {
            axum::serve(mgmt_listener, mgmt.into_make_service_with_connect_info::<SocketAddr>())
                .with_graceful_shutdown(async move {
                    let _ = mgmt_rx.wait_for(|&s| s).await;
                })
                .await
                .expect("mgmt server");
        });

        Self {
            server_url: format!("http://{addr}"),
            ws_url: format!("ws://{addr}/v1/gateway"),
            mgmt_url: format!("http://{mgmt_addr}"),
            client: reqwest::Client::new(),
            config,
            shutdown_tx,
        }
    }

    pub fn token_for(&self, user_id: i64) -> String {
        issue_jwt(user_id, &self.config.auth.jwt_secret, self.config.auth.access_token_ttl_secs)
            .expect("issue test token")
    }

    /// Connects a raw relay socket and registers the user.
    pub async fn connect_ws(&self, user_id: i64) -> WsClient {
        let token = self.token_for(user_id);
        let (stream, _) = connect_async(format!("{}?token={token}", self.ws_url)).await.expect("ws connect");
        let mut client = WsClient { stream };
        client.send_event(&ClientEvent::Register { user_id }).await;
        // Give the server a beat to process the join before tests publish.
        tokio::time::sleep(Duration::from_millis(100)).await;
        client
    }

    pub async fn post_message(&self, token: &str, recipient_id: i64, content: &str) -> reqwest::Response {
        self.client
            .post(format!("{}/v1/messages/{recipient_id}", self.server_url))
            .bearer_auth(token)
            .json(&serde_json::json!({ "content": content }))
            .send()
            .await
            .expect("post message")
    }
}

pub struct WsClient {
    pub stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsClient {
    pub async fn send_event(&mut self, event: &ClientEvent) {
        let json = serde_json::to_string(event).expect("serialize event");
        self.stream.send(Message::text(json)).await.expect("send frame");
    }

    pub async fn send_text(&mut self, text: &str) {
        self.stream.send(Message::text(text.to_string())).await.expect("send frame");
    }

    /// Next decodable server event, skipping control frames, within `timeout`.
    pub async fn recv_event(&mut self, timeout: Duration) -> Option<ServerEvent> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let remaining = deadline.checked_duration_since(tokio::time::Instant::now())?;
            match tokio::time::timeout(remaining, self.stream.next()).await {
                Ok(Some(Ok(Message::Text(text)))) => {
                    if let Ok(event) = serde_json::from_str::<ServerEvent>(&text) {
                        return Some(event);
                    }
                }
                Ok(Some(Ok(_))) => {}
                Ok(Some(Err(_)) | None) | Err(_) => return None,
            }
        }
    }

    /// Next raw frame, for tests that inspect close codes.
    pub async fn recv_raw(&mut self, timeout: Duration) -> Option<Message> {
        match tokio::time::timeout(timeout, self.stream.next()).await {
            Ok(Some(Ok(msg))) => Some(msg),
            _ => None,
        }
    }
}
