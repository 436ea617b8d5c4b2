//! Connection handlers for the Parlor server.
//!
//! This module accepts connections, resolves who is behind them and hands
//! each upgraded socket to a room client.

use crate::avatar::{Avatar, TryAvatars};
use crate::config::Config;
use crate::identity::Identity;
use crate::metrics::{self, ConnectionMetricsGuard, Metered};
use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use parlor_core::{trace, Client, Hub, HubHandle, Profile, Tracer, TracingTracer};
use parlor_protocol::Encoding;
use parlor_transport::{websocket, WebSocketConfig};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// Shared server state.
pub struct AppState {
    /// Handle to the room hub.
    pub hub: HubHandle,
    /// Avatar resolver chain.
    pub avatar: Box<dyn Avatar>,
    /// Server configuration.
    pub config: Config,
}

impl AppState {
    /// Create new app state around a running hub.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured avatar resolvers are invalid.
    pub fn new(config: Config, hub: HubHandle) -> Result<Self> {
        let avatar = TryAvatars::from_names(&config.room.avatars)
            .context("Invalid room.avatars setting")?;

        Ok(Self {
            hub,
            avatar: Box::new(avatar),
            config,
        })
    }
}

/// Run the HTTP/WebSocket server until interrupted.
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn run_server(config: Config) -> Result<()> {
    let tracer: Arc<dyn Tracer> = if config.room.trace {
        Arc::new(TracingTracer)
    } else {
        trace::off()
    };
    let hub = Hub::spawn(config.hub_config(), tracer);

    // Start metrics server if enabled
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
        metrics::spawn_hub_sampler(
            hub.clone(),
            Duration::from_secs(config.metrics.sample_interval_secs.max(1)),
        );
    }

    let addr = config.bind_addr()?;
    let room_path = config.room.path.clone();
    let state = Arc::new(AppState::new(config, hub.clone())?);
    let app = build_router(state);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Parlor server listening on {}", addr);
    info!("Room endpoint: ws://{}{}", addr, room_path);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(hub))
        .await?;

    Ok(())
}

/// Build the HTTP router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(&state.config.room.path, get(room_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Wait for Ctrl-C, then close the room.
async fn shutdown_signal(hub: HubHandle) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutting down");
    hub.shutdown();
}

/// Health check handler.
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (status, label, members) = match state.hub.stats().await {
        Ok(stats) => (StatusCode::OK, "ok", Some(stats.members)),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "closed", None),
    };

    (
        status,
        axum::Json(serde_json::json!({
            "status": label,
            "version": env!("CARGO_PKG_VERSION"),
            "members": members,
        })),
    )
}

/// Query parameters of the room endpoint.
#[derive(Debug, Default, Deserialize)]
struct RoomQuery {
    /// Outbound encoding, `json` (default) or `msgpack`.
    format: Option<String>,
}

/// Room upgrade handler.
///
/// A request without a valid identity is turned away here, before the
/// upgrade, and never reaches the room.
async fn room_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    Query(query): Query<RoomQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let identity = match Identity::from_headers(&headers) {
        Ok(identity) => identity,
        Err(e) => {
            warn!(error = %e, "Rejected connection");
            metrics::record_rejection("identity");
            return (StatusCode::UNAUTHORIZED, e.to_string()).into_response();
        }
    };

    let encoding = match query.format.as_deref() {
        None => Encoding::Json,
        Some(name) => match Encoding::from_name(name) {
            Some(encoding) => encoding,
            None => {
                metrics::record_rejection("format");
                return (StatusCode::BAD_REQUEST, format!("Unknown format: {}", name))
                    .into_response();
            }
        },
    };

    let avatar_url = state.avatar.avatar_url(&identity).unwrap_or_else(|e| {
        debug!(name = %identity.name, error = %e, "No avatar");
        String::new()
    });
    let profile = Profile::new(identity.name, avatar_url);

    let ws_config = WebSocketConfig {
        max_message_size: state.config.limits.max_message_size,
        encoding,
    };

    ws.max_message_size(ws_config.max_message_size)
        .on_failed_upgrade(|e| {
            warn!(error = %e, "WebSocket upgrade failed");
            metrics::record_rejection("upgrade");
        })
        .on_upgrade(move |socket| handle_socket(socket, state, profile, ws_config))
}

/// Run a room client over an upgraded socket.
async fn handle_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    profile: Profile,
    ws_config: WebSocketConfig,
) {
    let _metrics_guard = ConnectionMetricsGuard::new();

    let (source, sink) = websocket::split(socket, &ws_config);
    let client = Client::new(state.hub.clone(), profile);
    let id = client.id();

    debug!(client = %id, name = %client.profile().name, "WebSocket connected");

    if let Err(e) = client.run(Metered(source), Metered(sink)).await {
        warn!(client = %id, error = %e, "Client could not join");
    }

    debug!(client = %id, "WebSocket disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{SinkExt, StreamExt};
    use parlor_protocol::ChatFrame;
    use std::net::SocketAddr;
    use tokio::net::TcpStream;
    use tokio::time::timeout;
    use tokio_tungstenite::tungstenite::client::IntoClientRequest;
    use tokio_tungstenite::tungstenite::http::{header, HeaderValue};
    use tokio_tungstenite::tungstenite::{Error as WsError, Message};
    use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

    type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

    const WAIT: Duration = Duration::from_secs(5);

    async fn start_server() -> (SocketAddr, HubHandle) {
        let config = Config::default();
        let hub = Hub::spawn(config.hub_config(), trace::off());
        let state = Arc::new(AppState::new(config, hub.clone()).unwrap());
        let app = build_router(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (addr, hub)
    }

    fn auth_cookie(name: &str) -> String {
        let identity = Identity {
            name: name.to_string(),
            avatar_url: None,
            email: None,
            userid: Some(format!("{name}-hash")),
        };
        format!("auth={}", identity.encode())
    }

    async fn connect(addr: SocketAddr, cookie: Option<String>) -> Result<Socket, WsError> {
        connect_to(addr, "/room", cookie).await
    }

    async fn connect_to(
        addr: SocketAddr,
        path: &str,
        cookie: Option<String>,
    ) -> Result<Socket, WsError> {
        let mut request = format!("ws://{}{}", addr, path).into_client_request()?;
        if let Some(cookie) = cookie {
            request
                .headers_mut()
                .insert(header::COOKIE, HeaderValue::from_str(&cookie).unwrap());
        }
        let (socket, _) = connect_async(request).await?;
        Ok(socket)
    }

    async fn wait_for_members(hub: &HubHandle, count: usize) {
        timeout(WAIT, async {
            while hub.stats().await.unwrap().members != count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("member count never reached");
    }

    async fn next_frame(socket: &mut Socket) -> ChatFrame {
        loop {
            let message = timeout(WAIT, socket.next()).await.unwrap().unwrap().unwrap();
            if let Message::Text(text) = message {
                return serde_json::from_str(&text).unwrap();
            }
        }
    }

    #[tokio::test]
    async fn test_room_broadcast_over_websocket() {
        let (addr, hub) = start_server().await;
        let mut alice = connect(addr, Some(auth_cookie("alice"))).await.unwrap();
        let mut bob = connect(addr, Some(auth_cookie("bob"))).await.unwrap();
        wait_for_members(&hub, 2).await;

        alice
            .send(Message::Text(r#"{"message":"hello bob"}"#.into()))
            .await
            .unwrap();

        for socket in [&mut alice, &mut bob] {
            let frame = next_frame(socket).await;
            assert_eq!(frame.name, "alice");
            assert_eq!(frame.message, "hello bob");
            assert_eq!(frame.avatar_url, "//www.gravatar.com/avatar/alice-hash");
        }
    }

    #[tokio::test]
    async fn test_msgpack_format_sends_binary_frames() {
        let (addr, hub) = start_server().await;
        let mut alice = connect_to(addr, "/room?format=msgpack", Some(auth_cookie("alice")))
            .await
            .unwrap();
        wait_for_members(&hub, 1).await;

        alice
            .send(Message::Text(r#"{"message":"packed"}"#.into()))
            .await
            .unwrap();

        let frame: ChatFrame = loop {
            let message = timeout(WAIT, alice.next()).await.unwrap().unwrap().unwrap();
            match message {
                Message::Binary(data) => break rmp_serde::from_slice(&data).unwrap(),
                Message::Text(text) => panic!("Expected a binary frame, got {}", text),
                _ => continue,
            }
        };
        assert_eq!(frame.name, "alice");
        assert_eq!(frame.message, "packed");
    }

    #[tokio::test]
    async fn test_unknown_format_is_rejected() {
        let (addr, hub) = start_server().await;

        match connect_to(addr, "/room?format=xml", Some(auth_cookie("alice"))).await {
            Err(WsError::Http(response)) => {
                assert_eq!(response.status(), StatusCode::BAD_REQUEST.as_u16());
            }
            other => panic!("Expected HTTP 400, got {:?}", other.map(|_| ())),
        }
        assert_eq!(hub.stats().await.unwrap().members, 0);
    }

    #[tokio::test]
    async fn test_close_leaves_room() {
        let (addr, hub) = start_server().await;
        let mut alice = connect(addr, Some(auth_cookie("alice"))).await.unwrap();
        let _bob = connect(addr, Some(auth_cookie("bob"))).await.unwrap();
        wait_for_members(&hub, 2).await;

        alice.close(None).await.unwrap();
        wait_for_members(&hub, 1).await;
    }

    #[tokio::test]
    async fn test_missing_cookie_is_rejected() {
        let (addr, hub) = start_server().await;

        match connect(addr, None).await {
            Err(WsError::Http(response)) => {
                assert_eq!(response.status(), StatusCode::UNAUTHORIZED.as_u16());
            }
            other => panic!("Expected HTTP 401, got {:?}", other.map(|_| ())),
        }
        assert_eq!(hub.stats().await.unwrap().members, 0);
    }

    #[tokio::test]
    async fn test_health() {
        let (addr, hub) = start_server().await;
        let _alice = connect(addr, Some(auth_cookie("alice"))).await.unwrap();
        wait_for_members(&hub, 1).await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        tokio::io::AsyncWriteExt::write_all(
            &mut stream,
            b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        )
        .await
        .unwrap();
        let mut response = String::new();
        tokio::io::AsyncReadExt::read_to_string(&mut stream, &mut response)
            .await
            .unwrap();

        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains(r#""members":1"#));
    }
}
