use crate::api::AppState;
use crate::services::auth::verify_jwt;
use crate::services::session::Session;
use axum::{
    extract::{Query, State, ws::WebSocketUpgrade},
    http::Extensions,
    response::IntoResponse,
};
use serde::Deserialize;
use tower_http::request_id::RequestId;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    token: String,
}

/// Upgrades to a relay socket. Authentication happens at the handshake via a
/// `token` query parameter; there is no explicit acknowledgement afterwards,
/// absence of error is success.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    extensions: Extensions,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let request_id = extensions
        .get::<RequestId>()
        .map(|id| id.header_value().to_str().unwrap_or_default().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    match verify_jwt(&params.token, &state.config.auth.jwt_secret) {
        Ok(claims) => ws.on_upgrade(move |socket| {
            Session {
                user_id: claims.sub,
                request_id,
                socket,
                relay: state.relay.clone(),
                config: state.config.websocket.clone(),
                shutdown_rx: state.shutdown_rx.clone(),
            }
            .run()
        }),
        Err(e) => {
            tracing::warn!(error = %e, "WebSocket handshake failed: invalid token");
            axum::http::StatusCode::UNAUTHORIZED.into_response()
        }
    }
}
