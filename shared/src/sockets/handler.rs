use lambda_http::request::RequestContext;
use lambda_http::{http::StatusCode, Body, Error, Request, RequestExt, Response};
use std::sync::Arc;

use super::connections::Connection;
use super::messages::{WebSocketAction, WebSocketMessage};
use crate::responses::{empty, error_response};
use crate::AppState;

/// Route key of a WebSocket event, or `None` for plain HTTP requests.
pub fn websocket_route(event: &Request) -> Option<String> {
    if let Some(RequestContext::WebSocket(ctx)) = event.request_context_ref() {
        return ctx.route_key.clone();
    }

    event
        .headers()
        .get("routekey")
        .or_else(|| event.headers().get("routeKey"))
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

fn connection_id(event: &Request) -> Option<String> {
    if let Some(RequestContext::WebSocket(ctx)) = event.request_context_ref() {
        if let Some(id) = &ctx.connection_id {
            return Some(id.clone());
        }
    }

    event
        .headers()
        .get("connectionid")
        .or_else(|| event.headers().get("connectionId"))
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

fn jwt_subject(event: &Request) -> Option<String> {
    event
        .request_context_ref()
        .and_then(|ctx| ctx.authorizer())
        .and_then(|auth| auth.jwt.as_ref())
        .and_then(|jwt| jwt.claims.get("sub"))
        .map(|s| s.to_string())
}

/// Handle WebSocket events ($connect, $disconnect, $default)
pub async fn handle_websocket_event(
    event: Request,
    state: Arc<AppState>,
) -> Result<Response<Body>, Error> {
    let route_key = websocket_route(&event).unwrap_or_default();

    let Some(connection_id) = connection_id(&event) else {
        tracing::warn!("WebSocket event {} without a connection id", route_key);
        return error_response(StatusCode::BAD_REQUEST, "Missing connection id");
    };

    tracing::info!("WebSocket event: {} for connection: {}", route_key, connection_id);

    match route_key.as_str() {
        "$connect" => handle_connect(&event, &state, &connection_id).await,
        "$disconnect" => handle_disconnect(&state, &connection_id).await,
        "$default" => handle_message(&event, &state, &connection_id).await,
        _ => {
            tracing::warn!("Unknown WebSocket route: {}", route_key);
            empty(StatusCode::BAD_REQUEST)
        }
    }
}

async fn handle_connect(
    event: &Request,
    state: &AppState,
    connection_id: &str,
) -> Result<Response<Body>, Error> {
    let params = event.query_string_parameters_ref();

    let user_id = params
        .and_then(|params| params.first("user_id"))
        .map(|s| s.to_string())
        .or_else(|| jwt_subject(event))
        .unwrap_or_else(|| "anonymous".to_string());

    tracing::info!("WebSocket connect: {} (user: {})", connection_id, user_id);

    state
        .subscriptions
        .save_connection(Connection::new(connection_id, &user_id))
        .await?;

    if let Some(topic) = params
        .and_then(|params| params.first("topic"))
        .filter(|t| !t.trim().is_empty())
    {
        state.subscriptions.subscribe(connection_id, topic).await?;
    }

    empty(StatusCode::OK)
}

async fn handle_disconnect(state: &AppState, connection_id: &str) -> Result<Response<Body>, Error> {
    tracing::info!("WebSocket disconnect: {}", connection_id);

    state.subscriptions.remove_connection(connection_id).await?;

    empty(StatusCode::OK)
}

async fn handle_message(
    event: &Request,
    state: &AppState,
    connection_id: &str,
) -> Result<Response<Body>, Error> {
    let message: WebSocketMessage = match serde_json::from_slice(event.body()) {
        Ok(msg) => msg,
        Err(e) => {
            tracing::error!("Failed to parse WebSocket message: {}", e);
            return error_response(
                StatusCode::BAD_REQUEST,
                &format!("Invalid message format: {}", e),
            );
        }
    };

    tracing::info!("WebSocket message action: {}", message.action);

    let Some(action) = WebSocketAction::parse(&message.action) else {
        tracing::warn!("Unknown action: {}", message.action);
        return error_response(
            StatusCode::BAD_REQUEST,
            &format!("Unknown action: {}", message.action),
        );
    };

    let Some(topic) = message.topic(&state.config.insights_topic_prefix) else {
        return error_response(StatusCode::BAD_REQUEST, "Missing topic");
    };

    match action {
        WebSocketAction::Subscribe => state.subscriptions.subscribe(connection_id, &topic).await?,
        WebSocketAction::Unsubscribe => {
            state.subscriptions.unsubscribe(connection_id, &topic).await?
        }
    }

    empty(StatusCode::OK)
}
