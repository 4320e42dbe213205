use lambda_http::{http::StatusCode, Body, Error, Request, Response};
use std::{env, sync::Arc};

use super::connections::{get_connection, remove_connection, save_connection, subscribe_connection};
use super::messages::{FeedMessage, WebSocketMessage};
use crate::auth::{self, Caller};
use crate::{affiliations, users, AppState};

const FEEDS: [&str; 2] = ["users", "affiliations"];

/// Handle WebSocket events ($connect, $disconnect, $default)
pub async fn handle_websocket_event(
    event: Request,
    state: Arc<AppState>,
) -> Result<Response<Body>, Error> {
    let table_name = env::var("TABLE_NAME").unwrap_or_else(|_| "atlas".to_string());

    // For WebSocket events, connection ID and route key come from headers/context
    let connection_id = event
        .headers()
        .get("connectionid")
        .or_else(|| event.headers().get("connectionId"))
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let route_key = event
        .headers()
        .get("routekey")
        .or_else(|| event.headers().get("routeKey"))
        .and_then(|v| v.to_str().ok())
        .unwrap_or(event.uri().path());

    tracing::info!("WebSocket event: {} for connection: {}", route_key, connection_id);

    match route_key {
        "$connect" => handle_connect(event, state, &table_name, &connection_id).await,
        "$disconnect" => handle_disconnect(state, &table_name, &connection_id).await,
        "$default" => handle_message(event, state, &table_name, &connection_id).await,
        _ => {
            tracing::warn!("Unknown WebSocket route: {}", route_key);
            Ok(Response::builder()
                .status(StatusCode::BAD_REQUEST)
                .body(Body::Empty)
                .map_err(Box::new)?)
        }
    }
}

/// Handle $connect: capture who this connection belongs to. Feed
/// authorization later relies on the roles recorded here.
async fn handle_connect(
    event: Request,
    state: Arc<AppState>,
    table_name: &str,
    connection_id: &str,
) -> Result<Response<Body>, Error> {
    let caller = auth::caller_from_request(&event);

    tracing::info!(
        "WebSocket connect: {} (user: {})",
        connection_id,
        caller.user_id.as_deref().unwrap_or("anonymous")
    );

    save_connection(&state.dynamo_client, table_name, connection_id, &caller).await?;

    Ok(Response::builder()
        .status(StatusCode::OK)
        .body(Body::Empty)
        .map_err(Box::new)?)
}

/// Handle $disconnect event
async fn handle_disconnect(
    state: Arc<AppState>,
    table_name: &str,
    connection_id: &str,
) -> Result<Response<Body>, Error> {
    tracing::info!("WebSocket disconnect: {}", connection_id);

    remove_connection(&state.dynamo_client, table_name, connection_id).await?;

    Ok(Response::builder()
        .status(StatusCode::OK)
        .body(Body::Empty)
        .map_err(Box::new)?)
}

/// Handle $default event (incoming messages)
async fn handle_message(
    event: Request,
    state: Arc<AppState>,
    table_name: &str,
    connection_id: &str,
) -> Result<Response<Body>, Error> {
    let body = event.body();

    let message: WebSocketMessage = match serde_json::from_slice(body) {
        Ok(msg) => msg,
        Err(e) => {
            tracing::error!("Failed to parse WebSocket message: {}", e);
            return Ok(Response::builder()
                .status(StatusCode::BAD_REQUEST)
                .body(Body::from(format!(
                    r#"{{"error": "Invalid message format: {}"}}"#,
                    e
                )))
                .map_err(Box::new)?);
        }
    };

    match message.action.as_str() {
        "subscribe" => {
            let feed = match message.data.get("feed").and_then(|v| v.as_str()) {
                Some(feed) if FEEDS.contains(&feed) => feed,
                _ => {
                    return Ok(Response::builder()
                        .status(StatusCode::BAD_REQUEST)
                        .body(Body::from(r#"{"error": "Unknown feed"}"#))
                        .map_err(Box::new)?);
                }
            };
            handle_subscribe(state, table_name, connection_id, feed).await
        }
        _ => {
            tracing::warn!("Unknown action: {}", message.action);
            Ok(Response::builder()
                .status(StatusCode::BAD_REQUEST)
                .body(Body::from(format!(
                    r#"{{"error": "Unknown action: {}"}}"#,
                    message.action
                )))
                .map_err(Box::new)?)
        }
    }
}

/// Subscribe a connection to a feed and send it the current document set.
///
/// An unauthorized subscription ends quietly: no documents, no error frame,
/// the feed simply never starts.
async fn handle_subscribe(
    state: Arc<AppState>,
    table_name: &str,
    connection_id: &str,
    feed: &str,
) -> Result<Response<Body>, Error> {
    let caller = match get_connection(&state.dynamo_client, table_name, connection_id).await? {
        Some(conn) => Caller {
            user_id: conn.user_id,
            roles: conn.roles,
        },
        None => Caller::default(),
    };

    if !auth::can_subscribe(feed, &caller) {
        tracing::info!(
            "Refusing {} feed for connection {} (user: {})",
            feed,
            connection_id,
            caller.user_id.as_deref().unwrap_or("anonymous")
        );
        return Ok(Response::builder()
            .status(StatusCode::OK)
            .body(Body::Empty)
            .map_err(Box::new)?);
    }

    subscribe_connection(&state.dynamo_client, table_name, connection_id, feed).await?;

    // Initial document set, before change broadcasts take over.
    if let Some(api_gateway) = &state.api_gateway_client {
        let documents = match feed {
            "users" => {
                serde_json::to_value(users::list_users(&state.dynamo_client, table_name).await?)?
            }
            _ => serde_json::to_value(
                affiliations::list_affiliations(&state.dynamo_client, table_name).await?,
            )?,
        };

        let frame = FeedMessage::snapshot(feed, documents);
        let frame_json = serde_json::to_string(&frame)?;

        if let Err(e) = api_gateway
            .post_to_connection()
            .connection_id(connection_id)
            .data(frame_json.as_bytes().to_vec().into())
            .send()
            .await
        {
            tracing::warn!("Failed to send snapshot to {}: {}", connection_id, e);
        }
    }

    tracing::info!("Connection {} subscribed to {}", connection_id, feed);

    Ok(Response::builder()
        .status(StatusCode::OK)
        .body(Body::Empty)
        .map_err(Box::new)?)
}
