use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoClient;
use lambda_http::Error;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::auth::Caller;

/// WebSocket connection stored in DynamoDB
#[derive(Debug, Serialize, Deserialize)]
pub struct Connection {
    pub connection_id: String,
    pub user_id: Option<String>,
    pub roles: Vec<String>,
    pub feeds: Vec<String>,
    pub connected_at: String,
}

/// Save a WebSocket connection with the identity it connected as.
pub async fn save_connection(
    client: &DynamoClient,
    table_name: &str,
    connection_id: &str,
    caller: &Caller,
) -> Result<(), Error> {
    let now = chrono::Utc::now().to_rfc3339();
    let pk = format!("CONNECTION#{}", connection_id);

    let mut put_request = client
        .put_item()
        .table_name(table_name)
        .item("PK", AttributeValue::S(pk.clone()))
        .item("SK", AttributeValue::S(pk))
        .item("connection_id", AttributeValue::S(connection_id.to_string()))
        .item("connected_at", AttributeValue::S(now))
        .item("entity_type", AttributeValue::S("connection".to_string()));

    if let Some(user_id) = &caller.user_id {
        put_request = put_request.item("user_id", AttributeValue::S(user_id.clone()));
    }

    // DynamoDB rejects empty string sets; absence means no roles.
    if !caller.roles.is_empty() {
        put_request = put_request.item("roles", AttributeValue::Ss(caller.roles.clone()));
    }

    put_request.send().await?;

    tracing::info!(
        "Connection saved: {} (user: {})",
        connection_id,
        caller.user_id.as_deref().unwrap_or("anonymous")
    );
    Ok(())
}

/// Remove a WebSocket connection from DynamoDB
pub async fn remove_connection(
    client: &DynamoClient,
    table_name: &str,
    connection_id: &str,
) -> Result<(), Error> {
    let pk = format!("CONNECTION#{}", connection_id);

    client
        .delete_item()
        .table_name(table_name)
        .key("PK", AttributeValue::S(pk.clone()))
        .key("SK", AttributeValue::S(pk))
        .send()
        .await?;

    tracing::info!("Connection removed: {}", connection_id);
    Ok(())
}

/// Mark a connection as subscribed to a feed.
pub async fn subscribe_connection(
    client: &DynamoClient,
    table_name: &str,
    connection_id: &str,
    feed: &str,
) -> Result<(), Error> {
    let pk = format!("CONNECTION#{}", connection_id);

    client
        .update_item()
        .table_name(table_name)
        .key("PK", AttributeValue::S(pk.clone()))
        .key("SK", AttributeValue::S(pk))
        .update_expression("ADD feeds :feed")
        .expression_attribute_values(":feed", AttributeValue::Ss(vec![feed.to_string()]))
        .send()
        .await?;

    Ok(())
}

/// Look up a single connection record.
pub async fn get_connection(
    client: &DynamoClient,
    table_name: &str,
    connection_id: &str,
) -> Result<Option<Connection>, Error> {
    let pk = format!("CONNECTION#{}", connection_id);

    let result = client
        .get_item()
        .table_name(table_name)
        .key("PK", AttributeValue::S(pk.clone()))
        .key("SK", AttributeValue::S(pk))
        .send()
        .await?;

    Ok(result.item().and_then(parse_connection))
}

/// All connections subscribed to a feed.
pub async fn get_feed_connections(
    client: &DynamoClient,
    table_name: &str,
    feed: &str,
) -> Result<Vec<Connection>, Error> {
    let mut connections = Vec::new();

    let result = client
        .scan()
        .table_name(table_name)
        .filter_expression("entity_type = :type AND contains(feeds, :feed)")
        .expression_attribute_values(":type", AttributeValue::S("connection".to_string()))
        .expression_attribute_values(":feed", AttributeValue::S(feed.to_string()))
        .send()
        .await?;

    for item in result.items() {
        if let Some(conn) = parse_connection(item) {
            connections.push(conn);
        }
    }

    Ok(connections)
}

fn parse_connection(item: &HashMap<String, AttributeValue>) -> Option<Connection> {
    let connection_id = item
        .get("connection_id")
        .and_then(|v| v.as_s().ok())?
        .to_string();

    Some(Connection {
        connection_id,
        user_id: item
            .get("user_id")
            .and_then(|v| v.as_s().ok())
            .map(|s| s.to_string()),
        roles: item
            .get("roles")
            .and_then(|v| v.as_ss().ok())
            .cloned()
            .unwrap_or_default(),
        feeds: item
            .get("feeds")
            .and_then(|v| v.as_ss().ok())
            .cloned()
            .unwrap_or_default(),
        connected_at: item
            .get("connected_at")
            .and_then(|v| v.as_s().ok())
            .map(|s| s.to_string())
            .unwrap_or_default(),
    })
}
