use aws_sdk_apigatewaymanagement::Client as ApiGatewayManagementClient;
use aws_sdk_dynamodb::Client as DynamoClient;
use lambda_http::Error;

use super::connections::get_feed_connections;
use super::messages::FeedMessage;

/// Send a feed frame to every connection subscribed to the feed.
pub async fn broadcast_to_feed(
    dynamo_client: &DynamoClient,
    api_gateway_client: &ApiGatewayManagementClient,
    table_name: &str,
    feed: &str,
    message: &FeedMessage,
) -> Result<(), Error> {
    let connections = get_feed_connections(dynamo_client, table_name, feed).await?;
    let message_json = serde_json::to_string(message)?;

    tracing::info!(
        "Broadcasting {} to {} {} subscribers",
        message.r#type,
        connections.len(),
        feed
    );

    for conn in connections {
        let result = api_gateway_client
            .post_to_connection()
            .connection_id(&conn.connection_id)
            .data(message_json.as_bytes().to_vec().into())
            .send()
            .await;

        if let Err(e) = result {
            tracing::warn!(
                "Failed to send to connection {}: {}. Connection may be stale.",
                conn.connection_id,
                e
            );
        }
    }

    Ok(())
}
