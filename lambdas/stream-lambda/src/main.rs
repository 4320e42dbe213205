use atlas_shared::sockets::broadcast::broadcast_to_feed;
use atlas_shared::sockets::messages::FeedMessage;
use atlas_shared::types::{Affiliation, Profile, UserFeedEntry};
use aws_lambda_events::event::dynamodb::{Event, EventRecord};
use aws_sdk_apigatewaymanagement::Client as ApiGatewayManagementClient;
use aws_sdk_dynamodb::Client as DynamoClient;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .without_time()
        .init();

    run(service_fn(function_handler)).await
}

async fn function_handler(event: LambdaEvent<Event>) -> Result<(), Error> {
    tracing::info!(
        "DynamoDB Stream event received with {} records",
        event.payload.records.len()
    );

    let config = aws_config::load_from_env().await;
    let dynamo_client = DynamoClient::new(&config);

    let ws_endpoint =
        std::env::var("WS_API_ENDPOINT").expect("WS_API_ENDPOINT must be set for stream handler");

    let api_config = aws_sdk_apigatewaymanagement::config::Builder::from(&config)
        .endpoint_url(ws_endpoint)
        .build();
    let api_gateway_client = ApiGatewayManagementClient::from_conf(api_config);

    let table_name = std::env::var("TABLE_NAME").unwrap_or_else(|_| "atlas".to_string());

    for record in event.payload.records {
        if let Err(e) =
            process_record(&record, &dynamo_client, &api_gateway_client, &table_name).await
        {
            tracing::error!("Failed to process record: {}", e);
        }
    }

    Ok(())
}

/// Route one stream record to the feed it belongs to.
///
/// Only user documents and affiliations are published; programs,
/// observations, sessions and connection churn stay server-side.
async fn process_record(
    record: &EventRecord,
    dynamo_client: &DynamoClient,
    api_gateway_client: &ApiGatewayManagementClient,
    table_name: &str,
) -> Result<(), Error> {
    let event_name = &record.event_name;

    // For REMOVE events, new_image is empty; use old_image instead
    let image = if record.change.new_image.is_empty() {
        &record.change.old_image
    } else {
        &record.change.new_image
    };
    let image_json = serde_json::to_value(image)?;

    let pk = string_field(&image_json, "PK").ok_or("Missing PK")?;
    let sk = string_field(&image_json, "SK").unwrap_or_default();

    let (feed, message) = if let Some(user_id) = pk
        .strip_prefix("USER#")
        .filter(|_| sk.starts_with("USER#"))
    {
        let message = match event_name.as_str() {
            "INSERT" | "MODIFY" => {
                let entry = UserFeedEntry {
                    user_id: user_id.to_string(),
                    email: string_field(&image_json, "email").unwrap_or_default(),
                    profile: Profile {
                        first_name: string_field(&image_json, "first_name").unwrap_or_default(),
                        last_name: string_field(&image_json, "last_name").unwrap_or_default(),
                        affiliation: string_field(&image_json, "affiliation"),
                    },
                };
                FeedMessage::changed("users", serde_json::to_value(entry)?)
            }
            "REMOVE" => FeedMessage::removed("users", user_id),
            _ => return Ok(()),
        };
        ("users", message)
    } else if let Some(affiliation_id) = pk.strip_prefix("AFFILIATION#") {
        let message = match event_name.as_str() {
            "INSERT" | "MODIFY" => {
                let affiliation = Affiliation {
                    affiliation_id: affiliation_id.to_string(),
                    name: string_field(&image_json, "name").unwrap_or_default(),
                    created_at: string_field(&image_json, "created_at").unwrap_or_default(),
                };
                FeedMessage::changed("affiliations", serde_json::to_value(affiliation)?)
            }
            "REMOVE" => FeedMessage::removed("affiliations", affiliation_id),
            _ => return Ok(()),
        };
        ("affiliations", message)
    } else {
        return Ok(());
    };

    broadcast_to_feed(dynamo_client, api_gateway_client, table_name, feed, &message).await?;

    tracing::info!("Broadcast sent: {} on {}", message.r#type, feed);

    Ok(())
}

/// Pull a string attribute out of a stream image. Depending on the event
/// serialization the attribute arrives either as a plain string or wrapped
/// as {"S": "..."}.
fn string_field(image: &serde_json::Value, key: &str) -> Option<String> {
    match image.get(key)? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Object(map) => map
            .get("S")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_field_reads_wrapped_attributes() {
        let image = serde_json::json!({"PK": {"S": "USER#u-1"}});
        assert_eq!(string_field(&image, "PK").as_deref(), Some("USER#u-1"));
    }

    #[test]
    fn string_field_reads_plain_attributes() {
        let image = serde_json::json!({"PK": "AFFILIATION#aff-1"});
        assert_eq!(string_field(&image, "PK").as_deref(), Some("AFFILIATION#aff-1"));
    }

    #[test]
    fn string_field_is_none_for_missing_keys() {
        let image = serde_json::json!({});
        assert!(string_field(&image, "PK").is_none());
    }
}
