use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoClient;
use lambda_http::Error;

use crate::types::Program;

/// Write a program document into its owner's partition.
pub async fn create_program(
    dynamo: &DynamoClient,
    table_name: &str,
    owner: &str,
    name: &str,
    kind: &str,
) -> Result<Program, Error> {
    let program_id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    dynamo
        .put_item()
        .table_name(table_name)
        .item("PK", AttributeValue::S(format!("USER#{}", owner)))
        .item("SK", AttributeValue::S(format!("PROGRAM#{}", program_id)))
        .item("name", AttributeValue::S(name.to_string()))
        .item("kind", AttributeValue::S(kind.to_string()))
        .item("created_at", AttributeValue::S(now.clone()))
        .item("entity_type", AttributeValue::S("program".to_string()))
        .send()
        .await?;

    tracing::info!("Created {} program for {}", kind, owner);

    Ok(Program {
        program_id,
        name: name.to_string(),
        kind: kind.to_string(),
        owner: owner.to_string(),
        created_at: now,
    })
}
