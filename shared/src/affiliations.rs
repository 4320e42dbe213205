use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoClient;
use lambda_http::{http::StatusCode, Body, Error, Response};

use crate::auth::Caller;
use crate::types::{Affiliation, CreateAffiliationRequest, ErrorResponse};

/// Create an affiliation. Any authenticated caller.
pub async fn create_affiliation(
    dynamo: &DynamoClient,
    table_name: &str,
    caller: &Caller,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    if !caller.is_authenticated() {
        return not_authorized();
    }

    let req: CreateAffiliationRequest = match serde_json::from_slice(body) {
        Ok(req) => req,
        Err(e) => {
            let error = ErrorResponse {
                error: "InvalidRequest".to_string(),
                message: format!("Invalid request body: {}", e),
            };
            return Ok(Response::builder()
                .status(StatusCode::BAD_REQUEST)
                .header("Content-Type", "application/json")
                .header("Access-Control-Allow-Origin", "*")
                .body(serde_json::to_string(&error)?.into())
                .map_err(Box::new)?);
        }
    };

    let affiliation_id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    let pk = format!("AFFILIATION#{}", affiliation_id);

    dynamo
        .put_item()
        .table_name(table_name)
        .item("PK", AttributeValue::S(pk.clone()))
        .item("SK", AttributeValue::S(pk))
        .item("name", AttributeValue::S(req.name.clone()))
        .item("created_at", AttributeValue::S(now.clone()))
        .item("entity_type", AttributeValue::S("affiliation".to_string()))
        .send()
        .await?;

    let affiliation = Affiliation {
        affiliation_id,
        name: req.name,
        created_at: now,
    };

    Ok(Response::builder()
        .status(StatusCode::CREATED)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(serde_json::to_string(&affiliation)?.into())
        .map_err(Box::new)?)
}

/// Delete an affiliation by id. Any authenticated caller.
pub async fn delete_affiliation(
    dynamo: &DynamoClient,
    table_name: &str,
    caller: &Caller,
    affiliation_id: &str,
) -> Result<Response<Body>, Error> {
    if !caller.is_authenticated() {
        return not_authorized();
    }

    let pk = format!("AFFILIATION#{}", affiliation_id);

    dynamo
        .delete_item()
        .table_name(table_name)
        .key("PK", AttributeValue::S(pk.clone()))
        .key("SK", AttributeValue::S(pk))
        .send()
        .await?;

    tracing::info!("Deleted affiliation {}", affiliation_id);

    Ok(Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Origin", "*")
        .body(Body::Empty)
        .map_err(Box::new)?)
}

/// All affiliations, for the feed snapshot.
pub async fn list_affiliations(
    dynamo: &DynamoClient,
    table_name: &str,
) -> Result<Vec<Affiliation>, Error> {
    let mut affiliations = Vec::new();

    let result = dynamo
        .scan()
        .table_name(table_name)
        .filter_expression("entity_type = :type")
        .expression_attribute_values(":type", AttributeValue::S("affiliation".to_string()))
        .send()
        .await?;

    for item in result.items() {
        let affiliation_id = match item
            .get("PK")
            .and_then(|v| v.as_s().ok())
            .and_then(|pk| pk.strip_prefix("AFFILIATION#"))
        {
            Some(id) => id.to_string(),
            None => continue,
        };

        affiliations.push(Affiliation {
            affiliation_id,
            name: item
                .get("name")
                .and_then(|v| v.as_s().ok())
                .map(|s| s.to_string())
                .unwrap_or_default(),
            created_at: item
                .get("created_at")
                .and_then(|v| v.as_s().ok())
                .map(|s| s.to_string())
                .unwrap_or_default(),
        });
    }

    Ok(affiliations)
}

fn not_authorized() -> Result<Response<Body>, Error> {
    let error = ErrorResponse {
        error: "NotAuthorized".to_string(),
        message: "Not authorized".to_string(),
    };
    Ok(Response::builder()
        .status(StatusCode::FORBIDDEN)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(serde_json::to_string(&error)?.into())
        .map_err(Box::new)?)
}
