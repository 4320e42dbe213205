use aws_sdk_cognitoidentityprovider::types::{AttributeType, MessageActionType};
use aws_sdk_cognitoidentityprovider::Client as CognitoClient;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoClient;
use aws_sdk_sesv2::Client as SesClient;
use lambda_http::{http::StatusCode, Body, Error, Response};
use std::collections::HashMap;
use std::env;

use crate::auth::{Caller, USERS_ROLE};
use crate::types::{CreateUserRequest, ErrorResponse, Profile, RoleRequest, User, UserFeedEntry};
use crate::{email, programs};

/// Create an account in Cognito, grant the "users" role, mirror the profile
/// into DynamoDB, seed the "General" program, and send the enrollment email.
///
/// Creation failure is returned to the caller as a typed error; nothing is
/// granted or written in that case.
pub async fn create_user(
    cognito: &CognitoClient,
    dynamo: &DynamoClient,
    ses: &SesClient,
    user_pool_id: &str,
    table_name: &str,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    let req: CreateUserRequest = match serde_json::from_slice(body) {
        Ok(req) => req,
        Err(e) => {
            tracing::error!("Failed to parse create user request: {}", e);
            return bad_request(&format!("Invalid request body: {}", e));
        }
    };

    tracing::info!("Creating account for {}", req.email);

    // Enrollment mail is ours to send, so suppress Cognito's built-in invite.
    let result = cognito
        .admin_create_user()
        .user_pool_id(user_pool_id)
        .username(&req.email)
        .user_attributes(
            AttributeType::builder()
                .name("email")
                .value(&req.email)
                .build()?,
        )
        .user_attributes(
            AttributeType::builder()
                .name("email_verified")
                .value("true")
                .build()?,
        )
        .message_action(MessageActionType::Suppress)
        .send()
        .await;

    let user_id = match result {
        Ok(output) => match output.user().and_then(|u| u.username()) {
            Some(id) => id.to_string(),
            None => {
                tracing::error!("Account service returned no identity for {}", req.email);
                return creation_failed("Account service returned no user identity");
            }
        },
        Err(e) => {
            let error_message = format!("{:?}", e);
            tracing::error!("Account creation error: {}", error_message);

            let user_message = if error_message.contains("UsernameExistsException") {
                "An account with this email already exists"
            } else if error_message.contains("InvalidParameterException") {
                "Invalid email address"
            } else {
                "Unable to create user"
            };
            return creation_failed(user_message);
        }
    };

    // New accounts always belong to the "users" group.
    cognito
        .admin_add_user_to_group()
        .user_pool_id(user_pool_id)
        .username(&user_id)
        .group_name(USERS_ROLE)
        .send()
        .await?;

    let now = chrono::Utc::now().to_rfc3339();
    let pk = format!("USER#{}", user_id);

    let mut put_request = dynamo
        .put_item()
        .table_name(table_name)
        .item("PK", AttributeValue::S(pk.clone()))
        .item("SK", AttributeValue::S(pk))
        .item("email", AttributeValue::S(req.email.clone()))
        .item("first_name", AttributeValue::S(req.profile.first_name.clone()))
        .item("last_name", AttributeValue::S(req.profile.last_name.clone()))
        .item("created_at", AttributeValue::S(now.clone()))
        .item("entity_type", AttributeValue::S("user".to_string()));

    if let Some(affiliation) = &req.profile.affiliation {
        put_request = put_request.item("affiliation", AttributeValue::S(affiliation.clone()));
    }

    put_request.send().await?;

    // Every user starts with a General program.
    programs::create_program(dynamo, table_name, &user_id, "General", "general").await?;

    let frontend_url =
        env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:8080".to_string());

    if let Err(e) =
        email::send_enrollment_email(ses, &req.email, &req.profile.first_name, &frontend_url).await
    {
        // The account exists either way; a lost email is recoverable.
        tracing::error!("Failed to send enrollment email: {}", e);
    } else {
        tracing::info!("Enrollment email sent to {}", req.email);
    }

    let user = User {
        user_id,
        email: req.email,
        profile: req.profile,
        created_at: now,
    };

    Ok(Response::builder()
        .status(StatusCode::CREATED)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(serde_json::to_string(&user)?.into())
        .map_err(Box::new)?)
}

/// Delete a user and every record they own. Admin only.
///
/// Dependents go first: programs, then observations, then sessions, then the
/// user document, and finally the Cognito account. Best effort; there is no
/// cross-collection transaction.
pub async fn remove_user(
    cognito: &CognitoClient,
    dynamo: &DynamoClient,
    user_pool_id: &str,
    table_name: &str,
    caller: &Caller,
    user_id: &str,
) -> Result<Response<Body>, Error> {
    if !caller.is_authenticated() {
        return not_authorized();
    }
    if !caller.is_admin() {
        return not_authorized();
    }

    tracing::info!("Removing user {} and owned records", user_id);

    let pk = format!("USER#{}", user_id);

    // Everything the user owns lives in their partition.
    let mut items = Vec::new();
    let mut start_key: Option<HashMap<String, AttributeValue>> = None;
    loop {
        let mut query = dynamo
            .query()
            .table_name(table_name)
            .key_condition_expression("PK = :pk")
            .expression_attribute_values(":pk", AttributeValue::S(pk.clone()));
        if let Some(key) = start_key.take() {
            query = query.set_exclusive_start_key(Some(key));
        }
        let page = query.send().await?;
        items.extend(page.items().iter().cloned());
        match page.last_evaluated_key() {
            Some(key) => start_key = Some(key.clone()),
            None => break,
        }
    }

    let all_delete_keys = cascade_order(&pk, &items);

    tracing::info!(
        "Cascade for {}: {} records to delete",
        user_id,
        all_delete_keys.len()
    );

    delete_keys(dynamo, table_name, &all_delete_keys).await?;

    // The identity goes last, once nothing references it.
    let result = cognito
        .admin_delete_user()
        .user_pool_id(user_pool_id)
        .username(user_id)
        .send()
        .await;

    if let Err(e) = result {
        let error_message = format!("{:?}", e);
        if error_message.contains("UserNotFoundException") {
            tracing::warn!("User {} had no Cognito account", user_id);
        } else {
            return Err(error_message.into());
        }
    }

    Ok(Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Origin", "*")
        .body(Body::Empty)
        .map_err(Box::new)?)
}

/// Grant a role to a user. Admin only.
pub async fn add_to_role(
    cognito: &CognitoClient,
    user_pool_id: &str,
    caller: &Caller,
    user_id: &str,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    if !caller.is_authenticated() {
        return not_authorized();
    }
    if !caller.is_admin() {
        return not_authorized();
    }

    let req: RoleRequest = match serde_json::from_slice(body) {
        Ok(req) => req,
        Err(e) => return bad_request(&format!("Invalid request body: {}", e)),
    };

    cognito
        .admin_add_user_to_group()
        .user_pool_id(user_pool_id)
        .username(user_id)
        .group_name(&req.role)
        .send()
        .await?;

    tracing::info!("Granted role {} to {}", req.role, user_id);

    Ok(Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Origin", "*")
        .body(Body::Empty)
        .map_err(Box::new)?)
}

/// Revoke a role from a user. Admin only.
pub async fn remove_from_role(
    cognito: &CognitoClient,
    user_pool_id: &str,
    caller: &Caller,
    user_id: &str,
    role: &str,
) -> Result<Response<Body>, Error> {
    if !caller.is_authenticated() {
        return not_authorized();
    }
    if !caller.is_admin() {
        return not_authorized();
    }

    cognito
        .admin_remove_user_from_group()
        .user_pool_id(user_pool_id)
        .username(user_id)
        .group_name(role)
        .send()
        .await?;

    tracing::info!("Revoked role {} from {}", role, user_id);

    Ok(Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Origin", "*")
        .body(Body::Empty)
        .map_err(Box::new)?)
}

/// All user documents, projected to the fields the users feed publishes.
pub async fn list_users(
    dynamo: &DynamoClient,
    table_name: &str,
) -> Result<Vec<UserFeedEntry>, Error> {
    let mut entries = Vec::new();

    let result = dynamo
        .scan()
        .table_name(table_name)
        .filter_expression("entity_type = :type")
        .expression_attribute_values(":type", AttributeValue::S("user".to_string()))
        .send()
        .await?;

    for item in result.items() {
        let user_id = match item
            .get("PK")
            .and_then(|v| v.as_s().ok())
            .and_then(|pk| pk.strip_prefix("USER#"))
        {
            Some(id) => id.to_string(),
            None => continue,
        };

        entries.push(UserFeedEntry {
            user_id,
            email: item
                .get("email")
                .and_then(|v| v.as_s().ok())
                .map(|s| s.to_string())
                .unwrap_or_default(),
            profile: Profile {
                first_name: item
                    .get("first_name")
                    .and_then(|v| v.as_s().ok())
                    .map(|s| s.to_string())
                    .unwrap_or_default(),
                last_name: item
                    .get("last_name")
                    .and_then(|v| v.as_s().ok())
                    .map(|s| s.to_string())
                    .unwrap_or_default(),
                affiliation: item
                    .get("affiliation")
                    .and_then(|v| v.as_s().ok())
                    .map(|s| s.to_string()),
            },
        });
    }

    Ok(entries)
}

/// Order the keys of a user's partition for deletion: programs first, then
/// observations, then sessions, the user document last. Records the cascade
/// does not own are left alone.
fn cascade_order(
    pk: &str,
    items: &[HashMap<String, AttributeValue>],
) -> Vec<HashMap<String, AttributeValue>> {
    let mut program_keys = Vec::new();
    let mut observation_keys = Vec::new();
    let mut session_keys = Vec::new();
    let mut user_keys = Vec::new();

    for item in items {
        let sk = match item.get("SK").and_then(|v| v.as_s().ok()) {
            Some(sk) => sk,
            None => continue,
        };

        let mut key = HashMap::new();
        key.insert("PK".to_string(), AttributeValue::S(pk.to_string()));
        key.insert("SK".to_string(), AttributeValue::S(sk.to_string()));

        if sk.starts_with("PROGRAM#") {
            program_keys.push(key);
        } else if sk.starts_with("OBSERVATION#") {
            observation_keys.push(key);
        } else if sk.starts_with("SESSION#") {
            session_keys.push(key);
        } else if sk.starts_with("USER#") {
            user_keys.push(key);
        }
    }

    let mut keys = program_keys;
    keys.extend(observation_keys);
    keys.extend(session_keys);
    keys.extend(user_keys);
    keys
}

/// Batch-delete keys in order, 25 per request, retrying unprocessed items.
async fn delete_keys(
    client: &DynamoClient,
    table_name: &str,
    keys: &[HashMap<String, AttributeValue>],
) -> Result<(), Error> {
    for chunk in keys.chunks(25) {
        let delete_requests: Vec<_> = chunk
            .iter()
            .map(|key| {
                aws_sdk_dynamodb::types::WriteRequest::builder()
                    .delete_request(
                        aws_sdk_dynamodb::types::DeleteRequest::builder()
                            .set_key(Some(key.clone()))
                            .build()
                            .unwrap(),
                    )
                    .build()
            })
            .collect();

        let mut attempts = 0;
        let mut unprocessed = Some(delete_requests);

        while let Some(requests) = unprocessed {
            attempts += 1;
            if attempts > 5 {
                tracing::warn!(
                    "Max retry attempts reached, {} records may not be deleted",
                    requests.len()
                );
                break;
            }

            let result = client
                .batch_write_item()
                .request_items(table_name, requests)
                .send()
                .await?;

            unprocessed = result
                .unprocessed_items()
                .and_then(|items| items.get(table_name))
                .filter(|items| !items.is_empty())
                .cloned();

            if unprocessed.is_some() {
                tokio::time::sleep(tokio::time::Duration::from_millis(100 * attempts as u64)).await;
            }
        }
    }

    Ok(())
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

fn bad_request(message: &str) -> Result<Response<Body>, Error> {
    let error = ErrorResponse {
        error: "InvalidRequest".to_string(),
        message: message.to_string(),
    };
    Ok(Response::builder()
        .status(StatusCode::BAD_REQUEST)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(serde_json::to_string(&error)?.into())
        .map_err(Box::new)?)
}

fn creation_failed(message: &str) -> Result<Response<Body>, Error> {
    let error = ErrorResponse {
        error: "UserCreationFailed".to_string(),
        message: message.to_string(),
    };
    Ok(Response::builder()
        .status(StatusCode::BAD_GATEWAY)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(serde_json::to_string(&error)?.into())
        .map_err(Box::new)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(pk: &str, sk: &str) -> HashMap<String, AttributeValue> {
        let mut item = HashMap::new();
        item.insert("PK".to_string(), AttributeValue::S(pk.to_string()));
        item.insert("SK".to_string(), AttributeValue::S(sk.to_string()));
        item
    }

    fn sk_of(key: &HashMap<String, AttributeValue>) -> &str {
        key.get("SK").and_then(|v| v.as_s().ok()).unwrap()
    }

    #[test]
    fn cascade_deletes_dependents_before_the_user_document() {
        let pk = "USER#u-1";
        // Partition contents arrive in storage order, owner record first.
        let items = vec![
            item(pk, "USER#u-1"),
            item(pk, "OBSERVATION#obs-1"),
            item(pk, "PROGRAM#prog-1"),
            item(pk, "SESSION#sess-1"),
            item(pk, "PROGRAM#prog-2"),
        ];

        let keys = cascade_order(pk, &items);

        let sks: Vec<&str> = keys.iter().map(sk_of).collect();
        assert_eq!(
            sks,
            vec![
                "PROGRAM#prog-1",
                "PROGRAM#prog-2",
                "OBSERVATION#obs-1",
                "SESSION#sess-1",
                "USER#u-1",
            ]
        );
    }

    #[test]
    fn cascade_covers_every_owned_record() {
        let pk = "USER#u-2";
        let items = vec![
            item(pk, "PROGRAM#general"),
            item(pk, "SESSION#sess-1"),
            item(pk, "USER#u-2"),
        ];

        let keys = cascade_order(pk, &items);
        assert_eq!(keys.len(), items.len());
    }

    #[test]
    fn cascade_skips_records_it_does_not_own() {
        let pk = "USER#u-3";
        let items = vec![item(pk, "USER#u-3"), item(pk, "CONNECTION#c-1")];

        let keys = cascade_order(pk, &items);

        let sks: Vec<&str> = keys.iter().map(sk_of).collect();
        assert_eq!(sks, vec!["USER#u-3"]);
    }
}
