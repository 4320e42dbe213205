use atlas_shared::{affiliations, auth, users, AppState};
use lambda_http::{
    http::{Method, StatusCode},
    Body, Error, Request, Response,
};
use std::env;
use std::sync::Arc;

/// Main Lambda handler - routes requests to user or affiliation endpoints
pub(crate) async fn function_handler(
    event: Request,
    state: Arc<AppState>,
) -> Result<Response<Body>, Error> {
    let method = event.method();
    let path = event.uri().path();
    let body = event.body();
    tracing::info!("API Lambda invoked - Method: {} Path: {}", method, path);

    // Handle CORS preflight
    if method == "OPTIONS" {
        return Ok(Response::builder()
            .status(StatusCode::OK)
            .header("Access-Control-Allow-Origin", "*")
            .header("Access-Control-Allow-Methods", "GET,POST,DELETE,OPTIONS")
            .header(
                "Access-Control-Allow-Headers",
                "Content-Type,Authorization,X-User-Id,X-User-Roles",
            )
            .body(Body::Empty)
            .map_err(Box::new)?);
    }

    let table_name = env::var("TABLE_NAME").unwrap_or_else(|_| "atlas".to_string());

    // One caller identity per request; every handler gets it explicitly.
    let caller = auth::caller_from_request(&event);

    // User administration routes
    if path.starts_with("/users") {
        let user_pool_id =
            env::var("COGNITO_USER_POOL_ID").unwrap_or_else(|_| "atlas-local".to_string());
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        return match (method, parts.as_slice()) {
            // POST /users - create account, grant "users", seed General program
            (&Method::POST, ["users"]) => {
                users::create_user(
                    &state.cognito_client,
                    &state.dynamo_client,
                    &state.ses_client,
                    &user_pool_id,
                    &table_name,
                    body,
                )
                .await
            }
            // DELETE /users/{id} - cascade delete of a user and owned records
            (&Method::DELETE, ["users", user_id]) => {
                users::remove_user(
                    &state.cognito_client,
                    &state.dynamo_client,
                    &user_pool_id,
                    &table_name,
                    &caller,
                    user_id,
                )
                .await
            }
            // POST /users/{id}/roles - grant a role
            (&Method::POST, ["users", user_id, "roles"]) => {
                users::add_to_role(&state.cognito_client, &user_pool_id, &caller, user_id, body)
                    .await
            }
            // DELETE /users/{id}/roles/{role} - revoke a role
            (&Method::DELETE, ["users", user_id, "roles", role]) => {
                users::remove_from_role(&state.cognito_client, &user_pool_id, &caller, user_id, role)
                    .await
            }
            _ => not_found(),
        };
    }

    // Affiliation routes
    if path.starts_with("/affiliations") {
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        return match (method, parts.as_slice()) {
            // POST /affiliations - create affiliation
            (&Method::POST, ["affiliations"]) => {
                affiliations::create_affiliation(&state.dynamo_client, &table_name, &caller, body)
                    .await
            }
            // DELETE /affiliations/{id} - delete affiliation
            (&Method::DELETE, ["affiliations", affiliation_id]) => {
                affiliations::delete_affiliation(
                    &state.dynamo_client,
                    &table_name,
                    &caller,
                    affiliation_id,
                )
                .await
            }
            _ => not_found(),
        };
    }

    tracing::warn!("No route matched - Method: {} Path: {}", method, path);
    not_found()
}

fn not_found() -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(serde_json::json!({"error": "Not found"}).to_string().into())
        .map_err(Box::new)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_cognitoidentityprovider::Client as CognitoClient;
    use aws_sdk_dynamodb::Client as DynamoClient;
    use aws_sdk_sesv2::Client as SesClient;

    // Authorization is checked before any AWS call, so the denial paths run
    // against clients that never send anything.
    async fn test_state() -> Arc<AppState> {
        std::env::set_var("AWS_REGION", "us-east-1");
        let config = aws_config::load_from_env().await;
        AppState::new(
            CognitoClient::new(&config),
            DynamoClient::new(&config),
            SesClient::new(&config),
            None,
        )
    }

    fn request(method: Method, path: &str, body: Body) -> Request {
        lambda_http::http::Request::builder()
            .method(method)
            .uri(format!("https://api.example.com{}", path))
            .body(body)
            .unwrap()
    }

    fn authenticated_request(method: Method, path: &str, roles: &str, body: Body) -> Request {
        lambda_http::http::Request::builder()
            .method(method)
            .uri(format!("https://api.example.com{}", path))
            .header("X-User-Id", "caller-1")
            .header("X-User-Roles", roles)
            .body(body)
            .unwrap()
    }

    fn body_json(response: &Response<Body>) -> serde_json::Value {
        serde_json::from_slice(response.body()).unwrap()
    }

    #[tokio::test]
    async fn preflight_is_allowed() {
        let response = function_handler(request(Method::OPTIONS, "/users", Body::Empty), test_state().await)
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn remove_user_requires_authentication() {
        let response = function_handler(
            request(Method::DELETE, "/users/u-1", Body::Empty),
            test_state().await,
        )
        .await
        .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_json(&response)["error"], "NotAuthorized");
    }

    #[tokio::test]
    async fn remove_user_requires_admin() {
        let response = function_handler(
            authenticated_request(Method::DELETE, "/users/u-1", "users", Body::Empty),
            test_state().await,
        )
        .await
        .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_json(&response)["error"], "NotAuthorized");
    }

    #[tokio::test]
    async fn role_grant_requires_admin() {
        let response = function_handler(
            authenticated_request(
                Method::POST,
                "/users/u-1/roles",
                "users",
                Body::from(r#"{"role": "admin"}"#),
            ),
            test_state().await,
        )
        .await
        .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn role_revoke_requires_authentication() {
        let response = function_handler(
            request(Method::DELETE, "/users/u-1/roles/admin", Body::Empty),
            test_state().await,
        )
        .await
        .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn affiliation_insert_requires_authentication() {
        let response = function_handler(
            request(Method::POST, "/affiliations", Body::from(r#"{"name": "Foo"}"#)),
            test_state().await,
        )
        .await
        .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_json(&response)["error"], "NotAuthorized");
    }

    #[tokio::test]
    async fn affiliation_remove_requires_authentication() {
        let response = function_handler(
            request(Method::DELETE, "/affiliations/aff-1", Body::Empty),
            test_state().await,
        )
        .await
        .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let response = function_handler(
            request(Method::GET, "/telescope", Body::Empty),
            test_state().await,
        )
        .await
        .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
