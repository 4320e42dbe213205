pub mod types;
pub mod auth;
pub mod users;
pub mod programs;
pub mod affiliations;
pub mod sockets;
pub mod email;

use aws_sdk_apigatewaymanagement::Client as ApiGatewayManagementClient;
use aws_sdk_cognitoidentityprovider::Client as CognitoClient;
use aws_sdk_dynamodb::Client as DynamoClient;
use aws_sdk_sesv2::Client as SesClient;
use std::sync::Arc;

/// Shared application state
pub struct AppState {
    pub cognito_client: CognitoClient,
    pub dynamo_client: DynamoClient,
    pub ses_client: SesClient,
    pub api_gateway_client: Option<ApiGatewayManagementClient>,
}

impl AppState {
    pub fn new(
        cognito_client: CognitoClient,
        dynamo_client: DynamoClient,
        ses_client: SesClient,
        api_gateway_client: Option<ApiGatewayManagementClient>,
    ) -> Arc<Self> {
        Arc::new(Self {
            cognito_client,
            dynamo_client,
            ses_client,
            api_gateway_client,
        })
    }
}
