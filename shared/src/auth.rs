use lambda_http::{Request, RequestExt};

pub const ADMIN_ROLE: &str = "admin";
pub const USERS_ROLE: &str = "users";

/// Caller identity for a single request.
///
/// Extracted once at the routing layer and passed into every handler, so
/// authorization checks are plain functions of the request instead of an
/// ambient "current user".
#[derive(Debug, Clone, Default)]
pub struct Caller {
    /// Cognito subject, None for unauthenticated callers.
    pub user_id: Option<String>,
    /// Cognito group memberships.
    pub roles: Vec<String>,
}

impl Caller {
    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(ADMIN_ROLE)
    }
}

/// Extract the caller from the API Gateway JWT authorizer context.
/// In local development, X-User-Id / X-User-Roles headers override.
pub fn caller_from_request(event: &Request) -> Caller {
    let user_id = event
        .headers()
        .get("X-User-Id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .or_else(|| {
            event
                .request_context()
                .authorizer()
                .and_then(|auth| auth.jwt.as_ref())
                .and_then(|jwt| jwt.claims.get("sub"))
                .map(|s| s.to_string())
        });

    let roles = event
        .headers()
        .get("X-User-Roles")
        .and_then(|v| v.to_str().ok())
        .map(parse_groups)
        .or_else(|| {
            event
                .request_context()
                .authorizer()
                .and_then(|auth| auth.jwt.as_ref())
                .and_then(|jwt| jwt.claims.get("cognito:groups"))
                .map(|s| parse_groups(s))
        })
        .unwrap_or_default();

    Caller { user_id, roles }
}

/// Parse the "cognito:groups" claim. The HTTP API JWT authorizer flattens
/// the group list to "[admin users]"; other paths deliver "admin,users".
pub fn parse_groups(raw: &str) -> Vec<String> {
    raw.trim_start_matches('[')
        .trim_end_matches(']')
        .split([',', ' '])
        .filter(|s| !s.is_empty())
        .map(|s| s.trim().to_string())
        .collect()
}

/// Whether a caller may subscribe to a feed. The users feed is admin-only;
/// everything else is open to any connection.
pub fn can_subscribe(feed: &str, caller: &Caller) -> bool {
    match feed {
        "users" => caller.is_admin(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lambda_http::{http::Method, Body};

    #[test]
    fn parse_groups_handles_bracketed_claim() {
        assert_eq!(parse_groups("[admin users]"), vec!["admin", "users"]);
    }

    #[test]
    fn parse_groups_handles_comma_separated_claim() {
        assert_eq!(parse_groups("admin,users"), vec!["admin", "users"]);
    }

    #[test]
    fn parse_groups_handles_empty_claim() {
        assert!(parse_groups("[]").is_empty());
        assert!(parse_groups("").is_empty());
    }

    #[test]
    fn request_without_identity_is_unauthenticated() {
        let request = Request::default();

        let caller = caller_from_request(&request);
        assert!(!caller.is_authenticated());
        assert!(caller.roles.is_empty());
    }

    #[test]
    fn header_override_yields_authenticated_caller() {
        let request = lambda_http::http::Request::builder()
            .method(Method::GET)
            .uri("https://api.example.com/users")
            .header("X-User-Id", "user-1")
            .header("X-User-Roles", "users")
            .body(Body::Empty)
            .unwrap();

        let caller = caller_from_request(&request);
        assert_eq!(caller.user_id.as_deref(), Some("user-1"));
        assert!(caller.is_authenticated());
        assert!(caller.has_role(USERS_ROLE));
        assert!(!caller.is_admin());
    }

    #[test]
    fn users_feed_requires_admin() {
        let admin = Caller {
            user_id: Some("admin-1".to_string()),
            roles: vec![ADMIN_ROLE.to_string()],
        };
        let member = Caller {
            user_id: Some("user-1".to_string()),
            roles: vec![USERS_ROLE.to_string()],
        };

        assert!(can_subscribe("users", &admin));
        assert!(!can_subscribe("users", &member));
        assert!(can_subscribe("affiliations", &member));
        assert!(can_subscribe("affiliations", &Caller::default()));
    }
}
