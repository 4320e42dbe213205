use serde::{Deserialize, Serialize};

// ========== USER ==========
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Profile {
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affiliation: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    pub user_id: String,
    pub email: String,
    pub profile: Profile,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub profile: Profile,
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: String,
}

/// Projection published on the users feed: profile and email only.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserFeedEntry {
    pub user_id: String,
    pub email: String,
    pub profile: Profile,
}

// ========== PROGRAM ==========
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Program {
    pub program_id: String,
    pub name: String,
    pub kind: String, // general | asteroid
    pub owner: String,
    pub created_at: String,
}

// ========== OBSERVATION ==========
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Observation {
    pub observation_id: String,
    pub target: String,
    pub owner: String,
    pub created_at: String,
}

// ========== SESSION ==========
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Session {
    pub session_id: String,
    pub owner: String,
    pub created_at: String,
}

// ========== AFFILIATION ==========
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Affiliation {
    pub affiliation_id: String,
    pub name: String,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateAffiliationRequest {
    pub name: String,
}

// ========== ERRORS ==========
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_entry_exposes_profile_and_email_only() {
        let entry = UserFeedEntry {
            user_id: "u-1".to_string(),
            email: "astro@example.edu".to_string(),
            profile: Profile {
                first_name: "Vera".to_string(),
                last_name: "Rubin".to_string(),
                affiliation: None,
            },
        };

        let value = serde_json::to_value(&entry).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 3);
        assert!(object.contains_key("user_id"));
        assert!(object.contains_key("email"));
        assert!(object.contains_key("profile"));
    }

    #[test]
    fn profile_omits_missing_affiliation() {
        let profile = Profile {
            first_name: "Edwin".to_string(),
            last_name: "Hubble".to_string(),
            affiliation: None,
        };

        let value = serde_json::to_value(&profile).unwrap();
        assert!(value.get("affiliation").is_none());
    }
}
