use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ========== USER ==========
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub id: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Accepted on input, never written back out.
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub specializations: BTreeSet<String>,
}

impl User {
    /// Strip the fields that must never leave the service in search results.
    pub fn scrubbed_for_search(mut self) -> Self {
        self.password = None;
        self.email = None;
        self
    }

    pub fn without_password(mut self) -> Self {
        self.password = None;
        self
    }
}

/// Sparse profile update: `None` means "leave unchanged".
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub bio: Option<String>,
    pub role: Option<String>,
    pub full_name: Option<String>,
    pub specializations: Option<BTreeSet<String>>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct UserCounts {
    pub followers: u64,
    pub following: u64,
}

// ========== POST INSIGHTS ==========
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PostInsights {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub post_id: String,
    pub views: u64,
    pub unique_viewers: u64,
    pub like_count: u64,
    pub comment_count: u64,
    pub share_count: u64,
    pub engagement_rate: f64,
}

impl PostInsights {
    /// A zeroed record for a post that has never been seen.
    pub fn new(post_id: &str) -> Self {
        Self {
            id: None,
            post_id: post_id.to_string(),
            views: 0,
            unique_viewers: 0,
            like_count: 0,
            comment_count: 0,
            share_count: 0,
            engagement_rate: 0.0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordViewRequest {
    pub viewer_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SetCountRequest {
    pub count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_never_serialized() {
        let user: User = serde_json::from_value(serde_json::json!({
            "id": "u1",
            "username": "ada",
            "email": "ada@example.com",
            "password": "hunter2",
            "fullName": "Ada Lovelace",
            "specializations": ["math", "engines", "math"]
        }))
        .unwrap();

        assert_eq!(user.password.as_deref(), Some("hunter2"));
        assert_eq!(user.specializations.len(), 2);

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["fullName"], "Ada Lovelace");
        assert_eq!(json["email"], "ada@example.com");
    }

    #[test]
    fn test_search_scrub_drops_email_and_password() {
        let user = User {
            id: "u1".into(),
            username: "ada".into(),
            email: Some("ada@example.com".into()),
            password: Some("secret".into()),
            ..Default::default()
        };

        let json = serde_json::to_value(user.scrubbed_for_search()).unwrap();
        assert!(json.get("email").is_none());
        assert!(json.get("password").is_none());
        assert_eq!(json["username"], "ada");
    }

    #[test]
    fn test_insights_wire_format_is_camel_case() {
        let json = serde_json::to_value(PostInsights::new("p1")).unwrap();
        assert_eq!(json["postId"], "p1");
        assert_eq!(json["uniqueViewers"], 0);
        assert_eq!(json["engagementRate"], 0.0);
        assert!(json.get("id").is_none());
    }
}
