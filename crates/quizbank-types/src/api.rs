use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChangePasswordRequest {
    #[serde(rename = "currentPassword")]
    pub current_password: String,
    #[serde(rename = "newPassword")]
    pub new_password: String,
}

/// Public projection of a user. The password hash never leaves the DB
/// layer, so there is no field for it to leak through.
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: UserResponse,
    pub token: String,
}

// -- Tests --

/// List projection: content is deliberately omitted.
#[derive(Debug, Serialize)]
pub struct TestSummary {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
}

/// Full test record, content decoded back into its canonical mapping.
#[derive(Debug, Serialize)]
pub struct TestResponse {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub content: Map<String, Value>,
}
