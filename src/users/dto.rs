use serde::Deserialize;

/// Partial update; absent fields stay as they are.
#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}
