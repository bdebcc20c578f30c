use serde::{Deserialize, Serialize};

pub const DEFAULT_USER_ID: &str = "u1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_timezone() -> String {
    "Asia/Jakarta".to_string()
}

impl User {
    /// The single local user seeded into a fresh document.
    pub fn default_local() -> Self {
        User {
            id: DEFAULT_USER_ID.to_string(),
            name: "Local User".to_string(),
            timezone: default_timezone(),
        }
    }
}
