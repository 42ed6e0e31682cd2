use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    Editor,
    Viewer,
}

/// An operator account. Credentials are issued and verified by the external
/// authentication layer; this record only carries the stored hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub name: String,
    #[serde(default)]
    pub dept: String,
    pub role: Role,
    pub password_hash: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A [`User`] without its password hash, safe to return to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: String,
    pub username: String,
    pub name: String,
    pub dept: String,
    pub role: Role,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        PublicUser {
            id: user.id,
            username: user.username,
            name: user.name,
            dept: user.dept,
            role: user.role,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}
