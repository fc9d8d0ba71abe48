//! Identity provider contract

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The acting user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl User {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
            display_name: None,
        }
    }
}

/// Resolves the user on whose behalf draft operations run
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The signed-in user, or `None` when nobody is signed in
    async fn current_user(&self) -> Option<User>;
}

/// A fixed identity, used by the command line and in tests
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    user: Option<User>,
}

impl StaticIdentity {
    pub fn new(user: User) -> Self {
        Self { user: Some(user) }
    }

    pub fn anonymous() -> Self {
        Self { user: None }
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn current_user(&self) -> Option<User> {
        self.user.clone()
    }
}
