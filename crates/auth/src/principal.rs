use serde::{Deserialize, Serialize};

use warden_core::UserId;

use crate::User;

/// Identity of an authenticated caller, as carried by a token.
///
/// This is what the gateway attaches to a request once validation succeeds;
/// it is deliberately smaller than [`User`] so remote validators only need to
/// return id + email.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    #[serde(rename = "id")]
    pub user_id: UserId,
    pub email: String,
}

impl Identity {
    pub fn new(user_id: UserId, email: impl Into<String>) -> Self {
        Self {
            user_id,
            email: email.into(),
        }
    }
}

impl From<&User> for Identity {
    fn from(user: &User) -> Self {
        Self::new(user.id, user.email.clone())
    }
}

impl core::fmt::Display for Identity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} <{}>", self.user_id, self.email)
    }
}
