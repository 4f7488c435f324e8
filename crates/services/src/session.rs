use alerta_db::models::{Category, Role};
use bson::oid::ObjectId;

/// Who is acting. Resolved once per request or connection and passed
/// explicitly to everything that needs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub user_id: ObjectId,
    pub username: String,
    pub role: Role,
}

impl SessionContext {
    pub fn new(user_id: ObjectId, username: impl Into<String>, role: Role) -> Self {
        Self {
            user_id,
            username: username.into(),
            role,
        }
    }

    /// Category served by a responder, `None` for citizens.
    pub fn responder_category(&self) -> Option<Category> {
        self.role.category()
    }

    pub fn is_citizen(&self) -> bool {
        !self.role.is_responder()
    }
}
