use std::collections::HashSet;
use std::sync::Arc;

use alerta_db::models::{Category, Role};
use bson::oid::ObjectId;
use tracing::{debug, warn};

use crate::dao::base::{DaoError, DaoResult};
use crate::push::PushGateway;
use crate::store::UserRepository;

/// A user that can be reached by push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushDestination {
    pub user_id: ObjectId,
    pub username: String,
    pub token: String,
}

/// Resolves which devices should receive a given alert.
pub struct RecipientDirectory {
    users: Arc<dyn UserRepository>,
    gateway: Arc<dyn PushGateway>,
}

impl RecipientDirectory {
    pub fn new(users: Arc<dyn UserRepository>, gateway: Arc<dyn PushGateway>) -> Self {
        Self { users, gateway }
    }

    /// Every responder of `category` with a well-formed token, one entry
    /// per distinct token. Users without a usable token are skipped.
    pub async fn resolve_recipients(&self, category: Category) -> DaoResult<Vec<PushDestination>> {
        let responders = self.users.find_by_role(Role::from(category)).await?;
        let mut seen = HashSet::new();
        let mut destinations = Vec::with_capacity(responders.len());

        for user in responders {
            let Some(user_id) = user.id else { continue };
            let Some(token) = user.push_token.filter(|t| !t.is_empty()) else {
                debug!(%user_id, %category, "Responder has no push token, skipping");
                continue;
            };
            if !self.gateway.is_valid_token(&token) {
                warn!(%user_id, %category, "Responder has a malformed push token, skipping");
                continue;
            }
            if !seen.insert(token.clone()) {
                continue;
            }
            destinations.push(PushDestination {
                user_id,
                username: user.username,
                token,
            });
        }
        Ok(destinations)
    }

    /// The reporter's device, or `None` if the user is gone or has no
    /// usable token.
    pub async fn resolve_user(&self, user_id: ObjectId) -> DaoResult<Option<PushDestination>> {
        let user = match self.users.find_by_id(user_id).await {
            Ok(user) => user,
            Err(DaoError::NotFound) => return Ok(None),
            Err(e) => return Err(e),
        };
        Ok(user
            .push_token
            .filter(|t| self.gateway.is_valid_token(t))
            .map(|token| PushDestination {
                user_id,
                username: user.username,
                token,
            }))
    }
}
