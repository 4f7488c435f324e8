use alerta_db::models::{Role, User};
use async_trait::async_trait;
use bson::{DateTime, doc, oid::ObjectId};
use mongodb::Database;

use super::base::{BaseDao, DaoResult};
use crate::store::repository::UserRepository;

pub struct UserDao {
    pub base: BaseDao<User>,
}

impl UserDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, User::COLLECTION),
        }
    }
}

#[async_trait]
impl UserRepository for UserDao {
    async fn insert(&self, user: &User) -> DaoResult<ObjectId> {
        self.base.insert(user).await
    }

    async fn find_by_id(&self, id: ObjectId) -> DaoResult<User> {
        self.base.find_by_id(id).await
    }

    async fn find_by_email(&self, email: &str) -> DaoResult<Option<User>> {
        self.base.find_one(doc! { "email": email }).await
    }

    async fn find_by_username(&self, username: &str) -> DaoResult<Option<User>> {
        self.base.find_one(doc! { "username": username }).await
    }

    async fn find_by_role(&self, role: Role) -> DaoResult<Vec<User>> {
        self.base
            .find_sorted(doc! { "role": role.as_str() }, doc! { "_id": 1 }, None)
            .await
    }

    async fn set_push_token(&self, id: ObjectId, token: Option<String>) -> DaoResult<bool> {
        self.base
            .set_where(
                doc! { "_id": id },
                doc! { "push_token": token, "updated_at": DateTime::now() },
            )
            .await
    }
}
